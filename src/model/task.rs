use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub due_date: Option<NaiveDate>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
    /// Set when the task is the projection of a financial commitment.
    pub commitment_id: Option<i64>,
}
