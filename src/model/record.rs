use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A licence, permit or other document held by a branch.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "record_type": "Municipality licence",
        "number": "4410023",
        "expiry_date": "2025-03-01",
        "notes": "",
        "created_at": "2024-01-01T09:00:00"
    })
)]
pub struct Record {
    pub id: i64,
    pub record_type: String,
    pub number: String,
    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub expiry_date: Option<NaiveDate>,
    pub notes: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}
