use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct FinancialCommitment {
    pub id: i64,
    #[schema(example = "Landlord")]
    pub party: String,
    #[schema(example = 100.0)]
    pub amount: f64,
    /// Task kept in step with `party` and `amount`.
    pub task_id: Option<i64>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

/// Title of the task that mirrors a commitment.
pub fn commitment_task_title(party: &str, amount: f64) -> String {
    format!("Financial commitment: {party} - {amount:.2} SAR")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_carries_party_and_two_decimal_amount() {
        assert_eq!(
            commitment_task_title("X", 100.0),
            "Financial commitment: X - 100.00 SAR"
        );
        assert_eq!(
            commitment_task_title("Landlord", 250.5),
            "Financial commitment: Landlord - 250.50 SAR"
        );
    }
}
