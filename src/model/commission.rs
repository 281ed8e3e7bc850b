use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Singleton settings row used when a month is saved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CommissionSettings {
    #[schema(example = 0.01)]
    pub rate: f64,
    #[schema(example = 500.0)]
    pub fixed_deduction: f64,
    #[schema(example = 4)]
    pub employee_count: i64,
}

impl Default for CommissionSettings {
    fn default() -> Self {
        Self {
            rate: 0.0,
            fixed_deduction: 0.0,
            employee_count: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct CommissionBreakdown {
    pub total_commission: f64,
    pub employee_commission: f64,
}

/// `employee_count` is clamped to at least one.
pub fn compute_commission(sales: f64, settings: &CommissionSettings) -> CommissionBreakdown {
    let total_commission = sales * settings.rate;
    let employees = settings.employee_count.max(1) as f64;
    CommissionBreakdown {
        total_commission,
        employee_commission: (total_commission - settings.fixed_deduction) / employees,
    }
}

/// Saved month. `rate`, `fixed_deduction` and `employee_count` are the
/// settings in force when the month was saved.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct MonthlyCommission {
    pub id: i64,
    #[schema(example = "2024-01")]
    pub month: String,
    pub sales: f64,
    pub rate: f64,
    pub fixed_deduction: f64,
    pub employee_count: i64,
    pub total_commission: f64,
    pub employee_commission: f64,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

impl MonthlyCommission {
    pub fn snapshot(&self) -> CommissionSettings {
        CommissionSettings {
            rate: self.rate,
            fixed_deduction: self.fixed_deduction,
            employee_count: self.employee_count,
        }
    }

    /// Figures for display, always derived from the stored snapshot.
    pub fn breakdown(&self) -> CommissionBreakdown {
        compute_commission(self.sales, &self.snapshot())
    }
}

/// Normalizes `YYYY-MM` (or a full `YYYY-MM-DD`) to `YYYY-MM`.
pub fn parse_month(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()?;
    Some(date.format("%Y-%m").to_string())
}
