use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::AsRefStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "John Doe",
        "job_title": "Cashier",
        "nationality": "PH",
        "phone": "+966500000000",
        "passport_number": "P1234567",
        "passport_expiry": "2027-01-01",
        "residency_number": "2400000000",
        "residency_expiry": "2024-09-01",
        "insurance_number": "INS-88",
        "insurance_expiry": null,
        "notes": "",
        "created_at": "2024-01-01T09:00:00"
    })
)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub job_title: String,
    pub nationality: String,
    pub phone: String,
    pub passport_number: String,
    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub passport_expiry: Option<NaiveDate>,
    pub residency_number: String,
    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub residency_expiry: Option<NaiveDate>,
    pub insurance_number: String,
    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub insurance_expiry: Option<NaiveDate>,
    pub notes: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

/// The three expiry-tracked documents on an employee profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmployeeDocument {
    Passport,
    Residency,
    Insurance,
}

impl Employee {
    /// `(document, number, expiry)` for each tracked document.
    pub fn documents(&self) -> [(EmployeeDocument, &str, Option<NaiveDate>); 3] {
        [
            (
                EmployeeDocument::Passport,
                &self.passport_number,
                self.passport_expiry,
            ),
            (
                EmployeeDocument::Residency,
                &self.residency_number,
                self.residency_expiry,
            ),
            (
                EmployeeDocument::Insurance,
                &self.insurance_number,
                self.insurance_expiry,
            ),
        ]
    }
}
