use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use utoipa::ToSchema;

use crate::model::branch::Branch;
use crate::model::employee::{Employee, EmployeeDocument};
use crate::model::record::Record;
use crate::utils::expiry::{ExpiryStatus, classify, days_left, in_alert_window};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AlertSource {
    Record { branch: Branch },
    Employee { document: EmployeeDocument },
}

/// Derived view row; alerts are recomputed on every request and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Alert {
    pub source: AlertSource,
    /// Id of the record or employee row.
    pub owner_id: i64,
    /// Record type, or the employee's name.
    pub subject: String,
    pub reference: String,
    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub expiry_date: Option<NaiveDate>,
    pub days_left: Option<i64>,
    pub status: ExpiryStatus,
}

impl Alert {
    fn candidate(
        source: AlertSource,
        owner_id: i64,
        subject: &str,
        reference: &str,
        expiry_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Option<Alert> {
        let days = days_left(expiry_date, today)?;
        if !in_alert_window(days) {
            return None;
        }
        Some(Alert {
            source,
            owner_id,
            subject: subject.to_string(),
            reference: reference.to_string(),
            expiry_date,
            days_left: Some(days),
            status: classify(Some(days)),
        })
    }
}

/// Missing dates sort last.
fn by_expiry(a: &Alert, b: &Alert) -> Ordering {
    match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Scans records of every branch and the three documents of every employee.
pub fn build_alerts(
    records: &[(Branch, Record)],
    employees: &[Employee],
    today: NaiveDate,
) -> Vec<Alert> {
    let from_records = records.iter().filter_map(|(branch, r)| {
        Alert::candidate(
            AlertSource::Record { branch: *branch },
            r.id,
            &r.record_type,
            &r.number,
            r.expiry_date,
            today,
        )
    });

    let from_employees = employees.iter().flat_map(|e| {
        e.documents()
            .into_iter()
            .filter_map(move |(document, number, expiry)| {
                Alert::candidate(
                    AlertSource::Employee { document },
                    e.id,
                    &e.name,
                    number,
                    expiry,
                    today,
                )
            })
    });

    let mut alerts: Vec<Alert> = from_records.chain(from_employees).collect();
    alerts.sort_by(by_expiry);
    alerts
}
