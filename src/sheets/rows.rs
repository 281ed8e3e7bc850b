//! Worksheet layouts for every mirrored entity.

use chrono::NaiveDate;

use super::MirrorRow;
use crate::model::commission::MonthlyCommission;
use crate::model::commitment::FinancialCommitment;
use crate::model::daily::{DailyHeader, DailyTotals};
use crate::model::employee::Employee;
use crate::model::record::Record;
use crate::model::task::Task;

pub const DAILY_SHEET: &str = "daily_accounting";
pub const COMMISSION_SHEET: &str = "monthly_commission";
pub const COMMITMENTS_SHEET: &str = "financial_commitments";
pub const TASKS_SHEET: &str = "tasks_manual";
pub const EMPLOYEES_SHEET: &str = "employees";
// records use Branch::records_table() as their worksheet name

fn date_cell(d: Option<NaiveDate>) -> String {
    d.map(|d| d.to_string()).unwrap_or_default()
}

fn money(v: f64) -> String {
    format!("{v:.2}")
}

pub struct DailyRow<'a> {
    pub header: &'a DailyHeader,
    pub totals: DailyTotals,
}

impl MirrorRow for DailyRow<'_> {
    const HEADER: &'static [&'static str] = &[
        "id",
        "branch",
        "date",
        "cash_start",
        "cash_end",
        "inputs",
        "general_expenses",
        "petty_expenses",
        "total_overall",
        "total_in_enjaz",
        "error",
        "notes",
    ];

    fn key(&self) -> i64 {
        self.header.id
    }

    fn cells(&self) -> Vec<String> {
        let t = &self.totals;
        vec![
            self.header.id.to_string(),
            self.header.branch.to_uppercase(),
            self.header.day.to_string(),
            money(t.cash_start),
            money(t.cash_end),
            money(t.inputs),
            money(t.general),
            money(t.petty),
            money(t.total_overall),
            money(t.total_in_enjaz),
            money(t.error),
            self.header.notes.clone(),
        ]
    }
}

impl MirrorRow for MonthlyCommission {
    const HEADER: &'static [&'static str] = &[
        "id",
        "month",
        "sales",
        "rate",
        "fixed_deduction",
        "employee_count",
        "total_commission",
        "employee_commission",
    ];

    fn key(&self) -> i64 {
        self.id
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.month.clone(),
            money(self.sales),
            self.rate.to_string(),
            money(self.fixed_deduction),
            self.employee_count.to_string(),
            money(self.total_commission),
            money(self.employee_commission),
        ]
    }
}

impl MirrorRow for FinancialCommitment {
    const HEADER: &'static [&'static str] = &["id", "party", "amount", "task_id", "created_at"];

    fn key(&self) -> i64 {
        self.id
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.party.clone(),
            money(self.amount),
            self.task_id.map(|t| t.to_string()).unwrap_or_default(),
            self.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]
    }
}

impl MirrorRow for Task {
    const HEADER: &'static [&'static str] = &["id", "title", "due_date", "created_at"];

    fn key(&self) -> i64 {
        self.id
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.title.clone(),
            date_cell(self.due_date),
            self.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]
    }
}

impl MirrorRow for Record {
    const HEADER: &'static [&'static str] = &["id", "record_type", "number", "expiry_date", "notes"];

    fn key(&self) -> i64 {
        self.id
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.record_type.clone(),
            self.number.clone(),
            date_cell(self.expiry_date),
            self.notes.clone(),
        ]
    }
}

impl MirrorRow for Employee {
    const HEADER: &'static [&'static str] = &[
        "id",
        "name",
        "job_title",
        "nationality",
        "phone",
        "passport_number",
        "passport_expiry",
        "residency_number",
        "residency_expiry",
        "insurance_number",
        "insurance_expiry",
        "notes",
    ];

    fn key(&self) -> i64 {
        self.id
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.job_title.clone(),
            self.nationality.clone(),
            self.phone.clone(),
            self.passport_number.clone(),
            date_cell(self.passport_expiry),
            self.residency_number.clone(),
            date_cell(self.residency_expiry),
            self.insurance_number.clone(),
            date_cell(self.insurance_expiry),
            self.notes.clone(),
        ]
    }
}
