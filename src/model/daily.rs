use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{AsRefStr, EnumIter, EnumString};
use utoipa::ToSchema;

/// Label given to a line item that has an amount but no description.
pub const UNLABELED_ITEM: &str = "Unlabeled";

/// The three child collections of a daily header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum LineKind {
    Input,
    General,
    Petty,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DailyHeader {
    pub id: i64,
    #[schema(example = "es1")]
    pub branch: String,
    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub day: NaiveDate,
    pub cash_start: f64,
    pub cash_end: f64,
    /// Total reported by the external point-of-sale system.
    pub total_in_enjaz: f64,
    pub notes: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, FromRow)]
pub struct LineItemRow {
    pub kind: String,
    pub label: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    #[schema(example = "Card sales")]
    pub label: String,
    #[schema(example = 200.0)]
    pub amount: f64,
}

/// Line items of one header, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct LineItems {
    pub inputs: Vec<LineItem>,
    pub general_expenses: Vec<LineItem>,
    pub petty_expenses: Vec<LineItem>,
}

impl LineItems {
    pub fn from_rows(rows: Vec<LineItemRow>) -> Self {
        let mut items = LineItems::default();
        for row in rows {
            let item = LineItem {
                label: row.label,
                amount: row.amount,
            };
            match row.kind.parse::<LineKind>() {
                Ok(LineKind::Input) => items.inputs.push(item),
                Ok(LineKind::General) => items.general_expenses.push(item),
                Ok(LineKind::Petty) => items.petty_expenses.push(item),
                Err(_) => {}
            }
        }
        items
    }

    pub fn of_kind(&self, kind: LineKind) -> &[LineItem] {
        match kind {
            LineKind::Input => &self.inputs,
            LineKind::General => &self.general_expenses,
            LineKind::Petty => &self.petty_expenses,
        }
    }
}

/// Reconciliation figures for one day, or summed over a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct DailyTotals {
    pub inputs: f64,
    pub general: f64,
    pub petty: f64,
    pub expenses: f64,
    pub cash_start: f64,
    pub cash_end: f64,
    pub total_overall: f64,
    pub total_in_enjaz: f64,
    /// `total_overall - total_in_enjaz`; non-zero means the books disagree.
    pub error: f64,
}

impl DailyTotals {
    /// Adds every field of `other` into `self`.
    pub fn accumulate(&mut self, other: &DailyTotals) {
        self.inputs += other.inputs;
        self.general += other.general;
        self.petty += other.petty;
        self.expenses += other.expenses;
        self.cash_start += other.cash_start;
        self.cash_end += other.cash_end;
        self.total_overall += other.total_overall;
        self.total_in_enjaz += other.total_in_enjaz;
        self.error += other.error;
    }
}

fn sum(items: &[LineItem]) -> f64 {
    items.iter().map(|i| i.amount).sum()
}

pub fn compute_totals(header: &DailyHeader, items: &LineItems) -> DailyTotals {
    let inputs = sum(&items.inputs);
    let general = sum(&items.general_expenses);
    let petty = sum(&items.petty_expenses);
    let expenses = general + petty;
    let total_overall = inputs + expenses + header.cash_end - header.cash_start;

    DailyTotals {
        inputs,
        general,
        petty,
        expenses,
        cash_start: header.cash_start,
        cash_end: header.cash_end,
        total_overall,
        total_in_enjaz: header.total_in_enjaz,
        error: total_overall - header.total_in_enjaz,
    }
}

/// Cleans raw `(label, amount)` pairs: rows with neither label nor amount are
/// dropped, rows with an amount but no label get [`UNLABELED_ITEM`].
pub fn normalize_items<I>(raw: I) -> Vec<LineItem>
where
    I: IntoIterator<Item = (String, f64)>,
{
    raw.into_iter()
        .filter_map(|(label, amount)| {
            let label = label.trim();
            match (label.is_empty(), amount == 0.0) {
                (true, true) => None,
                (true, false) => Some(LineItem {
                    label: UNLABELED_ITEM.to_string(),
                    amount,
                }),
                (false, _) => Some(LineItem {
                    label: label.to_string(),
                    amount,
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cash_start: f64, cash_end: f64, total_in_enjaz: f64) -> DailyHeader {
        DailyHeader {
            id: 1,
            branch: "es1".into(),
            day: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            cash_start,
            cash_end,
            total_in_enjaz,
            notes: String::new(),
            updated_at: None,
        }
    }

    fn item(label: &str, amount: f64) -> LineItem {
        LineItem {
            label: label.into(),
            amount,
        }
    }

    #[test]
    fn reconciliation_example() {
        let items = LineItems {
            inputs: vec![item("sales", 200.0)],
            general_expenses: vec![item("rent", 30.0)],
            petty_expenses: vec![],
        };
        let t = compute_totals(&header(100.0, 150.0, 320.0), &items);
        assert_eq!(t.expenses, 30.0);
        assert_eq!(t.total_overall, 280.0);
        assert_eq!(t.error, -40.0);
    }

    #[test]
    fn overall_is_inputs_plus_expenses_plus_cash_delta() {
        let items = LineItems {
            inputs: vec![item("a", 10.0), item("b", 5.5)],
            general_expenses: vec![item("c", 3.0)],
            petty_expenses: vec![item("d", 1.25), item("e", 0.75)],
        };
        let t = compute_totals(&header(20.0, 50.0, 60.0), &items);
        assert_eq!(t.inputs, 15.5);
        assert_eq!(t.general, 3.0);
        assert_eq!(t.petty, 2.0);
        assert_eq!(t.total_overall, 15.5 + 3.0 + 2.0 + 50.0 - 20.0);
        assert_eq!(t.error, t.total_overall - 60.0);
    }

    #[test]
    fn empty_day_is_cash_delta_only() {
        let t = compute_totals(&header(100.0, 80.0, 0.0), &LineItems::default());
        assert_eq!(t.total_overall, -20.0);
        assert_eq!(t.error, -20.0);
    }

    #[test]
    fn normalize_drops_blank_rows_and_labels_orphans() {
        let items = normalize_items(vec![
            ("".to_string(), 0.0),
            ("  ".to_string(), 12.0),
            (" fuel ".to_string(), 0.0),
            ("cash".to_string(), 7.0),
        ]);
        assert_eq!(
            items,
            vec![item(UNLABELED_ITEM, 12.0), item("fuel", 0.0), item("cash", 7.0)]
        );
    }

    #[test]
    fn accumulate_adds_every_field() {
        let a = compute_totals(
            &header(1.0, 2.0, 3.0),
            &LineItems {
                inputs: vec![item("x", 4.0)],
                ..Default::default()
            },
        );
        let mut total = DailyTotals::default();
        total.accumulate(&a);
        total.accumulate(&a);
        assert_eq!(total.inputs, 8.0);
        assert_eq!(total.cash_start, 2.0);
        assert_eq!(total.total_overall, 2.0 * a.total_overall);
        assert_eq!(total.error, 2.0 * a.error);
    }

    #[test]
    fn rows_split_by_kind() {
        let items = LineItems::from_rows(vec![
            LineItemRow {
                kind: "input".into(),
                label: "a".into(),
                amount: 1.0,
            },
            LineItemRow {
                kind: "petty".into(),
                label: "b".into(),
                amount: 2.0,
            },
            LineItemRow {
                kind: "general".into(),
                label: "c".into(),
                amount: 3.0,
            },
        ]);
        assert_eq!(items.of_kind(LineKind::Input), &[item("a", 1.0)]);
        assert_eq!(items.of_kind(LineKind::Petty), &[item("b", 2.0)]);
        assert_eq!(items.of_kind(LineKind::General), &[item("c", 3.0)]);
    }
}
