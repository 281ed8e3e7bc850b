use chrono::NaiveDate;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::utils::form::parse_optional_date;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    Text(String),
    Date(Option<NaiveDate>),
    I64(i64),
}

/// How a column's JSON value is read.
#[derive(Debug, Clone, Copy)]
pub enum ColumnKind {
    Text,
    /// Empty text, `null` or blank string means no date.
    Date,
}

/// A column that clients are allowed to update.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
}

impl Column {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
            required: false,
        }
    }

    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
            required: true,
        }
    }

    pub const fn date(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Date,
            required: false,
        }
    }
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn text_value(column: &Column, value: &Value, payload: &Value) -> Result<SqlValue, AppError> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        _ => {
            return Err(AppError::invalid_input(
                format!("{} must be text", column.name),
                payload,
            ));
        }
    };
    if column.required && text.is_empty() {
        return Err(AppError::invalid_input(
            format!("{} is required", column.name),
            payload,
        ));
    }
    Ok(SqlValue::Text(text))
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only names listed in `columns` may appear in the payload, so the SET
/// clause never contains client-chosen identifiers.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    columns: &[Column],
    id_column: &str,
    id_value: i64,
) -> Result<SqlUpdate, AppError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::validation("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(AppError::validation("No fields provided for update"));
    }

    let mut set = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let column = columns
            .iter()
            .find(|c| c.name == key)
            .ok_or_else(|| AppError::invalid_input(format!("Unknown field {key}"), payload))?;

        let bound = match column.kind {
            ColumnKind::Text => text_value(column, value, payload)?,
            ColumnKind::Date => {
                let raw = match value {
                    Value::String(s) => Some(s.as_str()),
                    Value::Null => None,
                    _ => {
                        return Err(AppError::invalid_input(
                            format!("{} must be a date", column.name),
                            payload,
                        ));
                    }
                };
                let date = parse_optional_date(raw).map_err(|bad| {
                    AppError::invalid_input(
                        format!("{} is not a valid date: {bad}", column.name),
                        payload,
                    )
                })?;
                SqlValue::Date(date)
            }
        };

        set.push(format!("{} = ?", column.name));
        values.push(bound);
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        set.join(", "),
        id_column
    );

    // WHERE id = ?
    values.push(SqlValue::I64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &SqlitePool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[Column] = &[
        Column::required("name"),
        Column::text("phone"),
        Column::date("passport_expiry"),
    ];

    #[test]
    fn builds_set_clause_from_allowed_columns() {
        let payload = json!({"name": " Ali ", "passport_expiry": "2025-01-31"});
        let update = build_update_sql("employees", &payload, COLUMNS, "id", 9).unwrap();
        assert_eq!(
            update.sql,
            "UPDATE employees SET name = ?, passport_expiry = ? WHERE id = ?"
        );
        assert_eq!(
            update.values,
            vec![
                SqlValue::Text("Ali".into()),
                SqlValue::Date(NaiveDate::from_ymd_opt(2025, 1, 31)),
                SqlValue::I64(9),
            ]
        );
    }

    #[test]
    fn blank_date_clears_the_column() {
        let payload = json!({"passport_expiry": ""});
        let update = build_update_sql("employees", &payload, COLUMNS, "id", 1).unwrap();
        assert_eq!(update.values[0], SqlValue::Date(None));
    }

    #[test]
    fn rejects_unknown_fields_and_bad_values() {
        for payload in [
            json!({"id; DROP TABLE employees": "x"}),
            json!({"name": ""}),
            json!({"passport_expiry": "31/01/2025"}),
            json!({}),
            json!([1, 2]),
        ] {
            let err = build_update_sql("employees", &payload, COLUMNS, "id", 1).unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }));
        }
    }
}
