use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::branch::Branch,
    model::daily::{
        DailyHeader, DailyTotals, LineItem, LineItemRow, LineItems, LineKind, compute_totals,
        normalize_items,
    },
    sheets::{
        Mirror,
        rows::{DAILY_SHEET, DailyRow},
    },
    utils::form::{AmountField, clean_text, parse_optional_date},
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use strum::IntoEnumIterator;
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};

const HEADER_COLUMNS: &str =
    "id, branch, day, cash_start, cash_end, total_in_enjaz, notes, updated_at";

// -------------------- DTOs --------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct DailyQuery {
    /// `YYYY-MM-DD`, defaults to today.
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MovementsQuery {
    /// `YYYY-MM-DD`, defaults to the first day of the current month.
    pub from: Option<String>,
    /// `YYYY-MM-DD`, defaults to today.
    pub to: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LineInput {
    #[serde(default)]
    #[schema(example = "Card sales")]
    pub label: String,
    #[serde(default)]
    #[schema(example = "1,200.50", value_type = String)]
    pub amount: AmountField,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SaveDaily {
    #[serde(default)]
    #[schema(example = 100.0, value_type = String)]
    pub cash_start: AmountField,
    #[serde(default)]
    #[schema(example = 150.0, value_type = String)]
    pub cash_end: AmountField,
    #[serde(default)]
    #[schema(example = 320.0, value_type = String)]
    pub total_in_enjaz: AmountField,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub inputs: Vec<LineInput>,
    #[serde(default)]
    pub general_expenses: Vec<LineInput>,
    #[serde(default)]
    pub petty_expenses: Vec<LineInput>,
}

impl SaveDaily {
    fn line_items(&self) -> LineItems {
        fn clean(lines: &[LineInput]) -> Vec<LineItem> {
            normalize_items(lines.iter().map(|l| (l.label.clone(), l.amount.value())))
        }
        LineItems {
            inputs: clean(&self.inputs),
            general_expenses: clean(&self.general_expenses),
            petty_expenses: clean(&self.petty_expenses),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyView {
    pub branch: Branch,
    pub header: DailyHeader,
    pub items: LineItems,
    pub totals: DailyTotals,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovementDay {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub header_id: i64,
    pub notes: String,
    pub totals: DailyTotals,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovementsView {
    pub branch: Branch,
    #[schema(value_type = String, format = "date")]
    pub from: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub to: NaiveDate,
    pub days: Vec<MovementDay>,
    /// Field-by-field sum of `days`.
    pub overall: DailyTotals,
}

// -------------------- Ledger operations --------------------

/// Returns the header for `(branch, day)`, creating an empty one first if
/// the pair has none.
pub async fn get_or_create_header(
    conn: &mut SqliteConnection,
    branch: Branch,
    day: NaiveDate,
) -> Result<DailyHeader, sqlx::Error> {
    sqlx::query(
        "INSERT INTO daily_headers (branch, day) VALUES (?, ?) ON CONFLICT(branch, day) DO NOTHING",
    )
    .bind(branch.as_ref())
    .bind(day)
    .execute(&mut *conn)
    .await?;

    sqlx::query_as::<_, DailyHeader>(&format!(
        "SELECT {HEADER_COLUMNS} FROM daily_headers WHERE branch = ? AND day = ?"
    ))
    .bind(branch.as_ref())
    .bind(day)
    .fetch_one(&mut *conn)
    .await
}

/// Replaces all three line-item collections of a header. Callers run this
/// inside the transaction that updates the header.
pub async fn replace_line_items(
    conn: &mut SqliteConnection,
    header_id: i64,
    items: &LineItems,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM daily_lines WHERE header_id = ?")
        .bind(header_id)
        .execute(&mut *conn)
        .await?;

    for kind in LineKind::iter() {
        for (position, item) in items.of_kind(kind).iter().enumerate() {
            sqlx::query(
                "INSERT INTO daily_lines (header_id, kind, position, label, amount) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(header_id)
            .bind(kind.as_ref())
            .bind(position as i64)
            .bind(&item.label)
            .bind(item.amount)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

pub async fn load_line_items(
    conn: &mut SqliteConnection,
    header_id: i64,
) -> Result<LineItems, sqlx::Error> {
    let rows = sqlx::query_as::<_, LineItemRow>(
        "SELECT kind, label, amount FROM daily_lines WHERE header_id = ? ORDER BY position, id",
    )
    .bind(header_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(LineItems::from_rows(rows))
}

fn resolve_date(raw: Option<&str>, default: NaiveDate) -> Result<NaiveDate, AppError> {
    parse_optional_date(raw)
        .map(|d| d.unwrap_or(default))
        .map_err(|bad| AppError::validation(format!("Invalid date: {bad}")))
}

// -------------------- Handlers --------------------

/// Daily sheet for one branch and date
#[utoipa::path(
    get,
    path = "/accounting/{branch}/daily",
    params(
        ("branch" = Branch, Path, description = "Branch code"),
        DailyQuery
    ),
    responses(
        (status = 200, description = "Header, line items and reconciliation", body = DailyView),
        (status = 400, description = "Invalid date"),
        (status = 403, description = "No permission for this branch")
    ),
    tag = "Accounting",
    security(("session_cookie" = []))
)]
#[instrument(name = "daily_get", skip_all, fields(user = %auth.username, branch = %branch))]
pub async fn get_daily(
    auth: AuthUser,
    branch: web::Path<Branch>,
    query: web::Query<DailyQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    let branch = branch.into_inner();
    auth.require(branch.accounting_perm())?;
    let day = resolve_date(query.date.as_deref(), Local::now().date_naive())?;

    let mut conn = pool.acquire().await?;
    let header = get_or_create_header(&mut conn, branch, day).await?;
    let items = load_line_items(&mut conn, header.id).await?;
    let totals = compute_totals(&header, &items);

    Ok(HttpResponse::Ok().json(DailyView {
        branch,
        header,
        items,
        totals,
    }))
}

/// Save the daily sheet, replacing every line item
#[utoipa::path(
    post,
    path = "/accounting/{branch}/daily",
    params(
        ("branch" = Branch, Path, description = "Branch code"),
        DailyQuery
    ),
    request_body = SaveDaily,
    responses(
        (status = 200, description = "Saved sheet with recomputed totals", body = DailyView),
        (status = 400, description = "Invalid date"),
        (status = 403, description = "No permission for this branch")
    ),
    tag = "Accounting",
    security(("session_cookie" = []))
)]
#[instrument(name = "daily_save", skip_all, fields(user = %auth.username, branch = %branch))]
pub async fn save_daily(
    auth: AuthUser,
    branch: web::Path<Branch>,
    query: web::Query<DailyQuery>,
    pool: web::Data<SqlitePool>,
    mirror: web::Data<Mirror>,
    payload: web::Json<SaveDaily>,
) -> Result<HttpResponse, AppError> {
    let branch = branch.into_inner();
    auth.require(branch.accounting_perm())?;
    let day = resolve_date(query.date.as_deref(), Local::now().date_naive())?;
    let items = payload.line_items();

    let mut tx = pool.begin().await?;
    let header = get_or_create_header(&mut tx, branch, day).await?;

    sqlx::query(
        r#"
        UPDATE daily_headers
        SET cash_start = ?, cash_end = ?, total_in_enjaz = ?, notes = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(payload.cash_start.value())
    .bind(payload.cash_end.value())
    .bind(payload.total_in_enjaz.value())
    .bind(clean_text(payload.notes.as_deref()))
    .bind(Local::now().naive_local())
    .bind(header.id)
    .execute(&mut *tx)
    .await?;

    replace_line_items(&mut tx, header.id, &items).await?;

    let header = sqlx::query_as::<_, DailyHeader>(&format!(
        "SELECT {HEADER_COLUMNS} FROM daily_headers WHERE id = ?"
    ))
    .bind(header.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    let totals = compute_totals(&header, &items);
    info!(header_id = header.id, %day, error = totals.error, "Daily sheet saved");

    mirror
        .upsert(
            DAILY_SHEET,
            &DailyRow {
                header: &header,
                totals,
            },
        )
        .await;

    Ok(HttpResponse::Ok().json(DailyView {
        branch,
        header,
        items,
        totals,
    }))
}

/// Per-day reconciliation over a date range, with an overall row
#[utoipa::path(
    get,
    path = "/accounting/{branch}/movements",
    params(
        ("branch" = Branch, Path, description = "Branch code"),
        MovementsQuery
    ),
    responses(
        (status = 200, description = "Per-day totals and their sum", body = MovementsView),
        (status = 400, description = "Invalid range"),
        (status = 403, description = "No permission for this branch")
    ),
    tag = "Accounting",
    security(("session_cookie" = []))
)]
#[instrument(name = "daily_movements", skip_all, fields(user = %auth.username, branch = %branch))]
pub async fn movements(
    auth: AuthUser,
    branch: web::Path<Branch>,
    query: web::Query<MovementsQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    let branch = branch.into_inner();
    auth.require(branch.accounting_perm())?;

    let today = Local::now().date_naive();
    let month_start = today.with_day(1).unwrap_or(today);
    let from = resolve_date(query.from.as_deref(), month_start)?;
    let to = resolve_date(query.to.as_deref(), today)?;
    if from > to {
        return Err(AppError::invalid_input(
            "Start date must not be after end date",
            &serde_json::json!({ "from": from, "to": to }),
        ));
    }

    let mut conn = pool.acquire().await?;
    let headers = sqlx::query_as::<_, DailyHeader>(&format!(
        "SELECT {HEADER_COLUMNS} FROM daily_headers WHERE branch = ? AND day BETWEEN ? AND ? ORDER BY day"
    ))
    .bind(branch.as_ref())
    .bind(from)
    .bind(to)
    .fetch_all(&mut *conn)
    .await?;

    debug!(count = headers.len(), %from, %to, "Aggregating daily sheets");

    let mut days = Vec::with_capacity(headers.len());
    let mut overall = DailyTotals::default();
    for header in headers {
        let items = load_line_items(&mut conn, header.id).await?;
        let totals = compute_totals(&header, &items);
        overall.accumulate(&totals);
        days.push(MovementDay {
            date: header.day,
            header_id: header.id,
            notes: header.notes,
            totals,
        });
    }

    Ok(HttpResponse::Ok().json(MovementsView {
        branch,
        from,
        to,
        days,
        overall,
    }))
}
