use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::commission::{CommissionSettings, MonthlyCommission, compute_commission, parse_month},
    model::permission::PermKey,
    sheets::{Mirror, rows::COMMISSION_SHEET},
    utils::form::AmountField,
};
use actix_web::{HttpResponse, web};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, instrument};
use utoipa::ToSchema;

const MONTH_COLUMNS: &str = "id, month, sales, rate, fixed_deduction, employee_count, total_commission, employee_commission, created_at";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateSettings {
    /// Fraction of sales, e.g. `0.01` for one percent.
    #[schema(example = 0.01, value_type = String)]
    pub rate: AmountField,
    #[serde(default)]
    #[schema(example = 500.0, value_type = String)]
    pub fixed_deduction: AmountField,
    #[schema(example = 4, value_type = String)]
    pub employee_count: AmountField,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SaveMonth {
    /// `YYYY-MM`; a full date is accepted and truncated to its month.
    #[schema(example = "2024-01")]
    pub month: String,
    #[schema(example = "50,000", value_type = String)]
    pub sales: AmountField,
}

#[derive(Serialize, ToSchema)]
pub struct CommissionOverview {
    pub settings: CommissionSettings,
    pub months: Vec<MonthlyCommission>,
}

async fn load_settings(pool: &SqlitePool) -> Result<CommissionSettings, sqlx::Error> {
    let settings = sqlx::query_as::<_, CommissionSettings>(
        "SELECT rate, fixed_deduction, employee_count FROM commission_settings WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(settings.unwrap_or_default())
}

async fn find_month(pool: &SqlitePool, month: &str) -> Result<Option<MonthlyCommission>, sqlx::Error> {
    sqlx::query_as::<_, MonthlyCommission>(&format!(
        "SELECT {MONTH_COLUMNS} FROM monthly_commissions WHERE month = ?"
    ))
    .bind(month)
    .fetch_optional(pool)
    .await
}

/// Current commission settings
#[utoipa::path(
    get,
    path = "/accounting/commission/settings",
    responses(
        (status = 200, description = "Settings applied to the next saved month", body = CommissionSettings),
        (status = 403, description = "No permission")
    ),
    tag = "Commission",
    security(("session_cookie" = []))
)]
#[instrument(name = "commission_settings_get", skip_all, fields(user = %auth.username))]
pub async fn get_settings(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::MonthlyCommission)?;
    Ok(HttpResponse::Ok().json(load_settings(pool.get_ref()).await?))
}

/// Replace the commission settings. Months already saved keep their own copy.
#[utoipa::path(
    put,
    path = "/accounting/commission/settings",
    request_body = UpdateSettings,
    responses(
        (status = 200, description = "Stored settings", body = CommissionSettings),
        (status = 400, description = "Invalid settings"),
        (status = 403, description = "No permission")
    ),
    tag = "Commission",
    security(("session_cookie" = []))
)]
#[instrument(name = "commission_settings_put", skip_all, fields(user = %auth.username))]
pub async fn update_settings(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<UpdateSettings>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::MonthlyCommission)?;

    let settings = CommissionSettings {
        rate: payload.rate.value(),
        fixed_deduction: payload.fixed_deduction.value(),
        employee_count: payload.employee_count.value().round() as i64,
    };
    if settings.rate < 0.0 || settings.employee_count < 0 {
        return Err(AppError::invalid_input(
            "Rate and employee count must not be negative",
            &payload.into_inner(),
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO commission_settings (id, rate, fixed_deduction, employee_count)
        VALUES (1, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            rate = excluded.rate,
            fixed_deduction = excluded.fixed_deduction,
            employee_count = excluded.employee_count
        "#,
    )
    .bind(settings.rate)
    .bind(settings.fixed_deduction)
    .bind(settings.employee_count)
    .execute(pool.get_ref())
    .await?;

    info!(rate = settings.rate, employee_count = settings.employee_count, "Commission settings updated");
    Ok(HttpResponse::Ok().json(settings))
}

/// Saved months, newest first
#[utoipa::path(
    get,
    path = "/accounting/commission",
    responses(
        (status = 200, description = "Settings and every saved month", body = CommissionOverview),
        (status = 403, description = "No permission")
    ),
    tag = "Commission",
    security(("session_cookie" = []))
)]
#[instrument(name = "commission_list", skip_all, fields(user = %auth.username))]
pub async fn list_months(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::MonthlyCommission)?;

    let settings = load_settings(pool.get_ref()).await?;
    let months = sqlx::query_as::<_, MonthlyCommission>(&format!(
        "SELECT {MONTH_COLUMNS} FROM monthly_commissions ORDER BY month DESC"
    ))
    .fetch_all(pool.get_ref())
    .await?
    .into_iter()
    .map(|mut m| {
        // figures always come from the month's own snapshot
        let b = m.breakdown();
        m.total_commission = b.total_commission;
        m.employee_commission = b.employee_commission;
        m
    })
    .collect();

    Ok(HttpResponse::Ok().json(CommissionOverview { settings, months }))
}

/// Save (or re-save) a month with the current settings
#[utoipa::path(
    post,
    path = "/accounting/commission",
    request_body = SaveMonth,
    responses(
        (status = 200, description = "Stored month with its settings snapshot", body = MonthlyCommission),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "No permission")
    ),
    tag = "Commission",
    security(("session_cookie" = []))
)]
#[instrument(name = "commission_save", skip_all, fields(user = %auth.username, month = %payload.month))]
pub async fn save_month(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    mirror: web::Data<Mirror>,
    payload: web::Json<SaveMonth>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::MonthlyCommission)?;

    let Some(month) = parse_month(&payload.month) else {
        return Err(AppError::invalid_input(
            "Month must be in YYYY-MM format",
            &payload.into_inner(),
        ));
    };
    let sales = payload.sales.value();
    let settings = load_settings(pool.get_ref()).await?;
    let breakdown = compute_commission(sales, &settings);

    sqlx::query(
        r#"
        INSERT INTO monthly_commissions
            (month, sales, rate, fixed_deduction, employee_count, total_commission, employee_commission, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(month) DO UPDATE SET
            sales = excluded.sales,
            rate = excluded.rate,
            fixed_deduction = excluded.fixed_deduction,
            employee_count = excluded.employee_count,
            total_commission = excluded.total_commission,
            employee_commission = excluded.employee_commission,
            created_at = excluded.created_at
        "#,
    )
    .bind(&month)
    .bind(sales)
    .bind(settings.rate)
    .bind(settings.fixed_deduction)
    .bind(settings.employee_count)
    .bind(breakdown.total_commission)
    .bind(breakdown.employee_commission)
    .bind(Local::now().naive_local())
    .execute(pool.get_ref())
    .await?;

    let saved = find_month(pool.get_ref(), &month)
        .await?
        .ok_or(AppError::NotFound("Month"))?;

    info!(id = saved.id, sales, "Monthly commission saved");
    mirror.upsert(COMMISSION_SHEET, &saved).await;

    Ok(HttpResponse::Ok().json(saved))
}

/// Delete a saved month
#[utoipa::path(
    delete,
    path = "/accounting/commission/{month}",
    params(("month", Path, description = "Month as YYYY-MM")),
    responses(
        (status = 200, description = "Deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Month not saved"),
        (status = 403, description = "No permission")
    ),
    tag = "Commission",
    security(("session_cookie" = []))
)]
#[instrument(name = "commission_delete", skip_all, fields(user = %auth.username, month = %path))]
pub async fn delete_month(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    mirror: web::Data<Mirror>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::MonthlyCommission)?;

    let month = parse_month(&path).ok_or(AppError::NotFound("Month"))?;
    let saved = find_month(pool.get_ref(), &month)
        .await?
        .ok_or(AppError::NotFound("Month"))?;

    sqlx::query("DELETE FROM monthly_commissions WHERE id = ?")
        .bind(saved.id)
        .execute(pool.get_ref())
        .await?;

    info!(id = saved.id, "Monthly commission deleted");
    mirror.delete(COMMISSION_SHEET, saved.id).await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}
