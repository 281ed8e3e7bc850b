use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::branch::Branch,
    model::record::Record,
    sheets::Mirror,
    utils::db_utils::{Column, build_update_sql, execute_update},
    utils::expiry::{ExpiryStatus, days_left, status_of},
    utils::form::{clean_text, parse_optional_date},
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tracing::{info, instrument};
use utoipa::ToSchema;

const RECORD_COLUMNS: &str = "id, record_type, number, expiry_date, notes, created_at";

const UPDATABLE: &[Column] = &[
    Column::required("record_type"),
    Column::text("number"),
    Column::date("expiry_date"),
    Column::text("notes"),
];

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateRecord {
    #[schema(example = "Municipality licence")]
    pub record_type: String,
    #[schema(example = "4410023")]
    pub number: Option<String>,
    #[schema(example = "2025-03-01", format = "date")]
    pub expiry_date: Option<String>,
    pub notes: Option<String>,
}

/// A record with its expiry bucket as of today.
#[derive(Serialize, ToSchema)]
pub struct RecordView {
    #[serde(flatten)]
    pub record: Record,
    pub days_left: Option<i64>,
    pub status: ExpiryStatus,
}

impl RecordView {
    fn new(record: Record, today: NaiveDate) -> Self {
        Self {
            days_left: days_left(record.expiry_date, today),
            status: status_of(record.expiry_date, today),
            record,
        }
    }
}

async fn find_record(
    pool: &SqlitePool,
    branch: Branch,
    id: i64,
) -> Result<Option<Record>, sqlx::Error> {
    sqlx::query_as::<_, Record>(&format!(
        "SELECT {RECORD_COLUMNS} FROM {} WHERE id = ?",
        branch.records_table()
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// List a branch's records
#[utoipa::path(
    get,
    path = "/records/{branch}",
    params(("branch" = Branch, Path, description = "Branch code")),
    responses(
        (status = 200, description = "Records ordered by expiry, undated last", body = [RecordView]),
        (status = 403, description = "No permission for this branch")
    ),
    tag = "Records",
    security(("session_cookie" = []))
)]
#[instrument(name = "records_list", skip_all, fields(user = %auth.username, branch = %branch))]
pub async fn list_records(
    auth: AuthUser,
    branch: web::Path<Branch>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    let branch = branch.into_inner();
    auth.require(branch.records_perm())?;

    let today = Local::now().date_naive();
    let records = sqlx::query_as::<_, Record>(&format!(
        "SELECT {RECORD_COLUMNS} FROM {} ORDER BY expiry_date IS NULL, expiry_date, id",
        branch.records_table()
    ))
    .fetch_all(pool.get_ref())
    .await?;

    let views: Vec<RecordView> = records
        .into_iter()
        .map(|r| RecordView::new(r, today))
        .collect();
    Ok(HttpResponse::Ok().json(views))
}

/// Add a record to a branch
#[utoipa::path(
    post,
    path = "/records/{branch}",
    params(("branch" = Branch, Path, description = "Branch code")),
    request_body = CreateRecord,
    responses(
        (status = 201, description = "Created record", body = RecordView),
        (status = 400, description = "Missing type or bad date"),
        (status = 403, description = "No permission for this branch")
    ),
    tag = "Records",
    security(("session_cookie" = []))
)]
#[instrument(name = "records_create", skip_all, fields(user = %auth.username, branch = %branch))]
pub async fn create_record(
    auth: AuthUser,
    branch: web::Path<Branch>,
    pool: web::Data<SqlitePool>,
    mirror: web::Data<Mirror>,
    payload: web::Json<CreateRecord>,
) -> Result<HttpResponse, AppError> {
    let branch = branch.into_inner();
    auth.require(branch.records_perm())?;

    let record_type = payload.record_type.trim().to_string();
    if record_type.is_empty() {
        return Err(AppError::invalid_input("Record type is required", &payload.into_inner()));
    }
    let parsed = parse_optional_date(payload.expiry_date.as_deref());
    let expiry_date = match parsed {
        Ok(d) => d,
        Err(bad) => {
            return Err(AppError::invalid_input(
                format!("Invalid expiry date: {bad}"),
                &payload.into_inner(),
            ));
        }
    };

    let id = sqlx::query(&format!(
        "INSERT INTO {} (record_type, number, expiry_date, notes, created_at) VALUES (?, ?, ?, ?, ?)",
        branch.records_table()
    ))
    .bind(&record_type)
    .bind(clean_text(payload.number.as_deref()))
    .bind(expiry_date)
    .bind(clean_text(payload.notes.as_deref()))
    .bind(Local::now().naive_local())
    .execute(pool.get_ref())
    .await?
    .last_insert_rowid();

    let record = find_record(pool.get_ref(), branch, id)
        .await?
        .ok_or(AppError::NotFound("Record"))?;

    info!(id, "Record created");
    mirror.upsert(branch.records_table(), &record).await;

    Ok(HttpResponse::Created().json(RecordView::new(record, Local::now().date_naive())))
}

/// Update selected fields of a record
#[utoipa::path(
    put,
    path = "/records/{branch}/{id}",
    params(
        ("branch" = Branch, Path, description = "Branch code"),
        ("id", Path, description = "Record ID")
    ),
    request_body = Object,
    responses(
        (status = 200, description = "Updated record", body = RecordView),
        (status = 400, description = "Unknown field or bad value"),
        (status = 404, description = "Record not found")
    ),
    tag = "Records",
    security(("session_cookie" = []))
)]
#[instrument(name = "records_update", skip_all, fields(user = %auth.username))]
pub async fn update_record(
    auth: AuthUser,
    path: web::Path<(Branch, i64)>,
    pool: web::Data<SqlitePool>,
    mirror: web::Data<Mirror>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    let (branch, id) = path.into_inner();
    auth.require(branch.records_perm())?;

    let update = build_update_sql(branch.records_table(), &body, UPDATABLE, "id", id)?;
    if execute_update(pool.get_ref(), update).await? == 0 {
        return Err(AppError::NotFound("Record"));
    }

    let record = find_record(pool.get_ref(), branch, id)
        .await?
        .ok_or(AppError::NotFound("Record"))?;

    info!(id, %branch, "Record updated");
    mirror.upsert(branch.records_table(), &record).await;

    Ok(HttpResponse::Ok().json(RecordView::new(record, Local::now().date_naive())))
}

/// Delete a record
#[utoipa::path(
    delete,
    path = "/records/{branch}/{id}",
    params(
        ("branch" = Branch, Path, description = "Branch code"),
        ("id", Path, description = "Record ID")
    ),
    responses(
        (status = 200, description = "Deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Record not found")
    ),
    tag = "Records",
    security(("session_cookie" = []))
)]
#[instrument(name = "records_delete", skip_all, fields(user = %auth.username))]
pub async fn delete_record(
    auth: AuthUser,
    path: web::Path<(Branch, i64)>,
    pool: web::Data<SqlitePool>,
    mirror: web::Data<Mirror>,
) -> Result<HttpResponse, AppError> {
    let (branch, id) = path.into_inner();
    auth.require(branch.records_perm())?;

    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", branch.records_table()))
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Record"));
    }

    info!(id, %branch, "Record deleted");
    mirror.delete(branch.records_table(), id).await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::sheets::memory::MemorySheets;
    use crate::test_support::{TestUser, call_json, create_user};
    use actix_web::{http::StatusCode, test};
    use chrono::Duration;
    use std::sync::Arc;

    #[actix_web::test]
    async fn record_crud_is_scoped_to_branch() {
        let pool = test_pool().await;
        let sheets = Arc::new(MemorySheets::default());
        let app = test_app!(pool.clone(), Mirror::new(sheets.clone()));
        let cookie = TestUser::master().cookie();
        let soon = (Local::now().date_naive() + Duration::days(10)).to_string();

        let (status, created) = call_json(
            &app,
            test::TestRequest::post()
                .uri("/records/es2")
                .cookie(cookie.clone())
                .set_json(json!({"record_type": "Licence", "number": " 77 ", "expiry_date": soon}))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["number"], "77");
        assert_eq!(created["status"], "warning");
        assert_eq!(created["days_left"], 10);
        let id = created["id"].as_i64().unwrap();

        let (status, updated) = call_json(
            &app,
            test::TestRequest::put()
                .uri(&format!("/records/es2/{id}"))
                .cookie(cookie.clone())
                .set_json(json!({"expiry_date": ""}))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "neutral");
        assert_eq!(sheets.rows("records_es2")[1][3], "");

        let (status, _) = call_json(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/records/es1/{id}"))
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call_json(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/records/es2/{id}"))
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sheets.rows("records_es2").len(), 1);
    }

    #[actix_web::test]
    async fn invalid_input_is_echoed() {
        let pool = test_pool().await;
        let app = test_app!(pool, Mirror::disabled());

        let (status, body) = call_json(
            &app,
            test::TestRequest::post()
                .uri("/records/es1")
                .cookie(TestUser::master().cookie())
                .set_json(json!({"record_type": "Permit", "expiry_date": "next week"}))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["input"]["expiry_date"], "next week");
    }

    #[actix_web::test]
    async fn records_need_the_branch_key() {
        let pool = test_pool().await;
        let clerk = create_user(&pool, "clerk", &["records_es3"]).await;
        let app = test_app!(pool, Mirror::disabled());

        let (status, _) = call_json(
            &app,
            test::TestRequest::get().uri("/records/es3").cookie(clerk.cookie()).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call_json(
            &app,
            test::TestRequest::get().uri("/records/es1").cookie(clerk.cookie()).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["permission"], "records_es1");
    }
}
