use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::employee::{Employee, EmployeeDocument},
    model::permission::PermKey,
    sheets::{Mirror, rows::EMPLOYEES_SHEET},
    utils::db_utils::{Column, build_update_sql, execute_update},
    utils::expiry::{ExpiryStatus, days_left, status_of},
    utils::form::{clean_text, parse_optional_date},
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[Column] = &[
    Column::required("name"),
    Column::text("job_title"),
    Column::text("nationality"),
    Column::text("phone"),
    Column::text("passport_number"),
    Column::date("passport_expiry"),
    Column::text("residency_number"),
    Column::date("residency_expiry"),
    Column::text("insurance_number"),
    Column::date("insurance_expiry"),
    Column::text("notes"),
];

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "Cashier")]
    pub job_title: Option<String>,
    #[schema(example = "PH")]
    pub nationality: Option<String>,
    #[schema(example = "+966500000000")]
    pub phone: Option<String>,
    pub passport_number: Option<String>,
    #[schema(example = "2027-01-01", format = "date")]
    pub passport_expiry: Option<String>,
    pub residency_number: Option<String>,
    #[schema(example = "2024-09-01", format = "date")]
    pub residency_expiry: Option<String>,
    pub insurance_number: Option<String>,
    #[schema(format = "date")]
    pub insurance_expiry: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Matches name, phone, passport or residency number.
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentStatus {
    pub document: EmployeeDocument,
    pub number: String,
    #[schema(value_type = Option<String>, format = "date", nullable = true)]
    pub expiry_date: Option<NaiveDate>,
    pub days_left: Option<i64>,
    pub status: ExpiryStatus,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeView {
    #[serde(flatten)]
    pub employee: Employee,
    pub documents: Vec<DocumentStatus>,
}

impl EmployeeView {
    fn new(employee: Employee, today: NaiveDate) -> Self {
        let documents = employee
            .documents()
            .into_iter()
            .map(|(document, number, expiry)| DocumentStatus {
                document,
                number: number.to_string(),
                expiry_date: expiry,
                days_left: days_left(expiry, today),
                status: status_of(expiry, today),
            })
            .collect();
        Self {
            employee,
            documents,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<EmployeeView>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

async fn find_employee(pool: &SqlitePool, id: i64) -> Result<Option<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

fn parse_dates(payload: &CreateEmployee) -> Result<[Option<NaiveDate>; 3], AppError> {
    let mut out = [None; 3];
    let fields = [
        ("passport_expiry", &payload.passport_expiry),
        ("residency_expiry", &payload.residency_expiry),
        ("insurance_expiry", &payload.insurance_expiry),
    ];
    for (slot, (name, raw)) in out.iter_mut().zip(fields) {
        *slot = parse_optional_date(raw.as_deref()).map_err(|bad| {
            AppError::invalid_input(format!("{name} is not a valid date: {bad}"), payload)
        })?;
    }
    Ok(out)
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created successfully", body = EmployeeView),
        (status = 400, description = "Missing name or bad date"),
        (status = 500, description = "Internal server error", body = Object, example = json!({
            "message": "Something went wrong, Contact with system admin"
        }))
    ),
    tag = "Employee",
    security(("session_cookie" = []))
)]
#[instrument(name = "employee_create", skip_all, fields(user = %auth.username))]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    mirror: web::Data<Mirror>,
    payload: web::Json<CreateEmployee>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::Employees)?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::invalid_input("Name is required", &payload.into_inner()));
    }
    let [passport_expiry, residency_expiry, insurance_expiry] = parse_dates(&payload)?;

    let id = sqlx::query(
        r#"
        INSERT INTO employees
        (name, job_title, nationality, phone, passport_number, passport_expiry,
         residency_number, residency_expiry, insurance_number, insurance_expiry, notes, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&name)
    .bind(clean_text(payload.job_title.as_deref()))
    .bind(clean_text(payload.nationality.as_deref()))
    .bind(clean_text(payload.phone.as_deref()))
    .bind(clean_text(payload.passport_number.as_deref()))
    .bind(passport_expiry)
    .bind(clean_text(payload.residency_number.as_deref()))
    .bind(residency_expiry)
    .bind(clean_text(payload.insurance_number.as_deref()))
    .bind(insurance_expiry)
    .bind(clean_text(payload.notes.as_deref()))
    .bind(Local::now().naive_local())
    .execute(pool.get_ref())
    .await?
    .last_insert_rowid();

    let employee = find_employee(pool.get_ref(), id)
        .await?
        .ok_or(AppError::NotFound("Employee"))?;

    info!(id, "Employee created");
    mirror.upsert(EMPLOYEES_SHEET, &employee).await;

    Ok(HttpResponse::Created().json(EmployeeView::new(employee, Local::now().date_naive())))
}

// -------------------- Handler --------------------

#[utoipa::path(
    get,
    path = "/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse)
    ),
    tag = "Employee",
    security(("session_cookie" = []))
)]
#[instrument(name = "employee_list", skip_all, fields(user = %auth.username))]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::Employees)?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (i64::from(page) - 1).saturating_mul(i64::from(per_page));

    // ---------- build WHERE clause ----------
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));
    let where_clause = if search.is_some() {
        "WHERE name LIKE ? OR phone LIKE ? OR passport_number LIKE ? OR residency_number LIKE ?"
    } else {
        ""
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees {where_clause}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(like) = &search {
        for _ in 0..4 {
            count_query = count_query.bind(like);
        }
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    // ---------- data query ----------
    let data_sql = format!("SELECT * FROM employees {where_clause} ORDER BY id DESC LIMIT ? OFFSET ?");
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    if let Some(like) = &search {
        for _ in 0..4 {
            data_query = data_query.bind(like);
        }
    }
    let employees = data_query
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    let today = Local::now().date_naive();
    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees
            .into_iter()
            .map(|e| EmployeeView::new(e, today))
            .collect(),
        page,
        per_page,
        total,
    }))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Employee updated successfully", body = EmployeeView),
        (status = 400, description = "Unknown field or bad value"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "error": "not_found",
            "message": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(("session_cookie" = []))
)]
#[instrument(name = "employee_update", skip_all, fields(user = %auth.username, employee_id = %path))]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    mirror: web::Data<Mirror>,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::Employees)?;
    let employee_id = path.into_inner();

    let update = build_update_sql("employees", &body, UPDATABLE, "id", employee_id)?;
    if execute_update(pool.get_ref(), update).await? == 0 {
        return Err(AppError::NotFound("Employee"));
    }

    let employee = find_employee(pool.get_ref(), employee_id)
        .await?
        .ok_or(AppError::NotFound("Employee"))?;

    info!(employee_id, "Employee updated");
    mirror.upsert(EMPLOYEES_SHEET, &employee).await;

    Ok(HttpResponse::Ok().json(EmployeeView::new(employee, Local::now().date_naive())))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("session_cookie" = []))
)]
#[instrument(name = "employee_delete", skip_all, fields(user = %auth.username, employee_id = %path))]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    mirror: web::Data<Mirror>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::Employees)?;
    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Employee"));
    }

    info!(employee_id, "Employee deleted");
    mirror.delete(EMPLOYEES_SHEET, employee_id).await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = EmployeeView),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("session_cookie" = []))
)]
#[instrument(name = "employee_get", skip_all, fields(user = %auth.username, employee_id = %path))]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::Employees)?;

    let employee = find_employee(pool.get_ref(), path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Employee"))?;

    Ok(HttpResponse::Ok().json(EmployeeView::new(employee, Local::now().date_naive())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::sheets::memory::MemorySheets;
    use crate::test_support::{TestUser, call_json};
    use actix_web::{http::StatusCode, test};
    use std::sync::Arc;

    #[actix_web::test]
    async fn employee_lifecycle_is_mirrored() {
        let pool = test_pool().await;
        let sheets = Arc::new(MemorySheets::default());
        let app = test_app!(pool.clone(), Mirror::new(sheets.clone()));
        let cookie = TestUser::master().cookie();

        let (status, created) = call_json(
            &app,
            test::TestRequest::post()
                .uri("/employees")
                .cookie(cookie.clone())
                .set_json(json!({
                    "name": "Sara",
                    "job_title": "Accountant",
                    "passport_number": "P1",
                    "passport_expiry": "2001-01-01",
                    "insurance_expiry": ""
                }))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();
        let docs = created["documents"].as_array().unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0]["document"], "passport");
        assert_eq!(docs[0]["status"], "overdue");
        assert_eq!(docs[2]["status"], "neutral");

        let (status, updated) = call_json(
            &app,
            test::TestRequest::put()
                .uri(&format!("/employees/{id}"))
                .cookie(cookie.clone())
                .set_json(json!({"phone": "0500", "residency_expiry": "2030-05-05"}))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["phone"], "0500");
        assert_eq!(updated["residency_expiry"], "2030-05-05");
        assert_eq!(updated["job_title"], "Accountant");

        let rows = sheets.rows(EMPLOYEES_SHEET);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][4], "0500");

        let (status, _) = call_json(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/employees/{id}"))
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sheets.rows(EMPLOYEES_SHEET).len(), 1);

        let (status, _) = call_json(
            &app,
            test::TestRequest::get()
                .uri(&format!("/employees/{id}"))
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn list_is_paginated_and_searchable() {
        let pool = test_pool().await;
        for name in ["Ahmed", "Bilal", "Chandra"] {
            sqlx::query("INSERT INTO employees (name, created_at) VALUES (?, '2024-01-01 00:00:00')")
                .bind(name)
                .execute(&pool)
                .await
                .unwrap();
        }
        let app = test_app!(pool, Mirror::disabled());
        let cookie = TestUser::master().cookie();

        let (_, page) = call_json(
            &app,
            test::TestRequest::get()
                .uri("/employees?page=2&per_page=2")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(page["total"], 3);
        assert_eq!(page["data"].as_array().unwrap().len(), 1);
        assert_eq!(page["data"][0]["name"], "Ahmed");

        let (_, found) = call_json(
            &app,
            test::TestRequest::get()
                .uri("/employees?search=lal")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(found["total"], 1);
        assert_eq!(found["data"][0]["name"], "Bilal");
    }

    #[actix_web::test]
    async fn page_far_past_the_end_is_empty() {
        let pool = test_pool().await;
        let app = test_app!(pool, Mirror::disabled());

        let (status, body) = call_json(
            &app,
            test::TestRequest::get()
                .uri("/employees?page=4294967295&per_page=100")
                .cookie(TestUser::master().cookie())
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"], 4294967295u32);
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn non_numeric_page_is_a_validation_error() {
        let pool = test_pool().await;
        let app = test_app!(pool, Mirror::disabled());

        let (status, body) = call_json(
            &app,
            test::TestRequest::get()
                .uri("/employees?page=abc")
                .cookie(TestUser::master().cookie())
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
        assert_eq!(body["input"]["query"], "page=abc");
    }

    #[actix_web::test]
    async fn update_rejects_unknown_columns() {
        let pool = test_pool().await;
        let app = test_app!(pool, Mirror::disabled());

        let (status, body) = call_json(
            &app,
            test::TestRequest::put()
                .uri("/employees/1")
                .cookie(TestUser::master().cookie())
                .set_json(json!({"created_at": "2020-01-01"}))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["input"]["created_at"], "2020-01-01");
    }
}
