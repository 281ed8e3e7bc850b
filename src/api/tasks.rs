use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::alert::{Alert, build_alerts},
    model::branch::Branch,
    model::employee::Employee,
    model::permission::PermKey,
    model::record::Record,
    model::task::Task,
    sheets::{Mirror, rows::TASKS_SHEET},
    utils::form::parse_optional_date,
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use strum::IntoEnumIterator;
use tracing::{info, instrument};
use utoipa::ToSchema;

const TASK_SELECT: &str = r#"
    SELECT t.id, t.title, t.due_date, t.created_at, c.id AS commitment_id
    FROM tasks t
    LEFT JOIN financial_commitments c ON c.task_id = t.id
"#;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateTask {
    #[schema(example = "Renew municipality licence")]
    pub title: String,
    #[schema(example = "2024-06-30", format = "date")]
    pub due_date: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TaskBoard {
    pub tasks: Vec<Task>,
    /// Expiring documents, soonest first. Recomputed on every request.
    pub alerts: Vec<Alert>,
}

pub async fn load_task(pool: &SqlitePool, id: i64) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!("{TASK_SELECT} WHERE t.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Scans every branch's records and every employee for expiries inside the
/// alert window.
pub async fn list_alerts(pool: &SqlitePool, today: NaiveDate) -> Result<Vec<Alert>, sqlx::Error> {
    let mut records = Vec::new();
    for branch in Branch::iter() {
        let rows = sqlx::query_as::<_, Record>(&format!(
            "SELECT id, record_type, number, expiry_date, notes, created_at FROM {} WHERE expiry_date IS NOT NULL",
            branch.records_table()
        ))
        .fetch_all(pool)
        .await?;
        records.extend(rows.into_iter().map(|r| (branch, r)));
    }

    let employees = sqlx::query_as::<_, Employee>("SELECT * FROM employees")
        .fetch_all(pool)
        .await?;

    Ok(build_alerts(&records, &employees, today))
}

/// Manual tasks plus expiry alerts
#[utoipa::path(
    get,
    path = "/tasks",
    responses(
        (status = 200, description = "Tasks and derived alerts", body = TaskBoard),
        (status = 403, description = "No permission")
    ),
    tag = "Tasks",
    security(("session_cookie" = []))
)]
#[instrument(name = "tasks_list", skip_all, fields(user = %auth.username))]
pub async fn list_tasks(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::Tasks)?;

    let tasks = sqlx::query_as::<_, Task>(&format!(
        "{TASK_SELECT} ORDER BY t.due_date IS NULL, t.due_date, t.id DESC"
    ))
    .fetch_all(pool.get_ref())
    .await?;
    let alerts = list_alerts(pool.get_ref(), Local::now().date_naive()).await?;

    Ok(HttpResponse::Ok().json(TaskBoard { tasks, alerts }))
}

/// Create a manual task
#[utoipa::path(
    post,
    path = "/tasks",
    request_body = CreateTask,
    responses(
        (status = 201, description = "Created task", body = Task),
        (status = 400, description = "Missing title or bad date"),
        (status = 403, description = "No permission")
    ),
    tag = "Tasks",
    security(("session_cookie" = []))
)]
#[instrument(name = "tasks_create", skip_all, fields(user = %auth.username))]
pub async fn create_task(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    mirror: web::Data<Mirror>,
    payload: web::Json<CreateTask>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::Tasks)?;

    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::invalid_input("Title is required", &payload.into_inner()));
    }
    let parsed = parse_optional_date(payload.due_date.as_deref());
    let due_date = match parsed {
        Ok(d) => d,
        Err(bad) => {
            return Err(AppError::invalid_input(
                format!("Invalid due date: {bad}"),
                &payload.into_inner(),
            ));
        }
    };

    let id = sqlx::query("INSERT INTO tasks (title, due_date, created_at) VALUES (?, ?, ?)")
        .bind(&title)
        .bind(due_date)
        .bind(Local::now().naive_local())
        .execute(pool.get_ref())
        .await?
        .last_insert_rowid();

    let task = load_task(pool.get_ref(), id)
        .await?
        .ok_or(AppError::NotFound("Task"))?;

    info!(id, "Task created");
    mirror.upsert(TASKS_SHEET, &task).await;

    Ok(HttpResponse::Created().json(task))
}

/// Delete a manual task. Tasks owned by a commitment are removed through the
/// commitment instead.
#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    params(("id", Path, description = "Task ID")),
    responses(
        (status = 200, description = "Deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Task not found"),
        (status = 409, description = "Task belongs to a financial commitment")
    ),
    tag = "Tasks",
    security(("session_cookie" = []))
)]
#[instrument(name = "tasks_delete", skip_all, fields(user = %auth.username, task_id = %path))]
pub async fn delete_task(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    mirror: web::Data<Mirror>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::Tasks)?;
    let id = path.into_inner();

    let task = load_task(pool.get_ref(), id)
        .await?
        .ok_or(AppError::NotFound("Task"))?;
    if let Some(commitment_id) = task.commitment_id {
        return Err(AppError::Conflict(format!(
            "Task is managed by financial commitment {commitment_id}; delete the commitment instead"
        )));
    }

    sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(id, "Task deleted");
    mirror.delete(TASKS_SHEET, id).await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::test_support::{TestUser, call_json};
    use actix_web::{http::StatusCode, test};
    use chrono::Duration;

    async fn insert_record(pool: &SqlitePool, table: &str, kind: &str, expiry: Option<NaiveDate>) {
        sqlx::query(&format!(
            "INSERT INTO {table} (record_type, number, expiry_date, notes, created_at) VALUES (?, 'N', ?, '', '2024-01-01 00:00:00')"
        ))
        .bind(kind)
        .bind(expiry)
        .execute(pool)
        .await
        .unwrap();
    }

    #[actix_web::test]
    async fn alerts_cover_every_branch_and_employee_document() {
        let pool = test_pool().await;
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        insert_record(&pool, "records_es1", "licence", Some(today + Duration::days(45))).await;
        insert_record(&pool, "records_es2", "permit", Some(today + Duration::days(46))).await;
        insert_record(&pool, "records_es3", "civil defence", Some(today - Duration::days(400))).await;
        insert_record(&pool, "records_es3", "undated", None).await;

        sqlx::query(
            r#"
            INSERT INTO employees (name, passport_expiry, residency_expiry, insurance_expiry, created_at)
            VALUES ('Ali', ?, ?, NULL, '2024-01-01 00:00:00')
            "#,
        )
        .bind(today + Duration::days(10))
        .bind(today + Duration::days(1))
        .execute(&pool)
        .await
        .unwrap();

        let alerts = list_alerts(&pool, today).await.unwrap();
        let subjects: Vec<&str> = alerts.iter().map(|a| a.subject.as_str()).collect();
        assert_eq!(subjects, vec!["civil defence", "Ali", "Ali", "licence"]);
        assert_eq!(alerts[0].days_left, Some(-400));
        assert_eq!(alerts[3].days_left, Some(45));
    }

    #[actix_web::test]
    async fn manual_tasks_can_be_created_and_deleted() {
        let pool = test_pool().await;
        let app = test_app!(pool.clone(), Mirror::disabled());
        let cookie = TestUser::master().cookie();

        let (status, body) = call_json(
            &app,
            test::TestRequest::post()
                .uri("/tasks")
                .cookie(cookie.clone())
                .set_json(json!({"title": "  ", "due_date": "2024-06-01"}))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["input"]["due_date"], "2024-06-01");

        let (status, task) = call_json(
            &app,
            test::TestRequest::post()
                .uri("/tasks")
                .cookie(cookie.clone())
                .set_json(json!({"title": "Call supplier", "due_date": ""}))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(task["due_date"].is_null());

        let (status, board) = call_json(
            &app,
            test::TestRequest::get().uri("/tasks").cookie(cookie.clone()).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(board["tasks"][0]["title"], "Call supplier");

        let uri = format!("/tasks/{}", task["id"]);
        let (status, _) = call_json(
            &app,
            test::TestRequest::delete().uri(&uri).cookie(cookie.clone()).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call_json(
            &app,
            test::TestRequest::delete().uri(&uri).cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn commitment_tasks_cannot_be_deleted_directly() {
        let pool = test_pool().await;
        let app = test_app!(pool.clone(), Mirror::disabled());
        let cookie = TestUser::master().cookie();

        let (_, commitment) = call_json(
            &app,
            test::TestRequest::post()
                .uri("/accounting/commitments")
                .cookie(cookie.clone())
                .set_json(json!({"action": "add", "party": "Bank", "amount": 10}))
                .to_request(),
        )
        .await;

        let (status, body) = call_json(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/tasks/{}", commitment["task_id"]))
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");

        let (_, board) = call_json(
            &app,
            test::TestRequest::get().uri("/tasks").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(board["tasks"][0]["commitment_id"], commitment["id"]);
    }

    #[actix_web::test]
    async fn missing_title_gets_a_validation_body() {
        let pool = test_pool().await;
        let app = test_app!(pool, Mirror::disabled());

        for body in [json!({}), json!({"due_date": "2024-06-01"})] {
            let (status, resp) = call_json(
                &app,
                test::TestRequest::post()
                    .uri("/tasks")
                    .cookie(TestUser::master().cookie())
                    .set_json(body)
                    .to_request(),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(resp["error"], "validation");
            assert!(resp["message"].as_str().unwrap().contains("title"));
        }
    }
}
