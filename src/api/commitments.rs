use crate::{
    api::tasks::load_task,
    auth::auth::AuthUser,
    error::AppError,
    model::commitment::{FinancialCommitment, commitment_task_title},
    model::permission::PermKey,
    sheets::{
        Mirror,
        rows::{COMMITMENTS_SHEET, TASKS_SHEET},
    },
    utils::form::AmountField,
};
use actix_web::{HttpResponse, web};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

const COMMITMENT_COLUMNS: &str = "id, party, amount, task_id, created_at";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommitmentForm {
    #[schema(example = "Landlord")]
    pub party: String,
    #[serde(default)]
    #[schema(example = "2,500", value_type = String)]
    pub amount: AmountField,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommitmentUpdate {
    pub id: i64,
    #[schema(example = "Landlord")]
    pub party: String,
    #[serde(default)]
    #[schema(example = "2,500", value_type = String)]
    pub amount: AmountField,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommitmentRef {
    pub id: i64,
}

/// Form post on the commitments page, discriminated by `action`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommitmentAction {
    Add(CommitmentForm),
    Update(CommitmentUpdate),
    Delete(CommitmentRef),
}

async fn find_commitment(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<FinancialCommitment>, sqlx::Error> {
    sqlx::query_as::<_, FinancialCommitment>(&format!(
        "SELECT {COMMITMENT_COLUMNS} FROM financial_commitments WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

/// Brings the commitment's task in line with its party and amount: the
/// linked task is renamed, or a new one is created and linked when there is
/// none. Returns the commitment as stored afterwards.
pub async fn sync_commitment_task(
    conn: &mut SqliteConnection,
    commitment_id: i64,
) -> Result<FinancialCommitment, AppError> {
    let commitment = find_commitment(conn, commitment_id)
        .await?
        .ok_or(AppError::NotFound("Commitment"))?;
    let title = commitment_task_title(&commitment.party, commitment.amount);

    if let Some(task_id) = commitment.task_id {
        let renamed = sqlx::query("UPDATE tasks SET title = ? WHERE id = ?")
            .bind(&title)
            .bind(task_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        if renamed > 0 {
            return Ok(commitment);
        }
        warn!(commitment_id, task_id, "Linked task missing, creating a new one");
    }

    let task_id = sqlx::query("INSERT INTO tasks (title, due_date, created_at) VALUES (?, NULL, ?)")
        .bind(&title)
        .bind(Local::now().naive_local())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    sqlx::query("UPDATE financial_commitments SET task_id = ? WHERE id = ?")
        .bind(task_id)
        .bind(commitment_id)
        .execute(&mut *conn)
        .await?;

    Ok(FinancialCommitment {
        task_id: Some(task_id),
        ..commitment
    })
}

/// Removes the commitment and, before it, its linked task. Returns the
/// removed row, or `None` when the id is unknown.
pub async fn delete_commitment(
    conn: &mut SqliteConnection,
    commitment_id: i64,
) -> Result<Option<FinancialCommitment>, sqlx::Error> {
    let Some(commitment) = find_commitment(conn, commitment_id).await? else {
        return Ok(None);
    };

    if let Some(task_id) = commitment.task_id {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query("DELETE FROM financial_commitments WHERE id = ?")
        .bind(commitment_id)
        .execute(&mut *conn)
        .await?;

    Ok(Some(commitment))
}

fn validate_party<T: Serialize>(party: &str, input: &T) -> Result<String, AppError> {
    let party = party.trim();
    if party.is_empty() {
        return Err(AppError::invalid_input("Party is required", input));
    }
    Ok(party.to_string())
}

/// Mirrors the commitment and its task after a committed write.
async fn mirror_commitment(pool: &SqlitePool, mirror: &Mirror, commitment: &FinancialCommitment) {
    mirror.upsert(COMMITMENTS_SHEET, commitment).await;
    let Some(task_id) = commitment.task_id else {
        return;
    };
    match load_task(pool, task_id).await {
        Ok(Some(task)) => mirror.upsert(TASKS_SHEET, &task).await,
        Ok(None) => {}
        Err(e) => warn!(error = %e, task_id, "Could not reload task for mirroring"),
    }
}

/// List financial commitments, newest first
#[utoipa::path(
    get,
    path = "/accounting/commitments",
    responses(
        (status = 200, description = "Every commitment", body = [FinancialCommitment]),
        (status = 403, description = "No permission")
    ),
    tag = "Commitments",
    security(("session_cookie" = []))
)]
#[instrument(name = "commitments_list", skip_all, fields(user = %auth.username))]
pub async fn list_commitments(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::FinancialCommitments)?;

    let rows = sqlx::query_as::<_, FinancialCommitment>(&format!(
        "SELECT {COMMITMENT_COLUMNS} FROM financial_commitments ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(rows))
}

/// Add, update or delete a commitment; its task follows in the same transaction
#[utoipa::path(
    post,
    path = "/accounting/commitments",
    request_body = CommitmentAction,
    responses(
        (status = 200, description = "Stored commitment, or a deletion message", body = FinancialCommitment),
        (status = 400, description = "Missing party"),
        (status = 403, description = "No permission"),
        (status = 404, description = "Unknown commitment")
    ),
    tag = "Commitments",
    security(("session_cookie" = []))
)]
#[instrument(name = "commitments_post", skip_all, fields(user = %auth.username))]
pub async fn commitment_action(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    mirror: web::Data<Mirror>,
    payload: web::Json<CommitmentAction>,
) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::FinancialCommitments)?;

    match payload.into_inner() {
        CommitmentAction::Add(form) => {
            let party = validate_party(&form.party, &form)?;
            let amount = form.amount.value();

            let mut tx = pool.begin().await?;
            let id = sqlx::query(
                "INSERT INTO financial_commitments (party, amount, created_at) VALUES (?, ?, ?)",
            )
            .bind(&party)
            .bind(amount)
            .bind(Local::now().naive_local())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
            let commitment = sync_commitment_task(&mut tx, id).await?;
            tx.commit().await?;

            info!(id, task_id = ?commitment.task_id, "Commitment added");
            mirror_commitment(pool.get_ref(), &mirror, &commitment).await;
            Ok(HttpResponse::Ok().json(commitment))
        }
        CommitmentAction::Update(form) => {
            let party = validate_party(&form.party, &form)?;
            let amount = form.amount.value();

            let mut tx = pool.begin().await?;
            let updated = sqlx::query(
                "UPDATE financial_commitments SET party = ?, amount = ? WHERE id = ?",
            )
            .bind(&party)
            .bind(amount)
            .bind(form.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if updated == 0 {
                return Err(AppError::NotFound("Commitment"));
            }
            let commitment = sync_commitment_task(&mut tx, form.id).await?;
            tx.commit().await?;

            info!(id = form.id, task_id = ?commitment.task_id, "Commitment updated");
            mirror_commitment(pool.get_ref(), &mirror, &commitment).await;
            Ok(HttpResponse::Ok().json(commitment))
        }
        CommitmentAction::Delete(target) => {
            let mut tx = pool.begin().await?;
            let removed = delete_commitment(&mut tx, target.id)
                .await?
                .ok_or(AppError::NotFound("Commitment"))?;
            tx.commit().await?;

            info!(id = removed.id, "Commitment deleted");
            mirror.delete(COMMITMENTS_SHEET, removed.id).await;
            if let Some(task_id) = removed.task_id {
                mirror.delete(TASKS_SHEET, task_id).await;
            }
            Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
        }
    }
}
