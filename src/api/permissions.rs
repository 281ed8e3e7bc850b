use crate::{
    auth::auth::{AuthUser, load_capabilities},
    auth::password::hash_password,
    error::AppError,
    model::permission::{Capabilities, MASTER_USERNAME, PermKey},
    model::user::User,
};
use actix_web::{HttpResponse, web};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionLabel {
    pub key: PermKey,
    pub label: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserPermissions {
    pub id: i64,
    pub username: String,
    pub is_master: bool,
    /// Every key, explicitly `false` when not granted.
    #[schema(value_type = Object)]
    pub permissions: BTreeMap<PermKey, bool>,
}

#[derive(Serialize, ToSchema)]
pub struct PermissionsPage {
    pub catalogue: Vec<PermissionLabel>,
    pub users: Vec<UserPermissions>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewUser {
    #[schema(example = "clerk")]
    pub username: String,
    #[schema(example = "change-me")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub uid: i64,
    /// Left unchanged when absent or blank.
    pub password: Option<String>,
    /// Keys to grant; every other key is revoked.
    #[serde(default)]
    pub permissions: Vec<PermKey>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserRef {
    pub uid: i64,
}

/// Form post on the permissions page, discriminated by `action`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserAction {
    AddUser(NewUser),
    UpdateUser(UserUpdate),
    DeleteUser(UserRef),
}

fn catalogue() -> Vec<PermissionLabel> {
    PermKey::iter()
        .map(|key| PermissionLabel {
            key,
            label: key.label(),
        })
        .collect()
}

fn permission_map(capabilities: &Capabilities) -> BTreeMap<PermKey, bool> {
    PermKey::iter()
        .map(|key| (key, capabilities.allows(key)))
        .collect()
}

async fn find_user(conn: &mut SqliteConnection, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, is_admin, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

async fn user_permissions(pool: &SqlitePool, user: &User) -> Result<UserPermissions, sqlx::Error> {
    let capabilities = load_capabilities(pool, user.id, &user.username).await?;
    Ok(UserPermissions {
        id: user.id,
        username: user.username.clone(),
        is_master: user.username == MASTER_USERNAME,
        permissions: permission_map(&capabilities),
    })
}

/// Writes one row per key: allowed for the keys in `granted`, denied otherwise.
async fn store_permissions(
    conn: &mut SqliteConnection,
    user_id: i64,
    granted: &Capabilities,
) -> Result<(), sqlx::Error> {
    for key in PermKey::iter() {
        sqlx::query(
            r#"
            INSERT INTO permissions (user_id, perm_key, allowed)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, perm_key) DO UPDATE SET allowed = excluded.allowed
            "#,
        )
        .bind(user_id)
        .bind(key.as_ref())
        .bind(granted.allows(key))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn hash(password: &str) -> Result<String, AppError> {
    hash_password(password).map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Users and their permissions
#[utoipa::path(
    get,
    path = "/permissions",
    responses(
        (status = 200, description = "Permission catalogue and every user", body = PermissionsPage),
        (status = 403, description = "Only the master account may manage users")
    ),
    tag = "Permissions",
    security(("session_cookie" = []))
)]
#[instrument(name = "permissions_list", skip_all, fields(user = %auth.username))]
pub async fn list_permissions(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    auth.require_master()?;

    let users = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, is_admin, created_at FROM users ORDER BY id",
    )
    .fetch_all(pool.get_ref())
    .await?;

    let mut entries = Vec::with_capacity(users.len());
    for user in &users {
        entries.push(user_permissions(pool.get_ref(), user).await?);
    }

    Ok(HttpResponse::Ok().json(PermissionsPage {
        catalogue: catalogue(),
        users: entries,
    }))
}

/// Add, update or delete a user
#[utoipa::path(
    post,
    path = "/permissions",
    request_body = UserAction,
    responses(
        (status = 200, description = "Stored user, or a deletion message", body = UserPermissions),
        (status = 400, description = "Missing fields, or an attempt to delete the master account"),
        (status = 403, description = "Only the master account may manage users"),
        (status = 404, description = "Unknown user"),
        (status = 409, description = "Username already taken")
    ),
    tag = "Permissions",
    security(("session_cookie" = []))
)]
#[instrument(name = "permissions_post", skip_all, fields(user = %auth.username))]
pub async fn user_action(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<UserAction>,
) -> Result<HttpResponse, AppError> {
    auth.require_master()?;

    match payload.into_inner() {
        UserAction::AddUser(form) => {
            let username = form.username.trim().to_string();
            if username.is_empty() || form.password.is_empty() {
                // never echo the password back
                return Err(AppError::invalid_input(
                    "Username and password are required",
                    &json!({ "username": username }),
                ));
            }
            let hashed = hash(&form.password)?;

            let mut tx = pool.begin().await?;
            let inserted = sqlx::query(
                "INSERT INTO users (username, password_hash, is_admin, created_at) VALUES (?, ?, 0, ?)",
            )
            .bind(&username)
            .bind(hashed)
            .bind(Local::now().naive_local())
            .execute(&mut *tx)
            .await;
            let user_id = match inserted {
                Ok(r) => r.last_insert_rowid(),
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    return Err(AppError::Conflict(format!("Username {username} already exists")));
                }
                Err(e) => return Err(e.into()),
            };
            store_permissions(&mut tx, user_id, &Capabilities::default()).await?;
            tx.commit().await?;

            info!(user_id, new_user = %username, "User added");
            let mut conn = pool.acquire().await?;
            let user = find_user(&mut conn, user_id)
                .await?
                .ok_or(AppError::NotFound("User"))?;
            drop(conn);
            Ok(HttpResponse::Ok().json(user_permissions(pool.get_ref(), &user).await?))
        }
        UserAction::UpdateUser(form) => {
            let mut tx = pool.begin().await?;
            let user = find_user(&mut tx, form.uid)
                .await?
                .ok_or(AppError::NotFound("User"))?;

            if let Some(password) = form.password.as_deref().filter(|p| !p.is_empty()) {
                sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
                    .bind(hash(password)?)
                    .bind(user.id)
                    .execute(&mut *tx)
                    .await?;
            }

            let granted = if user.username == MASTER_USERNAME {
                Capabilities::all()
            } else {
                Capabilities::from_rows(
                    form.permissions
                        .iter()
                        .map(|k| (k.as_ref().to_string(), true)),
                )
            };
            store_permissions(&mut tx, user.id, &granted).await?;
            tx.commit().await?;

            info!(user_id = user.id, granted = ?granted.keys(), "User permissions saved");
            Ok(HttpResponse::Ok().json(user_permissions(pool.get_ref(), &user).await?))
        }
        UserAction::DeleteUser(target) => {
            let mut tx = pool.begin().await?;
            let user = find_user(&mut tx, target.uid)
                .await?
                .ok_or(AppError::NotFound("User"))?;
            if user.username == MASTER_USERNAME {
                warn!("Refused to delete the master account");
                return Err(AppError::validation("The master account cannot be deleted"));
            }

            sqlx::query("DELETE FROM permissions WHERE user_id = ?")
                .bind(user.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(user.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            info!(user_id = user.id, "User deleted");
            Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::sheets::Mirror;
    use crate::test_support::{TestUser, call_json, create_user};
    use actix_web::{http::StatusCode, test};
    use serde_json::Value;

    fn post(body: Value) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/permissions")
            .cookie(TestUser::master().cookie())
            .set_json(body)
    }

    #[actix_web::test]
    async fn master_manages_users() {
        let pool = test_pool().await;
        let app = test_app!(pool.clone(), Mirror::disabled());

        let (status, added) = call_json(
            &app,
            post(json!({"action": "add_user", "username": "clerk", "password": "pw"})).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let uid = added["id"].as_i64().unwrap();
        assert!(added["permissions"].as_object().unwrap().values().all(|v| v == false));

        let (status, _) = call_json(
            &app,
            post(json!({"action": "add_user", "username": "clerk", "password": "x"})).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, updated) = call_json(
            &app,
            post(json!({"action": "update_user", "uid": uid, "permissions": ["tasks", "records_es1"]}))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["permissions"]["tasks"], true);
        assert_eq!(updated["permissions"]["records_es1"], true);
        assert_eq!(updated["permissions"]["employees"], false);

        let (_, page) = call_json(
            &app,
            test::TestRequest::get()
                .uri("/permissions")
                .cookie(TestUser::master().cookie())
                .to_request(),
        )
        .await;
        assert_eq!(page["users"].as_array().unwrap().len(), 2);
        assert_eq!(page["catalogue"].as_array().unwrap().len(), 14);

        let (status, _) = call_json(
            &app,
            post(json!({"action": "delete_user", "uid": uid})).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions WHERE user_id = ?")
            .bind(uid)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(left, 0);
    }

    #[actix_web::test]
    async fn master_cannot_be_deleted_or_demoted() {
        let pool = test_pool().await;
        let app = test_app!(pool.clone(), Mirror::disabled());

        let (status, _) = call_json(
            &app,
            post(json!({"action": "delete_user", "uid": 1})).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, master) = call_json(
            &app,
            post(json!({"action": "update_user", "uid": 1, "permissions": []})).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(master["permissions"]["permissions"], true);

        let denied: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM permissions WHERE user_id = 1 AND allowed = 0")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(denied, 0);
    }

    #[actix_web::test]
    async fn permissions_key_alone_is_not_enough() {
        let pool = test_pool().await;
        let clerk = create_user(&pool, "clerk", &["permissions"]).await;
        let app = test_app!(pool, Mirror::disabled());

        let (status, body) = call_json(
            &app,
            test::TestRequest::get()
                .uri("/permissions")
                .cookie(clerk.cookie())
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "no_permission");
    }
}
