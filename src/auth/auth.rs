use crate::error::AppError;
use crate::model::permission::{Capabilities, MASTER_USERNAME, PermKey};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};
use sqlx::SqlitePool;

/// The authenticated caller, inserted into request extensions by
/// [`auth_middleware`](crate::auth::middleware::auth_middleware).
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub capabilities: Capabilities,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(AppError::Unauthorized.into())),
        }
    }
}

impl AuthUser {
    pub fn is_master(&self) -> bool {
        self.username == MASTER_USERNAME
    }

    pub fn require(&self, key: PermKey) -> Result<(), AppError> {
        if self.capabilities.allows(key) {
            Ok(())
        } else {
            Err(AppError::Forbidden(key))
        }
    }

    /// User administration needs both the master identity and the
    /// `permissions` key.
    pub fn require_master(&self) -> Result<(), AppError> {
        if self.is_master() && self.capabilities.allows(PermKey::Permissions) {
            Ok(())
        } else {
            Err(AppError::AdminOnly)
        }
    }
}

/// Reads a user's permissions from the store. The master account always
/// holds every key regardless of its rows.
pub async fn load_capabilities(
    pool: &SqlitePool,
    user_id: i64,
    username: &str,
) -> Result<Capabilities, sqlx::Error> {
    if username == MASTER_USERNAME {
        return Ok(Capabilities::all());
    }

    let rows = sqlx::query_as::<_, (String, bool)>(
        "SELECT perm_key, allowed FROM permissions WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(Capabilities::from_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn user(name: &str, caps: Capabilities) -> AuthUser {
        AuthUser {
            user_id: 2,
            username: name.to_string(),
            capabilities: caps,
        }
    }

    #[test]
    fn require_checks_single_key() {
        let u = user("clerk", Capabilities::from_rows(vec![("tasks".into(), true)]));
        assert!(u.require(PermKey::Tasks).is_ok());
        assert!(matches!(
            u.require(PermKey::Employees),
            Err(AppError::Forbidden(PermKey::Employees))
        ));
    }

    #[test]
    fn permissions_key_alone_is_not_admin() {
        let u = user("clerk", Capabilities::all());
        assert!(matches!(u.require_master(), Err(AppError::AdminOnly)));
        let m = user(MASTER_USERNAME, Capabilities::all());
        assert!(m.require_master().is_ok());
        let m_without = user(MASTER_USERNAME, Capabilities::default());
        assert!(m_without.require_master().is_err());
    }

    #[actix_web::test]
    async fn capabilities_come_from_rows() {
        let pool = test_pool().await;
        let id = sqlx::query(
            "INSERT INTO users (username, password_hash, is_admin, created_at) VALUES ('clerk', 'x', 0, '2024-01-01 00:00:00')",
        )
        .execute(&pool)
        .await
        .unwrap()
        .last_insert_rowid();
        sqlx::query("INSERT INTO permissions (user_id, perm_key, allowed) VALUES (?, 'home', 1), (?, 'tasks', 0)")
            .bind(id)
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        let caps = load_capabilities(&pool, id, "clerk").await.unwrap();
        assert_eq!(caps.keys(), vec![PermKey::Home]);

        let master = load_capabilities(&pool, 1, MASTER_USERNAME).await.unwrap();
        assert_eq!(master, Capabilities::all());
    }
}
