//! Fixtures shared by the handler tests.

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test;
use chrono::Local;
use serde_json::Value;
use sqlx::SqlitePool;
use strum::IntoEnumIterator;

use crate::auth::jwt::generate_session_token;
use crate::auth::middleware::SESSION_COOKIE;
use crate::auth::password::hash_password;
use crate::config::Config;
use crate::model::permission::{MASTER_USERNAME, PermKey};

pub const TEST_PASSWORD: &str = "secret";

/// Builds the full route tree over the given pool and mirror.
macro_rules! test_app {
    ($pool:expr, $mirror:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($pool))
                .app_data(actix_web::web::Data::new(crate::config::Config::for_tests()))
                .app_data(actix_web::web::Data::new($mirror))
                .configure(|cfg| crate::routes::configure(cfg, crate::config::Config::for_tests())),
        )
        .await
    };
}

pub struct TestUser {
    pub user_id: i64,
    pub username: String,
}

impl TestUser {
    /// The account `test_pool` bootstraps first.
    pub fn master() -> Self {
        Self {
            user_id: 1,
            username: MASTER_USERNAME.to_string(),
        }
    }

    pub fn cookie(&self) -> Cookie<'static> {
        let config = Config::for_tests();
        let token = generate_session_token(
            self.user_id,
            &self.username,
            &config.session_secret,
            config.session_ttl,
        )
        .unwrap();
        Cookie::new(SESSION_COOKIE, token)
    }
}

/// Inserts a user with password [`TEST_PASSWORD`] holding exactly `keys`.
pub async fn create_user(pool: &SqlitePool, username: &str, keys: &[&str]) -> TestUser {
    let user_id = sqlx::query(
        "INSERT INTO users (username, password_hash, is_admin, created_at) VALUES (?, ?, 0, ?)",
    )
    .bind(username)
    .bind(hash_password(TEST_PASSWORD).unwrap())
    .bind(Local::now().naive_local())
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid();

    for key in PermKey::iter() {
        sqlx::query("INSERT INTO permissions (user_id, perm_key, allowed) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(key.as_ref())
            .bind(keys.contains(&key.as_ref()))
            .execute(pool)
            .await
            .unwrap();
    }

    TestUser {
        user_id,
        username: username.to_string(),
    }
}

/// Calls the service and decodes the body as JSON (`Null` when the body is
/// empty or not JSON).
pub async fn call_json<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let bytes = test::read_body(resp).await;
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
