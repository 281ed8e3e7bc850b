use crate::{
    auth::{
        auth::{AuthUser, load_capabilities},
        jwt::generate_session_token,
        middleware::SESSION_COOKIE,
        password::verify_password,
    },
    config::Config,
    error::AppError,
    model::permission::{MASTER_USERNAME, PermKey},
    model::user::User,
    models::{LoginReqDto, SessionInfo},
};
use actix_web::{
    HttpResponse,
    cookie::{Cookie, SameSite, time::Duration},
    web,
};
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct PageLink {
    pub key: PermKey,
    pub label: &'static str,
}

/// Landing page: who is signed in and which pages they may open.
#[derive(Serialize, ToSchema)]
pub struct HomeView {
    pub session: SessionInfo,
    pub pages: Vec<PageLink>,
}

fn session_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(Duration::seconds(config.session_ttl as i64))
        .finish()
}

/// Sign in
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Signed in; the session cookie is set", body = SessionInfo),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many attempts")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip_all, fields(username = %user.username))]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    let username = user.username.trim();
    if username.is_empty() || user.password.is_empty() {
        return Err(AppError::InvalidCredentials);
    }

    let db_user = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, is_admin, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        AppError::InvalidCredentials
    })?;

    if let Err(e) = verify_password(&user.password, &db_user.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::InvalidCredentials);
    }

    debug!(user_id = db_user.id, "Password verified");

    let token = generate_session_token(
        db_user.id,
        &db_user.username,
        &config.session_secret,
        config.session_ttl,
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;

    let capabilities = load_capabilities(pool.get_ref(), db_user.id, &db_user.username).await?;

    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(token, &config))
        .json(SessionInfo {
            user_id: db_user.id,
            is_master: db_user.username == MASTER_USERNAME,
            username: db_user.username,
            permissions: capabilities.keys(),
        }))
}

/// Sign out
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 200, description = "Session cookie cleared")),
    tag = "Auth",
    security(("session_cookie" = []))
)]
#[instrument(name = "auth_logout", skip_all, fields(user = %auth.username))]
pub async fn logout(auth: AuthUser) -> HttpResponse {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();

    info!(user_id = auth.user_id, "Logged out");
    HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "message": "Logged out" }))
}

/// Landing page
#[utoipa::path(
    get,
    path = "/home",
    responses(
        (status = 200, description = "Current session and reachable pages", body = HomeView),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "No permission")
    ),
    tag = "Auth",
    security(("session_cookie" = []))
)]
#[instrument(name = "home", skip_all, fields(user = %auth.username))]
pub async fn home(auth: AuthUser) -> Result<HttpResponse, AppError> {
    auth.require(PermKey::Home)?;

    let keys = auth.capabilities.keys();
    let pages = keys
        .iter()
        .map(|&key| PageLink {
            key,
            label: key.label(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(HomeView {
        session: SessionInfo {
            user_id: auth.user_id,
            is_master: auth.is_master(),
            username: auth.username,
            permissions: keys,
        },
        pages,
    }))
}
