use crate::auth::auth::{AuthUser, load_capabilities};
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use sqlx::SqlitePool;
use tracing::{debug, warn};

pub const SESSION_COOKIE: &str = "session";

/// Session token from the cookie, falling back to `Authorization: Bearer`.
fn session_token(req: &ServiceRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn reject(req: ServiceRequest, err: AppError) -> ServiceResponse<BoxBody> {
    req.into_response(err.error_response())
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;
    let pool = req
        .app_data::<Data<SqlitePool>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("Database pool missing"))?;

    let token = match session_token(&req) {
        Some(t) => t,
        None => return Ok(reject(req, AppError::Unauthorized)),
    };

    let claims = match verify_token(&token, &config.session_secret) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "Rejected session token");
            return Ok(reject(req, AppError::Unauthorized));
        }
    };

    // the account may have been deleted since the token was issued
    let username = match sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = ?")
        .bind(claims.user_id)
        .fetch_optional(pool.get_ref())
        .await
    {
        Ok(Some(name)) if name == claims.sub => name,
        Ok(_) => {
            warn!(user_id = claims.user_id, "Session for missing user");
            return Ok(reject(req, AppError::Unauthorized));
        }
        Err(e) => return Ok(reject(req, AppError::Database(e))),
    };

    let capabilities = match load_capabilities(pool.get_ref(), claims.user_id, &username).await {
        Ok(c) => c,
        Err(e) => return Ok(reject(req, AppError::Database(e))),
    };

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        username,
        capabilities,
    });

    next.call(req).await
}
