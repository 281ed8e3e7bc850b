use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub session_secret: String,
    pub server_addr: String,
    pub session_ttl: usize,
    pub cookie_secure: bool,
    pub master_password: String,
    pub log_dir: String,

    // Rate limiting
    pub rate_login_per_min: u32,

    // Spreadsheet mirror; both must be present for mirroring to run
    pub google_service_account_json: Option<String>,
    pub google_sheet_id: Option<String>,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var_or(name, default)
        .trim()
        .parse()
        .with_context(|| format!("{name} must be a number"))
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let database_url = match non_empty("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "sqlite://{}?mode=rwc",
                var_or("DATABASE_PATH", "data.db")
            ),
        };

        let port: u16 = parse_var("PORT", "5000")?;

        let google_service_account_json = match non_empty("GOOGLE_SERVICE_ACCOUNT_JSON") {
            Some(json) => Some(json),
            None => match non_empty("GOOGLE_SERVICE_ACCOUNT_FILE") {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("cannot read service account file {path}"))?,
                ),
                None => None,
            },
        };

        Ok(Self {
            database_url,
            session_secret: var_or("APP_SECRET", "change-this-secret"),
            server_addr: var_or("SERVER_ADDR", &format!("0.0.0.0:{port}")),
            session_ttl: parse_var("SESSION_TTL", "43200")?, // default 12 h
            cookie_secure: var_or("COOKIE_SECURE", "1") == "1",
            master_password: var_or("MASTER_PASS", "1234"),
            log_dir: var_or("LOG_DIR", "logs"),

            rate_login_per_min: parse_var("RATE_LOGIN_PER_MIN", "30")?,

            google_service_account_json,
            google_sheet_id: non_empty("GOOGLE_SHEET_ID"),
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            session_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            session_ttl: 3600,
            cookie_secure: false,
            master_password: "1234".to_string(),
            log_dir: "logs".to_string(),
            rate_login_per_min: 1000,
            google_service_account_json: None,
            google_sheet_id: None,
        }
    }
}
