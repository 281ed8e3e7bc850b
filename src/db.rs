use anyhow::{Result, anyhow};
use chrono::Local;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use strum::IntoEnumIterator;
use tracing::info;

use crate::auth::password::hash_password;
use crate::model::branch::Branch;
use crate::model::permission::{MASTER_USERNAME, PermKey};

pub async fn init_db(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        is_admin INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        perm_key TEXT NOT NULL,
        allowed INTEGER NOT NULL DEFAULT 0,
        UNIQUE (user_id, perm_key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS daily_headers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        branch TEXT NOT NULL,
        day TEXT NOT NULL,
        cash_start REAL NOT NULL DEFAULT 0,
        cash_end REAL NOT NULL DEFAULT 0,
        total_in_enjaz REAL NOT NULL DEFAULT 0,
        notes TEXT NOT NULL DEFAULT '',
        UNIQUE (branch, day)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS daily_lines (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        header_id INTEGER NOT NULL REFERENCES daily_headers(id) ON DELETE CASCADE,
        kind TEXT NOT NULL,
        position INTEGER NOT NULL,
        label TEXT NOT NULL,
        amount REAL NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_daily_lines_header ON daily_lines (header_id)",
    r#"
    CREATE TABLE IF NOT EXISTS commission_settings (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        rate REAL NOT NULL DEFAULT 0,
        fixed_deduction REAL NOT NULL DEFAULT 0,
        employee_count INTEGER NOT NULL DEFAULT 1
    )
    "#,
    "INSERT OR IGNORE INTO commission_settings (id, rate, fixed_deduction, employee_count) VALUES (1, 0, 0, 1)",
    r#"
    CREATE TABLE IF NOT EXISTS monthly_commissions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        month TEXT NOT NULL UNIQUE,
        sales REAL NOT NULL DEFAULT 0,
        rate REAL NOT NULL,
        fixed_deduction REAL NOT NULL,
        employee_count INTEGER NOT NULL,
        total_commission REAL NOT NULL,
        employee_commission REAL NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS employees (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        job_title TEXT NOT NULL DEFAULT '',
        nationality TEXT NOT NULL DEFAULT '',
        phone TEXT NOT NULL DEFAULT '',
        passport_number TEXT NOT NULL DEFAULT '',
        passport_expiry TEXT,
        residency_number TEXT NOT NULL DEFAULT '',
        residency_expiry TEXT,
        notes TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        due_date TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS financial_commitments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        party TEXT NOT NULL,
        amount REAL NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
];

fn records_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_type TEXT NOT NULL,
            number TEXT NOT NULL DEFAULT '',
            expiry_date TEXT,
            notes TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )
        "#
    )
}

/// Columns added after the first release. Each is added only when missing.
const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[
    ("daily_headers", "updated_at", "TEXT"),
    ("employees", "insurance_number", "TEXT NOT NULL DEFAULT ''"),
    ("employees", "insurance_expiry", "TEXT"),
    ("financial_commitments", "task_id", "INTEGER"),
];

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool, sqlx::Error> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .any(|r| r.try_get::<String, _>("name").map(|n| n == column).unwrap_or(false)))
}

/// Creates or upgrades every table. Safe to run on every start.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }

    for branch in Branch::iter() {
        sqlx::query(&records_table_sql(branch.records_table()))
            .execute(pool)
            .await?;
    }

    for (table, column, decl) in ADDITIVE_COLUMNS {
        if !column_exists(pool, table, column).await? {
            info!(table, column, "Adding missing column");
            sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"))
                .execute(pool)
                .await?;
        }
    }

    Ok(())
}

/// Makes sure the master account exists and holds every permission.
pub async fn ensure_master_user(pool: &SqlitePool, default_password: &str) -> Result<i64> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
        .bind(MASTER_USERNAME)
        .fetch_optional(pool)
        .await?;

    let user_id = match existing {
        Some(id) => id,
        None => {
            let hashed = hash_password(default_password)
                .map_err(|e| anyhow!("hashing master password: {e}"))?;
            let result = sqlx::query(
                "INSERT INTO users (username, password_hash, is_admin, created_at) VALUES (?, ?, 1, ?)",
            )
            .bind(MASTER_USERNAME)
            .bind(hashed)
            .bind(Local::now().naive_local())
            .execute(pool)
            .await?;
            info!(username = MASTER_USERNAME, "Master account created");
            result.last_insert_rowid()
        }
    };

    for key in PermKey::iter() {
        sqlx::query(
            r#"
            INSERT INTO permissions (user_id, perm_key, allowed)
            VALUES (?, ?, 1)
            ON CONFLICT(user_id, perm_key) DO UPDATE SET allowed = 1
            "#,
        )
        .bind(user_id)
        .bind(key.as_ref())
        .execute(pool)
        .await?;
    }

    Ok(user_id)
}

/// Fresh in-memory database with schema and master account.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    ensure_schema(&pool).await.unwrap();
    ensure_master_user(&pool, "1234").await.unwrap();
    pool
}
