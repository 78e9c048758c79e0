use crate::config::{DEFAULT_THEME, DEFAULT_USER_NAME, DEFAULT_USER_ROLE};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const DEFAULT_DB_FILENAME: &str = "marketpulse.db";
const DATA_SUBDIR: &str = "marketpulse";

fn now_unix_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis().min(i64::MAX as u128) as i64,
        Err(_) => 0,
    }
}

fn resolve_db_filename() -> String {
    std::env::var("MARKETPULSE_DB_FILENAME")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_DB_FILENAME.to_string())
}

fn resolve_db_path() -> Result<PathBuf, AppError> {
    let mut base_dir = dirs::data_dir().ok_or(AppError::DataDirUnavailable)?;
    base_dir.push(DATA_SUBDIR);
    std::fs::create_dir_all(&base_dir)?;
    base_dir.push(resolve_db_filename());
    Ok(base_dir)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn initialize_pool_from_path(path: &Path) -> Result<SqlitePool, AppError> {
    let connect_options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePool::connect_with(connect_options).await?;
    run_migrations(&pool).await?;

    Ok(pool)
}

pub async fn initialize_pool() -> Result<SqlitePool, AppError> {
    let db_path = resolve_db_path()?;
    initialize_pool_from_path(&db_path).await
}

/// The persisted dashboard session: who is signed in, their theme, and the
/// tickers they watch. One row, replacing the browser-storage entries the
/// web dashboard kept (`marketpulse_user`, `mp_theme`, watchlist).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub user_name: String,
    pub role: String,
    pub theme: String,
    pub watchlist: Vec<String>,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSessionArgs {
    pub user_name: Option<String>,
    pub role: Option<String>,
    pub theme: Option<String>,
    pub watchlist: Option<Vec<String>>,
}

fn merge_field(current: String, incoming: Option<String>) -> String {
    match incoming {
        Some(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                current
            } else {
                trimmed.to_string()
            }
        }
        None => current,
    }
}

fn normalize_watchlist(tickers: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        let trimmed = ticker.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !normalized.iter().any(|existing| existing == trimmed) {
            normalized.push(trimmed.to_string());
        }
    }
    normalized
}

fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionSnapshot, AppError> {
    let user_name: String = row.try_get("user_name")?;
    let role: String = row.try_get("role")?;
    let theme: String = row.try_get("theme")?;
    let watchlist_json: String = row.try_get("watchlist_json")?;
    let updated_at_ms: i64 = row.try_get("updated_at_ms")?;

    let watchlist = match serde_json::from_str::<Vec<String>>(&watchlist_json) {
        Ok(tickers) => tickers,
        Err(error) => {
            tracing::warn!("stored watchlist is unreadable ({error}), treating as empty");
            Vec::new()
        }
    };

    Ok(SessionSnapshot {
        user_name,
        role,
        theme,
        watchlist,
        updated_at_ms,
    })
}

async fn ensure_session_seed(pool: &SqlitePool) -> Result<(), AppError> {
    let updated_at_ms = now_unix_ms();
    sqlx::query(
        "INSERT OR IGNORE INTO session (id, user_name, role, theme, watchlist_json, updated_at_ms) VALUES (1, ?, ?, ?, ?, ?)",
    )
    .bind(DEFAULT_USER_NAME)
    .bind(DEFAULT_USER_ROLE)
    .bind(DEFAULT_THEME)
    .bind("[]")
    .bind(updated_at_ms)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_session(pool: &SqlitePool) -> Result<SessionSnapshot, AppError> {
    ensure_session_seed(pool).await?;

    let row = sqlx::query(
        "SELECT user_name, role, theme, watchlist_json, updated_at_ms FROM session WHERE id = 1",
    )
    .fetch_one(pool)
    .await?;

    map_session_row(&row)
}

/// Merge save: absent or blank fields keep their current value, a provided
/// watchlist replaces the stored one after trim/dedup.
pub async fn save_session(
    pool: &SqlitePool,
    args: SaveSessionArgs,
) -> Result<SessionSnapshot, AppError> {
    let current = get_session(pool).await?;

    let user_name = merge_field(current.user_name, args.user_name);
    let role = merge_field(current.role, args.role);
    let theme = merge_field(current.theme, args.theme);
    let watchlist = match args.watchlist {
        Some(tickers) => normalize_watchlist(tickers),
        None => current.watchlist,
    };
    let watchlist_json = serde_json::to_string(&watchlist)?;
    let updated_at_ms = now_unix_ms();

    sqlx::query(
        "INSERT INTO session (id, user_name, role, theme, watchlist_json, updated_at_ms) VALUES (1, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET user_name=excluded.user_name, role=excluded.role, theme=excluded.theme, watchlist_json=excluded.watchlist_json, updated_at_ms=excluded.updated_at_ms",
    )
    .bind(user_name)
    .bind(role)
    .bind(theme)
    .bind(watchlist_json)
    .bind(updated_at_ms)
    .execute(pool)
    .await?;

    get_session(pool).await
}

/// Logout resets the row to the seeded defaults.
pub async fn clear_session(pool: &SqlitePool) -> Result<SessionSnapshot, AppError> {
    let updated_at_ms = now_unix_ms();
    sqlx::query(
        "INSERT INTO session (id, user_name, role, theme, watchlist_json, updated_at_ms) VALUES (1, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET user_name=excluded.user_name, role=excluded.role, theme=excluded.theme, watchlist_json=excluded.watchlist_json, updated_at_ms=excluded.updated_at_ms",
    )
    .bind(DEFAULT_USER_NAME)
    .bind(DEFAULT_USER_ROLE)
    .bind(DEFAULT_THEME)
    .bind("[]")
    .bind(updated_at_ms)
    .execute(pool)
    .await?;

    get_session(pool).await
}
