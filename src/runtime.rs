use crate::backend::{self, QuoteBoard, DEFAULT_ANALYZE_LIMIT, DEFAULT_ARTICLE_LIMIT};
use crate::config::RuntimeArgs;
use crate::error::AppError;
use crate::poll::{self, PollerChannels};
use crate::realtime::{run_alert_stream, ConnectionState, PushEnvelope, StreamStatusSnapshot};
use crate::session::{self, SaveSessionArgs, SessionSnapshot};
use crate::state::{AlertStreamHandle, AppState, PollerRuntime};
use crate::view::{AlertView, PortfolioView, StatsView};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStreamSession {
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResult {
    pub stopped: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_ms: u128,
    pub db: &'static str,
    pub stream: ConnectionState,
}

/// Resolves configuration, opens and migrates the session store, and loads
/// the persisted session. Nothing network-facing starts here.
pub async fn init(args: Option<RuntimeArgs>) -> Result<AppState, AppError> {
    let config = args.unwrap_or_default().normalize()?;
    let db_pool = session::initialize_pool().await?;
    let snapshot = session::get_session(&db_pool).await?;
    Ok(AppState::new(config, db_pool, snapshot))
}

/// Starts the alert stream task, replacing a running one in place.
pub async fn start_alert_stream(state: &AppState) -> AlertStreamSession {
    let existing_handle = {
        let mut stream_slot = state.alert_stream.lock().await;
        stream_slot.take()
    };
    if let Some(handle) = existing_handle {
        handle.cancellation_token.cancel();
        let _ = handle.join_handle.await;
    }

    let cancellation_token = CancellationToken::new();
    let task_token = cancellation_token.clone();
    let task_config = state.config.clone();
    let task_transport = Arc::clone(&state.transport);
    let task_status = state.stream_status.clone();

    let join_handle = tokio::spawn(async move {
        run_alert_stream(task_config, task_transport, task_status, task_token).await;
    });

    {
        let mut stream_slot = state.alert_stream.lock().await;
        *stream_slot = Some(AlertStreamHandle {
            cancellation_token,
            join_handle,
        });
    }

    AlertStreamSession {
        endpoint: state.config.ws_url.clone(),
    }
}

pub async fn stop_alert_stream(state: &AppState) -> StopResult {
    let existing_handle = {
        let mut stream_slot = state.alert_stream.lock().await;
        stream_slot.take()
    };

    let stopped = if let Some(handle) = existing_handle {
        handle.cancellation_token.cancel();
        let _ = handle.join_handle.await;
        true
    } else {
        false
    };

    StopResult { stopped }
}

/// Nudges the stream task past its current backoff wait, or out of the
/// parked state after the attempt ceiling. The attempt counter is untouched.
pub fn reconnect_alert_stream(state: &AppState) {
    state.transport.request_reconnect();
}

pub fn alert_stream_status(state: &AppState) -> StreamStatusSnapshot {
    state.stream_status.borrow().clone()
}

pub fn subscribe_alert_stream(state: &AppState) -> watch::Receiver<StreamStatusSnapshot> {
    state.stream_status.subscribe()
}

pub fn alerts_snapshot(state: &AppState) -> Vec<AlertView> {
    state.transport.alerts_snapshot()
}

pub fn last_push_message(state: &AppState) -> Option<PushEnvelope> {
    state.transport.last_message()
}

pub fn send_to_backend<T: Serialize>(state: &AppState, message: &T) {
    state.transport.send(message);
}

/// Starts the status and quote polls, replacing running ones in place.
pub async fn start_pollers(state: &AppState) -> PollerChannels {
    let existing = {
        let mut poller_slot = state.pollers.lock().await;
        poller_slot.take()
    };
    if let Some(runtime) = existing {
        runtime.handles.shutdown().await;
    }

    let (handles, channels) = poll::start_pollers(&state.config, &state.http_client, None);
    {
        let mut poller_slot = state.pollers.lock().await;
        *poller_slot = Some(PollerRuntime {
            handles,
            channels: channels.clone(),
        });
    }
    channels
}

pub async fn stop_pollers(state: &AppState) -> StopResult {
    let existing = {
        let mut poller_slot = state.pollers.lock().await;
        poller_slot.take()
    };

    let stopped = if let Some(runtime) = existing {
        runtime.handles.shutdown().await;
        true
    } else {
        false
    };

    StopResult { stopped }
}

pub async fn poll_channels(state: &AppState) -> Option<PollerChannels> {
    let poller_slot = state.pollers.lock().await;
    poller_slot.as_ref().map(|runtime| runtime.channels.clone())
}

pub async fn load_alerts(state: &AppState) -> Result<Vec<AlertView>, AppError> {
    let raw = backend::fetch_alerts(&state.http_client, &state.config.api_url).await?;
    let now = Utc::now();
    Ok(raw
        .into_iter()
        .map(|alert| AlertView::from_raw(alert, now))
        .collect())
}

pub async fn load_portfolio(state: &AppState) -> Result<PortfolioView, AppError> {
    let user_name = {
        let session = state.session.read().await;
        session.user_name.clone()
    };
    let raw =
        backend::fetch_portfolio(&state.http_client, &state.config.api_url, Some(&user_name))
            .await?;
    Ok(PortfolioView::from_raw(raw))
}

pub async fn load_stats(state: &AppState) -> Result<StatsView, AppError> {
    let raw = backend::fetch_stats(&state.http_client, &state.config.api_url).await?;
    Ok(StatsView::from_raw(raw))
}

pub async fn load_articles(
    state: &AppState,
    limit: Option<u16>,
    portfolio: Option<&[String]>,
) -> Result<Vec<Value>, AppError> {
    backend::fetch_articles(
        &state.http_client,
        &state.config.api_url,
        limit.unwrap_or(DEFAULT_ARTICLE_LIMIT),
        portfolio,
    )
    .await
}

pub async fn load_quotes(
    state: &AppState,
    tickers: Option<&[String]>,
) -> Result<QuoteBoard, AppError> {
    backend::fetch_stock_prices(&state.http_client, &state.config.api_url, tickers).await
}

pub async fn trigger_analysis(state: &AppState, limit: Option<u16>) -> Result<Value, AppError> {
    backend::trigger_fetch_and_analyze(
        &state.http_client,
        &state.config.api_url,
        limit.unwrap_or(DEFAULT_ANALYZE_LIMIT),
    )
    .await
}

pub async fn trigger_news_fetch(state: &AppState) -> Result<Value, AppError> {
    backend::trigger_news_fetch(&state.http_client, &state.config.api_url).await
}

pub async fn trigger_pipeline(state: &AppState) -> Result<Value, AppError> {
    backend::trigger_pipeline(&state.http_client, &state.config.api_url).await
}

/// Registers tickers with the backend, then folds them into the persisted
/// watchlist. A failed registration leaves the session untouched.
pub async fn add_to_watchlist(
    state: &AppState,
    tickers: Vec<String>,
) -> Result<SessionSnapshot, AppError> {
    backend::push_watchlist(&state.http_client, &state.config.api_url, &tickers).await?;

    let combined = {
        let session = state.session.read().await;
        let mut combined = session.watchlist.clone();
        combined.extend(tickers);
        combined
    };
    let saved = session::save_session(
        &state.db_pool,
        SaveSessionArgs {
            watchlist: Some(combined),
            ..SaveSessionArgs::default()
        },
    )
    .await?;

    {
        let mut writable = state.session.write().await;
        *writable = saved.clone();
    }
    Ok(saved)
}

pub async fn watchlist(state: &AppState) -> Vec<String> {
    let session = state.session.read().await;
    session.watchlist.clone()
}

pub async fn save_session(
    state: &AppState,
    args: SaveSessionArgs,
) -> Result<SessionSnapshot, AppError> {
    let saved = session::save_session(&state.db_pool, args).await?;
    {
        let mut writable = state.session.write().await;
        *writable = saved.clone();
    }
    Ok(saved)
}

pub async fn logout(state: &AppState) -> Result<SessionSnapshot, AppError> {
    let cleared = session::clear_session(&state.db_pool).await?;
    {
        let mut writable = state.session.write().await;
        *writable = cleared.clone();
    }
    Ok(cleared)
}

pub async fn build_health_response(
    started_at: Instant,
    pool: &SqlitePool,
    stream: ConnectionState,
) -> HealthResponse {
    let db_status = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await
    {
        Ok(_) => "ok",
        Err(_) => "error",
    };

    HealthResponse {
        status: "ok",
        uptime_ms: started_at.elapsed().as_millis(),
        db: db_status,
        stream,
    }
}

pub async fn health(state: &AppState) -> HealthResponse {
    let stream = state.stream_status.borrow().state;
    build_health_response(state.started_at, &state.db_pool, stream).await
}

/// Stops the stream and the pollers together and closes the session store.
/// Safe to call repeatedly, or without anything running.
pub async fn shutdown(state: &AppState) {
    let _ = stop_alert_stream(state).await;
    let _ = stop_pollers(state).await;
    state.db_pool.close().await;
}
