use crate::error::AppError;
use crate::view::raw::{RawAlert, RawPortfolio, RawStats};
use crate::view::timefmt::parse_timestamp;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};

pub const DEFAULT_ANALYZE_LIMIT: u16 = 4;
pub const DEFAULT_ARTICLE_LIMIT: u16 = 10;

pub type AlertWsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn alerts_endpoint(api_url: &str) -> String {
    format!("{api_url}/api/alerts")
}

fn portfolio_endpoint(api_url: &str) -> String {
    format!("{api_url}/api/portfolio")
}

fn stats_endpoint(api_url: &str) -> String {
    format!("{api_url}/api/stats")
}

fn articles_endpoint(api_url: &str, limit: u16, portfolio: Option<&[String]>) -> String {
    let mut endpoint = format!("{api_url}/api/articles?limit={limit}");
    if let Some(tickers) = portfolio {
        if !tickers.is_empty() {
            endpoint.push_str(&format!("&portfolio={}", tickers.join(",")));
        }
    }
    endpoint
}

fn stock_prices_endpoint(api_url: &str, tickers: Option<&[String]>) -> String {
    let mut endpoint = format!("{api_url}/api/stock-prices");
    if let Some(tickers) = tickers {
        if !tickers.is_empty() {
            endpoint.push_str(&format!("?tickers={}", tickers.join(",")));
        }
    }
    endpoint
}

fn news_fetch_status_endpoint(api_url: &str) -> String {
    format!("{api_url}/api/news/fetch-status")
}

fn health_endpoint(api_url: &str) -> String {
    format!("{api_url}/api/health")
}

fn fetch_and_analyze_endpoint(api_url: &str, limit: u16) -> String {
    format!("{api_url}/api/fetch-and-analyze?limit={limit}")
}

fn fetch_news_endpoint(api_url: &str) -> String {
    format!("{api_url}/api/fetch-news")
}

fn run_pipeline_endpoint(api_url: &str) -> String {
    format!("{api_url}/api/run-pipeline")
}

fn watchlist_endpoint(api_url: &str) -> String {
    format!("{api_url}/api/watchlist")
}

pub async fn connect_alert_stream(ws_url: &str) -> Result<AlertWsStream, AppError> {
    let ws_config = WebSocketConfig {
        max_message_size: Some(64 << 20),
        max_frame_size: Some(16 << 20),
        ..Default::default()
    };

    let (stream, _) = connect_async_with_config(ws_url, Some(ws_config), true).await?;
    Ok(stream)
}

/// The alerts route has shipped both shapes over time: the wrapped
/// `{count, alerts}` body and a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AlertsPayload {
    Wrapped {
        #[serde(default)]
        alerts: Vec<RawAlert>,
    },
    Bare(Vec<RawAlert>),
}

impl AlertsPayload {
    pub fn into_alerts(self) -> Vec<RawAlert> {
        match self {
            Self::Wrapped { alerts } => alerts,
            Self::Bare(alerts) => alerts,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ArticlesPayload {
    Wrapped {
        #[serde(default)]
        articles: Vec<Value>,
    },
    Bare(Vec<Value>),
}

impl ArticlesPayload {
    pub fn into_articles(self) -> Vec<Value> {
        match self {
            Self::Wrapped { articles } => articles,
            Self::Bare(articles) => articles,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Quote {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub current_price: f64,
    #[serde(default)]
    pub change: f64,
    #[serde(default)]
    pub change_percent: f64,
    #[serde(default)]
    pub company_name: String,
}

/// Live price board keyed by ticker, iterated in ticker order.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuoteBoard {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub data: BTreeMap<String, Quote>,
}

impl QuoteBoard {
    pub fn quotes(&self) -> impl Iterator<Item = &Quote> {
        self.data.values()
    }

    pub fn quote(&self, ticker: &str) -> Option<&Quote> {
        self.data.get(ticker)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FetchStep {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub count: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewsFetchStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub steps: Vec<FetchStep>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub articles_found: i64,
    #[serde(default)]
    pub sources_processed: Vec<String>,
}

impl NewsFetchStatus {
    pub fn is_processing(&self) -> bool {
        matches!(self.status.as_str(), "fetching" | "processing")
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        let started = parse_timestamp(self.start_time.as_deref()?)?;
        Some((now - started).num_seconds().max(0))
    }
}

#[derive(Debug, Serialize)]
struct WatchlistRequest<'a> {
    tickers: &'a [String],
}

pub async fn fetch_alerts(client: &Client, api_url: &str) -> Result<Vec<RawAlert>, AppError> {
    let endpoint = alerts_endpoint(api_url);
    let response = client.get(endpoint).send().await?.error_for_status()?;
    let payload = response.json::<AlertsPayload>().await?;
    Ok(payload.into_alerts())
}

pub async fn fetch_portfolio(
    client: &Client,
    api_url: &str,
    user_name: Option<&str>,
) -> Result<RawPortfolio, AppError> {
    let endpoint = portfolio_endpoint(api_url);
    let mut request = client.get(endpoint);
    if let Some(user_name) = user_name {
        request = request.query(&[("user_name", user_name)]);
    }
    let response = request.send().await?.error_for_status()?;
    Ok(response.json::<RawPortfolio>().await?)
}

pub async fn fetch_stats(client: &Client, api_url: &str) -> Result<RawStats, AppError> {
    let endpoint = stats_endpoint(api_url);
    let response = client.get(endpoint).send().await?.error_for_status()?;
    Ok(response.json::<RawStats>().await?)
}

pub async fn fetch_articles(
    client: &Client,
    api_url: &str,
    limit: u16,
    portfolio: Option<&[String]>,
) -> Result<Vec<Value>, AppError> {
    let endpoint = articles_endpoint(api_url, limit, portfolio);
    let response = client.get(endpoint).send().await?.error_for_status()?;
    let payload = response.json::<ArticlesPayload>().await?;
    Ok(payload.into_articles())
}

pub async fn fetch_stock_prices(
    client: &Client,
    api_url: &str,
    tickers: Option<&[String]>,
) -> Result<QuoteBoard, AppError> {
    let endpoint = stock_prices_endpoint(api_url, tickers);
    let response = client.get(endpoint).send().await?.error_for_status()?;
    Ok(response.json::<QuoteBoard>().await?)
}

pub async fn fetch_news_status(
    client: &Client,
    api_url: &str,
) -> Result<NewsFetchStatus, AppError> {
    let endpoint = news_fetch_status_endpoint(api_url);
    let response = client.get(endpoint).send().await?.error_for_status()?;
    Ok(response.json::<NewsFetchStatus>().await?)
}

pub async fn fetch_backend_health(client: &Client, api_url: &str) -> Result<Value, AppError> {
    let endpoint = health_endpoint(api_url);
    let response = client.get(endpoint).send().await?.error_for_status()?;
    Ok(response.json::<Value>().await?)
}

pub async fn trigger_fetch_and_analyze(
    client: &Client,
    api_url: &str,
    limit: u16,
) -> Result<Value, AppError> {
    let endpoint = fetch_and_analyze_endpoint(api_url, limit);
    let response = client.post(endpoint).send().await?.error_for_status()?;
    Ok(response.json::<Value>().await?)
}

pub async fn trigger_news_fetch(client: &Client, api_url: &str) -> Result<Value, AppError> {
    let endpoint = fetch_news_endpoint(api_url);
    let response = client.post(endpoint).send().await?.error_for_status()?;
    Ok(response.json::<Value>().await?)
}

pub async fn trigger_pipeline(client: &Client, api_url: &str) -> Result<Value, AppError> {
    let endpoint = run_pipeline_endpoint(api_url);
    let response = client.post(endpoint).send().await?.error_for_status()?;
    Ok(response.json::<Value>().await?)
}

pub async fn push_watchlist(
    client: &Client,
    api_url: &str,
    tickers: &[String],
) -> Result<Value, AppError> {
    let endpoint = watchlist_endpoint(api_url);
    let response = client
        .post(endpoint)
        .json(&WatchlistRequest { tickers })
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json::<Value>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:8000";

    #[test]
    fn alerts_endpoint_is_correct() {
        assert_eq!(alerts_endpoint(BASE), "http://localhost:8000/api/alerts");
    }

    #[test]
    fn articles_endpoint_appends_portfolio_when_present() {
        let plain = articles_endpoint(BASE, 10, None);
        assert!(plain.ends_with("/api/articles?limit=10"));

        let tickers = vec!["AAPL".to_string(), "TSLA".to_string()];
        let scoped = articles_endpoint(BASE, 5, Some(&tickers));
        assert!(scoped.contains("limit=5"));
        assert!(scoped.contains("portfolio=AAPL,TSLA"));
    }

    #[test]
    fn articles_endpoint_skips_empty_portfolio() {
        let endpoint = articles_endpoint(BASE, 10, Some(&[]));
        assert!(!endpoint.contains("portfolio="));
    }

    #[test]
    fn stock_prices_endpoint_joins_tickers() {
        let plain = stock_prices_endpoint(BASE, None);
        assert!(plain.ends_with("/api/stock-prices"));

        let tickers = vec!["NVDA".to_string(), "MSFT".to_string()];
        let scoped = stock_prices_endpoint(BASE, Some(&tickers));
        assert!(scoped.ends_with("/api/stock-prices?tickers=NVDA,MSFT"));
    }

    #[test]
    fn trigger_endpoints_are_correct() {
        assert!(fetch_and_analyze_endpoint(BASE, 4).ends_with("/api/fetch-and-analyze?limit=4"));
        assert!(fetch_news_endpoint(BASE).ends_with("/api/fetch-news"));
        assert!(run_pipeline_endpoint(BASE).ends_with("/api/run-pipeline"));
        assert!(watchlist_endpoint(BASE).ends_with("/api/watchlist"));
        assert!(news_fetch_status_endpoint(BASE).ends_with("/api/news/fetch-status"));
        assert!(health_endpoint(BASE).ends_with("/api/health"));
        assert!(stats_endpoint(BASE).ends_with("/api/stats"));
        assert!(portfolio_endpoint(BASE).ends_with("/api/portfolio"));
    }

    #[test]
    fn alerts_payload_accepts_both_shapes() {
        let wrapped: AlertsPayload =
            serde_json::from_str(r#"{"count":1,"alerts":[{"title":"x"}]}"#)
                .unwrap();
        assert_eq!(wrapped.into_alerts().len(), 1);

        let bare: AlertsPayload = serde_json::from_str(r#"[{"title":"x"},{"title":"y"}]"#).unwrap();
        assert_eq!(bare.into_alerts().len(), 2);

        let unrecognized: AlertsPayload = serde_json::from_str(r#"{"detail":"error"}"#).unwrap();
        assert!(unrecognized.into_alerts().is_empty());
    }

    #[test]
    fn quote_board_iterates_in_ticker_order() {
        let board: QuoteBoard = serde_json::from_str(
            r#"{
                "status": "success",
                "count": 2,
                "data": {
                    "TSLA": {"ticker":"TSLA","current_price":250.0,"change":-3.0,"change_percent":-1.2,"company_name":"Tesla"},
                    "AAPL": {"ticker":"AAPL","current_price":180.0,"change":1.5,"change_percent":0.8,"company_name":"Apple"}
                }
            }"#,
        )
        .unwrap();

        let tickers: Vec<&str> = board.quotes().map(|quote| quote.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "TSLA"]);
        assert_eq!(board.quote("AAPL").map(|quote| quote.current_price), Some(180.0));
    }

    #[test]
    fn fetch_status_reports_processing_phases() {
        let fetching: NewsFetchStatus =
            serde_json::from_str(r#"{"status":"fetching","progress":40.0}"#).unwrap();
        assert!(fetching.is_processing());

        let idle: NewsFetchStatus = serde_json::from_str(r#"{"status":"idle"}"#).unwrap();
        assert!(!idle.is_processing());
        assert_eq!(idle.elapsed_seconds(Utc::now()), None);
    }

    #[test]
    fn fetch_status_elapsed_counts_from_start_time() {
        let status: NewsFetchStatus = serde_json::from_str(
            r#"{"status":"processing","start_time":"2026-03-15T12:00:00"}"#,
        )
        .unwrap();
        let now = parse_timestamp("2026-03-15T12:01:30").unwrap();
        assert_eq!(status.elapsed_seconds(now), Some(90));
    }
}
