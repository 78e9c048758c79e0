use crate::backend::{fetch_news_status, fetch_stock_prices, NewsFetchStatus, QuoteBoard};
use crate::config::RuntimeConfig;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Read side of the two background polls. `None` until the first successful
/// fetch lands.
#[derive(Debug, Clone)]
pub struct PollerChannels {
    pub news_status: watch::Receiver<Option<NewsFetchStatus>>,
    pub quotes: watch::Receiver<Option<QuoteBoard>>,
}

pub struct PollerHandles {
    cancel_token: CancellationToken,
    status_handle: JoinHandle<()>,
    quote_handle: JoinHandle<()>,
}

impl PollerHandles {
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        let _ = self.status_handle.await;
        let _ = self.quote_handle.await;
    }
}

/// Spawns the processing-status poll and the price-refresh poll. Both tick
/// immediately, then on their configured cadence; a slow backend skips ticks
/// instead of bursting to catch up.
pub fn start_pollers(
    config: &RuntimeConfig,
    client: &Client,
    quote_tickers: Option<Vec<String>>,
) -> (PollerHandles, PollerChannels) {
    let cancel_token = CancellationToken::new();
    let (status_tx, status_rx) = watch::channel(None);
    let (quote_tx, quote_rx) = watch::channel(None);

    let status_cancel = cancel_token.clone();
    let status_client = client.clone();
    let status_api_url = config.api_url.clone();
    let status_interval_ms = config.status_poll_interval_ms;
    let status_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(status_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = status_cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match fetch_news_status(&status_client, &status_api_url).await {
                        Ok(status) => {
                            status_tx.send_replace(Some(status));
                        }
                        Err(error) => {
                            tracing::debug!("news status poll failed: {error}");
                        }
                    }
                }
            }
        }
    });

    let quote_cancel = cancel_token.clone();
    let quote_client = client.clone();
    let quote_api_url = config.api_url.clone();
    let quote_interval_ms = config.quote_poll_interval_ms;
    let quote_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(quote_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = quote_cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let tickers = quote_tickers.as_deref();
                    match fetch_stock_prices(&quote_client, &quote_api_url, tickers).await {
                        Ok(board) => {
                            quote_tx.send_replace(Some(board));
                        }
                        Err(error) => {
                            tracing::debug!("stock price poll failed: {error}");
                        }
                    }
                }
            }
        }
    });

    let handles = PollerHandles {
        cancel_token,
        status_handle,
        quote_handle,
    };
    let channels = PollerChannels {
        news_status: status_rx,
        quotes: quote_rx,
    };
    (handles, channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> RuntimeConfig {
        RuntimeConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            ws_url: "ws://127.0.0.1:1".to_string(),
            user_name: "Jaswanth".to_string(),
            status_poll_interval_ms: 50,
            quote_poll_interval_ms: 50,
        }
    }

    #[tokio::test]
    async fn failed_polls_leave_channels_empty_and_shutdown_joins() {
        let config = offline_config();
        let client = Client::new();
        let (handles, channels) = start_pollers(&config, &client, None);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(channels.news_status.borrow().is_none());
        assert!(channels.quotes.borrow().is_none());

        handles.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_joins_promptly_between_ticks() {
        let mut config = offline_config();
        config.status_poll_interval_ms = 60_000;
        config.quote_poll_interval_ms = 60_000;
        let client = Client::new();
        let (handles, _channels) = start_pollers(&config, &client, None);

        handles.shutdown().await;
    }
}
