use crate::config::RuntimeConfig;
use crate::poll::{PollerChannels, PollerHandles};
use crate::realtime::{StreamStatusSnapshot, TransportShared};
use crate::session::SessionSnapshot;
use reqwest::Client;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

pub struct AlertStreamHandle {
    pub cancellation_token: CancellationToken,
    pub join_handle: tokio::task::JoinHandle<()>,
}

pub struct PollerRuntime {
    pub handles: PollerHandles,
    pub channels: PollerChannels,
}

pub struct AppState {
    pub started_at: Instant,
    pub config: RuntimeConfig,
    pub http_client: Client,
    pub db_pool: SqlitePool,
    pub session: RwLock<SessionSnapshot>,
    pub transport: Arc<TransportShared>,
    pub alert_stream: Mutex<Option<AlertStreamHandle>>,
    pub pollers: Mutex<Option<PollerRuntime>>,
    pub stream_status: watch::Sender<StreamStatusSnapshot>,
}

impl AppState {
    pub fn new(config: RuntimeConfig, db_pool: SqlitePool, session: SessionSnapshot) -> Self {
        let initial_status = StreamStatusSnapshot::disconnected(
            config.ws_url.clone(),
            Some("stream idle".to_string()),
        );
        let (stream_status, _) = watch::channel(initial_status);

        Self {
            started_at: Instant::now(),
            config,
            http_client: Client::new(),
            db_pool,
            session: RwLock::new(session),
            transport: Arc::new(TransportShared::default()),
            alert_stream: Mutex::new(None),
            pollers: Mutex::new(None),
            stream_status,
        }
    }
}
