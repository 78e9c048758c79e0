//! Push-side of the dashboard runtime: envelope decoding, the in-memory
//! alert feed, and the reconnecting stream task that feeds it.

pub mod envelope;
pub mod feed;
pub mod transport;

pub use envelope::{parse_push_envelope, PushEnvelope};
pub use feed::{apply_envelope, AlertFeed, PushApplyOutcome};
pub use transport::{
    run_alert_stream, ConnectionState, ReconnectPolicy, StreamStatusSnapshot, TransportShared,
    MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY_MS,
};
