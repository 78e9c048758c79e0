//! Headless data runtime for the MarketPulse dashboard: the live alert
//! stream, the REST backend client, view-model normalization, background
//! polls, and the persisted session.

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod poll;
pub mod realtime;
pub mod runtime;
pub mod session;
pub mod state;
pub mod view;

pub use config::{RuntimeArgs, RuntimeConfig};
pub use error::AppError;
pub use realtime::{ConnectionState, StreamStatusSnapshot};
pub use session::{SaveSessionArgs, SessionSnapshot};
pub use state::AppState;
