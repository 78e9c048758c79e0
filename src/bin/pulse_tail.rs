use marketpulse_runtime::view::AlertView;
use marketpulse_runtime::{logging, runtime, AppError, ConnectionState};
use std::time::Duration;
use tracing::info;

fn state_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Connected => "connected",
        ConnectionState::Reconnecting => "reconnecting",
    }
}

fn print_alert(alert: &AlertView) {
    println!(
        "[{}] {} {} | impact={}% | rec={} | {}",
        alert.timestamp, alert.icon, alert.title, alert.impact, alert.recommendation, alert.ticker
    );
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init();

    let state = runtime::init(None).await?;
    let session = runtime::start_alert_stream(&state).await;
    let mut status_rx = runtime::subscribe_alert_stream(&state);

    info!("pulse_tail up, streaming from {}", session.endpoint);
    println!("--- MarketPulse Alerts (CTRL+C to stop) ---");

    let mut seen_alerts = 0usize;
    let mut ticker = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("stopping...");
                break;
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status_rx.borrow_and_update().clone();
                let reason = snapshot.reason.unwrap_or_default();
                println!(
                    "[status] {} attempts={} {reason}",
                    state_label(snapshot.state),
                    snapshot.reconnect_attempts
                );
            }
            _ = ticker.tick() => {
                let alerts = runtime::alerts_snapshot(&state);
                if alerts.len() > seen_alerts {
                    let fresh = alerts.len() - seen_alerts;
                    for alert in alerts[..fresh].iter().rev() {
                        print_alert(alert);
                    }
                    seen_alerts = alerts.len();
                }
            }
        }
    }

    runtime::shutdown(&state).await;
    Ok(())
}
