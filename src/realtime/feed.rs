use crate::realtime::envelope::PushEnvelope;
use crate::view::alert::AlertView;
use crate::view::raw::RawAlert;
use chrono::{DateTime, Utc};

/// Accumulated stream state: alerts most-recent-first plus the last parsed
/// envelope of any type. Single writer (the stream task), snapshot readers.
#[derive(Debug, Default)]
pub struct AlertFeed {
    pub alerts: Vec<AlertView>,
    pub last_message: Option<PushEnvelope>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushApplyOutcome {
    AlertPrepended,
    UpdateObserved,
    Inert,
}

/// Folds one parsed envelope into the feed. Every envelope becomes the last
/// message; only the alert-creation family touches the alert list.
pub fn apply_envelope(
    feed: &mut AlertFeed,
    envelope: PushEnvelope,
    now: DateTime<Utc>,
) -> PushApplyOutcome {
    let outcome = if envelope.is_alert() {
        let view = AlertView::from_raw(RawAlert::from_value(envelope.data.clone()), now);
        feed.alerts.insert(0, view);
        PushApplyOutcome::AlertPrepended
    } else if envelope.is_update() {
        PushApplyOutcome::UpdateObserved
    } else {
        PushApplyOutcome::Inert
    };

    feed.last_message = Some(envelope);
    outcome
}
