use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub const UNKNOWN_TIMESTAMP: &str = "Unknown";

/// Accepts the timestamp shapes the backend emits: RFC 3339 with an offset,
/// offset-less ISO 8601 (read as UTC), and bare dates.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return parsed.and_hms_opt(0, 0, 0).map(|datetime| datetime.and_utc());
    }
    None
}

pub fn format_relative(timestamp: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(value) = timestamp.filter(|value| !value.trim().is_empty()) else {
        return UNKNOWN_TIMESTAMP.to_string();
    };
    let Some(instant) = parse_timestamp(value) else {
        return UNKNOWN_TIMESTAMP.to_string();
    };
    relative_from_instant(instant, now)
}

pub fn relative_from_instant(instant: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(instant);

    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes} min{} ago", plural_suffix(minutes));
    }

    let hours = elapsed.num_hours();
    if hours < 24 {
        return format!("{hours} hour{} ago", plural_suffix(hours));
    }

    let days = elapsed.num_days();
    if days < 7 {
        return format!("{days} day{} ago", plural_suffix(days));
    }

    instant.format("%b %-d, %Y").to_string()
}

fn plural_suffix(magnitude: i64) -> &'static str {
    if magnitude > 1 {
        "s"
    } else {
        ""
    }
}
