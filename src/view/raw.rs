use serde::{Deserialize, Deserializer};

/// Decodes a field as `Some(T)` when the value matches the expected shape,
/// `None` otherwise. The backend's record shapes vary across deployments, so
/// a field-level mismatch must degrade to a default instead of failing the
/// whole record.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Alert record as the backend sends it: every field optional, legacy and
/// current names carried side by side. `AlertView::from_raw` collapses the
/// variants into the canonical shape.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAlert {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub impact_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub portfolio_impact_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub explanation: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub event_summary: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub recommendation: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub chain: Option<RawChain>,
    #[serde(default, rename = "impactChain", deserialize_with = "lenient")]
    pub impact_chain: Option<RawChain>,
    #[serde(default, deserialize_with = "lenient")]
    pub cascade_chain: Option<Vec<RawCascadeLevel>>,
    #[serde(default, deserialize_with = "lenient")]
    pub sources: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub source_urls: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub affected_holdings: Option<Vec<RawHolding>>,
    #[serde(default, deserialize_with = "lenient")]
    pub affected_companies: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub affected_tickers: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub tags: Option<Vec<String>>,
}

impl RawAlert {
    pub fn from_value(value: serde_json::Value) -> Self {
        match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!("alert payload is not an object ({error}), normalizing empty");
                Self::default()
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawChain {
    #[serde(default, deserialize_with = "lenient")]
    pub level1: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub level2: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub level3: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCascadeLevel {
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawHolding {
    #[serde(default, deserialize_with = "lenient")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub ticker: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub impact_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub impact_dollar: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub current_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPortfolio {
    #[serde(default, deserialize_with = "lenient")]
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub holdings: Option<Vec<RawPortfolioHolding>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPortfolioHolding {
    #[serde(default, deserialize_with = "lenient")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub ticker: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub purchase_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub current_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawStats {
    #[serde(default, deserialize_with = "lenient")]
    pub total_alerts: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub alerts_today: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub companies_tracked: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub new_companies_this_week: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub total_events: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub events_this_week: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub average_impact: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub recent_alerts: Option<Vec<RawTrendAlert>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTrendAlert {
    #[serde(default, deserialize_with = "lenient")]
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_empty_object_to_all_none() {
        let raw: RawAlert = serde_json::from_str("{}").expect("empty object should decode");
        assert!(raw.id.is_none());
        assert!(raw.severity.is_none());
        assert!(raw.affected_holdings.is_none());
    }

    #[test]
    fn mistyped_field_degrades_to_none_without_failing_record() {
        let raw: RawAlert = serde_json::from_str(
            r#"{"severity":"high","impact_percent":"not-a-number","sources":"not-a-list"}"#,
        )
        .expect("record with mistyped fields should still decode");

        assert_eq!(raw.severity.as_deref(), Some("high"));
        assert!(raw.impact_percent.is_none());
        assert!(raw.sources.is_none());
    }

    #[test]
    fn accepts_legacy_impact_chain_field_name() {
        let raw: RawAlert = serde_json::from_str(
            r#"{"impactChain":{"level1":"Fab halt","level2":"Chip shortage","level3":"Margin hit"}}"#,
        )
        .expect("legacy chain name should decode");

        let chain = raw.impact_chain.expect("legacy chain should be captured");
        assert_eq!(chain.level1.as_deref(), Some("Fab halt"));
    }

    #[test]
    fn non_object_payload_falls_back_to_default() {
        let raw = RawAlert::from_value(serde_json::json!("just a string"));
        assert!(raw.title.is_none());
        assert!(raw.created_at.is_none());
    }

    #[test]
    fn id_keeps_string_or_number_shape() {
        let as_string: RawAlert =
            serde_json::from_str(r#"{"id":"abc-123"}"#).expect("string id should decode");
        let as_number: RawAlert =
            serde_json::from_str(r#"{"id":42}"#).expect("numeric id should decode");

        assert_eq!(
            as_string.id,
            Some(serde_json::Value::String("abc-123".to_string()))
        );
        assert_eq!(as_number.id, Some(serde_json::json!(42)));
    }
}
