use crate::view::raw::{RawAlert, RawChain, RawHolding};
use crate::view::timefmt;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_SEVERITY: &str = "medium";
pub const DEFAULT_CONFIDENCE: f64 = 0.85;
pub const DEFAULT_RECOMMENDATION: &str = "MONITOR";
pub const DEFAULT_COMPANY: &str = "Multiple";
pub const DEFAULT_TICKER: &str = "N/A";

/// Canonical alert record. Every field is populated regardless of which
/// backend shape the raw record arrived in.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AlertView {
    pub id: String,
    pub title: String,
    pub company: String,
    pub ticker: String,
    pub severity: String,
    pub impact: f64,
    pub impact_percent: f64,
    pub description: String,
    pub timestamp: String,
    pub created_at: Option<String>,
    pub confidence: f64,
    pub recommendation: String,
    #[serde(rename = "impactChain")]
    pub impact_chain: ChainView,
    pub chain: Option<String>,
    pub sources: Vec<String>,
    pub explanation: String,
    pub affected_holdings: Vec<HoldingImpactView>,
    pub icon: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChainView {
    pub level1: String,
    pub level2: String,
    pub level3: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HoldingImpactView {
    pub company: String,
    pub impact_percent: f64,
    pub shares: f64,
    pub impact_value: f64,
}

impl HoldingImpactView {
    fn from_raw(raw: RawHolding) -> Self {
        let impact_percent = raw.impact_percent.unwrap_or(0.0);
        let shares = raw.quantity.unwrap_or(0.0);
        let current_price = raw.current_price.unwrap_or(0.0);
        let impact_value = raw
            .impact_dollar
            .unwrap_or_else(|| impact_percent * current_price * shares / 100.0);

        Self {
            company: raw.company.unwrap_or_default(),
            impact_percent,
            shares,
            impact_value,
        }
    }
}

impl AlertView {
    pub fn from_raw(raw: RawAlert, now: DateTime<Utc>) -> Self {
        let impact = raw
            .impact_percent
            .or(raw.portfolio_impact_percent)
            .unwrap_or(0.0);

        let explicit_chain = raw.chain.as_ref().or(raw.impact_chain.as_ref());
        let chain = explicit_chain.map(flatten_chain);
        let impact_chain = build_impact_chain(&raw, impact);

        let holdings = raw.affected_holdings.unwrap_or_default();
        let primary_company = holdings
            .first()
            .and_then(|holding| holding.company.clone())
            .filter(|company| !company.is_empty());
        let primary_ticker = holdings
            .first()
            .and_then(|holding| holding.ticker.clone())
            .filter(|ticker| !ticker.is_empty());

        let company = primary_company
            .clone()
            .or_else(|| first_non_empty(raw.affected_companies.as_deref()))
            .unwrap_or_else(|| DEFAULT_COMPANY.to_string());
        let ticker = primary_ticker
            .or_else(|| first_non_empty(raw.affected_tickers.as_deref()))
            .unwrap_or_else(|| DEFAULT_TICKER.to_string());

        let title = raw
            .title
            .clone()
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| synthesize_title(raw.kind.as_deref(), primary_company.as_deref()));

        let icon = select_icon(raw.kind.as_deref(), raw.severity.as_deref()).to_string();

        let description = raw
            .explanation
            .clone()
            .filter(|text| !text.is_empty())
            .or_else(|| raw.event_summary.clone().filter(|text| !text.is_empty()))
            .or_else(|| raw.title.clone().filter(|text| !text.is_empty()))
            .unwrap_or_default();
        let explanation = raw
            .explanation
            .filter(|text| !text.is_empty())
            .or_else(|| raw.description.filter(|text| !text.is_empty()))
            .unwrap_or_default();

        let timestamp = timefmt::format_relative(raw.created_at.as_deref(), now);

        Self {
            id: id_string(raw.id.as_ref()),
            title,
            company,
            ticker,
            severity: raw
                .severity
                .filter(|severity| !severity.is_empty())
                .unwrap_or_else(|| DEFAULT_SEVERITY.to_string()),
            impact,
            impact_percent: impact,
            description,
            timestamp,
            created_at: raw.created_at,
            confidence: raw.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            recommendation: raw
                .recommendation
                .filter(|recommendation| !recommendation.is_empty())
                .unwrap_or_else(|| DEFAULT_RECOMMENDATION.to_string()),
            impact_chain,
            chain,
            sources: raw.sources.or(raw.source_urls).unwrap_or_default(),
            explanation,
            affected_holdings: holdings.into_iter().map(HoldingImpactView::from_raw).collect(),
            icon,
            tags: raw.tags.unwrap_or_default(),
        }
    }
}

/// Normalizes whatever JSON the backend pushed or returned for one alert.
/// Never fails; a payload that is not even an object comes back fully
/// defaulted.
pub fn normalize_alert(value: serde_json::Value) -> AlertView {
    AlertView::from_raw(RawAlert::from_value(value), Utc::now())
}

fn id_string(id: Option<&serde_json::Value>) -> String {
    match id {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(serde_json::Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

fn first_non_empty(values: Option<&[String]>) -> Option<String> {
    values
        .and_then(|values| values.first())
        .filter(|value| !value.is_empty())
        .cloned()
}

fn synthesize_title(kind: Option<&str>, primary_company: Option<&str>) -> String {
    match kind {
        Some("positive_impact") => {
            format!("✨ POSITIVE: {} Impact", primary_company.unwrap_or("Portfolio"))
        }
        Some("relationship_based") => format!(
            "🔴 CRITICAL: {} Disruption",
            primary_company.unwrap_or("Supply Chain")
        ),
        _ => format!("🟡 MEDIUM: {} Event", primary_company.unwrap_or("Market")),
    }
}

// Icon precedence is close to the title-prefix precedence but not the same
// (severity high/critical shares one glyph here); the dashboard relies on
// both rule sets as they are.
fn select_icon(kind: Option<&str>, severity: Option<&str>) -> &'static str {
    if kind == Some("positive_impact") {
        return "✨";
    }
    match severity {
        Some("high") | Some("critical") => "🔴",
        Some("medium") => "🟡",
        _ => "⚠️",
    }
}

fn build_impact_chain(raw: &RawAlert, impact: f64) -> ChainView {
    if let Some(chain) = raw.chain.as_ref().or(raw.impact_chain.as_ref()) {
        return ChainView {
            level1: chain.level1.clone().unwrap_or_default(),
            level2: chain.level2.clone().unwrap_or_default(),
            level3: chain.level3.clone().unwrap_or_default(),
        };
    }

    let cascade = raw.cascade_chain.as_deref().unwrap_or_default();
    let description_at = |index: usize| {
        cascade
            .get(index)
            .and_then(|level| level.description.clone())
            .filter(|description| !description.is_empty())
    };

    ChainView {
        level1: description_at(0).unwrap_or_else(|| "Initial event".to_string()),
        level2: description_at(1).unwrap_or_else(|| "Secondary impact".to_string()),
        level3: description_at(2).unwrap_or_else(|| format!("Expected {impact}% impact")),
    }
}

fn flatten_chain(chain: &RawChain) -> String {
    let levels = [
        chain.level1.as_deref().unwrap_or(""),
        chain.level2.as_deref().unwrap_or(""),
        chain.level3.as_deref().unwrap_or(""),
    ];

    let Some(start) = levels.iter().position(|level| !level.is_empty()) else {
        return String::new();
    };
    let end = levels
        .iter()
        .rposition(|level| !level.is_empty())
        .unwrap_or(start);

    levels[start..=end].join(" → ")
}

pub fn severity_from_impact(impact: f64) -> &'static str {
    let magnitude = impact.abs();
    if magnitude >= 2.0 {
        "critical"
    } else if magnitude >= 1.0 {
        "high"
    } else if magnitude >= 0.5 {
        "medium"
    } else {
        "low"
    }
}

pub fn recommendation_from_impact(impact: f64) -> &'static str {
    if impact <= -2.0 {
        "SELL"
    } else if impact <= -1.0 {
        "REDUCE"
    } else if impact >= 2.0 {
        "BUY"
    } else if impact >= 1.0 {
        "INCREASE"
    } else {
        "HOLD"
    }
}
