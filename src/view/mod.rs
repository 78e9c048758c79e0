pub mod alert;
pub mod portfolio;
pub mod raw;
pub mod stats;
pub mod timefmt;

pub use alert::{
    normalize_alert, recommendation_from_impact, severity_from_impact, AlertView, ChainView,
    HoldingImpactView,
};
pub use portfolio::{HoldingView, PortfolioView, UserView};
pub use stats::{StatsView, TrendPointView};
