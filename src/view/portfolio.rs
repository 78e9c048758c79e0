use crate::config::{DEFAULT_USER_NAME, DEFAULT_USER_ROLE};
use crate::view::raw::RawPortfolio;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserView {
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HoldingView {
    pub id: i64,
    pub company: String,
    pub ticker: String,
    pub quantity: f64,
    pub purchase_price: f64,
    pub current_price: f64,
    // Placeholder until alert impact rollups are applied downstream.
    pub impact: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioView {
    pub user: UserView,
    pub holdings: Vec<HoldingView>,
    pub total_value: f64,
    pub total_change: f64,
    pub change_percent: f64,
}

impl PortfolioView {
    pub fn from_raw(raw: RawPortfolio) -> Self {
        let holdings: Vec<HoldingView> = raw
            .holdings
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, holding)| HoldingView {
                id: index as i64 + 1,
                company: holding
                    .company_name
                    .filter(|company| !company.is_empty())
                    .or(holding.company)
                    .unwrap_or_default(),
                ticker: holding.ticker.unwrap_or_default(),
                quantity: holding.quantity.unwrap_or(0.0),
                purchase_price: holding.purchase_price.unwrap_or(0.0),
                current_price: holding.current_price.unwrap_or(0.0),
                impact: 0.0,
            })
            .collect();

        let total_value: f64 = holdings
            .iter()
            .map(|holding| holding.quantity * holding.current_price)
            .sum();
        let total_cost: f64 = holdings
            .iter()
            .map(|holding| holding.quantity * holding.purchase_price)
            .sum();
        let total_change = total_value - total_cost;
        let change_percent = if total_cost > 0.0 {
            total_change / total_cost * 100.0
        } else {
            0.0
        };

        Self {
            user: UserView {
                name: raw
                    .user_name
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| DEFAULT_USER_NAME.to_string()),
                role: DEFAULT_USER_ROLE.to_string(),
            },
            holdings,
            total_value,
            total_change,
            change_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portfolio_from(json: &str) -> PortfolioView {
        let raw: RawPortfolio = serde_json::from_str(json).expect("test json should parse");
        PortfolioView::from_raw(raw)
    }

    #[test]
    fn aggregates_value_change_and_percent() {
        let view = portfolio_from(
            r#"{"holdings":[
                {"company_name":"Apple","ticker":"AAPL","quantity":10,"purchase_price":100,"current_price":150},
                {"company_name":"Sony","ticker":"SONY","quantity":5,"purchase_price":200,"current_price":180}
            ]}"#,
        );

        assert_eq!(view.total_value, 2_400.0);
        assert_eq!(view.total_change, 400.0);
        assert_eq!(view.change_percent, 20.0);
    }

    #[test]
    fn zero_cost_basis_yields_zero_percent() {
        let view = portfolio_from(
            r#"{"holdings":[{"company":"Freebie","quantity":10,"purchase_price":0,"current_price":5}]}"#,
        );

        assert_eq!(view.total_value, 50.0);
        assert_eq!(view.change_percent, 0.0);
        assert!(view.change_percent.is_finite());
    }

    #[test]
    fn empty_portfolio_still_fully_populated() {
        let view = portfolio_from("{}");

        assert_eq!(view.user.name, DEFAULT_USER_NAME);
        assert_eq!(view.user.role, DEFAULT_USER_ROLE);
        assert!(view.holdings.is_empty());
        assert_eq!(view.total_value, 0.0);
        assert_eq!(view.change_percent, 0.0);
    }

    #[test]
    fn company_name_preferred_over_company() {
        let view = portfolio_from(
            r#"{"holdings":[
                {"company_name":"Apple Inc.","company":"Apple","ticker":"AAPL"},
                {"company":"Sony","ticker":"SONY"}
            ]}"#,
        );

        assert_eq!(view.holdings[0].company, "Apple Inc.");
        assert_eq!(view.holdings[1].company, "Sony");
        assert_eq!(view.holdings[0].id, 1);
        assert_eq!(view.holdings[1].id, 2);
    }
}
