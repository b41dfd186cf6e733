//! Risk tiers and position-sizing parameters.
//!
//! Lot size is fixed per tier; the pip figure is recorded alongside trades
//! and reports (for XAUUSD, 10 pips = $1).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Conservative,
    Medium,
    Risky,
}

impl RiskLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "conservative" => Some(RiskLevel::Conservative),
            "medium" => Some(RiskLevel::Medium),
            "risky" => Some(RiskLevel::Risky),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Conservative => "conservative",
            RiskLevel::Medium => "medium",
            RiskLevel::Risky => "risky",
        }
    }

    pub fn params(&self) -> RiskParams {
        match self {
            RiskLevel::Conservative => RiskParams {
                max_lot_size: 0.01,
                stop_loss_pips: 200.0,
            },
            RiskLevel::Medium => RiskParams {
                max_lot_size: 0.05,
                stop_loss_pips: 300.0,
            },
            RiskLevel::Risky => RiskParams {
                max_lot_size: 0.10,
                stop_loss_pips: 500.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    pub max_lot_size: f64,
    pub stop_loss_pips: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        RiskLevel::Medium.params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_resolve_to_static_table() {
        assert_eq!(RiskLevel::Conservative.params().max_lot_size, 0.01);
        assert_eq!(RiskLevel::Conservative.params().stop_loss_pips, 200.0);
        assert_eq!(RiskLevel::Medium.params().max_lot_size, 0.05);
        assert_eq!(RiskLevel::Risky.params().max_lot_size, 0.10);
        assert_eq!(RiskLevel::Risky.params().stop_loss_pips, 500.0);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(RiskLevel::parse("MEDIUM"), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::parse("aggressive"), None);
    }
}
