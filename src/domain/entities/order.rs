//! Trade positions and settlement math.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    #[serde(rename = "LONG")]
    Long,
    #[serde(rename = "SHORT")]
    Short,
}

impl TradeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeKind::Long => "LONG",
            TradeKind::Short => "SHORT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LONG" => Some(TradeKind::Long),
            "SHORT" => Some(TradeKind::Short),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "PENDING_SELL")]
    PendingSell,
    #[serde(rename = "CLOSED")]
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "OPEN",
            TradeStatus::PendingSell => "PENDING_SELL",
            TradeStatus::Closed => "CLOSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(TradeStatus::Open),
            "PENDING_SELL" => Some(TradeStatus::PendingSell),
            "CLOSED" => Some(TradeStatus::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Realized profit/loss at settlement.
///
/// Long positions profit when the exit price exceeds the entry price;
/// short positions profit on the way down.
pub fn settlement_profit_loss(kind: TradeKind, buy_price: f64, sell_price: f64, quantity: f64) -> f64 {
    match kind {
        TradeKind::Long => (sell_price - buy_price) * quantity,
        TradeKind::Short => (buy_price - sell_price) * quantity,
    }
}
