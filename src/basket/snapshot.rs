//! Status snapshot published to the "Baskets Info" table

use serde::{Deserialize, Serialize};

/// Health marker shown in the status table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    #[default]
    #[serde(rename = "🟢 OK")]
    Ok,
    #[serde(rename = "🔴 Error")]
    Error,
}

/// One row of the basket status table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketInfo {
    pub symbol: String,
    pub status: HealthStatus,
    /// Position notional in quote currency, rounded
    pub pos_size_usd: f64,
    /// Distance to the resting grid order, e.g. `"-9.09 %"`
    pub to_re_balance: String,
    /// Distance to the take-profit level, e.g. `"2 %"`
    pub to_profit: String,
    pub next_order_price: f64,
    pub entry_price: f64,
    pub price: f64,
    /// Percent move from entry to the last close
    pub drawdown: f64,
    pub errors: Vec<String>,
}

/// Caller-supplied fields merged into the snapshot before it is recomputed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasketInfoPatch {
    pub next_order_price: Option<f64>,
    pub price: Option<f64>,
}

impl BasketInfo {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Merge the fields set in `patch`
    pub fn apply(&mut self, patch: BasketInfoPatch) {
        if let Some(price) = patch.next_order_price {
            self.next_order_price = price;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
    }

    /// Zero every field derived from an open position
    pub fn clear_position(&mut self) {
        self.pos_size_usd = 0.0;
        self.to_re_balance.clear();
        self.to_profit.clear();
        self.next_order_price = 0.0;
        self.entry_price = 0.0;
        self.drawdown = 0.0;
    }
}
