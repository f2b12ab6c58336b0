//! Mutable state of one basket

use super::diagnostics::GridSizeLog;
use super::snapshot::BasketInfo;
use super::types::{BasketPhase, Position};

/// Everything a basket changes while it runs. Owned by the basket and only
/// touched from its runner task.
#[derive(Debug, Clone)]
pub struct BasketState {
    /// Round counter, +1 per new round
    pub basket_id: u64,

    pub phase: BasketPhase,

    /// Terminal flag set by the drawdown guard
    pub is_stopped: bool,

    /// Messages captured during init, reported with every snapshot
    pub init_errors: Vec<String>,

    /// Last known long position
    pub buy_position: Position,

    /// Latest status snapshot
    pub info: BasketInfo,

    /// Price of the last grid order placed this round
    pub prev_order_price: f64,

    /// Id of the last grid order placed
    pub last_grid_order: Option<String>,

    /// Grid entries filled this round
    pub round_fills: u32,

    /// Diagnostic fill log
    pub grid_log: GridSizeLog,
}

impl BasketState {
    pub fn new(symbol: &str) -> Self {
        Self {
            basket_id: 0,
            phase: BasketPhase::Flat,
            is_stopped: false,
            init_errors: Vec::new(),
            buy_position: Position::flat(),
            info: BasketInfo::new(symbol),
            prev_order_price: 0.0,
            last_grid_order: None,
            round_fills: 0,
            grid_log: GridSizeLog::new(),
        }
    }

    /// Reset the per-round trackers and advance the round counter
    pub fn begin_round(&mut self) -> u64 {
        self.basket_id += 1;
        self.prev_order_price = 0.0;
        self.round_fills = 0;
        self.phase = BasketPhase::RoundOpen;
        self.basket_id
    }

    pub fn stop(&mut self) {
        self.is_stopped = true;
        self.phase = BasketPhase::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_round_resets_trackers() {
        let mut state = BasketState::new("ADA/USDT:USDT");
        state.prev_order_price = 0.9;
        state.round_fills = 3;

        assert_eq!(state.begin_round(), 1);
        assert_eq!(state.begin_round(), 2);
        assert_eq!(state.prev_order_price, 0.0);
        assert_eq!(state.round_fills, 0);
        assert_eq!(state.phase, BasketPhase::RoundOpen);
    }

    #[test]
    fn test_stop_is_terminal_phase() {
        let mut state = BasketState::new("ADA/USDT:USDT");
        state.stop();
        assert!(state.is_stopped);
        assert!(!state.phase.is_active());
    }
}
