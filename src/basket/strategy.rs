//! Pure sizing and exit rules of the grid basket
//!
//! Nothing in here touches the gateway; the basket feeds in numbers read from
//! the venue and acts on the results.

use crate::helpers::percent_difference;

use super::types::Position;

/// Price at which the next grid entry rests, `grid_step_percent` below `price`.
/// Can be zero or negative for steps of 100% and above.
pub fn pyramid_trigger_price(price: f64, grid_step_percent: f64) -> f64 {
    price * (1.0 - grid_step_percent / 100.0)
}

/// Contracts for the next grid entry.
///
/// Scales the current position by `size_factor`. When the product is zero or
/// not a number (flat position, factor 0) the base entry size is used.
pub fn next_entry_amount(contracts: f64, size_factor: f64, base_contracts: f64) -> f64 {
    let scaled = contracts * size_factor;
    if scaled == 0.0 || scaled.is_nan() {
        base_contracts
    } else {
        scaled
    }
}

/// Unrealised profit of a long position marked at `close`, in quote currency.
/// Zero while the venue reports no entry price.
pub fn long_profit(position: &Position, close: f64, contract_size: f64) -> f64 {
    match position.entry_price {
        Some(entry) => (close - entry) * position.contracts * contract_size,
        None => 0.0,
    }
}

/// True when the unrealised loss exceeds `size_usd * max_drawdown`
pub fn drawdown_breached(size_usd: f64, max_drawdown: f64, profit: f64) -> bool {
    size_usd * max_drawdown < -profit
}

/// True when `bid` is more than `tp_percent` above `entry`
pub fn take_profit_reached(entry: f64, bid: f64, tp_percent: f64) -> bool {
    percent_difference(entry, bid) > tp_percent
}

/// Distance in percent from `price` to the take-profit level of `entry`
pub fn distance_to_profit(price: f64, entry: f64, tp_percent: f64) -> f64 {
    percent_difference(price, entry * (1.0 + tp_percent / 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grow(mut contracts: f64, factor: f64, steps: usize) -> Vec<f64> {
        let mut sizes = vec![contracts];
        for _ in 0..steps {
            contracts += next_entry_amount(contracts, factor, 1.0);
            sizes.push(contracts);
        }
        sizes
    }

    #[test]
    fn test_trigger_price() {
        assert!((pyramid_trigger_price(100.0, 10.0) - 90.0).abs() < 1e-9);
        assert!((pyramid_trigger_price(100.0, 2.5) - 97.5).abs() < 1e-9);
        assert_eq!(pyramid_trigger_price(100.0, 100.0), 0.0);
        assert!(pyramid_trigger_price(100.0, 150.0) < 0.0);
    }

    #[test]
    fn test_size_factor_one_doubles() {
        assert_eq!(grow(1.0, 1.0, 3), vec![1.0, 2.0, 4.0, 8.0]);
    }

    #[test]
    fn test_size_factor_half_grows_by_half() {
        let sizes = grow(2.0, 0.5, 3);
        let expected = [2.0, 3.0, 4.5, 6.75];
        for (got, want) in sizes.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-9, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_entry_amount_falls_back_to_base() {
        assert_eq!(next_entry_amount(0.0, 1.0, 0.5), 0.5);
        assert_eq!(next_entry_amount(4.0, 0.0, 0.5), 0.5);
        assert_eq!(next_entry_amount(f64::NAN, 1.0, 0.5), 0.5);
        assert_eq!(next_entry_amount(4.0, 1.0, 0.5), 4.0);
    }

    #[test]
    fn test_long_profit() {
        let position = Position::new(2.0, 100.0);
        assert!((long_profit(&position, 95.0, 1.0) + 10.0).abs() < 1e-9);
        assert!((long_profit(&position, 110.0, 0.1) - 2.0).abs() < 1e-9);

        let no_entry = Position {
            contracts: 2.0,
            entry_price: None,
        };
        assert_eq!(long_profit(&no_entry, 95.0, 1.0), 0.0);
    }

    #[test]
    fn test_drawdown_threshold() {
        // size 100, 10% drawdown tolerates a loss of 10
        assert!(!drawdown_breached(100.0, 0.10, -9.0));
        assert!(drawdown_breached(100.0, 0.10, -11.0));
        assert!(!drawdown_breached(100.0, 0.10, 5.0));
    }

    #[test]
    fn test_take_profit_threshold() {
        assert!(take_profit_reached(100.0, 101.5, 1.0));
        assert!(!take_profit_reached(100.0, 100.5, 1.0));
        assert!(!take_profit_reached(100.0, 99.0, 1.0));
    }

    #[test]
    fn test_distance_to_profit() {
        // tp level is 102, price 100 is 2% away
        assert!((distance_to_profit(100.0, 100.0, 2.0) - 2.0).abs() < 1e-9);
        assert!(distance_to_profit(105.0, 100.0, 2.0) < 0.0);
    }
}
