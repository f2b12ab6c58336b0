//! Grid fill log kept in diagnostic mode
//!
//! The log only grows during a round. Price deltas between consecutive fills
//! are derived on demand by [`GridSizeLog::step_report`] and never written back
//! into the records.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::helpers::percent_difference;

/// One grid fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridFillRecord {
    /// Id of the filled order
    #[serde(rename = "_id")]
    pub id: String,
    pub time: String,
    pub price: f64,
    /// Position notional after the fill
    pub size_usd: f64,
    /// Position contracts after the fill
    pub amount: f64,
    pub basket_id: u64,
}

/// A fill record with its distance from the previous fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridStepRecord {
    #[serde(flatten)]
    pub fill: GridFillRecord,
    /// Percent change from the previous fill price
    pub diff: f64,
    /// Absolute change from the previous fill price
    pub dist: f64,
}

/// Append-only log of the current round's fills
#[derive(Debug, Clone, Default)]
pub struct GridSizeLog {
    records: Vec<GridFillRecord>,
    peak_usd: f64,
}

impl GridSizeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fill and track the round's peak notional
    pub fn record(&mut self, order_id: &str, price: f64, size_usd: f64, amount: f64, basket_id: u64) {
        self.records.push(GridFillRecord {
            id: order_id.to_string(),
            time: Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            price,
            size_usd,
            amount,
            basket_id,
        });
        self.peak_usd = self.peak_usd.max(size_usd);
    }

    pub fn records(&self) -> &[GridFillRecord] {
        &self.records
    }

    pub fn peak_usd(&self) -> f64 {
        self.peak_usd
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.peak_usd = 0.0;
    }

    /// Records paired with their distance to the previous fill.
    /// The first record reports zero for both.
    pub fn step_report(&self) -> Vec<GridStepRecord> {
        let mut prev_price: Option<f64> = None;
        self.records
            .iter()
            .map(|fill| {
                let (diff, dist) = match prev_price {
                    Some(prev) => (percent_difference(fill.price, prev), fill.price - prev),
                    None => (0.0, 0.0),
                };
                prev_price = Some(fill.price);
                GridStepRecord {
                    fill: fill.clone(),
                    diff,
                    dist,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tracks_peak_in_fill_order() {
        let mut log = GridSizeLog::new();
        log.record("2", 100.0, 20.0, 0.2, 1);
        log.record("3", 90.0, 36.0, 0.4, 1);
        log.record("4", 81.0, 30.0, 0.4, 1);

        assert_eq!(log.records().len(), 3);
        assert_eq!(log.peak_usd(), 36.0);
        let ids: Vec<&str> = log.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "4"]);
    }

    #[test]
    fn test_step_report_is_derived() {
        let mut log = GridSizeLog::new();
        log.record("a", 100.0, 10.0, 0.1, 3);
        log.record("b", 90.0, 18.0, 0.2, 3);
        log.record("c", 81.0, 32.4, 0.4, 3);

        let report = log.step_report();
        assert_eq!(report.len(), 3);
        assert_eq!(report[0].diff, 0.0);
        assert_eq!(report[0].dist, 0.0);
        assert!((report[1].dist + 10.0).abs() < 1e-9);
        assert!((report[1].diff - percent_difference(90.0, 100.0)).abs() < 1e-9);
        assert!((report[2].dist + 9.0).abs() < 1e-9);

        // source records untouched
        assert_eq!(log.records()[1].price, 90.0);
        assert_eq!(log.records().len(), 3);
    }

    #[test]
    fn test_step_record_serializes_flat() {
        let mut log = GridSizeLog::new();
        log.record("9", 100.0, 10.0, 0.1, 7);
        let json = serde_json::to_value(&log.step_report()[0]).unwrap();
        assert_eq!(json["_id"], "9");
        assert_eq!(json["basketId"], 7);
        assert_eq!(json["sizeUsd"], 10.0);
        assert_eq!(json["diff"], 0.0);
    }

    #[test]
    fn test_clear_resets_peak() {
        let mut log = GridSizeLog::new();
        log.record("1", 100.0, 6000.0, 60.0, 1);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.peak_usd(), 0.0);
    }
}
