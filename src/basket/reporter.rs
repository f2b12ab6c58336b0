//! Status reporting sink
//!
//! Baskets push rows into named tables; the sink only stores and renders
//! them. Rows are keyed by one of their fields and a later row with the same
//! key replaces the earlier one.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use serde_json::Value;
use tokio::sync::RwLock;

/// Table holding one row per basket
pub const BASKETS_INFO_TABLE: &str = "Baskets Info";
/// Diagnostic table with every grid fill of the closed round
pub const GRID_SIZE_INFO_TABLE: &str = "Grid Size Info";
/// Diagnostic table with per-step price deltas of an oversized round
pub const GRID_STEP_INFO_TABLE: &str = "gridSizeInfo";

/// Sink receiving table rows from baskets
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Upsert `rows` into `table`, keyed by the value of `key_field` in each row
    async fn table_update(&self, table: &str, rows: Vec<Value>, key_field: &str);
}

/// Rows of one table by key
pub type Table = BTreeMap<String, Value>;

/// In-memory table store shared by all baskets of a bot
#[derive(Clone, Default)]
pub struct TableReport {
    tables: Arc<RwLock<BTreeMap<String, Table>>>,
}

impl TableReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of one table
    pub async fn table(&self, name: &str) -> Option<Table> {
        self.tables.read().await.get(name).cloned()
    }

    /// Copy of every table
    pub async fn snapshot(&self) -> BTreeMap<String, Table> {
        self.tables.read().await.clone()
    }
}

/// Render a row key as a string, accepting string and numeric keys
fn row_key(row: &Value, key_field: &str) -> Option<String> {
    match row.get(key_field)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl StatusReporter for TableReport {
    async fn table_update(&self, table: &str, rows: Vec<Value>, key_field: &str) {
        let mut tables = self.tables.write().await;
        let entries = tables.entry(table.to_string()).or_default();
        for row in rows {
            match row_key(&row, key_field) {
                Some(key) => {
                    entries.insert(key, row);
                }
                None => warn!("Dropping row without '{}' in table '{}'", key_field, table),
            }
        }
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

/// Recording reporter for tests
pub mod mock {
    use super::*;

    /// One `table_update` call
    #[derive(Debug, Clone, PartialEq)]
    pub struct ReportCall {
        pub table: String,
        pub rows: Vec<Value>,
        pub key_field: String,
    }

    #[derive(Clone, Default)]
    pub struct RecordingReporter {
        pub calls: Arc<RwLock<Vec<ReportCall>>>,
    }

    impl RecordingReporter {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn calls(&self) -> Vec<ReportCall> {
            self.calls.read().await.clone()
        }

        /// Calls made for one table
        pub async fn calls_for(&self, table: &str) -> Vec<ReportCall> {
            self.calls
                .read()
                .await
                .iter()
                .filter(|c| c.table == table)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl StatusReporter for RecordingReporter {
        async fn table_update(&self, table: &str, rows: Vec<Value>, key_field: &str) {
            self.calls.write().await.push(ReportCall {
                table: table.to_string(),
                rows,
                key_field: key_field.to_string(),
            });
        }
    }
}
