use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{
    extract::State,
    response::{Html, Json},
    routing::get,
    Router,
};
use log::info;

use super::dashboard::render_dashboard;
use crate::basket::reporter::{Table, TableReport};
use crate::basket::{BasketError, BasketResult};

fn router(report: TableReport) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/tables", get(tables_handler))
        .with_state(report)
}

/// Serve the report tables until the listener fails
pub(crate) async fn start_server(report: TableReport, host: &str, port: u16) -> BasketResult<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| BasketError::InvalidConfig(format!("Invalid server address {}:{}: {}", host, port, e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Dashboard server running on http://{}", addr);

    axum::serve(listener, router(report)).await?;
    Ok(())
}

async fn dashboard_handler(State(report): State<TableReport>) -> Html<String> {
    Html(render_dashboard(&report.snapshot().await))
}

async fn tables_handler(State(report): State<TableReport>) -> Json<BTreeMap<String, Table>> {
    Json(report.snapshot().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::{StatusReporter, BASKETS_INFO_TABLE};
    use serde_json::json;

    #[tokio::test]
    async fn test_handlers_read_report() {
        let report = TableReport::new();
        report
            .table_update(BASKETS_INFO_TABLE, vec![json!({"symbol": "XRP/USDT:USDT"})], "symbol")
            .await;

        let Json(tables) = tables_handler(State(report.clone())).await;
        assert!(tables[BASKETS_INFO_TABLE].contains_key("XRP/USDT:USDT"));

        let Html(page) = dashboard_handler(State(report)).await;
        assert!(page.contains("XRP/USDT:USDT"));
    }

    #[tokio::test]
    async fn test_bad_address_rejected() {
        let result = start_server(TableReport::new(), "not an address", 3000).await;
        assert!(matches!(result, Err(BasketError::InvalidConfig(_))));
    }
}
