// HTTP read surface - consistency snapshot, issue list, recent transfers
//
// Read-only: nothing here writes to the ledger or to the monitor.

use crate::db::{self, Account, TransferCategory, TransferSummary};
use crate::issues::ConsistencyIssue;
use crate::monitor::{ConsistencyMonitor, ConsistencySnapshot};
use crate::scheduler::SharedConnection;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::{Arc, PoisonError};
use tower_http::cors::CorsLayer;
use tracing::error;

/// Number of transfers returned by the listing endpoints
pub const RECENT_TRANSFER_LIMIT: usize = 50;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ledger: SharedConnection,
    pub monitor: Arc<ConsistencyMonitor>,
    pub version: String,
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failed(data: T, error: String) -> Self {
        Self {
            success: false,
            data,
            error: Some(error),
        }
    }
}

/// Run a ledger query on the blocking pool. The ledger lock can be held for a
/// whole transfer (chaos sleep included), so it is never taken on a runtime
/// worker.
async fn ledger_read<T, F>(state: &AppState, what: &str, read: F) -> Response
where
    T: Serialize + Default + Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> anyhow::Result<T> + Send + 'static,
{
    let ledger = Arc::clone(&state.ledger);
    let result = tokio::task::spawn_blocking(move || {
        let conn = ledger.lock().unwrap_or_else(PoisonError::into_inner);
        read(&conn)
    })
    .await
    .map_err(anyhow::Error::from)
    .and_then(|read| read);

    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Err(e) => {
            error!("Error getting {}: {:#}", what, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::failed(T::default(), format!("Failed to read {}", what))),
            )
                .into_response()
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET / - Banner
async fn hello(State(state): State<AppState>) -> impl IntoResponse {
    format!("Ledger Audit {}", state.version)
}

/// GET /version
async fn version(State(state): State<AppState>) -> impl IntoResponse {
    state.version.clone()
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/consistency - Latest consistency snapshot
async fn get_consistency(State(state): State<AppState>) -> Json<ApiResponse<ConsistencySnapshot>> {
    Json(ApiResponse::ok(state.monitor.get_snapshot()))
}

/// GET /api/consistency/issues - Bounded issue history, newest first
async fn list_consistency_issues(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<ConsistencyIssue>>> {
    Json(ApiResponse::ok(state.monitor.list_issues()))
}

/// GET /api/transfers (alias /api/transacoes) - Recent synthetic transfers
async fn list_transfers(State(state): State<AppState>) -> Response {
    ledger_read::<Vec<TransferSummary>, _>(&state, "transfers", |conn| {
        let transfers = db::recent_transfers(conn, Some(TransferCategory::Mock), RECENT_TRANSFER_LIMIT)?;
        db::describe_transfers(conn, transfers)
    })
    .await
}

/// GET /api/transfers/all - Recent transfers of every category
async fn list_all_transfers(State(state): State<AppState>) -> Response {
    ledger_read::<Vec<TransferSummary>, _>(&state, "transfers", |conn| {
        let transfers = db::recent_transfers(conn, None, RECENT_TRANSFER_LIMIT)?;
        db::describe_transfers(conn, transfers)
    })
    .await
}

/// GET /api/accounts - All accounts
async fn list_accounts(State(state): State<AppState>) -> Response {
    ledger_read::<Vec<Account>, _>(&state, "accounts", db::get_all_accounts).await
}

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/consistency", get(get_consistency))
        .route("/consistency/issues", get(list_consistency_issues))
        .route("/transfers", get(list_transfers))
        .route("/transacoes", get(list_transfers))
        .route("/transfers/all", get(list_all_transfers))
        .route("/accounts", get(list_accounts))
        .with_state(state.clone());

    Router::new()
        .route("/", get(hello))
        .route("/version", get(version))
        .with_state(state)
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::MonitoredAccounts;
    use crate::db::{insert_account, insert_transfer, setup_database, NewTransfer};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use std::sync::Mutex;
    use tower::ServiceExt;

    fn state() -> AppState {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        AppState {
            ledger: Arc::new(Mutex::new(conn)),
            monitor: Arc::new(ConsistencyMonitor::new(MonitoredAccounts::default(), 200)),
            version: "0.1.0-test".to_string(),
        }
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_consistency_snapshot_endpoint() {
        let state = state();
        {
            let mut conn = state.ledger.lock().unwrap();
            insert_account(&conn, "Pedro", Some(dec!(-1))).unwrap();
            state.monitor.run_checks(&mut conn);
        }

        let (status, body) = get_json(build_router(state), "/api/consistency").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["healthy"], false);
        assert_eq!(body["data"]["issues_detected_in_last_run"], 2);
        assert_eq!(body["data"]["recent_issues"][0]["code"], "BASELINE_ACCOUNTS_NOT_FOUND");
        assert_eq!(body["data"]["recent_issues"][0]["severity"], "medium");
        assert_eq!(body["data"]["recent_issues"][1]["code"], "NEGATIVE_BALANCE");
    }

    #[tokio::test]
    async fn test_issue_list_endpoint() {
        let state = state();
        state.monitor.record_failure("boom");

        let (status, body) = get_json(build_router(state), "/api/consistency/issues").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["code"], "CHECK_RUNTIME_FAILURE");
    }

    #[tokio::test]
    async fn test_transfer_listings() {
        let state = state();
        {
            let conn = state.ledger.lock().unwrap();
            let joao = insert_account(&conn, "Joao", Some(dec!(100))).unwrap().id;
            let maria = insert_account(&conn, "Maria", Some(dec!(100))).unwrap().id;
            insert_transfer(&conn, &NewTransfer::new(joao, maria, dec!(10))).unwrap();
            insert_transfer(
                &conn,
                &NewTransfer::new(maria, joao, dec!(5)).with_category(TransferCategory::Rebalance),
            )
            .unwrap();
        }

        let (_, mock) = get_json(build_router(state.clone()), "/api/transfers").await;
        assert_eq!(mock["data"].as_array().unwrap().len(), 1);
        assert_eq!(mock["data"][0]["origin_account_name"], "Joao");
        assert_eq!(mock["data"][0]["amount"], "10");
        assert_eq!(mock["data"][0]["category"], "MOCK");

        let (_, all) = get_json(build_router(state), "/api/transfers/all").await;
        assert_eq!(all["data"].as_array().unwrap().len(), 2);
        assert_eq!(all["data"][0]["category"], "REBALANCE");
    }

    #[tokio::test]
    async fn test_busy_ledger_does_not_stall_the_runtime() {
        let state = state();
        state.monitor.record_failure("earlier tick");

        // A transfer in progress (e.g. a chaos sleep) holding the ledger
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let holder = {
            let ledger = Arc::clone(&state.ledger);
            std::thread::spawn(move || {
                let _guard = ledger.lock().unwrap();
                locked_tx.send(()).unwrap();
                std::thread::sleep(std::time::Duration::from_millis(300));
            })
        };
        locked_rx.recv().unwrap();

        let started = std::time::Instant::now();
        let accounts = tokio::spawn(get_json(build_router(state.clone()), "/api/accounts"));
        tokio::task::yield_now().await;

        let (status, body) = get_json(build_router(state), "/api/consistency").await;
        assert!(started.elapsed() < std::time::Duration::from_millis(200));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["healthy"], false);

        let (status, body) = accounts.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
        holder.join().unwrap();
    }

    #[tokio::test]
    async fn test_transacoes_alias_lists_mock_transfers() {
        let state = state();
        {
            let conn = state.ledger.lock().unwrap();
            let joao = insert_account(&conn, "Joao", Some(dec!(100))).unwrap().id;
            let maria = insert_account(&conn, "Maria", Some(dec!(100))).unwrap().id;
            insert_transfer(&conn, &NewTransfer::new(joao, maria, dec!(10))).unwrap();
            insert_transfer(
                &conn,
                &NewTransfer::new(maria, joao, dec!(5)).with_category(TransferCategory::Rebalance),
            )
            .unwrap();
        }

        let (status, body) = get_json(build_router(state), "/api/transacoes").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["category"], "MOCK");
    }

    #[tokio::test]
    async fn test_ledger_failure_returns_error_response() {
        let state = state();
        state
            .ledger
            .lock()
            .unwrap()
            .execute("DROP TABLE accounts", [])
            .unwrap();

        let (status, body) = get_json(build_router(state), "/api/accounts").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Failed to read accounts");
    }

    #[tokio::test]
    async fn test_version_banner() {
        let response = build_router(state())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Ledger Audit 0.1.0-test");
    }
}
