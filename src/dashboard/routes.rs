//! JSON API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.
//! Watchlist and rule edits go straight to the JSON files; a query loads a
//! fresh rule snapshot, so edits apply from the next query on.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::engine::batch::{self, BatchContext, BatchReport};
use crate::engine::reconciler::Reconciler;
use crate::storage;
use crate::types::{DividendBasis, OverrideRule, RoiError, Ticker, WatchlistEntry};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub reconciler: Reconciler,
    pub watchlist_path: String,
    pub rules_path: String,
    pub bases: Vec<DividendBasis>,
    pub fixed_roe: BTreeMap<Ticker, f64>,
    pub notes: BTreeMap<Ticker, String>,
    pub latest: RwLock<Option<BatchReport>>,
    /// Serialises read-modify-write cycles on the JSON files.
    edits: Mutex<()>,
}

impl DashboardState {
    pub fn new(reconciler: Reconciler, watchlist_path: String, rules_path: String) -> Self {
        Self {
            reconciler,
            watchlist_path,
            rules_path,
            bases: vec![DividendBasis::Ltm, DividendBasis::Annual],
            fixed_roe: BTreeMap::new(),
            notes: BTreeMap::new(),
            latest: RwLock::new(None),
            edits: Mutex::new(()),
        }
    }

    pub fn with_bases(mut self, bases: Vec<DividendBasis>) -> Self {
        self.bases = bases;
        self
    }

    pub fn with_overrides(mut self, fixed_roe: BTreeMap<Ticker, f64>, notes: BTreeMap<Ticker, String>) -> Self {
        self.fixed_roe = fixed_roe;
        self.notes = notes;
        self
    }

    /// Seed the report served by `GET /api/report`.
    pub async fn set_latest(&self, report: BatchReport) {
        *self.latest.write().await = Some(report);
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Request / error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StockRequest {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleRequest {
    pub symbol: String,
    #[serde(default)]
    pub min_roe: Option<f64>,
    #[serde(default)]
    pub fixed_roe: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Error response: a status code plus `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into() }
    }
}

impl From<RoiError> for ApiError {
    fn from(e: RoiError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = %e, "Request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{e:#}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /api/stocks
pub async fn get_stocks(State(state): State<AppState>) -> Json<Vec<WatchlistEntry>> {
    Json(storage::load_watchlist(&state.watchlist_path))
}

/// POST /api/stocks
pub async fn add_stock(
    State(state): State<AppState>,
    Json(req): Json<StockRequest>,
) -> Result<(StatusCode, Json<Vec<WatchlistEntry>>), ApiError> {
    let symbol = Ticker::parse(&req.symbol)?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }

    let _guard = state.edits.lock().await;
    if storage::load_watchlist(&state.watchlist_path).iter().any(|e| e.symbol == symbol) {
        return Err(ApiError::bad_request(format!("{symbol} is already on the watchlist")));
    }
    let entries = storage::add_stock(&state.watchlist_path, WatchlistEntry { name, symbol })?;
    Ok((StatusCode::CREATED, Json(entries)))
}

/// DELETE /api/stocks/:symbol
pub async fn delete_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<StatusCode, ApiError> {
    let ticker = Ticker::parse(&symbol)?;
    let _guard = state.edits.lock().await;
    if storage::remove_stock(&state.watchlist_path, &ticker)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("{ticker} is not on the watchlist")))
    }
}

/// GET /api/rules
pub async fn get_rules(State(state): State<AppState>) -> Json<Vec<OverrideRule>> {
    Json(storage::load_rules(&state.rules_path).to_vec())
}

/// POST /api/rules: insert or replace the rule for a ticker.
pub async fn upsert_rule(
    State(state): State<AppState>,
    Json(req): Json<RuleRequest>,
) -> Result<Json<Vec<OverrideRule>>, ApiError> {
    let rule = OverrideRule {
        symbol: Ticker::parse(&req.symbol)?,
        min_roe: req.min_roe,
        fixed_roe: req.fixed_roe,
    };
    storage::validate_rule(&rule)?;

    let _guard = state.edits.lock().await;
    let rules = storage::upsert_rule(&state.rules_path, rule)?;
    Ok(Json(rules.to_vec()))
}

/// DELETE /api/rules/:symbol
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<StatusCode, ApiError> {
    let ticker = Ticker::parse(&symbol)?;
    let _guard = state.edits.lock().await;
    if storage::remove_rule(&state.rules_path, &ticker)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("no rule for {ticker}")))
    }
}

/// POST /api/query: run a batch over the given symbols, or over the whole
/// watchlist when none are given. An empty body means the same; a body that
/// is not a valid query object is rejected.
pub async fn query(State(state): State<AppState>, body: Bytes) -> Result<Json<BatchReport>, ApiError> {
    let req = parse_query(&body)?;
    let watchlist = storage::load_watchlist(&state.watchlist_path);

    let entries = if req.symbols.is_empty() {
        watchlist
    } else {
        req.symbols
            .iter()
            .map(|raw| {
                let symbol = Ticker::parse(raw)?;
                let name = watchlist
                    .iter()
                    .find(|e| e.symbol == symbol)
                    .map(|e| e.name.clone())
                    .unwrap_or_else(|| symbol.to_string());
                Ok(WatchlistEntry { name, symbol })
            })
            .collect::<Result<Vec<_>, RoiError>>()?
    };

    let ctx = BatchContext::snapshot(
        storage::load_rules(&state.rules_path),
        &state.fixed_roe,
        state.notes.clone(),
    );
    info!(tickers = entries.len(), "Query received");

    let report = batch::run_batch(&state.reconciler, &entries, &ctx, &state.bases).await;
    state.set_latest(report.clone()).await;
    Ok(Json(report))
}

fn parse_query(body: &[u8]) -> Result<QueryRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(QueryRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid query body: {e}")))
}

/// GET /api/report: the most recent batch.
pub async fn get_report(State(state): State<AppState>) -> Result<Json<BatchReport>, ApiError> {
    state
        .latest
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("no report yet"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
