//! HTTP route handlers.
//!
//! All endpoints return JSON. State is the shared `LedgerService`.
//! Admin endpoints identify the caller by the `x-admin-id` header.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::engine::activation::AdWatch;
use crate::engine::admin::LedgerStats;
use crate::engine::referral::ReferralOutcome;
use crate::engine::streak::SessionStart;
use crate::engine::verification::VerificationOutcome;
use crate::error::LedgerError;
use crate::service::{LedgerService, SyncReport};
use crate::types::{GameStats, PaymentBatch, TradingState, Transaction, UserAccount};

pub type AppState = Arc<LedgerService>;

pub const ADMIN_HEADER: &str = "x-admin-id";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A failed call rendered as an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    /// The blocking task running the call panicked or was cancelled.
    Task(String),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unmet: Vec<crate::engine::activation::Requirement>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Ledger(err) => err,
            ApiError::Task(reason) => {
                let body = ErrorBody { error: reason, unmet: Vec::new() };
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
            }
        };
        let status = match &err {
            LedgerError::UnknownUser(_) => StatusCode::NOT_FOUND,
            LedgerError::NotAdmin(_) => StatusCode::FORBIDDEN,
            LedgerError::NoActiveSession(_) => StatusCode::CONFLICT,
            LedgerError::SelfReferral(_)
            | LedgerError::ActivationRequirementsUnmet { .. }
            | LedgerError::UnknownGame(_)
            | LedgerError::NoAttemptsLeft(_)
            | LedgerError::InvalidAmount(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let error = err.to_string();
        let unmet = match err {
            LedgerError::ActivationRequirementsUnmet { unmet } => unmet,
            _ => Vec::new(),
        };
        (status, Json(ErrorBody { error, unmet })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run a ledger call on the blocking pool. Calls take account locks that a
/// running sweep may hold for its whole pass.
async fn blocking<T, F>(state: AppState, call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&LedgerService) -> Result<T, LedgerError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || call(&state)).await {
        Ok(result) => Ok(result?),
        Err(e) => {
            error!(error = %e, "Ledger call task failed");
            Err(ApiError::Task(e.to_string()))
        }
    }
}

fn admin_id(headers: &HeaderMap) -> String {
    headers
        .get(ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReferralRequest {
    pub referrer_id: String,
    pub referred_id: String,
}

#[derive(Debug, Deserialize)]
pub struct GameRewardRequest {
    pub reward: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    #[serde(flatten)]
    pub batch: PaymentBatch,
    pub progress_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradingResponse {
    pub state: TradingState,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionOpened {
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnouncementSent {
    pub recipients: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionCancelled {
    pub cancelled: bool,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<LedgerStats> {
    Ok(Json(blocking(state, |s| Ok(s.stats())).await?))
}

/// GET /api/batch
pub async fn get_batch(State(state): State<AppState>) -> ApiResult<BatchResponse> {
    let batch = blocking(state, |s| Ok(s.open_batch())).await?;
    let progress_pct = batch.progress_pct();
    Ok(Json(BatchResponse { batch, progress_pct }))
}

/// GET /api/users/:id
pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<UserAccount> {
    Ok(Json(blocking(state, move |s| s.user(&id)).await?))
}

/// GET /api/users/:id/transactions
pub async fn get_transactions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Transaction>> {
    Ok(Json(blocking(state, move |s| s.transactions_for(&id)).await?))
}

// ---------------------------------------------------------------------------
// User operations
// ---------------------------------------------------------------------------

/// POST /api/users/:id/session
pub async fn start_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<SessionStart> {
    Ok(Json(blocking(state, move |s| Ok(s.start_session(&id))).await?))
}

/// POST /api/users/:id/ads
pub async fn record_ad(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<AdWatch> {
    Ok(Json(blocking(state, move |s| s.record_ad_watch(&id)).await?))
}

/// POST /api/users/:id/verification
///
/// Called by the payment provider once the fee is confirmed.
pub async fn confirm_verification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<VerificationOutcome> {
    Ok(Json(blocking(state, move |s| s.confirm_verification(&id)).await?))
}

/// POST /api/users/:id/trading
pub async fn toggle_trading(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<TradingResponse> {
    let state = blocking(state, move |s| s.request_trading_toggle(&id)).await?;
    Ok(Json(TradingResponse { state }))
}

/// POST /api/referrals
pub async fn apply_referral(
    State(state): State<AppState>,
    Json(req): Json<ReferralRequest>,
) -> ApiResult<ReferralOutcome> {
    let outcome = blocking(state, move |s| s.apply_referral(&req.referrer_id, &req.referred_id)).await?;
    Ok(Json(outcome))
}

/// POST /api/users/:id/games/:game_id
pub async fn record_game_reward(
    State(state): State<AppState>,
    Path((id, game_id)): Path<(String, String)>,
    Json(req): Json<GameRewardRequest>,
) -> ApiResult<GameStats> {
    let stats = blocking(state, move |s| s.record_game_reward(&id, &game_id, req.reward)).await?;
    Ok(Json(stats))
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

/// POST /api/admin/announcement
pub async fn begin_announcement(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<SessionOpened> {
    let expires_at = state.begin_announcement(&admin_id(&headers))?;
    Ok(Json(SessionOpened { expires_at }))
}

/// PUT /api/admin/announcement
pub async fn submit_announcement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AnnouncementRequest>,
) -> ApiResult<AnnouncementSent> {
    let admin = admin_id(&headers);
    let recipients = blocking(state, move |s| s.submit_announcement(&admin, &req.text)).await?;
    Ok(Json(AnnouncementSent { recipients }))
}

/// DELETE /api/admin/announcement
pub async fn cancel_announcement(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<SessionCancelled> {
    let cancelled = state.cancel_announcement(&admin_id(&headers))?;
    Ok(Json(SessionCancelled { cancelled }))
}

/// POST /api/admin/sync
pub async fn sync_all(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<SyncReport> {
    Ok(Json(state.sync_all(&admin_id(&headers)).await?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
