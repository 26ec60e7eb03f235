//! HTTP surface: matchmaking and reward RPCs.
//!
//! Caller identity comes from the session context established by the
//! external auth layer; here that context surfaces as the `x-user-id`
//! header the transport injects after authenticating the socket. Token
//! issuance itself is out of scope.

use crate::matchmaker::{FindMatchResponse, find_match};
use crate::registry::MatchRegistry;
use crate::rewards::{RewardResponse, claim_daily_reward};
use crate::rpc::RpcError;
use crate::services::{Notifier, Storage, Wallet};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use std::sync::Arc;
use tracing::instrument;

/// Header carrying the authenticated caller identifier.
const USER_ID_HEADER: &str = "x-user-id";

/// Shared state behind the RPC handlers.
#[derive(Clone)]
pub struct AppState {
    /// Running matches.
    pub registry: MatchRegistry,
    /// User-scoped object storage.
    pub storage: Arc<dyn Storage>,
    /// Wallet credit.
    pub wallet: Arc<dyn Wallet>,
    /// Notification delivery.
    pub notifier: Arc<dyn Notifier>,
}

/// Builds the RPC router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v2/rpc/find_match", post(find_match_handler))
        .route("/v2/rpc/rewards", post(rewards_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[instrument(skip(state, headers, payload))]
async fn find_match_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: String,
) -> Result<Json<FindMatchResponse>, RpcFailure> {
    let user_id = caller(&headers);
    let response = find_match(&state.registry, user_id.as_deref(), &payload)?;
    Ok(Json(response))
}

#[instrument(skip(state, headers, payload))]
async fn rewards_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: String,
) -> Result<Json<RewardResponse>, RpcFailure> {
    let user_id = caller(&headers);
    let response = claim_daily_reward(
        user_id.as_deref(),
        &payload,
        state.storage.as_ref(),
        state.wallet.as_ref(),
        state.notifier.as_ref(),
        Local::now(),
    )
    .await?;
    Ok(Json(response))
}

/// Authenticated caller identifier, if the session context carries one.
fn caller(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Response wrapper mapping the RPC taxonomy onto HTTP statuses.
#[derive(Debug)]
pub struct RpcFailure(RpcError);

impl From<RpcError> for RpcFailure {
    fn from(error: RpcError) -> Self {
        Self(error)
    }
}

impl IntoResponse for RpcFailure {
    fn into_response(self) -> Response {
        let status = match self.0 {
            RpcError::Unauthorized => StatusCode::UNAUTHORIZED,
            RpcError::InvalidInput => StatusCode::BAD_REQUEST,
            RpcError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
