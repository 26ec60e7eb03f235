//! Matchmaking façade: find or create a match for a caller.

use crate::registry::MatchRegistry;
use crate::rpc::RpcError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Most match identifiers returned from one query.
const MAX_LISTED: usize = 10;

/// Payload of a find-match request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FindMatchRequest {
    /// Ask for the short per-move deadline.
    #[serde(default)]
    pub fast: bool,
    /// Ask for a private match against the built-in AI opponent.
    #[serde(default)]
    pub ai: bool,
}

/// Match identifiers the caller can try to join, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindMatchResponse {
    /// One or more matches that fit the request.
    pub match_ids: Vec<String>,
}

/// Finds joinable matches for the caller, or creates one.
///
/// AI requests always create a fresh match: AI matches are private and
/// never listed for others to join. Otherwise up to 10 open matches with
/// the requested speed are returned, falling back to creating a new one.
///
/// # Errors
///
/// [`RpcError::Unauthorized`] without a caller identity,
/// [`RpcError::InvalidInput`] when the payload does not decode.
#[instrument(skip(registry, payload))]
pub fn find_match(
    registry: &MatchRegistry,
    user_id: Option<&str>,
    payload: &str,
) -> Result<FindMatchResponse, RpcError> {
    let user_id = user_id.ok_or(RpcError::Unauthorized)?;

    let request: FindMatchRequest = serde_json::from_str(payload).map_err(|e| {
        debug!(user_id, error = %e, "bad find-match payload");
        RpcError::InvalidInput
    })?;

    if request.ai {
        let match_id = registry.create_match(request.fast, true);
        info!(user_id, match_id = %match_id, "created AI match");
        return Ok(FindMatchResponse {
            match_ids: vec![match_id],
        });
    }

    let mut match_ids = registry.list_open(request.fast, MAX_LISTED);
    if match_ids.is_empty() {
        let match_id = registry.create_match(request.fast, false);
        info!(user_id, match_id = %match_id, "no open match found, created one");
        match_ids.push(match_id);
    } else {
        debug!(user_id, count = match_ids.len(), "listed open matches");
    }

    Ok(FindMatchResponse { match_ids })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::LoggingTransport;
    use std::sync::Arc;

    fn registry() -> MatchRegistry {
        MatchRegistry::new(Arc::new(LoggingTransport), None)
    }

    #[tokio::test]
    async fn test_find_match_requires_identity() {
        let registry = registry();
        assert_eq!(
            find_match(&registry, None, "{}").unwrap_err(),
            RpcError::Unauthorized
        );
    }

    #[tokio::test]
    async fn test_find_match_rejects_malformed_payload() {
        let registry = registry();
        assert_eq!(
            find_match(&registry, Some("u1"), "not json").unwrap_err(),
            RpcError::InvalidInput
        );
    }

    #[tokio::test]
    async fn test_find_match_creates_when_none_open() {
        let registry = registry();
        let response = find_match(&registry, Some("u1"), r#"{"fast":false}"#).unwrap();
        assert_eq!(response.match_ids.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_find_match_lists_matching_speed_only() {
        let registry = registry();
        let fast_id = registry.create_match(true, false);
        let normal_id = registry.create_match(false, false);

        let response = find_match(&registry, Some("u1"), r#"{"fast":true}"#).unwrap();
        assert_eq!(response.match_ids, vec![fast_id]);

        let response = find_match(&registry, Some("u1"), r#"{"fast":false}"#).unwrap();
        assert_eq!(response.match_ids, vec![normal_id]);
    }

    #[tokio::test]
    async fn test_ai_requests_always_create_fresh_private_matches() {
        let registry = registry();
        let first = find_match(&registry, Some("u1"), r#"{"ai":true}"#).unwrap();
        let second = find_match(&registry, Some("u1"), r#"{"ai":true}"#).unwrap();
        assert_eq!(first.match_ids.len(), 1);
        assert_eq!(second.match_ids.len(), 1);
        assert_ne!(first.match_ids[0], second.match_ids[0]);

        // Private: a plain find never surfaces AI matches.
        let listed = find_match(&registry, Some("u2"), r#"{"fast":false}"#).unwrap();
        assert!(!listed.match_ids.contains(&first.match_ids[0]));
        assert!(!listed.match_ids.contains(&second.match_ids[0]));
    }
}
