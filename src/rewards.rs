//! Daily reward RPC handler.
//!
//! Grants a coin reward once per local calendar day. The claim time lives in
//! a per-user storage object written back with the version read, so two
//! concurrent claims cannot both grant.

use crate::rpc::RpcError;
use crate::services::{Notification, Notifier, Storage, StorageWrite, Wallet};
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error, instrument};

const REWARD_COLLECTION: &str = "reward";
const REWARD_KEY: &str = "daily";
const DAILY_COINS: i64 = 500;
const NOTIFICATION_CODE_REWARD: i32 = 1001;

/// Per-user claim record stored under `reward/daily`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct DailyReward {
    /// Unix time of the last successful claim.
    last_claim_unix: i64,
}

/// Response payload of a reward claim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RewardResponse {
    /// Coins granted by this call; 0 when already claimed today.
    pub coins_received: i64,
}

/// Claims the daily reward for the caller.
///
/// # Errors
///
/// [`RpcError::Unauthorized`] without a caller identity,
/// [`RpcError::InvalidInput`] when a payload is supplied (none is allowed)
/// or the stored claim record does not decode, [`RpcError::Internal`] when
/// a collaborator fails.
#[instrument(skip(storage, wallet, notifier, payload))]
pub async fn claim_daily_reward(
    user_id: Option<&str>,
    payload: &str,
    storage: &dyn Storage,
    wallet: &dyn Wallet,
    notifier: &dyn Notifier,
    now: DateTime<Local>,
) -> Result<RewardResponse, RpcError> {
    let user_id = user_id.ok_or(RpcError::Unauthorized)?;
    if !payload.is_empty() {
        return Err(RpcError::InvalidInput);
    }

    let object = storage
        .read(REWARD_COLLECTION, REWARD_KEY, user_id)
        .await
        .map_err(|e| {
            error!(user_id, error = %e, "storage read error");
            RpcError::Internal
        })?;

    let mut claim = DailyReward::default();
    if let Some(object) = &object {
        claim = serde_json::from_str(&object.value).map_err(|e| {
            error!(user_id, error = %e, "corrupt daily reward record");
            RpcError::InvalidInput
        })?;
    }

    let midnight = local_midnight(now);
    let last_claim = Local
        .timestamp_opt(claim.last_claim_unix, 0)
        .single()
        .unwrap_or(midnight);
    if last_claim >= midnight {
        debug!(user_id, "daily reward already claimed");
        return Ok(RewardResponse { coins_received: 0 });
    }

    let changeset = HashMap::from([("coins".to_owned(), DAILY_COINS)]);
    wallet.credit(user_id, &changeset).await.map_err(|e| {
        error!(user_id, error = %e, "wallet update error");
        RpcError::Internal
    })?;

    notifier
        .send(Notification {
            code: NOTIFICATION_CODE_REWARD,
            subject: "You've received your daily reward!".to_owned(),
            content: serde_json::json!({ "coins": DAILY_COINS }),
            persistent: true,
            sender: None,
            user_id: user_id.to_owned(),
        })
        .await
        .map_err(|e| {
            error!(user_id, error = %e, "notification send error");
            RpcError::Internal
        })?;

    claim.last_claim_unix = now.timestamp();
    let value = serde_json::to_string(&claim).map_err(|e| {
        error!(user_id, error = %e, "error encoding claim record");
        RpcError::Internal
    })?;

    storage
        .write(StorageWrite {
            collection: REWARD_COLLECTION.to_owned(),
            key: REWARD_KEY.to_owned(),
            user_id: user_id.to_owned(),
            value,
            // The read version prevents concurrent claims both granting.
            version: object.map(|o| o.version),
            permission_read: 1,
            permission_write: 0,
        })
        .await
        .map_err(|e| {
            error!(user_id, error = %e, "storage write error");
            RpcError::Internal
        })?;

    debug!(user_id, coins = DAILY_COINS, "daily reward granted");
    Ok(RewardResponse {
        coins_received: DAILY_COINS,
    })
}

/// Start of the current local calendar day.
fn local_midnight(now: DateTime<Local>) -> DateTime<Local> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
        .unwrap_or(now)
}
