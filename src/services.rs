//! Collaborator seams consumed by the reward and session-event handlers.
//!
//! The core never implements storage engines, wallets, or notification
//! delivery; it talks to them through these traits. In-memory versions back
//! the development server and the test suite. Failures surface as
//! [`ServiceError`] and are treated as transient by callers: logged,
//! best-effort, never fatal to a tick or a session.

use async_trait::async_trait;
use derive_more::{Display, Error};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// A collaborator call failed.
#[derive(Debug, Clone, Display, Error)]
#[display("collaborator failure: {message}")]
pub struct ServiceError {
    /// What went wrong.
    pub message: String,
}

impl ServiceError {
    /// Creates a new service error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A stored object together with its concurrency version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject {
    /// Serialized value.
    pub value: String,
    /// Opaque version token for optimistic concurrency.
    pub version: String,
}

/// A write request against user-scoped storage.
#[derive(Debug, Clone)]
pub struct StorageWrite {
    /// Object collection.
    pub collection: String,
    /// Object key within the collection.
    pub key: String,
    /// Owning user.
    pub user_id: String,
    /// Serialized value to store.
    pub value: String,
    /// Expected current version; `None` writes unconditionally.
    pub version: Option<String>,
    /// 1 if the owning client may read the object.
    pub permission_read: u8,
    /// 1 if the owning client may write the object.
    pub permission_write: u8,
}

/// User-scoped object storage with optimistic concurrency.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Reads one object, or `None` if absent.
    async fn read(
        &self,
        collection: &str,
        key: &str,
        user_id: &str,
    ) -> Result<Option<StorageObject>, ServiceError>;

    /// Writes one object, returning the new version token.
    ///
    /// # Errors
    ///
    /// Fails when an expected version no longer matches.
    async fn write(&self, request: StorageWrite) -> Result<String, ServiceError>;
}

/// Wallet credit for virtual currency.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Applies a changeset of currency deltas to the user's wallet.
    async fn credit(
        &self,
        user_id: &str,
        changeset: &HashMap<String, i64>,
    ) -> Result<(), ServiceError>;
}

/// An in-app notification to deliver.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Application-defined code.
    pub code: i32,
    /// Short subject line.
    pub subject: String,
    /// Structured content payload.
    pub content: serde_json::Value,
    /// Whether the notification outlives the session.
    pub persistent: bool,
    /// Sending user, or `None` when server-sent.
    pub sender: Option<String>,
    /// Receiving user.
    pub user_id: String,
}

/// Notification delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one notification.
    async fn send(&self, notification: Notification) -> Result<(), ServiceError>;
}

/// A live socket session of some user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPresence {
    /// The user the session belongs to.
    pub user_id: String,
    /// The socket session identifier.
    pub session_id: String,
}

/// Live-session listing and forced disconnect.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    /// Lists the user's live sessions.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionPresence>, ServiceError>;

    /// Forcibly closes one session's socket.
    async fn disconnect(&self, session_id: &str) -> Result<(), ServiceError>;
}

// ─────────────────────────────────────────────────────────────
//  In-memory implementations (dev server and tests)
// ─────────────────────────────────────────────────────────────

type ObjectKey = (String, String, String);

/// In-memory [`Storage`] with counter-based version tokens.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    objects: RwLock<HashMap<ObjectKey, StorageObject>>,
    counter: RwLock<u64>,
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn read(
        &self,
        collection: &str,
        key: &str,
        user_id: &str,
    ) -> Result<Option<StorageObject>, ServiceError> {
        let objects = self.objects.read().await;
        Ok(objects
            .get(&(collection.to_owned(), key.to_owned(), user_id.to_owned()))
            .cloned())
    }

    async fn write(&self, request: StorageWrite) -> Result<String, ServiceError> {
        let mut objects = self.objects.write().await;
        let key = (request.collection, request.key, request.user_id);
        if let Some(expected) = &request.version {
            let current = objects.get(&key).map(|o| o.version.as_str());
            if current != Some(expected.as_str()) {
                return Err(ServiceError::new("storage version conflict"));
            }
        }
        let mut counter = self.counter.write().await;
        *counter += 1;
        let version = counter.to_string();
        objects.insert(
            key,
            StorageObject {
                value: request.value,
                version: version.clone(),
            },
        );
        Ok(version)
    }
}

/// In-memory [`Wallet`] tracking balances per user and currency.
#[derive(Debug, Default)]
pub struct InMemoryWallet {
    balances: RwLock<HashMap<String, HashMap<String, i64>>>,
}

impl InMemoryWallet {
    /// Current balance of one currency for a user.
    pub async fn balance(&self, user_id: &str, currency: &str) -> i64 {
        let balances = self.balances.read().await;
        balances
            .get(user_id)
            .and_then(|wallet| wallet.get(currency))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Wallet for InMemoryWallet {
    async fn credit(
        &self,
        user_id: &str,
        changeset: &HashMap<String, i64>,
    ) -> Result<(), ServiceError> {
        let mut balances = self.balances.write().await;
        let wallet = balances.entry(user_id.to_owned()).or_default();
        for (currency, delta) in changeset {
            *wallet.entry(currency.clone()).or_default() += delta;
        }
        Ok(())
    }
}

/// [`Notifier`] that records deliveries for inspection.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Notifications delivered so far.
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> Result<(), ServiceError> {
        debug!(
            code = notification.code,
            user_id = %notification.user_id,
            "notification delivered"
        );
        self.sent.write().await.push(notification);
        Ok(())
    }
}

/// In-memory [`SessionDirectory`].
#[derive(Debug, Default)]
pub struct InMemorySessions {
    live: RwLock<Vec<SessionPresence>>,
}

impl InMemorySessions {
    /// Registers a live session.
    pub async fn connect(&self, user_id: &str, session_id: &str) {
        self.live.write().await.push(SessionPresence {
            user_id: user_id.to_owned(),
            session_id: session_id.to_owned(),
        });
    }
}

#[async_trait]
impl SessionDirectory for InMemorySessions {
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionPresence>, ServiceError> {
        let live = self.live.read().await;
        Ok(live
            .iter()
            .filter(|presence| presence.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn disconnect(&self, session_id: &str) -> Result<(), ServiceError> {
        let mut live = self.live.write().await;
        live.retain(|presence| presence.session_id != session_id);
        Ok(())
    }
}
