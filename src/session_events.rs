//! Session lifecycle hooks.
//!
//! Two account-level policies: a user may hold at most one live realtime
//! session (new devices kick old ones), and a user's last-online time is
//! recorded when a session ends. Both are best-effort: collaborator
//! failures are logged and the session proceeds.

use crate::services::{Notification, Notifier, SessionDirectory, Storage, StorageWrite};
use std::sync::Arc;
use tracing::{error, info, instrument};

const NOTIFICATION_CODE_SINGLE_DEVICE: i32 = 101;
const PROFILE_COLLECTION: &str = "profile";
const LAST_ONLINE_KEY: &str = "last_online";

/// Handles session start/end events from the transport layer.
pub struct SessionEvents {
    sessions: Arc<dyn SessionDirectory>,
    notifier: Arc<dyn Notifier>,
    storage: Arc<dyn Storage>,
}

impl SessionEvents {
    /// Creates the handler over its collaborator seams.
    pub fn new(
        sessions: Arc<dyn SessionDirectory>,
        notifier: Arc<dyn Notifier>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            sessions,
            notifier,
            storage,
        }
    }

    /// Limits the user to one live session: every other session is notified
    /// and force-disconnected when a new one starts.
    #[instrument(skip(self))]
    pub async fn on_session_start(&self, user_id: &str, session_id: &str) {
        let presences = match self.sessions.list_sessions(user_id).await {
            Ok(presences) => presences,
            Err(e) => {
                error!(user_id, error = %e, "session list error");
                return;
            }
        };

        for presence in presences {
            if presence.user_id == user_id && presence.session_id == session_id {
                // Our own freshly started session.
                continue;
            }

            let notification = Notification {
                code: NOTIFICATION_CODE_SINGLE_DEVICE,
                subject: "Another device is active!".to_owned(),
                content: serde_json::json!({ "kicked_by": session_id }),
                persistent: false,
                sender: Some(user_id.to_owned()),
                user_id: user_id.to_owned(),
            };
            if let Err(e) = self.notifier.send(notification).await {
                error!(user_id, error = %e, "notification send error");
                continue;
            }

            if let Err(e) = self.sessions.disconnect(&presence.session_id).await {
                error!(
                    user_id,
                    session_id = %presence.session_id,
                    error = %e,
                    "session disconnect error"
                );
                continue;
            }
            info!(
                user_id,
                kicked = %presence.session_id,
                "disconnected concurrent session"
            );
        }
    }

    /// Records the user's last-online time when their session ends.
    #[instrument(skip(self))]
    pub async fn on_session_end(&self, user_id: &str, now_unix: i64) {
        let value = serde_json::json!({ "last_online_time_unix": now_unix }).to_string();
        let write = StorageWrite {
            collection: PROFILE_COLLECTION.to_owned(),
            key: LAST_ONLINE_KEY.to_owned(),
            user_id: user_id.to_owned(),
            value,
            version: None,
            permission_read: 1,
            permission_write: 0,
        };
        if let Err(e) = self.storage.write(write).await {
            error!(user_id, error = %e, "last online update error");
        }
    }
}
