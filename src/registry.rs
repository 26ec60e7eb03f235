//! In-process supervisor for running match actors.
//!
//! The registry spawns match actors, tracks their advertised labels for
//! matchmaking queries, and forgets matches that close themselves. Label
//! changes and closures arrive over an event channel so actors never touch
//! the registry map directly.

use crate::actor::{
    MatchHandle, MatchId, MatchRuntime, RegistryEvent, Transport, spawn_match,
};
use crate::messages::MatchLabel;
use crate::oracle::MoveOracle;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

struct MatchEntry {
    handle: MatchHandle,
    label: MatchLabel,
    ai: bool,
}

/// Creates, indexes, and evicts match actors.
#[derive(Clone)]
pub struct MatchRegistry {
    inner: Arc<Mutex<HashMap<MatchId, MatchEntry>>>,
    events: mpsc::UnboundedSender<RegistryEvent>,
    transport: Arc<dyn Transport>,
    oracle: Option<MoveOracle>,
}

impl MatchRegistry {
    /// Creates a registry delivering broadcasts through `transport`.
    /// AI-enabled matches consult `oracle`; matches without AI never do.
    pub fn new(transport: Arc<dyn Transport>, oracle: Option<MoveOracle>) -> Self {
        let (events, events_rx) = mpsc::unbounded_channel();
        let inner: Arc<Mutex<HashMap<MatchId, MatchEntry>>> = Arc::default();
        tokio::spawn(pump_events(Arc::clone(&inner), events_rx));
        Self {
            inner,
            events,
            transport,
            oracle,
        }
    }

    /// Spawns a new match actor and returns its identifier.
    pub fn create_match(&self, fast: bool, ai: bool) -> MatchId {
        let id = Uuid::new_v4().to_string();
        let runtime = MatchRuntime {
            transport: Arc::clone(&self.transport),
            events: self.events.clone(),
            oracle: if ai { self.oracle.clone() } else { None },
        };
        let handle = spawn_match(id.clone(), fast, ai, runtime);
        let entry = MatchEntry {
            handle,
            label: MatchLabel::new(fast),
            ai,
        };
        self.inner.lock().unwrap().insert(id.clone(), entry);
        info!(match_id = %id, fast, ai, "match created");
        id
    }

    /// Identifiers of up to `limit` joinable matches advertising the wanted
    /// speed. AI matches are never listed for others to join.
    pub fn list_open(&self, fast: bool, limit: usize) -> Vec<MatchId> {
        let wanted = u8::from(fast);
        self.inner
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, entry)| !entry.ai && entry.label.open == 1 && entry.label.fast == wanted)
            .map(|(id, _)| id.clone())
            .take(limit)
            .collect()
    }

    /// Input handle of a running match, if it is still alive.
    pub fn handle(&self, id: &str) -> Option<MatchHandle> {
        self.inner.lock().unwrap().get(id).map(|e| e.handle.clone())
    }

    /// Currently advertised label of a running match.
    pub fn label(&self, id: &str) -> Option<MatchLabel> {
        self.inner.lock().unwrap().get(id).map(|e| e.label)
    }

    /// Number of live matches.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// True when no matches are running.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

/// Applies actor events to the registry map until every sender is gone.
async fn pump_events(
    inner: Arc<Mutex<HashMap<MatchId, MatchEntry>>>,
    mut events: mpsc::UnboundedReceiver<RegistryEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            RegistryEvent::LabelChanged { match_id, label } => {
                debug!(match_id = %match_id, ?label, "label republished");
                if let Some(entry) = inner.lock().unwrap().get_mut(&match_id) {
                    entry.label = label;
                }
            }
            RegistryEvent::Closed { match_id } => {
                info!(match_id = %match_id, "match closed");
                inner.lock().unwrap().remove(&match_id);
            }
        }
    }
}
