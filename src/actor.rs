//! Per-match actor runtime.
//!
//! Each match runs as one tokio task invoked at the fixed tick rate. Inputs
//! queue on the actor's inbox and are drained once per tick, so all match
//! state mutation is serialized without locks. When the loop reports
//! [`TickOutcome::Stop`] the task releases its resources and announces its
//! own closure to the registry.

use crate::match_loop::{MatchInput, MatchLoop, RejectReason, TICK_RATE, TickOutcome};
use crate::messages::{MatchLabel, OpCode};
use crate::oracle::MoveOracle;
use crate::presence::{HumanPresence, MatchData, Presence};
use chrono::Utc;
use derive_more::{Display, From};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, trace, warn};

/// Identifier of a running match.
pub type MatchId = String;

/// An encoded broadcast leaving the match loop.
#[derive(Debug, Clone)]
pub struct Outbound {
    /// Operation code of the message.
    pub op: OpCode,
    /// Encoded payload; `None` for payload-less rejections.
    pub payload: Option<Vec<u8>>,
    /// Recipients; `None` broadcasts to every connected participant.
    pub targets: Option<Vec<Presence>>,
}

/// Delivery seam to the external realtime transport.
///
/// Delivery is the transport's responsibility; implementations log failures
/// rather than surfacing them into the match loop.
pub trait Transport: Send + Sync {
    /// Hands one outbound message to the transport.
    fn deliver(&self, match_id: &str, outbound: Outbound);
}

/// Development stand-in transport that traces deliveries.
#[derive(Debug, Default)]
pub struct LoggingTransport;

impl Transport for LoggingTransport {
    fn deliver(&self, match_id: &str, outbound: Outbound) {
        trace!(
            match_id,
            op = ?outbound.op,
            bytes = outbound.payload.as_ref().map_or(0, Vec::len),
            unicast = outbound.targets.is_some(),
            "delivering message"
        );
    }
}

/// Notifications an actor sends about itself.
#[derive(Debug)]
pub enum RegistryEvent {
    /// The advertised label changed and must be republished.
    LabelChanged {
        /// The match whose label changed.
        match_id: MatchId,
        /// The new label.
        label: MatchLabel,
    },
    /// The match terminated; its handle is dead.
    Closed {
        /// The match that terminated.
        match_id: MatchId,
    },
}

/// A join attempt could not be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, From)]
pub enum JoinError {
    /// The match loop turned the attempt away.
    #[display("{_0}")]
    Rejected(RejectReason),
    /// The match already terminated.
    #[display("match closed")]
    Closed,
}

impl std::error::Error for JoinError {}

/// Handle for feeding inputs to a running match actor.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    id: MatchId,
    inbox: mpsc::UnboundedSender<MatchInput>,
}

impl MatchHandle {
    /// Identifier of the match this handle points at.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Requests admission; resolves at the next tick.
    ///
    /// # Errors
    ///
    /// [`JoinError::Rejected`] when the loop turns the attempt away,
    /// [`JoinError::Closed`] when the match has already terminated.
    pub async fn join_attempt(&self, presence: HumanPresence) -> Result<(), JoinError> {
        let (reply, decision) = oneshot::channel();
        self.inbox
            .send(MatchInput::JoinAttempt { presence, reply })
            .map_err(|_| JoinError::Closed)?;
        match decision.await {
            Ok(decision) => decision.map_err(JoinError::Rejected),
            Err(_) => Err(JoinError::Closed),
        }
    }

    /// Finalizes an accepted admission.
    pub fn join(&self, presence: HumanPresence) {
        let _ = self.inbox.send(MatchInput::Join(presence));
    }

    /// Reports a departed participant.
    pub fn leave(&self, user_id: impl Into<String>) {
        let _ = self.inbox.send(MatchInput::Leave {
            user_id: user_id.into(),
        });
    }

    /// Queues a raw inbound message for the next tick.
    pub fn send_data(&self, data: MatchData) {
        let _ = self.inbox.send(MatchInput::Data(data));
    }
}

/// Everything a spawned match needs besides its own state.
pub struct MatchRuntime {
    /// Outbound delivery seam.
    pub transport: Arc<dyn Transport>,
    /// Where label changes and closure are announced.
    pub events: mpsc::UnboundedSender<RegistryEvent>,
    /// Prediction client for AI-enabled matches.
    pub oracle: Option<MoveOracle>,
}

/// Spawns the actor task for one match and returns its input handle.
pub fn spawn_match(id: MatchId, fast: bool, ai: bool, runtime: MatchRuntime) -> MatchHandle {
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let handle = MatchHandle {
        id: id.clone(),
        inbox: inbox_tx.clone(),
    };
    tokio::spawn(run_match(id, fast, ai, runtime, inbox_tx, inbox_rx));
    handle
}

/// Bridges the loop's dispatcher seam onto the transport and registry.
struct ActorDispatcher {
    match_id: MatchId,
    transport: Arc<dyn Transport>,
    events: mpsc::UnboundedSender<RegistryEvent>,
}

impl crate::match_loop::Dispatcher for ActorDispatcher {
    fn broadcast(&mut self, op: OpCode, payload: Option<Vec<u8>>, targets: Option<&[Presence]>) {
        self.transport.deliver(
            &self.match_id,
            Outbound {
                op,
                payload,
                targets: targets.map(<[Presence]>::to_vec),
            },
        );
    }

    fn update_label(&mut self, label: &MatchLabel) {
        let event = RegistryEvent::LabelChanged {
            match_id: self.match_id.clone(),
            label: *label,
        };
        if self.events.send(event).is_err() {
            warn!(match_id = %self.match_id, "error updating label: registry gone");
        }
    }
}

#[instrument(skip_all, fields(match_id = %id, fast, ai))]
async fn run_match(
    id: MatchId,
    fast: bool,
    ai: bool,
    runtime: MatchRuntime,
    inbox_tx: mpsc::UnboundedSender<MatchInput>,
    mut inbox_rx: mpsc::UnboundedReceiver<MatchInput>,
) {
    let mut game = MatchLoop::new(fast, ai);
    let mut dispatcher = ActorDispatcher {
        match_id: id.clone(),
        transport: runtime.transport,
        events: runtime.events.clone(),
    };
    let mut ticker = tokio::time::interval(Duration::from_millis(1000 / u64::from(TICK_RATE)));

    debug!("match actor started");
    loop {
        ticker.tick().await;
        let inputs = drain_inbox(&mut inbox_rx);
        let now = Utc::now().timestamp();
        if game.tick(now, inputs, &mut dispatcher) == TickOutcome::Stop {
            break;
        }

        // The virtual player moves like anyone else: its chosen position is
        // queued as an ordinary input and processed on a subsequent tick.
        // Oracle failures skip the turn; the forfeit countdown is the net.
        if let Some(ai_mark) = game.ai_to_move() {
            if let Some(oracle) = &runtime.oracle {
                match oracle.select_move(game.state().board(), ai_mark).await {
                    Ok(position) => {
                        let _ = inbox_tx.send(MatchInput::Data(MatchData::ai_move(position)));
                    }
                    Err(e) => warn!(error = %e, "skipping AI turn"),
                }
            } else {
                warn!("AI match has no oracle configured; skipping AI turn");
            }
        }
    }

    // Closing the inbox drops pending join-attempt replies, which resolves
    // the waiters with `JoinError::Closed`.
    inbox_rx.close();
    let _ = runtime.events.send(RegistryEvent::Closed { match_id: id });
    debug!("match actor stopped");
}

/// Drains the backlog accumulated since the previous tick. Inputs arriving
/// afterwards land in the next tick's batch.
fn drain_inbox(inbox: &mut mpsc::UnboundedReceiver<MatchInput>) -> Vec<MatchInput> {
    let mut inputs = Vec::new();
    while let Ok(input) = inbox.try_recv() {
        inputs.push(input);
    }
    inputs
}
