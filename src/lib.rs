//! Tictactoe Arena - authoritative match server library
//!
//! Server-side logic for real-time two-player tic-tac-toe: matchmaking,
//! the tick-driven match lifecycle, and an optional AI opponent backed by
//! an external move-prediction service.
//!
//! # Architecture
//!
//! - **Rules**: pure board evaluation ([`games::tictactoe`])
//! - **Match loop**: the tick-driven state machine owning all match state
//! - **Actor**: one tokio task per match draining a per-tick inbox
//! - **Matchmaker**: list-or-create façade over the match registry
//! - **Oracle**: HTTP adapter injecting AI moves as ordinary player input
//! - **Services**: collaborator seams for storage, wallet, notifications

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod actor;
mod cli;
mod config;
mod games;
mod match_loop;
mod match_state;
mod matchmaker;
mod messages;
mod oracle;
mod presence;
mod registry;
mod rewards;
mod rpc;
mod server;
mod services;
mod session_events;

// Crate-level exports - actor runtime
pub use actor::{
    JoinError, LoggingTransport, MatchHandle, MatchId, MatchRuntime, Outbound, RegistryEvent,
    Transport, spawn_match,
};

// Crate-level exports - CLI
pub use cli::{Cli, Command};

// Crate-level exports - configuration
pub use config::{ConfigError, ServerConfig};

// Crate-level exports - game rules
pub use games::tictactoe::{Board, Mark, MoveError, apply_move, check_tie, check_win};

// Crate-level exports - match loop
pub use match_loop::{
    Dispatcher, MatchInput, MatchLoop, RejectReason, TICK_RATE, TickOutcome,
};

// Crate-level exports - match state
pub use match_state::{MatchState, PlayerSlot};

// Crate-level exports - matchmaking
pub use matchmaker::{FindMatchRequest, FindMatchResponse, find_match};

// Crate-level exports - wire messages
pub use messages::{
    DoneMessage, MatchLabel, MoveMessage, OpCode, StartMessage, UpdateMessage,
};

// Crate-level exports - oracle adapter
pub use oracle::{MoveOracle, OracleError};

// Crate-level exports - presences
pub use presence::{AI_USER_ID, AI_USERNAME, HumanPresence, MatchData, Presence};

// Crate-level exports - registry
pub use registry::MatchRegistry;

// Crate-level exports - RPC surface
pub use rewards::{RewardResponse, claim_daily_reward};
pub use rpc::RpcError;
pub use server::{AppState, router};

// Crate-level exports - collaborator services
pub use services::{
    InMemorySessions, InMemoryStorage, InMemoryWallet, Notification, Notifier, RecordingNotifier,
    ServiceError, SessionDirectory, SessionPresence, Storage, StorageObject, StorageWrite, Wallet,
};
pub use session_events::SessionEvents;
