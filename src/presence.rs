//! Player presences and the input events delivered to the match loop.

use crate::messages::OpCode;
use serde::{Deserialize, Serialize};

/// Identifier of the built-in virtual player.
pub const AI_USER_ID: &str = "ai-user-id";

/// Username advertised for the built-in virtual player.
pub const AI_USERNAME: &str = "ai-player";

/// A connected human player as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanPresence {
    /// Stable player identifier.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// Socket session carrying this presence.
    pub session_id: String,
}

/// A participant in a match.
///
/// The capability set is small and fixed, so this is a closed type rather
/// than a trait object: either a connected human or the single well-known
/// virtual player descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    /// A human connected through the transport.
    Human(HumanPresence),
    /// The built-in AI opponent.
    Ai,
}

impl Presence {
    /// Stable identifier of the participant.
    pub fn user_id(&self) -> &str {
        match self {
            Presence::Human(human) => &human.user_id,
            Presence::Ai => AI_USER_ID,
        }
    }

    /// Display name of the participant.
    pub fn username(&self) -> &str {
        match self {
            Presence::Human(human) => &human.username,
            Presence::Ai => AI_USERNAME,
        }
    }

    /// True for the built-in AI opponent.
    pub fn is_ai(&self) -> bool {
        matches!(self, Presence::Ai)
    }
}

/// A raw inbound transport message attributed to a sender.
///
/// The opcode arrives untyped; the match loop decodes it and rejects
/// anything it does not recognize.
#[derive(Debug, Clone)]
pub struct MatchData {
    /// Raw operation code as received.
    pub op_code: i64,
    /// Who sent the message.
    pub sender: Presence,
    /// Serialized payload, possibly empty.
    pub data: Vec<u8>,
}

impl MatchData {
    /// Wraps a chosen position as a synthetic move from the virtual player.
    pub fn ai_move(position: usize) -> Self {
        let payload = serde_json::json!({ "position": position });
        Self {
            op_code: OpCode::Move as i64,
            sender: Presence::Ai,
            data: payload.to_string().into_bytes(),
        }
    }
}
