//! Shared error taxonomy for request-level RPC handlers.

use derive_more::Display;

/// Request-level failure returned to an RPC caller.
///
/// User-visible failures carry no internal detail; the cause is logged at
/// the point of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RpcError {
    /// No caller identity was present in the session context.
    #[display("no user id found in session context")]
    Unauthorized,
    /// The request payload was malformed or unexpected.
    #[display("invalid request payload")]
    InvalidInput,
    /// A collaborator failed; the operation could not complete.
    #[display("internal server error")]
    Internal,
}

impl std::error::Error for RpcError {}
