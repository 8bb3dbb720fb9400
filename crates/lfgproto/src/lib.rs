//! `lfgproto`: wire protocol shared by the dungeon-finder services.
//!
//! All messages are carried inside a length-prefixed frame by the session
//! layer; the payload's first byte is a message type, remaining bytes are
//! type-specific big-endian fields. Result codes, lock reasons and role-check
//! states keep the client's literal wire values; the enums here are closed
//! sums with an explicit encoding table each.

pub mod codes;
pub mod ids;
pub mod msg;
pub mod slot;

/// Decode failure for an inbound finder request.
#[derive(Debug, Clone)]
pub enum ProtoError {
    /// Payload ran out before the named field.
    Truncated {
        field: &'static str,
        need: usize,
        got: usize,
    },
    /// Payload length disagrees with what the request type dictates.
    WrongLength {
        req: &'static str,
        need: usize,
        got: usize,
    },
    /// First byte is not a request type this protocol knows.
    UnknownRequest(u8),
    /// Requester kind byte names neither a player nor a group.
    BadRequesterKind(u8),
}

impl std::fmt::Display for ProtoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtoError::Truncated { field, need, got } => {
                write!(f, "payload truncated at {field}: need {need} bytes, got {got}")
            }
            ProtoError::WrongLength { req, need, got } => {
                write!(f, "{req} request must be {need} bytes, got {got}")
            }
            ProtoError::UnknownRequest(t) => write!(f, "unknown request type: 0x{t:02x}"),
            ProtoError::BadRequesterKind(k) => write!(f, "bad requester kind: 0x{k:02x}"),
        }
    }
}

impl std::error::Error for ProtoError {}
