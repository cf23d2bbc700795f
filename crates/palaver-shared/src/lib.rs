//! # palaver-shared
//!
//! Domain types and the real-time wire protocol shared between the palaver
//! server, the call engine and the storage layer.

pub mod protocol;
pub mod types;

pub use protocol::{ClientEvent, IceCandidate, ServerEvent};
pub use types::{ChatMessage, ConnId, GroupId, MediaKind, MessageBody, PeerRef, UserId};
