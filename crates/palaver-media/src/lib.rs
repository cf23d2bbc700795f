//! # palaver-media
//!
//! Client-side call engine: drives the single offer/answer exchange of a
//! call, buffers remote ICE candidates until the remote description is
//! set, and tears the session down idempotently.
//!
//! The engine is written against the [`backend::PeerBackend`] and
//! [`backend::MediaSource`] traits so that the negotiation logic stays
//! independent of any concrete WebRTC stack.

pub mod backend;
pub mod ice;
pub mod negotiation;

mod error;

pub use backend::{MediaSource, MediaTrack, PeerBackend, SdpKind, SessionDescription};
pub use error::{EngineError, Result};
pub use ice::CandidateQueue;
pub use negotiation::{NegotiationState, Negotiator, SignalOut};
