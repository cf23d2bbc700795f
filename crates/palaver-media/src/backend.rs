//! Abstraction over the concrete media stack.
//!
//! A production build implements these traits on top of a WebRTC peer
//! connection and the platform capture devices; tests implement them with
//! in-memory fakes. Every async method is a suspension point: the engine
//! must keep working for other sessions while one backend call is pending.

use palaver_shared::{IceCandidate, MediaKind};

use crate::error::Result;

/// An SDP document exchanged during negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// One local capture track. `stop` must be idempotent.
pub trait MediaTrack {
    fn stop(&mut self);
}

/// Source of local capture tracks (camera and/or microphone).
#[allow(async_fn_in_trait)]
pub trait MediaSource {
    type Track: MediaTrack;

    /// Acquire the local tracks for the requested media kind.
    async fn acquire(&mut self, kind: MediaKind) -> Result<Vec<Self::Track>>;
}

/// Negotiation surface of one peer connection.
#[allow(async_fn_in_trait)]
pub trait PeerBackend {
    type Track: MediaTrack;

    async fn create_offer(&mut self) -> Result<SessionDescription>;
    async fn create_answer(&mut self) -> Result<SessionDescription>;
    async fn set_local_description(&mut self, desc: SessionDescription) -> Result<()>;
    async fn set_remote_description(&mut self, desc: SessionDescription) -> Result<()>;
    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<()>;

    /// Attach an outbound track before creating the local description.
    async fn add_track(&mut self, track: &Self::Track) -> Result<()>;

    /// Close the connection. Must tolerate repeated calls.
    fn close(&mut self);
}
