//! Offer/answer/ICE negotiation driver.
//!
//! Exactly one offer/answer exchange happens per session; there is no
//! renegotiation. The initiator calls [`Negotiator::start`], the responder
//! [`Negotiator::accept_offer`]. Remote candidates arriving before the
//! remote description are buffered and applied in arrival order once it is
//! set. After [`Negotiator::teardown`] every incoming signal is ignored,
//! so a late offer for an ended session never touches a stale connection.

use tracing::{debug, warn};

use palaver_shared::{IceCandidate, MediaKind};

use crate::backend::{MediaSource, MediaTrack, PeerBackend, SdpKind, SessionDescription};
use crate::error::{EngineError, Result};
use crate::ice::CandidateQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    OfferSent,
    Connected,
    Closed,
}

/// Outbound signaling produced by the engine. The embedding client
/// re-addresses these and sends them over the real-time channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOut {
    Offer { sdp: String },
    Answer { sdp: String },
    Candidate(IceCandidate),
}

pub struct Negotiator<P, S>
where
    S: MediaSource,
    P: PeerBackend<Track = S::Track>,
{
    peer: P,
    media: S,
    kind: MediaKind,
    state: NegotiationState,
    remote_described: bool,
    pending: CandidateQueue,
    tracks: Vec<S::Track>,
}

impl<P, S> Negotiator<P, S>
where
    S: MediaSource,
    P: PeerBackend<Track = S::Track>,
{
    pub fn new(peer: P, media: S, kind: MediaKind) -> Self {
        Self {
            peer,
            media,
            kind,
            state: NegotiationState::Idle,
            remote_described: false,
            pending: CandidateQueue::new(),
            tracks: Vec::new(),
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn active_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending.len()
    }

    /// Initiator path: acquire local media, attach tracks, create the
    /// offer and set it as local description. A failure tears the session
    /// down before returning.
    pub async fn start(&mut self) -> Result<SignalOut> {
        if self.state != NegotiationState::Idle {
            return Err(EngineError::Negotiation(
                "offer already created for this session".to_string(),
            ));
        }

        match self.start_inner().await {
            Ok(signal) => Ok(signal),
            Err(e) => {
                warn!(error = %e, "starting call failed, tearing down");
                self.teardown();
                Err(e)
            }
        }
    }

    async fn start_inner(&mut self) -> Result<SignalOut> {
        self.attach_local_media().await?;

        let offer = self.peer.create_offer().await?;
        let sdp = offer.sdp.clone();
        self.peer.set_local_description(offer).await?;
        self.state = NegotiationState::OfferSent;
        debug!("local offer set, awaiting answer");

        Ok(SignalOut::Offer { sdp })
    }

    /// Responder path: acquire local media, apply the remote offer, answer
    /// it, then drain any candidates buffered while the offer was in
    /// flight. A duplicate offer on the same session is ignored.
    pub async fn accept_offer(&mut self, sdp: &str) -> Result<Option<SignalOut>> {
        if self.state != NegotiationState::Idle {
            debug!(state = ?self.state, "ignoring offer in non-idle state");
            return Ok(None);
        }

        match self.accept_offer_inner(sdp).await {
            Ok(signal) => Ok(Some(signal)),
            Err(e) => {
                warn!(error = %e, "answering offer failed, tearing down");
                self.teardown();
                Err(e)
            }
        }
    }

    async fn accept_offer_inner(&mut self, sdp: &str) -> Result<SignalOut> {
        self.attach_local_media().await?;

        self.peer
            .set_remote_description(SessionDescription::offer(sdp))
            .await?;
        self.remote_described = true;

        let answer = self.peer.create_answer().await?;
        if answer.kind != SdpKind::Answer {
            return Err(EngineError::Negotiation(
                "backend produced a non-answer description".to_string(),
            ));
        }
        let answer_sdp = answer.sdp.clone();
        self.peer.set_local_description(answer).await?;
        self.state = NegotiationState::Connected;

        self.drain_pending().await?;
        debug!("answer sent, session connected");

        Ok(SignalOut::Answer { sdp: answer_sdp })
    }

    /// Initiator path: apply the remote answer and drain buffered
    /// candidates. An answer in any other state is ignored.
    pub async fn apply_answer(&mut self, sdp: &str) -> Result<()> {
        if self.state != NegotiationState::OfferSent {
            debug!(state = ?self.state, "ignoring answer in unexpected state");
            return Ok(());
        }

        self.peer
            .set_remote_description(SessionDescription::answer(sdp))
            .await?;
        self.remote_described = true;
        self.state = NegotiationState::Connected;

        self.drain_pending().await?;
        debug!("remote answer applied, session connected");
        Ok(())
    }

    /// Apply a remote candidate immediately once the remote description is
    /// set; buffer it otherwise.
    pub async fn apply_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        if self.state == NegotiationState::Closed {
            return Ok(());
        }

        if !self.remote_described {
            self.pending.push(candidate);
            debug!(buffered = self.pending.len(), "buffered remote candidate");
            return Ok(());
        }

        self.peer.add_ice_candidate(candidate).await
    }

    /// Emit a locally gathered candidate to the peer. Returns `None` after
    /// teardown.
    pub fn local_candidate(&self, candidate: IceCandidate) -> Option<SignalOut> {
        if self.state == NegotiationState::Closed {
            return None;
        }
        Some(SignalOut::Candidate(candidate))
    }

    /// Stop all local tracks, close the connection and clear the buffer.
    /// Safe to call any number of times.
    pub fn teardown(&mut self) {
        if self.state == NegotiationState::Closed {
            return;
        }

        for track in &mut self.tracks {
            track.stop();
        }
        self.tracks.clear();
        self.peer.close();
        self.pending.clear();
        self.state = NegotiationState::Closed;
        debug!("session torn down");
    }

    async fn attach_local_media(&mut self) -> Result<()> {
        let tracks = self.media.acquire(self.kind).await?;
        for track in &tracks {
            self.peer.add_track(track).await?;
        }
        self.tracks = tracks;
        Ok(())
    }

    async fn drain_pending(&mut self) -> Result<()> {
        for candidate in self.pending.drain() {
            self.peer.add_ice_candidate(candidate).await?;
        }
        Ok(())
    }
}
