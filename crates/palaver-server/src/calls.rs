//! Call signaling state machine.
//!
//! Tracks one ephemeral session per identity pair through
//! RINGING -> CONNECTED -> ENDED. ENDED is terminal: the session is
//! removed from the registry, so "ended" and "absent" are the same
//! observable state and every invalid transition is an explicit `Ignored`.
//!
//! Crossed requests are resolved by the registry: the first request
//! establishes the session, the second is rejected as busy. A session left
//! ringing is force-ended after the configured timeout; the timer carries
//! the session generation so a stale timer never touches a newer session
//! on the same pair.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info};

use palaver_shared::{MediaKind, ServerEvent, UserId};

use crate::relay::Relay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Ringing,
    Connected,
}

#[derive(Debug, Clone)]
pub struct CallSession {
    pub caller: UserId,
    pub callee: UserId,
    pub kind: MediaKind,
    pub state: CallState,
    generation: u64,
}

/// Canonically ordered identity pair; both directions map to one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PairKey(UserId, UserId);

impl PairKey {
    fn new(a: &UserId, b: &UserId) -> Self {
        if a <= b {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Session created; forward the request to the callee.
    Ring { generation: u64 },
    /// The pair already has an active session; reject as busy.
    Busy,
}

/// Accept/reject outcomes carry the media kind the session was created
/// with; the forwarded `call:answer` must label the call as requested,
/// not as the answering client claims.
#[derive(Debug, PartialEq, Eq)]
pub enum AnswerOutcome {
    Accepted { kind: MediaKind },
    Rejected { kind: MediaKind },
    /// No matching ringing session, or the wrong side answered.
    Ignored,
}

#[derive(Debug, PartialEq, Eq)]
pub enum EndOutcome {
    Ended,
    Ignored,
}

#[derive(Clone)]
pub struct CallRegistry {
    sessions: Arc<RwLock<HashMap<PairKey, CallSession>>>,
    next_generation: Arc<AtomicU64>,
    ring_timeout: Duration,
}

impl CallRegistry {
    pub fn new(ring_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(0)),
            ring_timeout,
        }
    }

    /// A caller requests a call. First request on a pair wins; a
    /// concurrent crossed request finds the session already present and is
    /// told to reject as busy.
    pub async fn request(
        &self,
        caller: &UserId,
        callee: &UserId,
        kind: MediaKind,
    ) -> RequestOutcome {
        let key = PairKey::new(caller, callee);
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(&key) {
            debug!(caller = %caller, callee = %callee, "pair already in a call");
            return RequestOutcome::Busy;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        sessions.insert(
            key,
            CallSession {
                caller: caller.clone(),
                callee: callee.clone(),
                kind,
                state: CallState::Ringing,
                generation,
            },
        );
        info!(caller = %caller, callee = %callee, ?kind, "call ringing");
        RequestOutcome::Ring { generation }
    }

    /// The callee answers a ringing session. Only the callee of a session
    /// in RINGING may answer; everything else is ignored.
    pub async fn answer(&self, responder: &UserId, peer: &UserId, accepted: bool) -> AnswerOutcome {
        let key = PairKey::new(responder, peer);
        let mut sessions = self.sessions.write().await;

        let Some(session) = sessions.get_mut(&key) else {
            return AnswerOutcome::Ignored;
        };
        if session.state != CallState::Ringing || session.callee != *responder {
            debug!(responder = %responder, state = ?session.state, "ignoring answer");
            return AnswerOutcome::Ignored;
        }

        let kind = session.kind;
        if accepted {
            session.state = CallState::Connected;
            info!(caller = %peer, callee = %responder, "call connected");
            AnswerOutcome::Accepted { kind }
        } else {
            sessions.remove(&key);
            info!(caller = %peer, callee = %responder, "call rejected");
            AnswerOutcome::Rejected { kind }
        }
    }

    /// Either participant ends the session, from RINGING or CONNECTED.
    pub async fn end(&self, who: &UserId, other: &UserId) -> EndOutcome {
        let key = PairKey::new(who, other);
        let mut sessions = self.sessions.write().await;

        match sessions.get(&key) {
            Some(session) if session.caller == *who || session.callee == *who => {
                sessions.remove(&key);
                info!(who = %who, other = %other, "call ended");
                EndOutcome::Ended
            }
            _ => EndOutcome::Ignored,
        }
    }

    /// A participant disconnected: force-end every session they are part
    /// of and return the peers that must be notified.
    pub async fn disconnect(&self, who: &UserId) -> Vec<UserId> {
        let mut sessions = self.sessions.write().await;
        let keys: Vec<PairKey> = sessions
            .iter()
            .filter(|(_, s)| s.caller == *who || s.callee == *who)
            .map(|(k, _)| k.clone())
            .collect();

        let mut peers = Vec::new();
        for key in keys {
            if let Some(session) = sessions.remove(&key) {
                let peer = if session.caller == *who {
                    session.callee
                } else {
                    session.caller
                };
                info!(who = %who, peer = %peer, "call force-ended on disconnect");
                peers.push(peer);
            }
        }
        peers
    }

    /// End a session that is still ringing with the given generation.
    /// Returns whether anything was removed.
    pub async fn expire_ringing(
        &self,
        caller: &UserId,
        callee: &UserId,
        generation: u64,
    ) -> bool {
        let key = PairKey::new(caller, callee);
        let mut sessions = self.sessions.write().await;

        match sessions.get(&key) {
            Some(session)
                if session.state == CallState::Ringing && session.generation == generation =>
            {
                info!(caller = %caller, callee = %callee, kind = ?session.kind, "ring timed out");
                sessions.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Arm the ring timeout for a freshly created session.
    pub fn spawn_ring_timeout(
        &self,
        relay: Relay,
        caller: UserId,
        callee: UserId,
        generation: u64,
    ) {
        let registry = self.clone();
        let timeout = self.ring_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if registry.expire_ringing(&caller, &callee, generation).await {
                relay
                    .deliver(
                        &caller,
                        ServerEvent::CallEnd {
                            from: callee.clone(),
                        },
                    )
                    .await;
                relay
                    .deliver(&callee, ServerEvent::CallEnd { from: caller })
                    .await;
            }
        });
    }

    pub async fn session(&self, a: &UserId, b: &UserId) -> Option<CallSession> {
        let sessions = self.sessions.read().await;
        sessions.get(&PairKey::new(a, b)).cloned()
    }
}
