//! Per-session FIFO buffer for remote ICE candidates.
//!
//! Candidates that arrive before the remote description is set cannot be
//! applied yet; they are held here and drained in arrival order once the
//! description lands.

use std::collections::VecDeque;

use palaver_shared::IceCandidate;

#[derive(Debug, Default)]
pub struct CandidateQueue {
    queue: VecDeque<IceCandidate>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: IceCandidate) {
        self.queue.push_back(candidate);
    }

    /// Remove and return all buffered candidates, oldest first.
    pub fn drain(&mut self) -> Vec<IceCandidate> {
        self.queue.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
