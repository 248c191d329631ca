//! Per-tenant track queue
//!
//! Plain FIFO. Index 0 is the head: the track that is playing, or about to.
//! The head is only ever removed by the engine once its playback has ended
//! (finished, failed, or skipped).

use goro_common::types::{TenantId, TrackRequest};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;
use tracing::debug;

use super::state::QueueEntry;

/// Ordered pending tracks for one tenant
#[derive(Debug, Clone)]
pub struct TenantQueue {
    tenant: TenantId,
    pending: VecDeque<TrackRequest>,
}

impl TenantQueue {
    pub fn new(tenant: TenantId) -> Self {
        Self {
            tenant,
            pending: VecDeque::new(),
        }
    }

    /// Append to the tail; returns the new length
    pub fn enqueue(&mut self, track: TrackRequest) -> usize {
        self.pending.push_back(track);
        self.pending.len()
    }

    pub fn peek_head(&self) -> Option<&TrackRequest> {
        self.pending.front()
    }

    pub fn remove_head(&mut self) -> Option<TrackRequest> {
        self.pending.pop_front()
    }

    /// Uniformly permute everything after the head
    ///
    /// The head keeps its position so the current track is never disturbed.
    pub fn shuffle_rest<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.pending.len() > 2 {
            self.pending.make_contiguous()[1..].shuffle(rng);
        }
    }

    /// Drop everything; returns how many tracks were discarded
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        if dropped > 0 {
            debug!(tenant = %self.tenant, dropped, "Queue cleared");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 1-based listing of the queue, head first
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.pending
            .iter()
            .enumerate()
            .map(|(i, track)| QueueEntry {
                position: i + 1,
                track: track.clone(),
            })
            .collect()
    }
}
