//! Per-client cell holding the latest [`RateLimitState`].
//!
//! Backed by `ArcSwap`: readers take a cheap snapshot and every response publishes a complete
//! replacement. Concurrent writers race and the last publish wins. The state only steers
//! throttling, so a lost update costs at most one poorly timed request.

use arc_swap::ArcSwap;
use std::sync::Arc;

use super::{RateLimitHeaders, RateLimitState};

#[derive(Debug, Clone)]
pub struct SharedRateLimitState {
    inner: Arc<ArcSwap<RateLimitState>>,
}

impl Default for SharedRateLimitState {
    fn default() -> Self {
        Self::new(RateLimitState::default())
    }
}

impl SharedRateLimitState {
    pub fn new(state: RateLimitState) -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(state)) }
    }

    /// Snapshot the current state.
    pub fn get(&self) -> RateLimitState {
        **self.inner.load()
    }

    /// Replace the state entirely.
    pub fn set(&self, state: RateLimitState) {
        self.inner.store(Arc::new(state));
    }

    /// Publish the state derived from `snapshot` and the response `headers`.
    ///
    /// Derives from the caller's snapshot rather than re-reading the cell, so the new state
    /// reflects exactly the transition the caller reports in its response event.
    pub fn publish(&self, snapshot: &RateLimitState, headers: &RateLimitHeaders) -> RateLimitState {
        let next = snapshot.apply(headers);
        self.set(next);
        next
    }
}
