//! Concurrency limiting driven by the server's concurrency headers.
//!
//! The account-wide ceiling is shared with every other integration using the same credentials,
//! so a fixed local pool is either too timid or rejected with 409s. [`ConcurrencyThrottler`]
//! recomputes its ceiling with [`calculate_concurrency`] whenever one of its tasks finishes and
//! whenever a response on the client's [`EventBus`] reports fresh capacity numbers.
//!
//! The ceiling is never exceeded. Between responses the `running` figure is stale, so capacity
//! may be under-used until the next response arrives.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::trace;

use crate::rate_limit::{RateLimitState, SharedRateLimitState};
use crate::telemetry::{ClientEvent, EventBus};

/// Share of the remaining server capacity this client allows itself.
const HEADROOM_NUMERATOR: u64 = 3;
const HEADROOM_DENOMINATOR: u64 = 4;

/// Local concurrency ceiling given the server's view of the account.
///
/// `server_running` counts our own `local_active` requests, so only the remainder belongs to
/// other consumers. Of what they leave free we take three quarters, and never less than one
/// slot. Saturating, never panics.
///
/// ```rust
/// use qualys_client::throttle::calculate_concurrency;
///
/// assert_eq!(calculate_concurrency(0, 15, 0), 11);
/// assert_eq!(calculate_concurrency(0, 15, 5), 7);
/// assert_eq!(calculate_concurrency(7, 15, 14), 6);
/// assert_eq!(calculate_concurrency(0, 0, 100), 1);
/// ```
pub fn calculate_concurrency(local_active: usize, server_limit: u32, server_running: u32) -> usize {
    let local_active = u64::try_from(local_active).unwrap_or(u64::MAX);
    let others = u64::from(server_running).saturating_sub(local_active);
    let free = u64::from(server_limit).saturating_sub(others);
    let available = free * HEADROOM_NUMERATOR / HEADROOM_DENOMINATOR;
    usize::try_from(available).unwrap_or(usize::MAX).max(1)
}

/// Latest capacity figures observed on the bus.
#[derive(Debug)]
struct Feedback {
    server: Mutex<(u32, u32)>,
    changed: Notify,
}

impl Feedback {
    fn new(state: RateLimitState) -> Self {
        Self {
            server: Mutex::new((state.concurrency, state.concurrency_running)),
            changed: Notify::new(),
        }
    }

    fn observe(&self, state: &RateLimitState) {
        *self.server.lock().unwrap_or_else(|p| p.into_inner()) =
            (state.concurrency, state.concurrency_running);
        self.changed.notify_one();
    }

    fn ceiling(&self, local_active: usize) -> usize {
        let (limit, running) = *self.server.lock().unwrap_or_else(|p| p.into_inner());
        calculate_concurrency(local_active, limit, running)
    }
}

/// Runs a batch of futures under the adaptive ceiling.
#[derive(Debug, Clone)]
pub struct ConcurrencyThrottler {
    bus: EventBus,
    state: SharedRateLimitState,
}

impl ConcurrencyThrottler {
    /// Throttle against the capacity published on `bus` and held in `state`.
    pub fn new(bus: EventBus, state: SharedRateLimitState) -> Self {
        Self { bus, state }
    }

    /// Drive `tasks` to completion and return their outputs in input order.
    ///
    /// Tasks start in input order as slots free up. The bus subscription lives exactly as long
    /// as this call.
    pub async fn run<I, F, T>(&self, tasks: I) -> Vec<T>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T>,
    {
        let feedback = Arc::new(Feedback::new(self.state.get()));
        let listener = feedback.clone();
        let _subscription = self.bus.subscribe(move |event: &ClientEvent| {
            if let ClientEvent::Response(e) = event {
                listener.observe(&e.next_rate_limit_state);
            }
        });

        let mut pending = tasks.into_iter().enumerate();
        let mut next = pending.next();
        let mut running = FuturesUnordered::new();
        let mut results = Vec::new();

        loop {
            let ceiling = feedback.ceiling(running.len());
            while running.len() < ceiling {
                let Some((index, task)) = next.take() else { break };
                running.push(async move { (index, task.await) });
                next = pending.next();
            }
            if running.is_empty() {
                break;
            }
            trace!(active = running.len(), ceiling, "throttler waiting");

            tokio::select! {
                Some(output) = running.next() => results.push(output),
                _ = feedback.changed.notified() => {}
            }
        }

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, output)| output).collect()
    }
}
