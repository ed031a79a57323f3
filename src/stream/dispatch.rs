//! Bounded dispatch of parsed records to the iteratee.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::iterate::{Iteratee, IterateeErrorHook};

#[derive(Debug, Default)]
struct Counters {
    successes: AtomicUsize,
    failures: AtomicUsize,
}

/// Runs the iteratee on at most `concurrency` records at a time and keeps the error budget.
pub(crate) struct Dispatcher<T> {
    slots: Arc<Semaphore>,
    tasks: JoinSet<()>,
    counters: Arc<Counters>,
    iteratee: Arc<dyn Iteratee<T>>,
    on_error: Option<IterateeErrorHook<T>>,
    error_limit: Option<usize>,
}

impl<T> Dispatcher<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new(
        iteratee: Arc<dyn Iteratee<T>>,
        concurrency: usize,
        error_limit: Option<usize>,
        on_error: Option<IterateeErrorHook<T>>,
    ) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(concurrency.max(1))),
            tasks: JoinSet::new(),
            counters: Arc::new(Counters::default()),
            iteratee,
            on_error,
            error_limit,
        }
    }

    pub(crate) fn successes(&self) -> usize {
        self.counters.successes.load(Ordering::SeqCst)
    }

    pub(crate) fn failures(&self) -> usize {
        self.counters.failures.load(Ordering::SeqCst)
    }

    /// The limit was reached before anything succeeded.
    pub(crate) fn budget_exceeded(&self) -> bool {
        self.error_limit
            .is_some_and(|limit| self.failures() >= limit && self.successes() == 0)
    }

    pub(crate) fn limit_error(&self) -> ClientError {
        ClientError::IterateeErrorLimit { limit: self.error_limit.unwrap_or_default() }
    }

    /// Wait for a free slot and start the iteratee on `record`.
    ///
    /// The budget is checked again once the slot is ours; when it is exhausted `record` is
    /// dropped undelivered.
    pub(crate) async fn submit(&mut self, record: T) -> Result<(), ClientError> {
        let permit =
            self.slots.clone().acquire_owned().await.map_err(|_| ClientError::DispatchClosed)?;
        self.reap();
        if self.budget_exceeded() {
            return Err(self.limit_error());
        }

        let iteratee = self.iteratee.clone();
        let on_error = self.on_error.clone();
        let counters = self.counters.clone();
        self.tasks.spawn(async move {
            let copy = on_error.as_ref().map(|_| record.clone());
            match iteratee.call(record).await {
                Ok(()) => {
                    counters.successes.fetch_add(1, Ordering::SeqCst);
                }
                Err(error) => {
                    counters.failures.fetch_add(1, Ordering::SeqCst);
                    debug!(error = %error, "iteratee failed");
                    if let (Some(hook), Some(record)) = (on_error, copy) {
                        hook(&error, &record);
                    }
                }
            }
            drop(permit);
        });
        Ok(())
    }

    /// Collect tasks that already finished.
    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.note(joined);
        }
    }

    /// Wait for every dispatched task.
    pub(crate) async fn drain(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            self.note(joined);
        }
    }

    fn note(&self, joined: Result<(), JoinError>) {
        if let Err(e) = joined {
            // Panicked iteratees never reach their own bookkeeping.
            warn!(error = %e, "iteratee task did not complete");
            self.counters.failures.fetch_add(1, Ordering::SeqCst);
        }
    }
}
