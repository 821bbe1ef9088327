//! Bounded, fixed-interval retry wrapper for remote operations.
//!
//! Every remote operation of a reader runs inside one retry scope on the
//! dispatch worker. The wrapper:
//!
//! - refuses to run anywhere but the worker thread (a placement mistake is
//!   a programming error, reported as a contract violation, never retried);
//! - holds an instance-level lock for the whole sequence, so logical calls
//!   into the same reader never interleave their attempts;
//! - retries only transient failures, with a fixed delay between attempts
//!   and no jitter;
//! - aborts immediately when the reader's cancellation token fires, during
//!   an attempt gap or before one, surfacing `Interrupted` rather than the
//!   transient failure;
//! - re-raises the last transient failure unchanged once attempts are
//!   exhausted.

use std::sync::Mutex;
use std::thread::ThreadId;
use std::time::Duration;

use loghub_core::{Error, Result};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub(crate) struct RetryRunner {
    max_attempts: u32,
    retry_interval: Duration,
    worker_thread_id: ThreadId,
    cancel: CancellationToken,
    serial: Mutex<()>,
}

impl RetryRunner {
    pub(crate) fn new(
        max_attempts: u32,
        retry_interval: Duration,
        worker_thread_id: ThreadId,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            // A configured zero still yields one attempt.
            max_attempts: max_attempts.max(1),
            retry_interval,
            worker_thread_id,
            cancel,
            serial: Mutex::new(()),
        }
    }

    /// Run `body` with retries on the dispatch worker.
    pub(crate) fn run<T>(&self, runtime: &Runtime, mut body: impl FnMut() -> Result<T>) -> Result<T> {
        if std::thread::current().id() != self.worker_thread_id {
            return Err(Error::Contract(
                "retry wrapper invoked off the dispatch worker thread".into(),
            ));
        }

        let _serial = self
            .serial
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }

            match body() {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(
                            attempt,
                            max_attempts = self.max_attempts,
                            error = %e,
                            "attempts exhausted, giving up"
                        );
                        return Err(e);
                    }
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        retry_interval_ms = self.retry_interval.as_millis() as u64,
                        error = %e,
                        "transient failure, backing off"
                    );
                    let cancelled = runtime.block_on(async {
                        tokio::select! {
                            _ = self.cancel.cancelled() => true,
                            _ = tokio::time::sleep(self.retry_interval) => false,
                        }
                    });
                    if cancelled {
                        return Err(Error::Interrupted);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
