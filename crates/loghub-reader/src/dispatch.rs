//! Dedicated worker thread with a blocking dispatch façade.
//!
//! The remote client must only ever be driven from one thread: it is not
//! safe to call concurrently, and an interrupted call can leave it in a bad
//! state. Each reader therefore owns exactly one worker thread. A job
//! submitted from any other thread is queued and the submitter blocks,
//! without timeout, until the worker sends the result back; a job submitted
//! from the worker thread itself runs inline.
//!
//! The worker owns a current-thread tokio runtime so jobs can drive the
//! async client trait and the retry backoff sleeps. The thread is detached
//! (its join handle is dropped at spawn), so an exiting process never waits
//! on it.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread::ThreadId;

use loghub_core::{Error, Result};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::debug;

type Job = Box<dyn FnOnce(&Runtime) + Send>;

thread_local! {
    // Set once per worker thread so inline execution can reach the runtime.
    static WORKER_RUNTIME: RefCell<Option<Rc<Runtime>>> = const { RefCell::new(None) };
}

pub(crate) struct DispatchWorker {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    thread_id: ThreadId,
    cancel: CancellationToken,
}

impl DispatchWorker {
    /// Spawn the worker thread and wait until its runtime is ready.
    pub(crate) fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let cancel = CancellationToken::new();
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<ThreadId, String>>();

        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => Rc::new(runtime),
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                WORKER_RUNTIME.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&runtime)));
                let _ = ready_tx.send(Ok(std::thread::current().id()));

                while let Ok(job) = job_rx.recv() {
                    job(&runtime);
                }
                debug!("dispatch worker exiting");
            })
            .map_err(|e| Error::Contract(format!("failed to spawn dispatch worker '{name}': {e}")))?;

        let thread_id = ready_rx
            .recv()
            .map_err(|_| Error::Contract("dispatch worker exited before becoming ready".into()))?
            .map_err(|e| Error::Contract(format!("dispatch worker runtime failed to start: {e}")))?;

        Ok(Self {
            tx: Mutex::new(Some(job_tx)),
            thread_id,
            cancel,
        })
    }

    /// Run `f` on the worker thread and block until it completes.
    pub(crate) fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Runtime) -> Result<T> + Send + 'static,
    {
        if std::thread::current().id() == self.thread_id {
            return run_inline(f);
        }

        let (reply_tx, reply_rx) = mpsc::sync_channel::<Result<T>>(1);
        let job: Job = Box::new(move |runtime| {
            let _ = reply_tx.send(f(runtime));
        });

        {
            let guard = self
                .tx
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match guard.as_ref() {
                Some(tx) => tx
                    .send(job)
                    .map_err(|_| Error::Interrupted)?,
                None => return Err(Error::Contract("offset reader is closed".into())),
            }
        }

        // Unbounded wait: the only latency bound is the job's own retry
        // budget plus remote-call latency. A vanished worker means the
        // reader was torn down underneath us.
        reply_rx.recv().map_err(|_| Error::Interrupted)?
    }

    /// Thread id of the worker, for placement checks.
    pub(crate) fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Token cancelled when the worker shuts down.
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel in-flight work and let the worker drain out.
    ///
    /// Queued jobs still run (their retry loops observe the cancellation
    /// and abort); new submissions are rejected.
    pub(crate) fn shutdown(&self) {
        self.cancel.cancel();
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }
}

impl Drop for DispatchWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_inline<T, F>(f: F) -> Result<T>
where
    F: FnOnce(&Runtime) -> Result<T>,
{
    WORKER_RUNTIME.with(|slot| {
        let runtime = slot.borrow().clone();
        match runtime {
            Some(runtime) => f(&runtime),
            None => Err(Error::Contract(
                "inline dispatch outside an initialized worker thread".into(),
            )),
        }
    })
}
