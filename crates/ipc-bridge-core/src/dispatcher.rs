//! Main-Thread Dispatcher: a FIFO queue drained on the Editor's per-frame
//! tick, giving background callers "run this on main and await the result".

use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce() + Send>;

/// Error returned when the dispatcher has been shut down and can no longer
/// accept work, or when a queued job's result could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatcherError {
    /// The dispatcher's queue has been closed; no tick loop is draining it.
    #[error("dispatcher is shut down")]
    ShutDown,
}

/// Producer-side handle: enqueue main-thread work from any thread.
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: mpsc::UnboundedSender<Job>,
}

impl DispatcherHandle {
    /// Enqueue `f` to run on the next tick and return a handle that resolves
    /// to its result once the tick loop has drained and executed it.
    ///
    /// # Errors
    ///
    /// Returns [`DispatcherError::ShutDown`] if the tick loop is no longer
    /// running.
    pub fn run_on_main<F, T>(&self, f: F) -> Result<MainThreadFuture<T>, DispatcherError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let result = f();
            // The receiver may already be gone if the caller dropped the
            // future; that is not a dispatcher-level error.
            let _ = tx.send(result);
        });
        self.sender.send(job).map_err(|_| DispatcherError::ShutDown)?;
        Ok(MainThreadFuture { rx })
    }
}

/// Awaitable handle returned by [`DispatcherHandle::run_on_main`].
pub struct MainThreadFuture<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> MainThreadFuture<T> {
    /// Await completion of the enqueued work.
    ///
    /// # Errors
    ///
    /// Returns [`DispatcherError::ShutDown`] if the dispatcher was dropped
    /// before draining this job (e.g. shutdown mid-flight).
    pub async fn wait(self) -> Result<T, DispatcherError> {
        self.rx.await.map_err(|_| DispatcherError::ShutDown)
    }
}

/// Consumer-side queue: owned by whatever drives the Editor tick.
pub struct MainThreadDispatcher {
    sender: mpsc::UnboundedSender<Job>,
    receiver: mpsc::UnboundedReceiver<Job>,
}

impl Default for MainThreadDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadDispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    /// Obtain a cloneable producer handle.
    #[must_use]
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle { sender: self.sender.clone() }
    }

    /// Drain and run every job queued as of the start of this call, in FIFO
    /// order. A job that enqueues more work runs that work on the next tick,
    /// not this one. Call this from the thread that owns Editor API access,
    /// once per tick.
    ///
    /// Returns the number of jobs run.
    pub fn tick(&mut self) -> usize {
        let mut pending = Vec::new();
        while let Ok(job) = self.receiver.try_recv() {
            pending.push(job);
        }
        let ran = pending.len();
        for job in pending {
            job();
        }
        ran
    }
}
