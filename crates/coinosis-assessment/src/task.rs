use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Background task tied to the lifetime of the component that started it.
///
/// `cancel` asks the task to stop at its next suspension point; dropping the
/// handle aborts it outright so it never acts on stale state.
pub struct ScheduledTask {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

/// Cancellation side handed to the task body.
#[derive(Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation was requested.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl ScheduledTask {
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(Cancellation) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(body(Cancellation { rx }));
        debug!(task = name, "Scheduled task started");
        Self {
            name,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
        debug!(task = self.name, "Scheduled task cancelled");
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the task to end on its own.
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
