//! Component runtime — shared lifecycle scaffolding.
//!
//! A [`Component`] is an independently-runnable unit: a comms channel
//! (Telegram, console) or a background job such as the session sweeper.
//! Components capture their shared state at construction and are handed to
//! [`spawn_components`], which runs each as its own Tokio task.
//!
//! Any component error cancels the shared [`CancellationToken`] so siblings
//! and `main` shut down together.

use std::future::Future;
use std::pin::Pin;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::AppError;

// ── Component ─────────────────────────────────────────────────────────────────

/// A boxed, owned future returned by [`Component::run`].
pub type ComponentFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

pub trait Component: Send + 'static {
    /// Stable identifier used in log messages.
    fn id(&self) -> &str;

    /// Consume the component and return its run-loop. The loop should end
    /// when `shutdown` is cancelled or its own work is done.
    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture;
}

// ── SubsystemHandle ───────────────────────────────────────────────────────────

/// Handle to a running set of components.
pub struct SubsystemHandle {
    inner: JoinHandle<Result<(), AppError>>,
}

impl SubsystemHandle {
    /// Await all components and return the first error, if any.
    pub async fn join(self) -> Result<(), AppError> {
        match self.inner.await {
            Ok(r) => r,
            Err(e) => Err(AppError::Comms(format!("subsystem task panicked: {e}"))),
        }
    }

    /// Run until `stop` resolves or the components end on their own.
    ///
    /// A stop signal cancels `shutdown` and drains the components. If `stop`
    /// fails (no signal handler could be installed) the components keep
    /// running until they finish.
    pub async fn run_until<F>(self, stop: F, shutdown: &CancellationToken) -> Result<(), AppError>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let join = self.join();
        tokio::pin!(join);

        tokio::select! {
            signal = stop => match signal {
                Ok(()) => {
                    info!("stop signal received, shutting down");
                    shutdown.cancel();
                    (&mut join).await
                }
                Err(e) => {
                    warn!("cannot listen for a stop signal, running until the components exit: {e}");
                    (&mut join).await
                }
            },
            res = &mut join => res,
        }
    }
}

// ── spawn_components ──────────────────────────────────────────────────────────

/// Spawn every component and return a handle that resolves once all exit.
///
/// On the first error or panic `shutdown` is cancelled; remaining
/// components are drained and the first error is returned.
pub fn spawn_components(
    components: Vec<Box<dyn Component>>,
    shutdown: CancellationToken,
) -> SubsystemHandle {
    let handle = tokio::spawn(async move {
        let mut set: JoinSet<Result<(), AppError>> = JoinSet::new();

        for component in components {
            debug!(component = %component.id(), "spawning component");
            set.spawn(component.run(shutdown.clone()));
        }

        let mut first_err: Option<AppError> = None;

        while let Some(res) = set.join_next().await {
            match res {
                Err(e) => {
                    error!("component panicked: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert_with(|| AppError::Comms(format!("component panicked: {e}")));
                }
                Ok(Err(e)) => {
                    error!("component error: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert(e);
                }
                Ok(Ok(())) => {}
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    });

    SubsystemHandle { inner: handle }
}
