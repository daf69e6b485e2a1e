//! Cooperative shutdown coordination.
//!
//! A [`Shutdown`] goes Running → requested → drained. Long-lived components
//! register a [`ShutdownPreventer`] when they are built and resolve it once
//! they have no outstanding work after the request. Nothing is interrupted:
//! components observe the request at their own checkpoints, and through a
//! hook that runs inside [`Shutdown::request`].

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Process-wide shutdown state. Clones share the same state.
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

type RequestHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Inner {
    requested: CancellationToken,
    preventers: Mutex<Vec<CancellationToken>>,
    hooks: Mutex<Vec<RequestHook>>,
}

/// Completion signal that holds off [`Shutdown::drained`] until resolved.
#[derive(Clone, Debug)]
pub struct ShutdownPreventer {
    done: CancellationToken,
}

impl ShutdownPreventer {
    /// Mark this component as safe to stop. Resolving twice is a no-op.
    pub fn resolve(&self) {
        self.done.cancel();
    }

    pub fn is_resolved(&self) -> bool {
        self.done.is_cancelled()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_preventer(&self) -> ShutdownPreventer {
        let done = CancellationToken::new();
        self.inner.preventers.lock().unwrap().push(done.clone());
        ShutdownPreventer { done }
    }

    /// Request shutdown. Hooks registered with [`Shutdown::on_request`] run
    /// before this returns, on the first call only.
    pub fn request(&self) {
        if !self.inner.requested.is_cancelled() {
            info!("Shutdown requested");
        }
        self.inner.requested.cancel();
        let hooks = std::mem::take(&mut *self.inner.hooks.lock().unwrap());
        for hook in hooks {
            hook();
        }
    }

    /// Run `hook` synchronously when shutdown is requested, or right away if
    /// it already was.
    ///
    /// The hook must not call back into this `Shutdown` under a lock that
    /// `request` callers may hold.
    pub fn on_request(&self, hook: impl FnOnce() + Send + 'static) {
        {
            let mut hooks = self.inner.hooks.lock().unwrap();
            if !self.inner.requested.is_cancelled() {
                hooks.push(Box::new(hook));
                return;
            }
        }
        hook();
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.is_cancelled()
    }

    /// Token cancelled when shutdown is requested.
    pub fn token(&self) -> CancellationToken {
        self.inner.requested.clone()
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&self) {
        self.inner.requested.cancelled().await;
    }

    /// Resolves once shutdown has been requested and every registered
    /// preventer has resolved.
    pub async fn drained(&self) {
        self.requested().await;
        let preventers = self.inner.preventers.lock().unwrap().clone();
        for done in preventers {
            done.cancelled().await;
        }
        info!("All components drained");
    }

    pub fn preventer_count(&self) -> usize {
        self.inner.preventers.lock().unwrap().len()
    }

    /// Request shutdown when the process receives SIGINT or SIGTERM.
    pub fn request_on_signal(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            shutdown.request();
        })
    }
}

/// Resolves when the process receives a shutdown signal (SIGINT or SIGTERM).
///
/// On non-Unix only Ctrl-C is available. A handler that cannot be installed
/// never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c  => {}
        _ = sigterm => {}
    }
}
