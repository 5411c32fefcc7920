//! Graceful shutdown
//!
//! One [`ShutdownHandle`] is shared by the HTTP server, the consumer loop
//! and the signal listener. Triggering it (on SIGINT, SIGTERM or manually)
//! stops the server from accepting connections and asks the loop to drain.
//!
//! `SHUTDOWN_TIMEOUT_SECS` (default 30) bounds how long the process waits
//! for the loop to finish its in-flight message.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct GracefulShutdown {
    /// Maximum time to wait for the consumer loop to drain
    pub timeout: Duration,
}

impl GracefulShutdown {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }
}

/// What started the shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Received SIGINT (Ctrl+C)
    SigInt,
    /// Received SIGTERM
    SigTerm,
    /// Requested from code
    Manual,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SigInt => write!(f, "SIGINT (Ctrl+C)"),
            Self::SigTerm => write!(f, "SIGTERM"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Handle for triggering and observing shutdown
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self, signal: ShutdownSignal) {
        if !*self.sender.borrow() {
            tracing::info!(%signal, "initiating graceful shutdown");
        }
        self.sender.send_replace(true);
    }

    /// A receiver that reads `true` once shutdown was requested, in the
    /// form the consumer loop takes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolve once shutdown was requested.
    pub async fn wait(&self) {
        let mut receiver = self.subscribe();
        // The sender lives in `self`, so `changed` cannot fail here.
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve on SIGINT or SIGTERM.
pub async fn shutdown_signal() -> ShutdownSignal {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        ShutdownSignal::SigInt
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
        ShutdownSignal::SigTerm
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<ShutdownSignal>();

    tokio::select! {
        signal = ctrl_c => signal,
        signal = terminate => signal,
    }
}

/// Serve `router` on an already-bound listener until `handle` is triggered,
/// then let in-flight requests finish.
pub async fn serve_with_shutdown(
    listener: TcpListener,
    router: axum::Router,
    handle: ShutdownHandle,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Admin API listening on {}", addr);
        tracing::info!("   Health: http://{}/health", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { handle.wait().await })
        .await?;

    tracing::info!("Admin API shut down gracefully");
    Ok(())
}
