//! Serialized config reloads.
//!
//! Two triggers feed one coordinator task, which is the only caller of
//! [`ConfigStore::reload`]:
//!
//! - SIGHUP, through a [`SignalTrigger`]: fire and forget, outcome logged
//! - `POST /-/reload`, through a [`ReloadHandle`]: the caller awaits the result

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info};

use crate::config::{ConfigError, ConfigStore};

/// Queue depth for pending HTTP reload requests.
const REQUEST_QUEUE: usize = 16;

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Reload coordinator is not running")]
    CoordinatorStopped,
}

/// One reload attempt and the slot its result goes to.
#[derive(Debug)]
pub struct ReloadRequest {
    respond_to: oneshot::Sender<Result<(), ConfigError>>,
}

/// Requests reloads and waits for their outcome.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    requests: mpsc::Sender<ReloadRequest>,
}

impl ReloadHandle {
    /// Reload the config file and wait for the result.
    pub async fn reload(&self) -> Result<(), ReloadError> {
        let (respond_to, response) = oneshot::channel();
        self.requests
            .send(ReloadRequest { respond_to })
            .await
            .map_err(|_| ReloadError::CoordinatorStopped)?;

        response
            .await
            .map_err(|_| ReloadError::CoordinatorStopped)??;
        Ok(())
    }
}

/// Fire-and-forget reload trigger.
#[derive(Debug, Clone)]
pub struct SignalTrigger {
    signals: mpsc::Sender<()>,
}

impl SignalTrigger {
    /// Ask for a reload without waiting for it.
    ///
    /// Triggers that arrive while one is already pending are merged into it.
    /// Returns `false` once the coordinator has stopped.
    pub fn notify(&self) -> bool {
        match self.signals.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

/// Single consumer of every reload trigger.
#[derive(Debug)]
pub struct ReloadCoordinator {
    store: Arc<ConfigStore>,
    path: PathBuf,
    signals: mpsc::Receiver<()>,
    requests: mpsc::Receiver<ReloadRequest>,
}

impl ReloadCoordinator {
    /// Create a coordinator reloading `path` into `store`.
    pub fn new(
        store: Arc<ConfigStore>,
        path: impl Into<PathBuf>,
    ) -> (Self, ReloadHandle, SignalTrigger) {
        let (signal_tx, signals) = mpsc::channel(1);
        let (request_tx, requests) = mpsc::channel(REQUEST_QUEUE);

        let coordinator = Self {
            store,
            path: path.into(),
            signals,
            requests,
        };
        (
            coordinator,
            ReloadHandle {
                requests: request_tx,
            },
            SignalTrigger { signals: signal_tx },
        )
    }

    /// Process reloads until shutdown or until every trigger is gone.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(path = %self.path.display(), "Reload coordinator started");

        let mut signals_open = true;
        let mut requests_open = true;

        while (signals_open || requests_open) && !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                signal = self.signals.recv(), if signals_open => match signal {
                    Some(()) => {
                        let _ = self.reload("signal");
                    }
                    None => signals_open = false,
                },
                request = self.requests.recv(), if requests_open => match request {
                    Some(request) => {
                        let result = self.reload("http");
                        if request.respond_to.send(result).is_err() {
                            debug!("Reload caller went away before the result was delivered");
                        }
                    }
                    None => requests_open = false,
                },
            }
        }

        info!("Reload coordinator stopped");
    }

    fn reload(&self, trigger: &str) -> Result<(), ConfigError> {
        let result = self.store.reload(&self.path);
        match &result {
            Ok(()) => info!(trigger, host = %self.store.get().host, "Loaded config file"),
            Err(e) => error!(trigger, error = %e, "Error reloading config"),
        }
        result
    }
}

/// Forward SIGHUP to `trigger` until shutdown.
#[cfg(unix)]
pub async fn forward_sighup(
    trigger: SignalTrigger,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;

    loop {
        tokio::select! {
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                info!("Received SIGHUP, reloading config");
                if !trigger.notify() {
                    break;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    Ok(())
}
