//! Per-request scrape orchestration.

use std::future::Future;
use std::time::Duration;

use hitron_coda::{Connector, DeviceError, DeviceSession};
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::collector::{CmCollector, CollectOutcome, RouterCollector, WifiCollector, run_isolated};
use crate::config::DeviceConfig;
use crate::metrics::{ExporterMetrics, NAMESPACE};

/// Upper bound on session teardown.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Cancellation scope of one scrape.
///
/// The context is cancelled once its [`ScrapeGuard`] is dropped, typically
/// because the HTTP client went away.
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    cancel: Option<watch::Receiver<bool>>,
}

/// Keeps a [`ScrapeContext`] alive. Dropping it cancels the scrape.
#[derive(Debug)]
pub struct ScrapeGuard {
    cancel: watch::Sender<bool>,
}

impl Drop for ScrapeGuard {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

impl ScrapeContext {
    /// Create a context bound to the returned guard.
    pub fn new() -> (ScrapeGuard, Self) {
        let (tx, rx) = watch::channel(false);
        (ScrapeGuard { cancel: tx }, Self { cancel: Some(rx) })
    }

    /// A context that is never cancelled.
    pub fn background() -> Self {
        Self { cancel: None }
    }

    pub fn is_cancelled(&self) -> bool {
        match &self.cancel {
            Some(rx) => *rx.borrow() || rx.has_changed().is_err(),
            None => false,
        }
    }

    /// Resolves once the scrape is cancelled.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.cancel else {
            return std::future::pending().await;
        };

        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Drive a device call, abandoning it if the scrape is cancelled first.
    pub async fn run<T, F>(&self, call: F) -> Result<T, DeviceError>
    where
        F: Future<Output = Result<T, DeviceError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(DeviceError::Cancelled),
            result = call => result,
        }
    }
}

/// Runs scrapes against the device.
///
/// The connector is shared; everything else (session, collectors, registry)
/// is created per scrape.
#[derive(Debug)]
pub struct Scraper<C> {
    connector: C,
    metrics: ExporterMetrics,
    close_timeout: Duration,
}

impl<C: Connector> Scraper<C> {
    pub fn new(connector: C, metrics: ExporterMetrics) -> Self {
        Self {
            connector,
            metrics,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Run one collection cycle and return its registry.
    ///
    /// Never fails: device problems end up as `hitron_coda_up 0`, subsystem
    /// error gauges and the self-metric error counters.
    pub async fn scrape(&self, config: &DeviceConfig, ctx: &ScrapeContext) -> Registry {
        let mut registry = Registry::with_prefix(NAMESPACE);
        let up = Gauge::<i64>::default();

        match ctx.run(self.connector.open(config.credentials())).await {
            Ok(session) => {
                let reachable = self.drive(&session, ctx, &mut registry).await;
                self.close(&session).await;
                if reachable {
                    up.set(1);
                }
            }
            Err(e) => self.connection_error("open", &e),
        }

        registry.register(
            "up",
            "Whether the Hitron CODA device was reachable during the last scrape",
            up,
        );
        registry
    }

    /// Login and collect. Returns whether no connection-level error occurred.
    async fn drive(
        &self,
        session: &C::Session,
        ctx: &ScrapeContext,
        registry: &mut Registry,
    ) -> bool {
        if let Err(e) = ctx.run(session.login()).await {
            self.connection_error("login", &e);
            return false;
        }

        let outcome =
            run_isolated(RouterCollector::default(), session, ctx, registry, &self.metrics).await;
        if outcome == CollectOutcome::Cancelled {
            return false;
        }

        let outcome =
            run_isolated(CmCollector::default(), session, ctx, registry, &self.metrics).await;
        if outcome == CollectOutcome::Cancelled {
            return false;
        }

        let outcome =
            run_isolated(WifiCollector::default(), session, ctx, registry, &self.metrics).await;
        outcome != CollectOutcome::Cancelled
    }

    fn connection_error(&self, phase: &str, error: &DeviceError) {
        if matches!(error, DeviceError::Cancelled) {
            debug!(phase, "Scrape cancelled");
            return;
        }
        info!(phase, error = %error, "Error scraping target");
        self.metrics.client_errors.inc();
    }

    /// Close the session. Runs on every path, even after cancellation.
    async fn close(&self, session: &C::Session) {
        match tokio::time::timeout(self.close_timeout, session.close()).await {
            Ok(Ok(())) => debug!("Session closed"),
            Ok(Err(e)) => debug!(error = %e, "Error closing session"),
            Err(_) => warn!(
                timeout_secs = self.close_timeout.as_secs_f64(),
                "Timed out closing session"
            ),
        }
    }
}
