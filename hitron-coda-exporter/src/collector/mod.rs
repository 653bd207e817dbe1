//! Sub-collectors turning device records into metrics.
//!
//! Each sub-collector owns the metric families of one subsystem. A fresh set
//! is built for every scrape and only registered if every query it needs
//! succeeded, so a failing subsystem contributes nothing but its error gauge.

pub mod cm;
pub mod router;
pub mod wifi;

use std::fmt;
use std::future::Future;
use std::sync::atomic::AtomicU64;

use hitron_coda::{DeviceError, DeviceSession};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tracing::{debug, warn};

use crate::metrics::ExporterMetrics;
use crate::scrape::ScrapeContext;

pub use cm::CmCollector;
pub use router::RouterCollector;
pub use wifi::WifiCollector;

/// Floating point gauge.
pub type GaugeF64 = Gauge<f64, AtomicU64>;

/// Floating point counter, set once per scrape from a device total.
pub type CounterF64 = Counter<f64, AtomicU64>;

/// Device area a sub-collector covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Router,
    Cm,
    Wifi,
}

impl Subsystem {
    pub fn as_str(self) -> &'static str {
        match self {
            Subsystem::Router => "router",
            Subsystem::Cm => "cm",
            Subsystem::Wifi => "wifi",
        }
    }

    /// Name of the gauge emitted when this subsystem fails, without the
    /// registry prefix.
    pub fn error_metric(self) -> String {
        format!("{}_error", self.as_str())
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fixed set of metric families filled from one or more device queries.
pub trait SubCollector: Send + Sync {
    fn subsystem(&self) -> Subsystem;

    /// Query the device and fill the families. Any query failure aborts the
    /// collection.
    fn collect<S: DeviceSession>(
        &self,
        session: &S,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Register every family with the values collected.
    fn register(self, registry: &mut Registry);
}

/// How one sub-collector run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    Collected,
    /// The subsystem failed; only its error gauge was registered.
    Failed,
    /// The scrape was cancelled mid-collection.
    Cancelled,
}

/// Run `collector` behind an isolation boundary.
///
/// Errors never escape: they are logged, counted in
/// `request_errors_total` and turned into the subsystem's error gauge.
pub async fn run_isolated<C, S>(
    collector: C,
    session: &S,
    ctx: &ScrapeContext,
    registry: &mut Registry,
    metrics: &ExporterMetrics,
) -> CollectOutcome
where
    C: SubCollector,
    S: DeviceSession,
{
    let subsystem = collector.subsystem();

    match ctx.run(collector.collect(session)).await {
        Ok(()) => {
            collector.register(registry);
            CollectOutcome::Collected
        }
        Err(DeviceError::Cancelled) => {
            debug!(subsystem = %subsystem, "Collection cancelled");
            CollectOutcome::Cancelled
        }
        Err(e) => {
            warn!(subsystem = %subsystem, error = %e, "Error scraping target");
            metrics.request_errors.inc();

            let error = Gauge::<i64>::default();
            error.set(1);
            registry.register(subsystem.error_metric(), "Error scraping target", error);
            CollectOutcome::Failed
        }
    }
}

/// Value of the first sample of `series` in a rendered registry.
///
/// `series` is either a bare metric name or a name followed by the start of
/// its label set.
#[cfg(test)]
pub(crate) fn sample_value(body: &str, series: &str) -> Option<f64> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .find(|line| match line.strip_prefix(series) {
            Some(rest) => series.contains('{') || rest.starts_with([' ', '{']),
            None => false,
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}
