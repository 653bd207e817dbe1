//! Metrics about the exporter itself, served on `/metrics`.

use std::fmt;

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::metrics::info::Info;
use prometheus_client::registry::Registry;

/// Prefix of every metric the exporter emits.
pub const NAMESPACE: &str = "hitron_coda";

/// Content type of rendered registries.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Self metrics shared by every scrape.
///
/// Clones share the underlying atomics.
#[derive(Debug, Clone)]
pub struct ExporterMetrics {
    pub collection_duration: Histogram,
    pub request_errors: Counter,
    pub client_errors: Counter,
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterMetrics {
    pub fn new() -> Self {
        Self {
            // 10ms .. ~40s
            collection_duration: Histogram::new(exponential_buckets(0.01, 2.0, 13)),
            request_errors: Counter::default(),
            client_errors: Counter::default(),
        }
    }

    /// Build the self-metrics registry.
    pub fn registry(&self) -> Registry {
        let mut registry = Registry::with_prefix(NAMESPACE);

        let build_info = Info::new(vec![
            ("version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
            (
                "revision".to_string(),
                option_env!("GIT_COMMIT").unwrap_or("unknown").to_string(),
            ),
        ]);
        registry.register(
            "build",
            "A metric with a constant '1' value labeled by version and revision from which hitron_coda_exporter was built",
            build_info,
        );
        registry.register(
            "collection_duration_seconds",
            "Duration of collections by the Hitron CODA exporter",
            self.collection_duration.clone(),
        );
        registry.register(
            "request_errors",
            "Errors in requests to the Hitron CODA exporter",
            self.request_errors.clone(),
        );
        registry.register(
            "client_errors",
            "Errors with the Hitron CODA client",
            self.client_errors.clone(),
        );

        registry
    }
}

/// Encode a registry in the OpenMetrics text format.
pub fn render(registry: &Registry) -> Result<String, fmt::Error> {
    let mut body = String::new();
    encode(&mut body, registry)?;
    Ok(body)
}
