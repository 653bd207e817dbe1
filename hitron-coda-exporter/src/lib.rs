//! Prometheus exporter for Hitron CODA cable modems.
//!
//! Every request to `/scrape` opens a fresh session with the modem, runs the
//! `router`, `cm` and `wifi` sub-collectors and renders the result in the
//! OpenMetrics text format. Nothing is cached between scrapes.
//!
//! # Architecture
//!
//! ```text
//!                   ┌───────────────┐
//! SIGHUP ──────────>│    Reload     │──> ConfigStore
//! POST /-/reload ──>│  Coordinator  │        │
//!                   └───────────────┘        │ snapshot
//!                                            v
//! GET /scrape ─────────────────────────> Scraper ──> router / cm / wifi
//! ```
//!
//! # Configuration
//!
//! The device settings live in a JSON5 file, see [`config::DeviceConfig`].
//! Process settings are command line flags.

pub mod collector;
pub mod config;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod reload;
pub mod scrape;

pub use config::{ConfigError, ConfigStore, DeviceConfig};
pub use http::{AppState, HttpServer};
pub use metrics::ExporterMetrics;
pub use reload::{ReloadCoordinator, ReloadError, ReloadHandle, SignalTrigger};
pub use scrape::{ScrapeContext, Scraper};
