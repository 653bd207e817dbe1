//! Hitron CODA cable modem client.
//!
//! This crate provides the device side of the exporter:
//!
//! - [`Connector`] / [`DeviceSession`] - the request/response contract a scrape
//!   drives (open, login, query, close)
//! - [`records`] - typed device records with parsed numbers, durations and addresses
//! - [`HttpConnector`] / [`CableModem`] - the HTTPS implementation talking to a real modem
//! - [`error`] - error types
//!
//! With the `mock` feature enabled, [`mock::MockConnector`] provides a scripted
//! in-memory device for tests.

pub mod client;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod records;
pub mod session;
mod wire;

pub use client::{CableModem, DEFAULT_TIMEOUT, HttpConnector};
pub use error::{DeviceError, Result};
pub use records::{
    CmDsInfo, CmDsOfdm, CmSysInfo, CmUsInfo, CmUsOfdm, DsOfdmReceiver, DsPort, RouterLocation,
    RouterSysInfo, UsOfdmChannel, UsPort, WifiClient, WifiClients,
};
pub use session::{Connector, Credentials, DeviceSession};
