//! The request/response contract between a scrape and the modem.

use std::fmt;
use std::future::Future;

use crate::error::Result;
use crate::records::{
    CmDsInfo, CmDsOfdm, CmSysInfo, CmUsInfo, CmUsOfdm, RouterLocation, RouterSysInfo, WifiClients,
};

/// Connection settings for one device.
#[derive(Clone, Copy)]
pub struct Credentials<'a> {
    /// Address or base URL of the modem's web interface.
    pub host: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

impl fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opens device sessions.
///
/// A connector is long-lived and shared by every scrape; the sessions it opens
/// are not. Each scrape opens its own session and closes it when done.
pub trait Connector: Send + Sync + 'static {
    /// Session type produced by this connector.
    type Session: DeviceSession;

    /// Open a session for the given credentials.
    ///
    /// This only prepares the connection; authentication happens in
    /// [`DeviceSession::login`].
    fn open(&self, credentials: Credentials<'_>)
    -> impl Future<Output = Result<Self::Session>> + Send;
}

/// A short-lived, authenticated conversation with one modem.
pub trait DeviceSession: Send + Sync {
    /// Authenticate with the credentials the session was opened with.
    fn login(&self) -> impl Future<Output = Result<()>> + Send;

    /// Tear the session down. Safe to call after a failed login.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;

    fn router_sys_info(&self) -> impl Future<Output = Result<RouterSysInfo>> + Send;

    fn router_location(&self) -> impl Future<Output = Result<RouterLocation>> + Send;

    fn cm_sys_info(&self) -> impl Future<Output = Result<CmSysInfo>> + Send;

    fn cm_ds_info(&self) -> impl Future<Output = Result<CmDsInfo>> + Send;

    fn cm_us_info(&self) -> impl Future<Output = Result<CmUsInfo>> + Send;

    fn cm_us_ofdm(&self) -> impl Future<Output = Result<CmUsOfdm>> + Send;

    fn cm_ds_ofdm(&self) -> impl Future<Output = Result<CmDsOfdm>> + Send;

    fn wifi_clients(&self) -> impl Future<Output = Result<WifiClients>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials {
            host: "192.168.0.1",
            username: "cusadmin",
            password: "hunter2",
        };
        let out = format!("{:?}", creds);
        assert!(out.contains("cusadmin"));
        assert!(!out.contains("hunter2"));
    }
}
