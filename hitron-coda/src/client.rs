//! HTTPS client for the modem's management API.

use std::future::Future;
use std::time::Duration;

use reqwest::{RequestBuilder, Url};
use tracing::debug;

use crate::error::{DeviceError, Result};
use crate::records::{
    CmDsInfo, CmDsOfdm, CmSysInfo, CmUsInfo, CmUsOfdm, RouterLocation, RouterSysInfo, WifiClients,
};
use crate::session::{Connector, Credentials, DeviceSession};
use crate::wire::{self, WireRecord};

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens [`CableModem`] sessions over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Connector for HttpConnector {
    type Session = CableModem;

    fn open(
        &self,
        credentials: Credentials<'_>,
    ) -> impl Future<Output = Result<CableModem>> + Send {
        let modem = CableModem::new(credentials, self.timeout);
        async move { modem }
    }
}

/// One session with a modem.
///
/// The session cookie set at login lives in the client's cookie store, so a
/// `CableModem` must not be shared between scrapes.
#[derive(Debug)]
pub struct CableModem {
    client: reqwest::Client,
    base: Url,
    username: String,
    password: String,
}

impl CableModem {
    /// Build a session for `credentials`. No request is sent yet.
    pub fn new(credentials: Credentials<'_>, timeout: Duration) -> Result<Self> {
        let base = base_url(credentials.host)?;

        // The modem serves a self-signed certificate.
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(|e| DeviceError::from_reqwest(base.as_str(), e))?;

        Ok(Self {
            client,
            base,
            username: credentials.username.to_string(),
            password: credentials.password.to_string(),
        })
    }

    /// Base URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, endpoint: &str) -> Result<Url> {
        self.base
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| DeviceError::InvalidHost {
                host: self.base.to_string(),
                reason: e.to_string(),
            })
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Vec<u8>> {
        debug!(endpoint = %endpoint, "Requesting");

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DeviceError::from_reqwest(endpoint, e))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| DeviceError::from_reqwest(endpoint, e))?;
        Ok(body.to_vec())
    }

    async fn fetch<W: WireRecord>(&self) -> Result<W::Record> {
        let request = self.client.get(self.url(W::ENDPOINT)?);
        let body = self.send(W::ENDPOINT, request).await?;
        wire::decode::<W>(&body)
    }
}

impl DeviceSession for CableModem {
    async fn login(&self) -> Result<()> {
        let model = serde_json::json!({
            "username": self.username,
            "password": self.password,
        })
        .to_string();

        let request = self
            .client
            .post(self.url(wire::LOGIN)?)
            .form(&[("model", model)]);
        let body = self.send(wire::LOGIN, request).await?;

        match wire::decode_status(wire::LOGIN, &body) {
            Err(DeviceError::Api { code, message, .. }) => Err(DeviceError::LoginFailed(
                if message.is_empty() {
                    format!("error code {code}")
                } else {
                    message
                },
            )),
            other => other,
        }
    }

    async fn close(&self) -> Result<()> {
        let request = self.client.post(self.url(wire::LOGOUT)?);
        let body = self.send(wire::LOGOUT, request).await?;
        wire::decode_status(wire::LOGOUT, &body)
    }

    async fn router_sys_info(&self) -> Result<RouterSysInfo> {
        self.fetch::<wire::RouterSysInfoWire>().await
    }

    async fn router_location(&self) -> Result<RouterLocation> {
        self.fetch::<wire::RouterLocationWire>().await
    }

    async fn cm_sys_info(&self) -> Result<CmSysInfo> {
        self.fetch::<wire::CmSysInfoWire>().await
    }

    async fn cm_ds_info(&self) -> Result<CmDsInfo> {
        self.fetch::<wire::CmDsInfoWire>().await
    }

    async fn cm_us_info(&self) -> Result<CmUsInfo> {
        self.fetch::<wire::CmUsInfoWire>().await
    }

    async fn cm_us_ofdm(&self) -> Result<CmUsOfdm> {
        self.fetch::<wire::CmUsOfdmWire>().await
    }

    async fn cm_ds_ofdm(&self) -> Result<CmDsOfdm> {
        self.fetch::<wire::CmDsOfdmWire>().await
    }

    async fn wifi_clients(&self) -> Result<WifiClients> {
        self.fetch::<wire::WifiClientsWire>().await
    }
}

/// Turn a configured host into a base URL ending in `/`.
///
/// Bare hosts (`192.168.0.1`, `modem.lan:8443`) get an `https://` scheme.
fn base_url(host: &str) -> Result<Url> {
    let host = host.trim();
    let invalid = |reason: &str| DeviceError::InvalidHost {
        host: host.to_string(),
        reason: reason.to_string(),
    };

    if host.is_empty() {
        return Err(invalid("host is empty"));
    }

    let raw = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };

    let mut url = Url::parse(&raw).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(host: &str) -> Credentials<'_> {
        Credentials {
            host,
            username: "cusadmin",
            password: "password",
        }
    }

    #[test]
    fn test_base_url_bare_host() {
        let url = base_url("192.168.0.1").unwrap();
        assert_eq!(url.as_str(), "https://192.168.0.1/");
    }

    #[test]
    fn test_base_url_keeps_scheme_and_path() {
        let url = base_url("http://modem.lan:8080/admin").unwrap();
        assert_eq!(url.as_str(), "http://modem.lan:8080/admin/");
    }

    #[test]
    fn test_base_url_rejects_bad_hosts() {
        assert!(matches!(base_url(""), Err(DeviceError::InvalidHost { .. })));
        assert!(matches!(
            base_url("ftp://modem.lan"),
            Err(DeviceError::InvalidHost { .. })
        ));
    }

    #[test]
    fn test_endpoint_urls() {
        let modem = CableModem::new(creds("10.0.0.1"), DEFAULT_TIMEOUT).unwrap();
        let url = modem.url("/1/Device/CM/SysInfo").unwrap();
        assert_eq!(url.as_str(), "https://10.0.0.1/1/Device/CM/SysInfo");

        let modem = CableModem::new(creds("https://10.0.0.1/webui"), DEFAULT_TIMEOUT).unwrap();
        let url = modem.url(wire::LOGIN).unwrap();
        assert_eq!(url.as_str(), "https://10.0.0.1/webui/1/Device/Users/Login");
    }

    #[tokio::test]
    async fn test_connector_rejects_invalid_host() {
        let connector = HttpConnector::default();
        let err = connector.open(creds("   ")).await.unwrap_err();
        assert!(err.to_string().contains("host is empty"));
    }
}
