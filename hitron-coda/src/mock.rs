//! Scripted in-memory device for tests.
//!
//! [`MockConnector`] hands out sessions that answer from a shared
//! [`MockData`] and can be told to fail or hang on individual queries.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{DeviceError, Result};
use crate::records::{
    CmDsInfo, CmDsOfdm, CmSysInfo, CmUsInfo, CmUsOfdm, DsOfdmReceiver, DsPort, RouterLocation,
    RouterSysInfo, UsOfdmChannel, UsPort, WifiClient, WifiClients,
};
use crate::session::{Connector, Credentials, DeviceSession};

/// One data query of [`DeviceSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    RouterSysInfo,
    RouterLocation,
    CmSysInfo,
    CmDsInfo,
    CmUsInfo,
    CmUsOfdm,
    CmDsOfdm,
    WifiClients,
}

impl Query {
    /// Endpoint the real device serves this query from.
    pub fn endpoint(self) -> &'static str {
        match self {
            Query::RouterSysInfo => "/1/Device/Router/SysInfo",
            Query::RouterLocation => "/1/Device/Router/Location",
            Query::CmSysInfo => "/1/Device/CM/SysInfo",
            Query::CmDsInfo => "/1/Device/CM/DsInfo",
            Query::CmUsInfo => "/1/Device/CM/UsInfo",
            Query::CmUsOfdm => "/1/Device/CM/UsOfdm",
            Query::CmDsOfdm => "/1/Device/CM/DsOfdm",
            Query::WifiClients => "/1/Device/WiFi/Client",
        }
    }
}

/// Records served by mock sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct MockData {
    pub router_sys_info: RouterSysInfo,
    pub router_location: RouterLocation,
    pub cm_sys_info: CmSysInfo,
    pub cm_ds_info: CmDsInfo,
    pub cm_us_info: CmUsInfo,
    pub cm_us_ofdm: CmUsOfdm,
    pub cm_ds_ofdm: CmDsOfdm,
    pub wifi_clients: WifiClients,
}

impl MockData {
    /// A plausible single-device snapshot.
    pub fn sample() -> Self {
        Self {
            router_sys_info: RouterSysInfo {
                system_time: 1_709_294_400,
                lan_name: "br0".to_string(),
                wan_name: "erouter0".to_string(),
                lan_rx: 1_024,
                lan_tx: 2_048,
                wan_rx: 4_096,
                wan_tx: 8_192,
                wan_rx_pkts: 40,
                wan_tx_pkts: 80,
                lan_uptime: Duration::from_secs(3_600),
                wan_uptime: Duration::from_secs(1_800),
                priv_lan_ip: Some(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1))),
                priv_lan_prefix: Some(24),
                wan_ips: vec![
                    IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)),
                    IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 7)),
                ],
                dns: vec![
                    IpAddr::V4(Ipv4Addr::new(203, 0, 113, 53)),
                    IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x53)),
                ],
                rf_mac: "de:ad:be:ef:ca:fe".to_string(),
                router_mode: "Dualstack".to_string(),
            },
            router_location: RouterLocation {
                location_text: "basement".to_string(),
            },
            cm_sys_info: CmSysInfo {
                us_data_rate: 800_000_000,
                ds_data_rate: 1_000_000_000,
                ip: Some(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))),
                mac_addr: "00:11:22:33:44:55".to_string(),
                lease: Duration::from_secs(604_800),
            },
            cm_ds_info: CmDsInfo {
                ports: vec![DsPort {
                    port_id: "1".to_string(),
                    channel_id: "9".to_string(),
                    frequency: 591_000_000,
                    signal_strength: 3.6,
                    snr: 40.9,
                    ds_octets: 123_456,
                    correcteds: 7,
                    uncorrect: 1,
                }],
            },
            cm_us_info: CmUsInfo {
                ports: vec![UsPort {
                    port_id: "1".to_string(),
                    channel_id: "3".to_string(),
                    frequency: 38_596_000,
                    signal_strength: 44.25,
                    bandwidth: 6_400_000,
                }],
            },
            cm_us_ofdm: CmUsOfdm {
                channels: vec![UsOfdmChannel {
                    id: 0,
                    enable: true,
                    fft_size: "2K".to_string(),
                    channel_bw: 44.0,
                    dig_atten: 1.5,
                    dig_atten_bo: 0.5,
                    rep_power: 170.0,
                    rep_power_1_6: 42.5,
                }],
            },
            cm_ds_ofdm: CmDsOfdm {
                receivers: vec![DsOfdmReceiver {
                    id: 0,
                    fft_type: "4K".to_string(),
                    subcarrier_freq: 275_600_000,
                    plc_power: -1.4,
                }],
            },
            wifi_clients: WifiClients {
                clients: vec![WifiClient {
                    band: "5G".to_string(),
                    hostname: "laptop".to_string(),
                    phy_mode: "11ac".to_string(),
                    ssid: "home".to_string(),
                    mac_addr: "aa:bb:cc:dd:ee:ff".to_string(),
                    rssi: -52,
                    data_rate: 866_000_000,
                    bandwidth: 80_000_000,
                }],
            },
        }
    }
}

impl Default for MockData {
    fn default() -> Self {
        Self::sample()
    }
}

#[derive(Debug, Default)]
struct MockState {
    data: MockData,
    fail_open: bool,
    fail_login: bool,
    failing: HashSet<Query>,
    stalled: HashSet<Query>,
    latency: Duration,
    opens: usize,
    logins: usize,
    closes: usize,
    hosts: Vec<String>,
}

/// Connector whose sessions answer from memory.
///
/// Clones share state, so a test can keep one handle to script and inspect
/// while the exporter owns another.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    /// Connector serving [`MockData::sample`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: MockData) -> Self {
        let connector = Self::default();
        connector.state.lock().data = data;
        connector
    }

    /// Replace the served records.
    pub fn set_data(&self, data: MockData) {
        self.state.lock().data = data;
    }

    /// Make `open` fail.
    pub fn fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Make `login` fail.
    pub fn fail_login(&self, fail: bool) {
        self.state.lock().fail_login = fail;
    }

    /// Make `query` return an error.
    pub fn fail(&self, query: Query) {
        self.state.lock().failing.insert(query);
    }

    /// Make `query` never complete.
    pub fn stall(&self, query: Query) {
        self.state.lock().stalled.insert(query);
    }

    /// Delay every data query by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Clear failures and stalls.
    pub fn heal(&self) {
        let mut state = self.state.lock();
        state.fail_open = false;
        state.fail_login = false;
        state.failing.clear();
        state.stalled.clear();
    }

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    pub fn logins(&self) -> usize {
        self.state.lock().logins
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    /// Host passed to the most recent `open`.
    pub fn last_host(&self) -> Option<String> {
        self.state.lock().hosts.last().cloned()
    }

    /// Every host passed to `open`, oldest first.
    pub fn hosts(&self) -> Vec<String> {
        self.state.lock().hosts.clone()
    }
}

impl Connector for MockConnector {
    type Session = MockSession;

    async fn open(&self, credentials: Credentials<'_>) -> Result<MockSession> {
        let mut state = self.state.lock();
        state.opens += 1;
        state.hosts.push(credentials.host.to_string());

        if state.fail_open {
            return Err(DeviceError::InvalidHost {
                host: credentials.host.to_string(),
                reason: "mock open failure".to_string(),
            });
        }

        Ok(MockSession {
            state: Arc::clone(&self.state),
        })
    }
}

/// Session handed out by [`MockConnector`].
#[derive(Debug)]
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
}

enum Outcome<T> {
    Ready(Result<T>),
    Stall,
}

impl MockSession {
    async fn answer<T>(&self, query: Query, pick: impl FnOnce(&MockData) -> T) -> Result<T> {
        let (outcome, latency) = {
            let state = self.state.lock();
            let outcome = if state.stalled.contains(&query) {
                Outcome::Stall
            } else if state.failing.contains(&query) {
                Outcome::Ready(Err(DeviceError::Status {
                    endpoint: query.endpoint().to_string(),
                    status: 500,
                }))
            } else {
                Outcome::Ready(Ok(pick(&state.data)))
            };
            (outcome, state.latency)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match outcome {
            Outcome::Ready(result) => result,
            Outcome::Stall => std::future::pending().await,
        }
    }
}

impl DeviceSession for MockSession {
    async fn login(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.logins += 1;
        if state.fail_login {
            return Err(DeviceError::LoginFailed("mock login failure".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().closes += 1;
        Ok(())
    }

    async fn router_sys_info(&self) -> Result<RouterSysInfo> {
        self.answer(Query::RouterSysInfo, |d| d.router_sys_info.clone())
            .await
    }

    async fn router_location(&self) -> Result<RouterLocation> {
        self.answer(Query::RouterLocation, |d| d.router_location.clone())
            .await
    }

    async fn cm_sys_info(&self) -> Result<CmSysInfo> {
        self.answer(Query::CmSysInfo, |d| d.cm_sys_info.clone()).await
    }

    async fn cm_ds_info(&self) -> Result<CmDsInfo> {
        self.answer(Query::CmDsInfo, |d| d.cm_ds_info.clone()).await
    }

    async fn cm_us_info(&self) -> Result<CmUsInfo> {
        self.answer(Query::CmUsInfo, |d| d.cm_us_info.clone()).await
    }

    async fn cm_us_ofdm(&self) -> Result<CmUsOfdm> {
        self.answer(Query::CmUsOfdm, |d| d.cm_us_ofdm.clone()).await
    }

    async fn cm_ds_ofdm(&self) -> Result<CmDsOfdm> {
        self.answer(Query::CmDsOfdm, |d| d.cm_ds_ofdm.clone()).await
    }

    async fn wifi_clients(&self) -> Result<WifiClients> {
        self.answer(Query::WifiClients, |d| d.wifi_clients.clone())
            .await
    }
}
