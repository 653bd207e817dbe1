//! Typed device records.
//!
//! Values are parsed but not converted: rates stay in the units the modem
//! reports (bits per second), so unit handling stays with the consumer.

use std::net::IpAddr;
use std::time::Duration;

/// Router-side system information (`/1/Device/Router/SysInfo`).
#[derive(Debug, Clone, PartialEq)]
pub struct RouterSysInfo {
    /// Device clock, seconds since the Unix epoch.
    pub system_time: i64,
    pub lan_name: String,
    pub wan_name: String,
    pub lan_rx: u64,
    pub lan_tx: u64,
    pub wan_rx: u64,
    pub wan_tx: u64,
    pub wan_rx_pkts: u64,
    pub wan_tx_pkts: u64,
    pub lan_uptime: Duration,
    pub wan_uptime: Duration,
    /// `None` while the modem reports no LAN address (bridge mode).
    pub priv_lan_ip: Option<IpAddr>,
    /// Prefix length of the private LAN network.
    pub priv_lan_prefix: Option<u8>,
    pub wan_ips: Vec<IpAddr>,
    pub dns: Vec<IpAddr>,
    /// MAC address of the HFC (coax) module, lower-case colon form. Empty
    /// when not reported.
    pub rf_mac: String,
    pub router_mode: String,
}

/// Free-form device location (`/1/Device/Router/Location`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterLocation {
    pub location_text: String,
}

/// Cable modem system information (`/1/Device/CM/SysInfo`).
#[derive(Debug, Clone, PartialEq)]
pub struct CmSysInfo {
    /// WAN upstream rate in bits per second.
    pub us_data_rate: u64,
    /// WAN downstream rate in bits per second.
    pub ds_data_rate: u64,
    /// `None` until the modem holds a DHCP lease.
    pub ip: Option<IpAddr>,
    /// Empty when not reported.
    pub mac_addr: String,
    pub lease: Duration,
}

/// Downstream QAM channels (`/1/Device/CM/DsInfo`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CmDsInfo {
    pub ports: Vec<DsPort>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DsPort {
    pub port_id: String,
    pub channel_id: String,
    /// Hertz.
    pub frequency: u64,
    /// dBmV.
    pub signal_strength: f64,
    /// dB.
    pub snr: f64,
    pub ds_octets: u64,
    pub correcteds: u64,
    pub uncorrect: u64,
}

/// Upstream QAM channels (`/1/Device/CM/UsInfo`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CmUsInfo {
    pub ports: Vec<UsPort>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsPort {
    pub port_id: String,
    pub channel_id: String,
    /// Hertz.
    pub frequency: u64,
    /// dBmV.
    pub signal_strength: f64,
    /// Bits per second.
    pub bandwidth: u64,
}

/// Upstream OFDMA channels (`/1/Device/CM/UsOfdm`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CmUsOfdm {
    pub channels: Vec<UsOfdmChannel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsOfdmChannel {
    pub id: u32,
    pub enable: bool,
    pub fft_size: String,
    pub channel_bw: f64,
    pub dig_atten: f64,
    pub dig_atten_bo: f64,
    /// Quarter-dBmV.
    pub rep_power: f64,
    /// Quarter-dBmV, power spectral density in 1.6MHz.
    pub rep_power_1_6: f64,
}

/// Downstream OFDM receivers (`/1/Device/CM/DsOfdm`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CmDsOfdm {
    pub receivers: Vec<DsOfdmReceiver>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DsOfdmReceiver {
    pub id: u32,
    pub fft_type: String,
    /// Frequency of the first subcarrier, hertz.
    pub subcarrier_freq: u64,
    /// dBmV.
    pub plc_power: f64,
}

/// Associated wireless clients (`/1/Device/WiFi/Client`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WifiClients {
    pub clients: Vec<WifiClient>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WifiClient {
    pub band: String,
    pub hostname: String,
    pub phy_mode: String,
    pub ssid: String,
    pub mac_addr: String,
    /// dB.
    pub rssi: i32,
    /// Bits per second.
    pub data_rate: u64,
    /// Hertz.
    pub bandwidth: u64,
}
