//! JSON wire format of the modem's management API.
//!
//! Every response is a flat JSON object carrying `errCode`/`errMsg` next to
//! the payload. Numeric values arrive as strings and are parsed here; an empty
//! numeric string is read as zero, which is what the modem sends for
//! counters it has not started yet.

use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{DeviceError, Result};
use crate::records::{
    CmDsInfo, CmDsOfdm, CmSysInfo, CmUsInfo, CmUsOfdm, DsOfdmReceiver, DsPort, RouterLocation,
    RouterSysInfo, UsOfdmChannel, UsPort, WifiClient, WifiClients,
};

pub(crate) const LOGIN: &str = "/1/Device/Users/Login";
pub(crate) const LOGOUT: &str = "/1/Device/Users/Logout";

/// Error code the modem uses for success.
const ERR_CODE_OK: &str = "000";

/// A response payload that decodes into a typed record.
pub(crate) trait WireRecord: DeserializeOwned + Default {
    type Record;

    /// Path of the endpoint serving this payload.
    const ENDPOINT: &'static str;

    fn into_record(self) -> Result<Self::Record>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "errCode", default)]
    err_code: String,
    #[serde(rename = "errMsg", default)]
    err_msg: String,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Default, Deserialize)]
struct Empty {}

/// Decode a data response into its record.
pub(crate) fn decode<W: WireRecord>(body: &[u8]) -> Result<W::Record> {
    let envelope: Envelope<W> = serde_json::from_slice(body)
        .map_err(|e| DeviceError::decode(W::ENDPOINT, e.to_string()))?;
    check_err_code(W::ENDPOINT, &envelope.err_code, &envelope.err_msg)?;
    envelope.body.into_record()
}

/// Decode a response that carries nothing but a status (login, logout).
pub(crate) fn decode_status(endpoint: &str, body: &[u8]) -> Result<()> {
    let envelope: Envelope<Empty> =
        serde_json::from_slice(body).map_err(|e| DeviceError::decode(endpoint, e.to_string()))?;
    check_err_code(endpoint, &envelope.err_code, &envelope.err_msg)
}

fn check_err_code(endpoint: &str, code: &str, message: &str) -> Result<()> {
    if code.is_empty() || code == ERR_CODE_OK {
        return Ok(());
    }
    Err(DeviceError::Api {
        endpoint: endpoint.to_string(),
        code: code.to_string(),
        message: message.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RouterSysInfoWire {
    system_time: String,
    lan_name: String,
    wan_name: String,
    lan_rx: String,
    lan_tx: String,
    wan_rx: String,
    wan_tx: String,
    wan_rx_pkts: String,
    wan_tx_pkts: String,
    system_lan_uptime: String,
    system_wan_uptime: String,
    priv_lan_ip: String,
    priv_lan_net: String,
    wan_ip: String,
    dns: String,
    rf_mac: String,
    router_mode: String,
}

impl WireRecord for RouterSysInfoWire {
    type Record = RouterSysInfo;
    const ENDPOINT: &'static str = "/1/Device/Router/SysInfo";

    fn into_record(self) -> Result<RouterSysInfo> {
        let ep = Self::ENDPOINT;
        Ok(RouterSysInfo {
            system_time: parse_system_time(ep, &self.system_time)?,
            lan_name: self.lan_name,
            wan_name: self.wan_name,
            lan_rx: parse_num(ep, "lanRx", &self.lan_rx)?,
            lan_tx: parse_num(ep, "lanTx", &self.lan_tx)?,
            wan_rx: parse_num(ep, "wanRx", &self.wan_rx)?,
            wan_tx: parse_num(ep, "wanTx", &self.wan_tx)?,
            wan_rx_pkts: parse_num(ep, "wanRxPkts", &self.wan_rx_pkts)?,
            wan_tx_pkts: parse_num(ep, "wanTxPkts", &self.wan_tx_pkts)?,
            lan_uptime: parse_duration_field(ep, "systemLanUptime", &self.system_lan_uptime)?,
            wan_uptime: parse_duration_field(ep, "systemWanUptime", &self.system_wan_uptime)?,
            priv_lan_ip: parse_opt_ip(ep, "privLanIp", &self.priv_lan_ip)?,
            priv_lan_prefix: parse_prefix_len(ep, &self.priv_lan_net)?,
            wan_ips: parse_ip_list(ep, "wanIp", &self.wan_ip)?,
            dns: parse_ip_list(ep, "dns", &self.dns)?,
            rf_mac: normalize_mac(ep, "rfMac", &self.rf_mac)?,
            router_mode: self.router_mode,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RouterLocationWire {
    location_text: String,
}

impl WireRecord for RouterLocationWire {
    type Record = RouterLocation;
    const ENDPOINT: &'static str = "/1/Device/Router/Location";

    fn into_record(self) -> Result<RouterLocation> {
        Ok(RouterLocation {
            location_text: self.location_text,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CmSysInfoWire {
    #[serde(rename = "UsDataRate")]
    us_data_rate: String,
    #[serde(rename = "DsDataRate")]
    ds_data_rate: String,
    #[serde(rename = "ip")]
    ip: String,
    #[serde(rename = "macAddr")]
    mac_addr: String,
    #[serde(rename = "dhcpLeaseTime")]
    lease: String,
}

impl WireRecord for CmSysInfoWire {
    type Record = CmSysInfo;
    const ENDPOINT: &'static str = "/1/Device/CM/SysInfo";

    fn into_record(self) -> Result<CmSysInfo> {
        let ep = Self::ENDPOINT;
        Ok(CmSysInfo {
            us_data_rate: parse_num(ep, "UsDataRate", &self.us_data_rate)?,
            ds_data_rate: parse_num(ep, "DsDataRate", &self.ds_data_rate)?,
            ip: parse_opt_ip(ep, "ip", &self.ip)?,
            mac_addr: normalize_mac(ep, "macAddr", &self.mac_addr)?,
            lease: parse_duration_field(ep, "dhcpLeaseTime", &self.lease)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CmDsInfoWire {
    #[serde(rename = "Freq_List")]
    ports: Vec<DsPortWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DsPortWire {
    port_id: String,
    channel_id: String,
    frequency: String,
    signal_strength: String,
    snr: String,
    dsoctets: String,
    correcteds: String,
    uncorrect: String,
}

impl WireRecord for CmDsInfoWire {
    type Record = CmDsInfo;
    const ENDPOINT: &'static str = "/1/Device/CM/DsInfo";

    fn into_record(self) -> Result<CmDsInfo> {
        let ep = Self::ENDPOINT;
        let ports = self
            .ports
            .into_iter()
            .map(|p| {
                Ok(DsPort {
                    frequency: parse_num(ep, "frequency", &p.frequency)?,
                    signal_strength: parse_num(ep, "signalStrength", &p.signal_strength)?,
                    snr: parse_num(ep, "snr", &p.snr)?,
                    ds_octets: parse_num(ep, "dsoctets", &p.dsoctets)?,
                    correcteds: parse_num(ep, "correcteds", &p.correcteds)?,
                    uncorrect: parse_num(ep, "uncorrect", &p.uncorrect)?,
                    port_id: p.port_id,
                    channel_id: p.channel_id,
                })
            })
            .collect::<Result<_>>()?;
        Ok(CmDsInfo { ports })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CmUsInfoWire {
    #[serde(rename = "Freq_List")]
    ports: Vec<UsPortWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UsPortWire {
    port_id: String,
    channel_id: String,
    frequency: String,
    signal_strength: String,
    bandwidth: String,
}

impl WireRecord for CmUsInfoWire {
    type Record = CmUsInfo;
    const ENDPOINT: &'static str = "/1/Device/CM/UsInfo";

    fn into_record(self) -> Result<CmUsInfo> {
        let ep = Self::ENDPOINT;
        let ports = self
            .ports
            .into_iter()
            .map(|p| {
                Ok(UsPort {
                    frequency: parse_num(ep, "frequency", &p.frequency)?,
                    signal_strength: parse_num(ep, "signalStrength", &p.signal_strength)?,
                    bandwidth: parse_num(ep, "bandwidth", &p.bandwidth)?,
                    port_id: p.port_id,
                    channel_id: p.channel_id,
                })
            })
            .collect::<Result<_>>()?;
        Ok(CmUsInfo { ports })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CmUsOfdmWire {
    #[serde(rename = "Channel_List")]
    channels: Vec<UsOfdmChannelWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UsOfdmChannelWire {
    #[serde(rename = "uschindex")]
    id: String,
    state: String,
    #[serde(rename = "fftVal")]
    fft_size: String,
    #[serde(rename = "channelBw")]
    channel_bw: String,
    #[serde(rename = "digAtten")]
    dig_atten: String,
    #[serde(rename = "digAttenBo")]
    dig_atten_bo: String,
    #[serde(rename = "repPower")]
    rep_power: String,
    #[serde(rename = "repPower1_6")]
    rep_power_1_6: String,
}

impl WireRecord for CmUsOfdmWire {
    type Record = CmUsOfdm;
    const ENDPOINT: &'static str = "/1/Device/CM/UsOfdm";

    fn into_record(self) -> Result<CmUsOfdm> {
        let ep = Self::ENDPOINT;
        let channels = self
            .channels
            .into_iter()
            .map(|c| {
                Ok(UsOfdmChannel {
                    id: parse_num(ep, "uschindex", &c.id)?,
                    enable: parse_enabled(ep, &c.state)?,
                    channel_bw: parse_num(ep, "channelBw", &c.channel_bw)?,
                    dig_atten: parse_num(ep, "digAtten", &c.dig_atten)?,
                    dig_atten_bo: parse_num(ep, "digAttenBo", &c.dig_atten_bo)?,
                    rep_power: parse_num(ep, "repPower", &c.rep_power)?,
                    rep_power_1_6: parse_num(ep, "repPower1_6", &c.rep_power_1_6)?,
                    fft_size: c.fft_size,
                })
            })
            .collect::<Result<_>>()?;
        Ok(CmUsOfdm { channels })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CmDsOfdmWire {
    #[serde(rename = "Receiver_List")]
    receivers: Vec<DsOfdmReceiverWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DsOfdmReceiverWire {
    #[serde(rename = "receive")]
    id: String,
    #[serde(rename = "ffttype")]
    fft_type: String,
    #[serde(rename = "Subcarr0freqFreq")]
    subcarrier_freq: String,
    #[serde(rename = "plcpower")]
    plc_power: String,
}

impl WireRecord for CmDsOfdmWire {
    type Record = CmDsOfdm;
    const ENDPOINT: &'static str = "/1/Device/CM/DsOfdm";

    fn into_record(self) -> Result<CmDsOfdm> {
        let ep = Self::ENDPOINT;
        let receivers = self
            .receivers
            .into_iter()
            .map(|r| {
                Ok(DsOfdmReceiver {
                    id: parse_num(ep, "receive", &r.id)?,
                    subcarrier_freq: parse_num(ep, "Subcarr0freqFreq", &r.subcarrier_freq)?,
                    plc_power: parse_num(ep, "plcpower", &r.plc_power)?,
                    fft_type: r.fft_type,
                })
            })
            .collect::<Result<_>>()?;
        Ok(CmDsOfdm { receivers })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WifiClientsWire {
    #[serde(rename = "Client_List")]
    clients: Vec<WifiClientWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WifiClientWire {
    band: String,
    hostname: String,
    phy_mode: String,
    ssid: String,
    mac_addr: String,
    rssi: String,
    data_rate: String,
    bandwidth: String,
}

impl WireRecord for WifiClientsWire {
    type Record = WifiClients;
    const ENDPOINT: &'static str = "/1/Device/WiFi/Client";

    fn into_record(self) -> Result<WifiClients> {
        let ep = Self::ENDPOINT;
        let clients = self
            .clients
            .into_iter()
            .map(|c| {
                Ok(WifiClient {
                    mac_addr: normalize_mac(ep, "macAddr", &c.mac_addr)?,
                    rssi: parse_num(ep, "rssi", &c.rssi)?,
                    data_rate: parse_num(ep, "dataRate", &c.data_rate)?,
                    bandwidth: parse_bandwidth_hz(ep, &c.bandwidth)?,
                    band: c.band,
                    hostname: c.hostname,
                    phy_mode: c.phy_mode,
                    ssid: c.ssid,
                })
            })
            .collect::<Result<_>>()?;
        Ok(WifiClients { clients })
    }
}

// ---------------------------------------------------------------------------
// Field parsers
// ---------------------------------------------------------------------------

fn field_error(endpoint: &str, field: &str, value: &str, reason: impl Display) -> DeviceError {
    DeviceError::decode(endpoint, format!("{field} = {value:?}: {reason}"))
}

fn parse_num<T>(endpoint: &str, field: &str, value: &str) -> Result<T>
where
    T: FromStr + Default,
    T::Err: Display,
{
    let value = value.trim();
    if value.is_empty() {
        return Ok(T::default());
    }
    value
        .parse()
        .map_err(|e| field_error(endpoint, field, value, e))
}

fn parse_ip(endpoint: &str, field: &str, value: &str) -> Result<IpAddr> {
    value
        .trim()
        .parse()
        .map_err(|e| field_error(endpoint, field, value, e))
}

/// An address the modem leaves empty when it has none.
fn parse_opt_ip(endpoint: &str, field: &str, value: &str) -> Result<Option<IpAddr>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    parse_ip(endpoint, field, value).map(Some)
}

/// Parse a comma or whitespace separated address list.
fn parse_ip_list(endpoint: &str, field: &str, value: &str) -> Result<Vec<IpAddr>> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| parse_ip(endpoint, field, s))
        .collect()
}

/// Prefix length from a dotted netmask (`255.255.255.0`) or a bare length.
/// Empty means no network is configured.
fn parse_prefix_len(endpoint: &str, value: &str) -> Result<Option<u8>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let bare = value.trim_start_matches('/');
    if let Ok(len) = bare.parse::<u8>() {
        if len <= 32 {
            return Ok(Some(len));
        }
    }

    let mask: Ipv4Addr = value
        .parse()
        .map_err(|e| field_error(endpoint, "privLanNet", value, e))?;
    let bits = u32::from(mask);
    let len = bits.leading_ones();
    if bits.count_ones() != len {
        return Err(field_error(
            endpoint,
            "privLanNet",
            value,
            "netmask is not contiguous",
        ));
    }
    Ok(Some(len as u8))
}

/// Lower-case colon separated form of a 48-bit MAC address. An empty value
/// stays empty.
fn normalize_mac(endpoint: &str, field: &str, value: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Ok(String::new());
    }
    let hex: String = value
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(field_error(endpoint, field, value, "not a MAC address"));
    }

    let octets: Vec<&str> = (0..12).step_by(2).map(|i| &hex[i..i + 2]).collect();
    Ok(octets.join(":"))
}

fn parse_system_time(endpoint: &str, value: &str) -> Result<i64> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    if let Ok(secs) = value.parse::<i64>() {
        return Ok(secs);
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|t| t.and_utc().timestamp())
        .map_err(|e| field_error(endpoint, "systemTime", value, e))
}

fn parse_duration_field(endpoint: &str, field: &str, value: &str) -> Result<Duration> {
    if value.trim().is_empty() {
        return Ok(Duration::ZERO);
    }
    parse_duration(value).ok_or_else(|| field_error(endpoint, field, value, "unrecognized duration"))
}

/// Parse the modem's human readable durations.
///
/// Both `12 Days,03 Hours,41 Minutes,09 Seconds` (number before unit) and
/// `D: 6 H: 23 M: 59 S: 2` (unit before number) are accepted. A bare number
/// is seconds.
pub(crate) fn parse_duration(value: &str) -> Option<Duration> {
    let mut total: u64 = 0;
    let mut pending_num: Option<u64> = None;
    let mut pending_unit: Option<u64> = None;
    let mut seen = false;

    let tokens = value
        .split(|c: char| c == ',' || c == ':' || c.is_whitespace())
        .filter(|t| !t.is_empty());

    for token in tokens {
        if let Ok(n) = token.parse::<u64>() {
            match pending_unit.take() {
                Some(unit) => {
                    total = total.checked_add(n.checked_mul(unit)?)?;
                    seen = true;
                }
                None if pending_num.is_none() => pending_num = Some(n),
                None => return None,
            }
        } else {
            let unit = unit_seconds(token)?;
            match pending_num.take() {
                Some(n) => {
                    total = total.checked_add(n.checked_mul(unit)?)?;
                    seen = true;
                }
                None if pending_unit.is_none() => pending_unit = Some(unit),
                None => return None,
            }
        }
    }

    match (pending_num, pending_unit, seen) {
        (Some(n), None, false) => Some(Duration::from_secs(n)),
        (None, None, true) => Some(Duration::from_secs(total)),
        _ => None,
    }
}

fn unit_seconds(token: &str) -> Option<u64> {
    match token.chars().next()?.to_ascii_lowercase() {
        'd' => Some(86_400),
        'h' => Some(3_600),
        'm' => Some(60),
        's' => Some(1),
        _ => None,
    }
}

fn parse_enabled(endpoint: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "enable" | "enabled" | "1" | "true" => Ok(true),
        "disable" | "disabled" | "0" | "false" | "" => Ok(false),
        _ => Err(field_error(endpoint, "state", value, "expected ENABLE or DISABLE")),
    }
}

/// Channel bandwidth in hertz from `20MHz`, `40M`, `80 MHz` or plain hertz.
fn parse_bandwidth_hz(endpoint: &str, value: &str) -> Result<u64> {
    let raw = value.trim();
    if raw.is_empty() {
        return Ok(0);
    }

    let lower = raw.to_ascii_lowercase();
    let without_hz = lower.strip_suffix("hz").unwrap_or(&lower).trim_end();
    let (number, multiplier) = match without_hz.chars().last() {
        Some('k') => (&without_hz[..without_hz.len() - 1], 1e3),
        Some('m') => (&without_hz[..without_hz.len() - 1], 1e6),
        Some('g') => (&without_hz[..without_hz.len() - 1], 1e9),
        _ => (without_hz, 1.0),
    };

    let n: f64 = number
        .trim()
        .parse()
        .map_err(|e| field_error(endpoint, "bandwidth", raw, e))?;
    if !n.is_finite() || n < 0.0 {
        return Err(field_error(endpoint, "bandwidth", raw, "out of range"));
    }
    Ok((n * multiplier).round() as u64)
}
