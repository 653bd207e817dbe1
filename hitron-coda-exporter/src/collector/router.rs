//! Router system and backhaul metrics.

use std::net::IpAddr;

use hitron_coda::{DeviceError, DeviceSession, RouterLocation, RouterSysInfo};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use super::{CounterF64, GaugeF64, SubCollector, Subsystem};

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct LanLabels {
    pub lan_name: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct WanLabels {
    pub wan_name: String,
}

/// Labels of the constant `router_sys_info` series.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct SysInfoLabels {
    /// Private LAN address in `addr/prefix` form, empty when not reported.
    pub lan_ip: String,
    pub wan_ip4: String,
    pub wan_ip6: String,
    pub dns4: String,
    pub dns6: String,
    /// MAC of the HFC module, the one facing the cable network.
    pub rf_mac: String,
    pub router_mode: String,
    pub location: String,
}

/// Build the `router_sys_info` labels.
///
/// When the device reports several addresses of one family, the last one
/// wins.
pub fn router_sys_info_labels(info: &RouterSysInfo, location: &RouterLocation) -> SysInfoLabels {
    let (wan_ip4, wan_ip6) = last_by_family(&info.wan_ips);
    let (dns4, dns6) = last_by_family(&info.dns);

    SysInfoLabels {
        lan_ip: lan_network(info),
        wan_ip4,
        wan_ip6,
        dns4,
        dns6,
        rf_mac: info.rf_mac.clone(),
        router_mode: info.router_mode.clone(),
        location: location.location_text.clone(),
    }
}

/// `addr/prefix`, the bare address without a prefix, or empty without an
/// address.
fn lan_network(info: &RouterSysInfo) -> String {
    match (info.priv_lan_ip, info.priv_lan_prefix) {
        (Some(ip), Some(prefix)) => format!("{ip}/{prefix}"),
        (Some(ip), None) => ip.to_string(),
        (None, _) => String::new(),
    }
}

fn last_by_family(addrs: &[IpAddr]) -> (String, String) {
    let mut v4 = String::new();
    let mut v6 = String::new();
    for addr in addrs {
        match addr {
            IpAddr::V4(a) => v4 = a.to_string(),
            IpAddr::V6(a) => match a.to_ipv4_mapped() {
                Some(mapped) => v4 = mapped.to_string(),
                None => v6 = a.to_string(),
            },
        }
    }
    (v4, v6)
}

/// Metrics from `Router/SysInfo` and `Router/Location`.
#[derive(Debug, Default)]
pub struct RouterCollector {
    system_time: GaugeF64,
    lan_receive_bytes: Family<LanLabels, CounterF64>,
    lan_transmit_bytes: Family<LanLabels, CounterF64>,
    lan_uptime: Family<LanLabels, GaugeF64>,
    wan_receive_bytes: Family<WanLabels, CounterF64>,
    wan_transmit_bytes: Family<WanLabels, CounterF64>,
    wan_receive_packets: Family<WanLabels, CounterF64>,
    wan_transmit_packets: Family<WanLabels, CounterF64>,
    wan_uptime: Family<WanLabels, GaugeF64>,
    sys_info: Family<SysInfoLabels, GaugeF64>,
}

impl SubCollector for RouterCollector {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Router
    }

    async fn collect<S: DeviceSession>(&self, session: &S) -> Result<(), DeviceError> {
        let info = session.router_sys_info().await?;
        let location = session.router_location().await?;

        self.system_time.set(info.system_time as f64);

        let lan = LanLabels {
            lan_name: info.lan_name.clone(),
        };
        self.lan_receive_bytes
            .get_or_create(&lan)
            .inc_by(info.lan_rx as f64);
        self.lan_transmit_bytes
            .get_or_create(&lan)
            .inc_by(info.lan_tx as f64);
        self.lan_uptime
            .get_or_create(&lan)
            .set(info.lan_uptime.as_secs_f64());

        let wan = WanLabels {
            wan_name: info.wan_name.clone(),
        };
        self.wan_receive_bytes
            .get_or_create(&wan)
            .inc_by(info.wan_rx as f64);
        self.wan_transmit_bytes
            .get_or_create(&wan)
            .inc_by(info.wan_tx as f64);
        self.wan_receive_packets
            .get_or_create(&wan)
            .inc_by(info.wan_rx_pkts as f64);
        self.wan_transmit_packets
            .get_or_create(&wan)
            .inc_by(info.wan_tx_pkts as f64);
        self.wan_uptime
            .get_or_create(&wan)
            .set(info.wan_uptime.as_secs_f64());

        self.sys_info
            .get_or_create(&router_sys_info_labels(&info, &location))
            .set(1.0);

        Ok(())
    }

    fn register(self, registry: &mut Registry) {
        registry.register(
            "router_system_time_seconds",
            "The router's current system time (UTC, seconds past the epoch)",
            self.system_time,
        );
        registry.register(
            "router_lan_receive_bytes",
            "Number of bytes received on the LAN interface",
            self.lan_receive_bytes,
        );
        registry.register(
            "router_lan_transmit_bytes",
            "Number of bytes transmitted on the LAN interface",
            self.lan_transmit_bytes,
        );
        registry.register(
            "router_lan_uptime_seconds",
            "The LAN interface's uptime in seconds",
            self.lan_uptime,
        );
        registry.register(
            "router_wan_receive_bytes",
            "Number of bytes received on the WAN interface",
            self.wan_receive_bytes,
        );
        registry.register(
            "router_wan_transmit_bytes",
            "Number of bytes transmitted on the WAN interface",
            self.wan_transmit_bytes,
        );
        registry.register(
            "router_wan_receive_packets",
            "Number of packets received on the WAN interface",
            self.wan_receive_packets,
        );
        registry.register(
            "router_wan_transmit_packets",
            "Number of packets transmitted on the WAN interface",
            self.wan_transmit_packets,
        );
        registry.register(
            "router_wan_uptime_seconds",
            "The WAN interface's uptime in seconds",
            self.wan_uptime,
        );
        registry.register(
            "router_sys_info",
            "A metric with a constant '1' value labeled by various system information",
            self.sys_info,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::sample_value;
    use crate::metrics::{NAMESPACE, render};
    use hitron_coda::Credentials;
    use hitron_coda::mock::{MockConnector, MockData};
    use hitron_coda::session::Connector;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_router_sys_info_labels() {
        let mut info = MockData::sample().router_sys_info;
        info.priv_lan_ip = Some(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1)));
        info.priv_lan_prefix = Some(24);
        info.wan_ips = vec![
            IpAddr::V4(Ipv4Addr::new(127, 200, 100, 10)),
            "2001:3::cafe:dead:beef".parse().unwrap(),
        ];
        info.dns = vec![
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            "2001:3::2".parse().unwrap(),
        ];
        info.rf_mac = "de:ad:be:ef:ca:fe".to_string();
        info.router_mode = "fancy!".to_string();
        let location = RouterLocation {
            location_text: "attic".to_string(),
        };

        let expected = SysInfoLabels {
            lan_ip: "192.168.0.1/24".to_string(),
            wan_ip4: "127.200.100.10".to_string(),
            wan_ip6: "2001:3::cafe:dead:beef".to_string(),
            dns4: "127.0.0.1".to_string(),
            dns6: "2001:3::2".to_string(),
            rf_mac: "de:ad:be:ef:ca:fe".to_string(),
            router_mode: "fancy!".to_string(),
            location: "attic".to_string(),
        };
        assert_eq!(router_sys_info_labels(&info, &location), expected);
    }

    #[test]
    fn test_router_sys_info_labels_in_bridge_mode() {
        let mut info = MockData::sample().router_sys_info;
        info.priv_lan_ip = None;
        info.priv_lan_prefix = None;
        info.wan_ips.clear();
        info.rf_mac.clear();
        let location = RouterLocation::default();

        let labels = router_sys_info_labels(&info, &location);
        assert_eq!(labels.lan_ip, "");
        assert_eq!(labels.wan_ip4, "");
        assert_eq!(labels.wan_ip6, "");
        assert_eq!(labels.rf_mac, "");

        info.priv_lan_ip = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(router_sys_info_labels(&info, &location).lan_ip, "10.0.0.1");
    }

    #[test]
    fn test_last_address_of_each_family_wins() {
        let addrs = vec![
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
        ];
        let (v4, v6) = last_by_family(&addrs);
        assert_eq!(v4, "10.0.0.2");
        assert_eq!(v6, "::1");

        let (v4, v6) = last_by_family(&[]);
        assert!(v4.is_empty() && v6.is_empty());
    }

    #[tokio::test]
    async fn test_router_collect() {
        let connector = MockConnector::new();
        let session = connector
            .open(Credentials {
                host: "modem",
                username: "u",
                password: "p",
            })
            .await
            .unwrap();

        let collector = RouterCollector::default();
        collector.collect(&session).await.unwrap();

        let mut registry = Registry::with_prefix(NAMESPACE);
        collector.register(&mut registry);
        let body = render(&registry).unwrap();

        assert_eq!(
            sample_value(&body, "hitron_coda_router_system_time_seconds"),
            Some(1_709_294_400.0)
        );
        assert_eq!(
            sample_value(
                &body,
                "hitron_coda_router_lan_receive_bytes_total{lan_name=\"br0\"}"
            ),
            Some(1_024.0)
        );
        assert_eq!(
            sample_value(
                &body,
                "hitron_coda_router_wan_transmit_packets_total{wan_name=\"erouter0\"}"
            ),
            Some(80.0)
        );
        assert_eq!(
            sample_value(&body, "hitron_coda_router_wan_uptime_seconds"),
            Some(1_800.0)
        );
        assert!(body.contains("lan_ip=\"192.168.0.1/24\""));
        assert!(body.contains("location=\"basement\""));
    }
}
