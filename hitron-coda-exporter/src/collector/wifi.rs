//! Wireless client metrics.

use hitron_coda::{DeviceError, DeviceSession, WifiClient};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use super::{GaugeF64, SubCollector, Subsystem};

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ClientLabels {
    pub band: String,
    pub hostname: String,
    pub phy_mode: String,
    pub ssid: String,
    pub mac_addr: String,
}

impl From<&WifiClient> for ClientLabels {
    fn from(client: &WifiClient) -> Self {
        Self {
            band: client.band.clone(),
            hostname: client.hostname.clone(),
            phy_mode: client.phy_mode.clone(),
            ssid: client.ssid.clone(),
            mac_addr: client.mac_addr.clone(),
        }
    }
}

/// Metrics from `WiFi/Client`.
#[derive(Debug, Default)]
pub struct WifiCollector {
    rssi: Family<ClientLabels, GaugeF64>,
    data_rate: Family<ClientLabels, GaugeF64>,
    bandwidth: Family<ClientLabels, GaugeF64>,
}

impl SubCollector for WifiCollector {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Wifi
    }

    async fn collect<S: DeviceSession>(&self, session: &S) -> Result<(), DeviceError> {
        let clients = session.wifi_clients().await?;

        for client in &clients.clients {
            let labels = ClientLabels::from(client);
            self.rssi.get_or_create(&labels).set(f64::from(client.rssi));
            // bits/s to bytes/s
            self.data_rate
                .get_or_create(&labels)
                .set(client.data_rate as f64 / 8.0);
            self.bandwidth
                .get_or_create(&labels)
                .set(client.bandwidth as f64);
        }
        Ok(())
    }

    fn register(self, registry: &mut Registry) {
        registry.register(
            "wifi_client_rssi_db",
            "Received Signal Strength Indicator. Estimated measure of power level that a client is receiving from AP, in dB",
            self.rssi,
        );
        registry.register(
            "wifi_client_data_rate_bytes_per_second",
            "Data rate for this client, in bytes per second (converted from bits/sec)",
            self.data_rate,
        );
        registry.register(
            "wifi_client_bandwidth_hertz",
            "Channel bandwidth, in hertz",
            self.bandwidth,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::sample_value;
    use crate::metrics::{NAMESPACE, render};
    use hitron_coda::mock::{MockConnector, MockData};
    use hitron_coda::session::Connector;
    use hitron_coda::{Credentials, WifiClients};

    #[tokio::test]
    async fn test_wifi_collect() {
        let mut data = MockData::sample();
        let mut second = data.wifi_clients.clients[0].clone();
        second.hostname = "phone".to_string();
        second.mac_addr = "11:22:33:44:55:66".to_string();
        second.rssi = -70;
        second.data_rate = 144_000_000;
        data.wifi_clients.clients.push(second);

        let connector = MockConnector::with_data(data);
        let session = connector
            .open(Credentials {
                host: "modem",
                username: "u",
                password: "p",
            })
            .await
            .unwrap();

        let collector = WifiCollector::default();
        collector.collect(&session).await.unwrap();
        let mut registry = Registry::with_prefix(NAMESPACE);
        collector.register(&mut registry);
        let body = render(&registry).unwrap();

        let laptop = "{band=\"5G\",hostname=\"laptop\",phy_mode=\"11ac\",ssid=\"home\",mac_addr=\"aa:bb:cc:dd:ee:ff\"}";
        assert_eq!(
            sample_value(&body, &format!("hitron_coda_wifi_client_rssi_db{laptop}")),
            Some(-52.0)
        );
        assert_eq!(
            sample_value(
                &body,
                &format!("hitron_coda_wifi_client_data_rate_bytes_per_second{laptop}")
            ),
            Some(108_250_000.0)
        );
        assert_eq!(
            sample_value(
                &body,
                &format!("hitron_coda_wifi_client_bandwidth_hertz{laptop}")
            ),
            Some(80_000_000.0)
        );
        assert!(body.contains("hostname=\"phone\""));
    }

    #[tokio::test]
    async fn test_wifi_no_clients() {
        let mut data = MockData::sample();
        data.wifi_clients = WifiClients::default();
        let connector = MockConnector::with_data(data);
        let session = connector
            .open(Credentials {
                host: "modem",
                username: "u",
                password: "p",
            })
            .await
            .unwrap();

        let collector = WifiCollector::default();
        collector.collect(&session).await.unwrap();
        let mut registry = Registry::with_prefix(NAMESPACE);
        collector.register(&mut registry);
        let body = render(&registry).unwrap();

        // descriptors without samples
        assert!(body.contains("# TYPE hitron_coda_wifi_client_rssi_db gauge"));
        assert!(!body.contains("hitron_coda_wifi_client_rssi_db{"));
    }
}
