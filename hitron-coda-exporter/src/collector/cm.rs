//! Cable modem channel and link metrics.

use hitron_coda::{CmDsInfo, CmDsOfdm, CmSysInfo, CmUsInfo, CmUsOfdm, DeviceError, DeviceSession};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use super::{CounterF64, GaugeF64, SubCollector, Subsystem};

/// The device reports rates in bits per second.
const BITS_PER_BYTE: f64 = 8.0;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct LeaseLabels {
    pub ip: String,
    pub mac_addr: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PortLabels {
    pub port: String,
    pub channel: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct UsOfdmLabels {
    pub channel: String,
    pub enabled: String,
    pub fft_size: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DsOfdmLabels {
    pub receiver: String,
    pub fft_type: String,
}

/// Metrics from the `CM/*` endpoints.
#[derive(Debug, Default)]
pub struct CmCollector {
    us_data_rate: GaugeF64,
    ds_data_rate: GaugeF64,
    dhcp_lease: Family<LeaseLabels, GaugeF64>,

    ds_frequency: Family<PortLabels, GaugeF64>,
    ds_signal_strength: Family<PortLabels, GaugeF64>,
    ds_snr: Family<PortLabels, GaugeF64>,
    ds_received_bytes: Family<PortLabels, CounterF64>,
    ds_corrected: Family<PortLabels, CounterF64>,
    ds_uncorrected: Family<PortLabels, CounterF64>,

    us_frequency: Family<PortLabels, GaugeF64>,
    us_signal_strength: Family<PortLabels, GaugeF64>,
    us_bandwidth: Family<PortLabels, GaugeF64>,

    us_ofdm_dig_atten: Family<UsOfdmLabels, GaugeF64>,
    us_ofdm_dig_atten_bo: Family<UsOfdmLabels, GaugeF64>,
    us_ofdm_channel_bw: Family<UsOfdmLabels, GaugeF64>,
    us_ofdm_rep_power: Family<UsOfdmLabels, GaugeF64>,
    us_ofdm_target_power: Family<UsOfdmLabels, GaugeF64>,

    ds_ofdm_subcarrier_freq: Family<DsOfdmLabels, GaugeF64>,
    ds_ofdm_plc_power: Family<DsOfdmLabels, GaugeF64>,
}

impl CmCollector {
    fn record_sys_info(&self, info: &CmSysInfo) {
        self.us_data_rate
            .set(info.us_data_rate as f64 / BITS_PER_BYTE);
        self.ds_data_rate
            .set(info.ds_data_rate as f64 / BITS_PER_BYTE);
        self.dhcp_lease
            .get_or_create(&LeaseLabels {
                ip: info.ip.map(|ip| ip.to_string()).unwrap_or_default(),
                mac_addr: info.mac_addr.clone(),
            })
            .set(info.lease.as_secs_f64());
    }

    fn record_ds_info(&self, info: &CmDsInfo) {
        for port in &info.ports {
            let labels = PortLabels {
                port: port.port_id.clone(),
                channel: port.channel_id.clone(),
            };
            self.ds_frequency
                .get_or_create(&labels)
                .set(port.frequency as f64);
            self.ds_signal_strength
                .get_or_create(&labels)
                .set(port.signal_strength);
            self.ds_snr.get_or_create(&labels).set(port.snr);
            self.ds_received_bytes
                .get_or_create(&labels)
                .inc_by(port.ds_octets as f64);
            self.ds_corrected
                .get_or_create(&labels)
                .inc_by(port.correcteds as f64);
            self.ds_uncorrected
                .get_or_create(&labels)
                .inc_by(port.uncorrect as f64);
        }
    }

    fn record_us_info(&self, info: &CmUsInfo) {
        for port in &info.ports {
            let labels = PortLabels {
                port: port.port_id.clone(),
                channel: port.channel_id.clone(),
            };
            self.us_frequency
                .get_or_create(&labels)
                .set(port.frequency as f64);
            self.us_signal_strength
                .get_or_create(&labels)
                .set(port.signal_strength);
            self.us_bandwidth
                .get_or_create(&labels)
                .set(port.bandwidth as f64 / BITS_PER_BYTE);
        }
    }

    fn record_us_ofdm(&self, info: &CmUsOfdm) {
        for channel in &info.channels {
            let labels = UsOfdmLabels {
                channel: channel.id.to_string(),
                enabled: channel.enable.to_string(),
                fft_size: channel.fft_size.clone(),
            };
            self.us_ofdm_channel_bw
                .get_or_create(&labels)
                .set(channel.channel_bw);
            self.us_ofdm_dig_atten
                .get_or_create(&labels)
                .set(channel.dig_atten);
            self.us_ofdm_dig_atten_bo
                .get_or_create(&labels)
                .set(channel.dig_atten_bo);
            self.us_ofdm_rep_power
                .get_or_create(&labels)
                .set(channel.rep_power);
            self.us_ofdm_target_power
                .get_or_create(&labels)
                .set(channel.rep_power_1_6);
        }
    }

    fn record_ds_ofdm(&self, info: &CmDsOfdm) {
        for receiver in &info.receivers {
            let labels = DsOfdmLabels {
                receiver: receiver.id.to_string(),
                fft_type: receiver.fft_type.clone(),
            };
            self.ds_ofdm_plc_power
                .get_or_create(&labels)
                .set(receiver.plc_power);
            self.ds_ofdm_subcarrier_freq
                .get_or_create(&labels)
                .set(receiver.subcarrier_freq as f64);
        }
    }
}

impl SubCollector for CmCollector {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Cm
    }

    async fn collect<S: DeviceSession>(&self, session: &S) -> Result<(), DeviceError> {
        let sys_info = session.cm_sys_info().await?;
        let ds_info = session.cm_ds_info().await?;
        let us_info = session.cm_us_info().await?;
        let us_ofdm = session.cm_us_ofdm().await?;
        let ds_ofdm = session.cm_ds_ofdm().await?;

        self.record_sys_info(&sys_info);
        self.record_ds_info(&ds_info);
        self.record_us_info(&us_info);
        self.record_us_ofdm(&us_ofdm);
        self.record_ds_ofdm(&ds_ofdm);
        Ok(())
    }

    fn register(self, registry: &mut Registry) {
        registry.register(
            "cm_upstream_data_rate_bytes_per_second",
            "WAN upstream data rate, in bytes per second",
            self.us_data_rate,
        );
        registry.register(
            "cm_downstream_data_rate_bytes_per_second",
            "WAN downstream data rate, in bytes per second",
            self.ds_data_rate,
        );
        registry.register(
            "cm_dhcp_lease_duration_seconds",
            "Lease duration for DHCP on WAN interface",
            self.dhcp_lease,
        );

        registry.register(
            "cm_downstream_frequency_hertz",
            "Downstream port frequency",
            self.ds_frequency,
        );
        registry.register(
            "cm_downstream_signal_strength_dbmv",
            "Downstream data channel signal strength, in dBmV (decibels above/below 1 millivolt)",
            self.ds_signal_strength,
        );
        registry.register(
            "cm_downstream_signal_noise_ratio_db",
            "Downstream data channel signal-to-noise ratio, in dB",
            self.ds_snr,
        );
        registry.register(
            "cm_downstream_received_bytes",
            "Number of octets/bytes received",
            self.ds_received_bytes,
        );
        registry.register(
            "cm_downstream_corrected_blocks",
            "Number of blocks received that required correction due to corruption, and were corrected",
            self.ds_corrected,
        );
        registry.register(
            "cm_downstream_uncorrected_blocks",
            "Number of blocks received that required correction due to corruption, but were unable to be corrected",
            self.ds_uncorrected,
        );

        registry.register(
            "cm_upstream_frequency_hertz",
            "Upstream port frequency",
            self.us_frequency,
        );
        registry.register(
            "cm_upstream_signal_strength_dbmv",
            "Upstream data channel signal strength, in dBmV (decibels above/below 1 millivolt)",
            self.us_signal_strength,
        );
        registry.register(
            "cm_upstream_bandwidth_bytes_per_second",
            "Upstream data channel bandwidth, in bytes per second",
            self.us_bandwidth,
        );

        registry.register(
            "cm_upstream_ofdm_digital_attenuation_db",
            "The digital attenuation (signal loss) of the transmission medium on which the channel's signal is carried, in decibels (dB)",
            self.us_ofdm_dig_atten,
        );
        registry.register(
            "cm_upstream_ofdm_measured_digital_attenuation_db",
            "The measured digital attenuation of the channel's signal, in decibels (dB)",
            self.us_ofdm_dig_atten_bo,
        );
        registry.register(
            "cm_upstream_ofdm_channel_bandwidth_hz",
            "Bandwidth of this channel, expressed as the number of subchannels multiplied by the channel's FFT size, in hertz (Hz)",
            self.us_ofdm_channel_bw,
        );
        registry.register(
            "cm_upstream_ofdm_reported_power_qdbmv",
            "Reported power of this channel, in quarter-dB above/below 1mV (quarter-dBmV)",
            self.us_ofdm_rep_power,
        );
        registry.register(
            "cm_upstream_ofdm_target_power_qdbmv",
            "Target power (P1.6r_n, or power spectral density in 1.6MHz) of this channel, in quarter-dB above/below 1mV (quarter-dBmV)",
            self.us_ofdm_target_power,
        );

        registry.register(
            "cm_downstream_ofdm_subcarrier_freq_hertz",
            "Downstream frequency in Hz of the first OFDM subcarrier",
            self.ds_ofdm_subcarrier_freq,
        );
        registry.register(
            "cm_downstream_ofdm_plc_power_dbmv",
            "Power level device was instructed to use on this OFDM connection by the Physical Link Channel, in dB above/below 1mV",
            self.ds_ofdm_plc_power,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::sample_value;
    use crate::metrics::{NAMESPACE, render};
    use hitron_coda::Credentials;
    use hitron_coda::mock::{MockConnector, MockData, Query};
    use hitron_coda::session::Connector;

    fn creds() -> Credentials<'static> {
        Credentials {
            host: "modem",
            username: "u",
            password: "p",
        }
    }

    async fn collect_body(connector: &MockConnector) -> Result<String, DeviceError> {
        let session = connector.open(creds()).await?;
        let collector = CmCollector::default();
        collector.collect(&session).await?;

        let mut registry = Registry::with_prefix(NAMESPACE);
        collector.register(&mut registry);
        Ok(render(&registry).unwrap())
    }

    #[tokio::test]
    async fn test_rates_are_converted_to_bytes() {
        let body = collect_body(&MockConnector::new()).await.unwrap();

        // 800 000 000 bit/s upstream
        assert_eq!(
            sample_value(&body, "hitron_coda_cm_upstream_data_rate_bytes_per_second"),
            Some(100_000_000.0)
        );
        assert_eq!(
            sample_value(&body, "hitron_coda_cm_downstream_data_rate_bytes_per_second"),
            Some(125_000_000.0)
        );
        assert_eq!(
            sample_value(
                &body,
                "hitron_coda_cm_upstream_bandwidth_bytes_per_second{port=\"1\",channel=\"3\"}"
            ),
            Some(800_000.0)
        );
    }

    #[tokio::test]
    async fn test_channel_metrics() {
        let body = collect_body(&MockConnector::new()).await.unwrap();

        assert_eq!(
            sample_value(
                &body,
                "hitron_coda_cm_downstream_frequency_hertz{port=\"1\",channel=\"9\"}"
            ),
            Some(591_000_000.0)
        );
        assert_eq!(
            sample_value(
                &body,
                "hitron_coda_cm_downstream_uncorrected_blocks_total{port=\"1\",channel=\"9\"}"
            ),
            Some(1.0)
        );
        assert_eq!(
            sample_value(
                &body,
                "hitron_coda_cm_dhcp_lease_duration_seconds{ip=\"10.1.2.3\",mac_addr=\"00:11:22:33:44:55\"}"
            ),
            Some(604_800.0)
        );
        assert_eq!(
            sample_value(
                &body,
                "hitron_coda_cm_upstream_ofdm_target_power_qdbmv{channel=\"0\",enabled=\"true\",fft_size=\"2K\"}"
            ),
            Some(42.5)
        );
        assert_eq!(
            sample_value(
                &body,
                "hitron_coda_cm_downstream_ofdm_plc_power_dbmv{receiver=\"0\",fft_type=\"4K\"}"
            ),
            Some(-1.4)
        );
    }

    #[tokio::test]
    async fn test_unprovisioned_modem_keeps_channel_metrics() {
        let mut data = MockData::sample();
        data.cm_sys_info.ip = None;
        data.cm_sys_info.mac_addr = String::new();
        data.cm_sys_info.lease = std::time::Duration::ZERO;

        let body = collect_body(&MockConnector::with_data(data)).await.unwrap();

        assert_eq!(
            sample_value(
                &body,
                "hitron_coda_cm_dhcp_lease_duration_seconds{ip=\"\",mac_addr=\"\"}"
            ),
            Some(0.0)
        );
        assert_eq!(
            sample_value(
                &body,
                "hitron_coda_cm_downstream_signal_strength_dbmv{port=\"1\",channel=\"9\"}"
            ),
            Some(3.6)
        );
        assert!(body.contains("hitron_coda_cm_upstream_signal_strength_dbmv{"));
    }

    #[tokio::test]
    async fn test_downstream_totals_are_counters() {
        let body = collect_body(&MockConnector::new()).await.unwrap();

        for name in [
            "hitron_coda_cm_downstream_received_bytes",
            "hitron_coda_cm_downstream_corrected_blocks",
            "hitron_coda_cm_downstream_uncorrected_blocks",
        ] {
            assert!(body.contains(&format!("# TYPE {name} counter\n")), "{name}");
            assert!(body.contains(&format!("{name}_total{{")), "{name}");
        }
    }

    #[tokio::test]
    async fn test_any_query_failure_fails_collection() {
        for query in [
            Query::CmSysInfo,
            Query::CmDsInfo,
            Query::CmUsInfo,
            Query::CmUsOfdm,
            Query::CmDsOfdm,
        ] {
            let connector = MockConnector::new();
            connector.fail(query);
            assert!(collect_body(&connector).await.is_err(), "{query:?}");
        }
    }
}
