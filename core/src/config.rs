//! Device configuration
//!
//! Compile-time defaults. Wireless credentials are baked in from the build
//! environment (`FK_CONFIG_WIFI_1_SSID`, `FK_CONFIG_WIFI_1_PASSWORD` and the
//! same for network 2); a network with no SSID set is left out.

use hal_abstractions::NetworkInfo;

/// Most networks the device will try
pub const MAX_NETWORKS: usize = 2;

/// Timings and thresholds for the main loop
#[derive(Debug, Clone, Copy)]
pub struct DeviceConfig {
    /// Interval between acquisition cycles
    pub readings_interval_ms: u32,
    /// Interval between upload attempts
    pub upload_interval_ms: u32,
    /// Length of the audio sampling window
    pub audio_window_ms: u32,
    /// Settling time between waking the sensors and reading them
    pub sensor_warmup_ms: u32,
    /// Interval between fuel-gauge samples
    pub power_interval_ms: u32,
    /// Battery percentage below which status shows caution
    pub low_battery_percent: f32,
    /// How long one network gets to associate
    pub wifi_connect_timeout_ms: u32,
    /// How long the radio stays off after every network failed
    pub wifi_retry_ms: u32,
    /// Networks to try, in order
    pub networks: &'static [NetworkInfo],
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            readings_interval_ms: 60 * 1000,
            upload_interval_ms: 5 * 60 * 1000,
            audio_window_ms: 2000,
            sensor_warmup_ms: 500,
            power_interval_ms: 30 * 1000,
            low_battery_percent: 10.0,
            wifi_connect_timeout_ms: 10 * 1000,
            wifi_retry_ms: 5 * 60 * 1000,
            networks: configured_networks(),
        }
    }
}

const fn network(ssid: Option<&'static str>, password: Option<&'static str>) -> Option<NetworkInfo> {
    match (ssid, password) {
        (Some(ssid), Some(password)) => Some(NetworkInfo { ssid, password }),
        (Some(ssid), None) => Some(NetworkInfo { ssid, password: "" }),
        (None, _) => None,
    }
}

const NETWORK_1: Option<NetworkInfo> = network(
    option_env!("FK_CONFIG_WIFI_1_SSID"),
    option_env!("FK_CONFIG_WIFI_1_PASSWORD"),
);

const NETWORK_2: Option<NetworkInfo> = network(
    option_env!("FK_CONFIG_WIFI_2_SSID"),
    option_env!("FK_CONFIG_WIFI_2_PASSWORD"),
);

/// Drop the unset entries, keeping order
const fn compact(
    list: [Option<NetworkInfo>; MAX_NETWORKS],
) -> ([NetworkInfo; MAX_NETWORKS], usize) {
    const EMPTY: NetworkInfo = NetworkInfo {
        ssid: "",
        password: "",
    };
    let mut networks = [EMPTY; MAX_NETWORKS];
    let mut len = 0;
    let mut i = 0;
    while i < MAX_NETWORKS {
        if let Some(network) = list[i] {
            networks[len] = network;
            len += 1;
        }
        i += 1;
    }
    (networks, len)
}

static CONFIGURED: ([NetworkInfo; MAX_NETWORKS], usize) = compact([NETWORK_1, NETWORK_2]);

/// Networks baked into this build
pub fn configured_networks() -> &'static [NetworkInfo] {
    &CONFIGURED.0[..CONFIGURED.1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DeviceConfig::default();
        assert_eq!(config.audio_window_ms, 2000);
        assert_eq!(config.readings_interval_ms, 60_000);
        assert!(config.networks.len() <= MAX_NETWORKS);
    }

    #[test]
    fn test_compact_keeps_order() {
        let a = NetworkInfo {
            ssid: "a",
            password: "",
        };
        let b = NetworkInfo {
            ssid: "b",
            password: "pw",
        };
        let (networks, len) = compact([None, Some(b)]);
        assert_eq!(&networks[..len], &[b]);
        let (networks, len) = compact([Some(a), Some(b)]);
        assert_eq!(&networks[..len], &[a, b]);
    }

    #[test]
    fn test_password_is_optional() {
        assert_eq!(
            network(Some("open"), None),
            Some(NetworkInfo {
                ssid: "open",
                password: ""
            })
        );
        assert_eq!(network(None, Some("orphan")), None);
    }
}
