//! Shared payload types used by commands and responses.

use serde::{Deserialize, Serialize};

/// Optional tuning parameters for a Wi-Fi scan command.
///
/// Absent fields are omitted from the encoded command entirely so a plain
/// scan stays within the payload budget.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WifiScanParams {
    /// Dwell time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    /// Scan mode hint (e.g. "active", "passive").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Restrict the scan to these channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<u32>>,
}

/// A Wi-Fi network reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiNetwork {
    /// Network name (may be empty for hidden networks).
    pub ssid: String,
    /// Access point MAC address.
    pub bssid: String,
    /// Signal strength in dBm.
    pub rssi: i32,
    /// Wi-Fi channel.
    pub channel: u32,
    /// Encryption label ("wpa2", "wpa3", "wep", "open", ...).
    pub encryption: String,
}

impl WifiNetwork {
    /// Whether the network uses any encryption at all.
    pub fn secure(&self) -> bool {
        !self.encryption.eq_ignore_ascii_case("open")
    }
}

/// A host discovered during a network scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// IPv4 address as reported by the device.
    pub ip: String,
    /// MAC address.
    pub mac: String,
    /// Vendor string from the device's OUI lookup.
    #[serde(default)]
    pub vendor: Option<String>,
}

/// One open port on a scanned host.
///
/// This is both the wire shape of a `port_summary` entry and the engine's
/// accumulated record for streamed `port_result`/`port_raw` messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// Port number.
    pub port: u16,
    /// Transport protocol, normally "tcp".
    #[serde(default)]
    pub protocol: Option<String>,
    /// Service name guess.
    #[serde(default)]
    pub service: Option<String>,
    /// Banner captured from the service, if any.
    #[serde(default)]
    pub banner: Option<String>,
    /// Service version string, if probed.
    #[serde(default)]
    pub version: Option<String>,
}

/// Device status snapshot.
///
/// The firmware has shipped several spellings for some of these fields;
/// aliases keep older builds decodable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Battery charge percentage.
    #[serde(default)]
    pub battery: Option<i32>,
    /// Whether the device is charging.
    #[serde(default)]
    pub charging: Option<bool>,
    /// Whether a companion is connected over the link.
    #[serde(default, alias = "btConnected")]
    pub bt_connected: Option<bool>,
    /// Whether the device has joined a Wi-Fi network.
    #[serde(default, alias = "wifiConnected")]
    pub wifi_connected: Option<bool>,
    /// SSID of the joined network.
    #[serde(default)]
    pub ssid: Option<String>,
    /// Legacy SSID field ("disconnected"/"unknown" when not joined).
    #[serde(default)]
    pub wifi: Option<String>,
    /// Signal strength of the joined network in dBm.
    #[serde(default)]
    pub rssi: Option<i32>,
    /// Name of the operation currently running on the device.
    #[serde(default)]
    pub operation: Option<String>,
    /// Legacy name for `operation`.
    #[serde(default)]
    pub stage: Option<String>,
    /// Progress of the running operation in percent.
    #[serde(default)]
    pub progress: Option<u32>,
    /// Legacy name for `progress`.
    #[serde(default)]
    pub percent: Option<u32>,
    /// Device uptime in seconds.
    #[serde(default)]
    pub uptime: Option<u64>,
}

impl DeviceStatus {
    /// SSID the device claims to be joined to, normalizing the legacy
    /// "disconnected"/"unknown" placeholders away.
    pub fn reported_ssid(&self) -> Option<&str> {
        self.ssid
            .as_deref()
            .or(self.wifi.as_deref())
            .filter(|s| !s.is_empty() && *s != "disconnected" && *s != "unknown")
    }

    /// Whether the device is joined to a Wi-Fi network, falling back to the
    /// reported SSID when the explicit flag is missing.
    pub fn is_wifi_connected(&self) -> bool {
        match self.wifi_connected {
            Some(flag) => flag,
            None => self.reported_ssid().is_some(),
        }
    }

    /// Name of the running operation, whichever field carried it.
    pub fn active_stage(&self) -> Option<&str> {
        self.operation.as_deref().or(self.stage.as_deref())
    }

    /// Progress of the running operation in percent.
    pub fn stage_percent(&self) -> Option<u32> {
        self.progress.or(self.percent)
    }
}

/// A vulnerability reported for a scanned host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    /// Host the finding applies to, when the device includes it.
    #[serde(default)]
    pub ip: Option<String>,
    /// CVE id or finding label.
    pub cve: String,
    /// Severity on a 0-10 scale.
    pub severity: u8,
    /// Human-readable description.
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wifi_network_secure() {
        let mut net = WifiNetwork {
            ssid: "lab".to_string(),
            bssid: "aa:bb:cc:dd:ee:ff".to_string(),
            rssi: -44,
            channel: 6,
            encryption: "wpa2".to_string(),
        };
        assert!(net.secure());

        net.encryption = "OPEN".to_string();
        assert!(!net.secure());
    }

    #[test]
    fn test_status_ssid_normalization() {
        let status: DeviceStatus =
            serde_json::from_str(r#"{"wifi":"disconnected","battery":80}"#).unwrap();
        assert_eq!(status.reported_ssid(), None);
        assert!(!status.is_wifi_connected());

        let status: DeviceStatus =
            serde_json::from_str(r#"{"ssid":"lab-net","wifi_connected":true}"#).unwrap();
        assert_eq!(status.reported_ssid(), Some("lab-net"));
        assert!(status.is_wifi_connected());
    }

    #[test]
    fn test_status_legacy_aliases() {
        let status: DeviceStatus = serde_json::from_str(
            r#"{"btConnected":true,"wifiConnected":false,"stage":"port_scan","percent":40}"#,
        )
        .unwrap();
        assert_eq!(status.bt_connected, Some(true));
        assert!(!status.is_wifi_connected());
        assert_eq!(status.active_stage(), Some("port_scan"));
        assert_eq!(status.stage_percent(), Some(40));
    }
}
