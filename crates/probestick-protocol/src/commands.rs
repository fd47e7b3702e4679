//! Commands that can be sent to the scanner device.

use serde::Serialize;

use crate::constants::MAX_PAYLOAD_SIZE;
use crate::error::ProtocolError;
use crate::types::WifiScanParams;

/// Commands that can be sent to the scanner device.
///
/// Each command encodes to a single compact JSON object tagged with a `cmd`
/// field. Commands are immutable once constructed; the request id for a
/// Wi-Fi scan is chosen by the caller and carried through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd")]
pub enum Command {
    /// Start a Wi-Fi scan. Results stream back as a chunked transfer
    /// correlated by `request_id`.
    #[serde(rename = "wifi_scan")]
    ScanWifi {
        /// Caller-generated correlation id.
        request_id: String,
        /// Optional scan tuning, flattened into the command object.
        #[serde(flatten)]
        params: Option<WifiScanParams>,
    },

    /// Join a Wi-Fi network.
    #[serde(rename = "wifi_connect")]
    ConnectWifi {
        /// Network name.
        ssid: String,
        /// Network passphrase.
        password: String,
    },

    /// Discover hosts on the joined network.
    #[serde(rename = "network_scan")]
    ScanNetwork,

    /// Scan a port range on one host.
    #[serde(rename = "port_scan")]
    ScanPorts {
        /// Target IPv4 address.
        target: String,
        /// First port of the range.
        start: u16,
        /// Last port of the range.
        end: u16,
    },

    /// Deep scan of one host with optional OS and service-version probes.
    #[serde(rename = "advanced_scan")]
    AdvancedScan {
        /// Target IPv4 address.
        target: String,
        /// Attempt OS detection.
        #[serde(rename = "osDetect")]
        os_detect: bool,
        /// Probe service versions.
        #[serde(rename = "serviceVersion")]
        service_version: bool,
    },

    /// Scan a host and analyze it for vulnerabilities.
    #[serde(rename = "analyze")]
    Analyze {
        /// Target IPv4 address.
        target: String,
    },

    /// Query device status.
    #[serde(rename = "status")]
    Status,

    /// Cancel the running operation.
    #[serde(rename = "cancel")]
    Cancel,
}

impl Command {
    /// Wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::ScanWifi { .. } => "wifi_scan",
            Command::ConnectWifi { .. } => "wifi_connect",
            Command::ScanNetwork => "network_scan",
            Command::ScanPorts { .. } => "port_scan",
            Command::AdvancedScan { .. } => "advanced_scan",
            Command::Analyze { .. } => "analyze",
            Command::Status => "status",
            Command::Cancel => "cancel",
        }
    }

    /// Encode the command as compact JSON.
    ///
    /// Fails closed if the encoded UTF-8 length exceeds the transport
    /// payload budget; an oversized command is never truncated.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let json =
            serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))?;
        if json.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::CommandTooLarge {
                max: MAX_PAYLOAD_SIZE,
                actual: json.len(),
            });
        }
        Ok(json)
    }
}
