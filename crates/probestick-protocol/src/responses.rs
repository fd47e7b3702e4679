//! Responses received from the scanner device.
//!
//! Every inbound message is a JSON object carrying a `type` discriminator.
//! Decoding is lenient: fields that are not essential to a message are
//! optional and default when missing, and several fields accept legacy
//! spellings from older firmware builds. A message whose discriminator is
//! unknown, or whose body fails typed decoding, yields an error the caller
//! is expected to log and drop; one malformed message never takes down the
//! session.

use serde::Deserialize;

use crate::error::ProtocolError;
use crate::types::{DeviceRecord, DeviceStatus, PortInfo, VulnerabilityReport, WifiNetwork};

/// Responses received from the scanner device, keyed by the `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Command acknowledgement.
    #[serde(rename = "ack")]
    Ack(Ack),

    /// Error reported by the device. Terminal for the active operation.
    #[serde(rename = "error")]
    Error(ProtoError),

    /// One part of a chunked Wi-Fi scan transfer.
    #[serde(rename = "wifi_scan_chunk", alias = "chunk")]
    ScanChunk(ScanChunk),

    /// End of a chunked Wi-Fi scan transfer.
    #[serde(rename = "wifi_scan_complete", alias = "complete")]
    ScanComplete(ScanComplete),

    /// Legacy single-shot Wi-Fi scan result list.
    #[serde(rename = "wifi_results")]
    WifiResults {
        /// All networks found by the scan.
        #[serde(default)]
        networks: Vec<WifiNetwork>,
    },

    /// Host discovered during a network scan.
    #[serde(rename = "device")]
    DeviceFound(DeviceRecord),

    /// Network scan finished.
    #[serde(rename = "net_done")]
    NetDone {
        /// Number of hosts found.
        #[serde(default)]
        count: Option<u32>,
    },

    /// Open port found during a port scan.
    #[serde(rename = "port_result")]
    PortOpen(PortOpen),

    /// Open port with protocol and version detail (advanced scan).
    #[serde(rename = "port_raw")]
    PortRaw(PortRaw),

    /// Port scan finished.
    #[serde(rename = "port_done")]
    PortDone {
        /// Number of open ports found.
        #[serde(default)]
        count: Option<u32>,
        /// Scanned host, when the device includes it.
        #[serde(default)]
        ip: Option<String>,
    },

    /// Final summary of a port scan.
    #[serde(rename = "port_summary")]
    PortSummary(PortSummary),

    /// Progress report for the running operation.
    #[serde(rename = "progress")]
    Progress(Progress),

    /// The device cancelled the running operation.
    #[serde(rename = "cancelled")]
    Cancelled,

    /// Device status snapshot.
    #[serde(rename = "status")]
    Status(DeviceStatus),

    /// Vulnerability finding during analysis.
    #[serde(rename = "vulnerability")]
    Vulnerability(VulnerabilityReport),

    /// Analysis finished.
    #[serde(rename = "analysis_complete")]
    AnalysisComplete(AnalysisComplete),
}

impl Response {
    /// Decode one complete JSON message.
    pub fn decode(json: &str) -> Result<Response, ProtocolError> {
        serde_json::from_str(json).map_err(|e| ProtocolError::InvalidMessage(e.to_string()))
    }
}

/// Command acknowledgement body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Ack {
    /// Name of the acknowledged command.
    #[serde(default)]
    pub cmd: Option<String>,
    /// Legacy name for `cmd`.
    #[serde(default)]
    pub action: Option<String>,
    /// "ok" or "error"; missing means ok.
    #[serde(default)]
    pub status: Option<String>,
    /// Failure detail when `status` is "error".
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "requestId")]
    pub request_id: Option<String>,
    /// Legacy name for `request_id`.
    #[serde(default)]
    pub id: Option<String>,
    /// Device timestamp.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Subsystem the ack belongs to.
    #[serde(default)]
    pub domain: Option<String>,
}

impl Ack {
    /// The acknowledged command name, whichever field carried it.
    pub fn command(&self) -> Option<&str> {
        self.cmd.as_deref().or(self.action.as_deref())
    }

    /// Correlation id, normalized across the legacy field names.
    pub fn effective_request_id(&self) -> Option<&str> {
        self.request_id.as_deref().or(self.id.as_deref())
    }

    /// Whether the device rejected the command.
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }
}

/// Error message body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProtoError {
    /// Numeric error code, if the firmware assigns one.
    #[serde(default)]
    pub code: Option<i64>,
    /// Human-readable error message.
    pub message: String,
    /// Extra detail.
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default, alias = "requestId")]
    pub request_id: Option<String>,
    /// Legacy name for `request_id`.
    #[serde(default)]
    pub id: Option<String>,
    /// Subsystem the error belongs to.
    #[serde(default)]
    pub domain: Option<String>,
}

impl ProtoError {
    /// Correlation id, normalized across the legacy field names.
    pub fn effective_request_id(&self) -> Option<&str> {
        self.request_id.as_deref().or(self.id.as_deref())
    }
}

/// One numbered part of a chunked scan-result transfer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScanChunk {
    /// Zero-based sequence number.
    pub seq: u32,
    /// Declared total number of chunks.
    pub total: u32,
    /// Chunk contents.
    pub payload: ChunkPayload,
    #[serde(default, alias = "requestId")]
    pub request_id: Option<String>,
    /// Legacy name for `request_id`.
    #[serde(default)]
    pub id: Option<String>,
    /// Declared CRC-32 of the encoded payload, as 8 hex digits.
    #[serde(default)]
    pub crc: Option<String>,
    /// Subsystem the chunk belongs to; absent means Wi-Fi.
    #[serde(default)]
    pub domain: Option<String>,
}

impl ScanChunk {
    /// Correlation id, normalized across the legacy field names.
    pub fn effective_request_id(&self) -> Option<&str> {
        self.request_id.as_deref().or(self.id.as_deref())
    }

    /// Whether this chunk carries a Wi-Fi scan payload.
    pub fn is_wifi(&self) -> bool {
        self.domain
            .as_deref()
            .map_or(true, |d| d.eq_ignore_ascii_case("wifi"))
    }
}

/// Chunk contents: either inline result items or a base64-encoded,
/// CRC-protected JSON array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChunkPayload {
    /// Result items carried inline.
    Networks(Vec<WifiNetwork>),
    /// Base64 of a UTF-8 JSON array of result items.
    Encoded(String),
}

/// End marker of a chunked scan-result transfer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScanComplete {
    /// Total number of result items the device sent.
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default, alias = "requestId")]
    pub request_id: Option<String>,
    /// Legacy name for `request_id`.
    #[serde(default)]
    pub id: Option<String>,
    /// Subsystem the transfer belongs to; absent means Wi-Fi.
    #[serde(default)]
    pub domain: Option<String>,
}

impl ScanComplete {
    /// Correlation id, normalized across the legacy field names.
    pub fn effective_request_id(&self) -> Option<&str> {
        self.request_id.as_deref().or(self.id.as_deref())
    }

    /// Whether this completion closes a Wi-Fi transfer.
    pub fn is_wifi(&self) -> bool {
        self.domain
            .as_deref()
            .map_or(true, |d| d.eq_ignore_ascii_case("wifi"))
    }
}

/// `port_result` body: one open port, streamed as it is found.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PortOpen {
    /// Port number.
    pub port: u16,
    /// Service name guess.
    #[serde(default)]
    pub service: Option<String>,
    /// Captured banner.
    #[serde(default)]
    pub banner: Option<String>,
    /// Scanned host, when the device includes it.
    #[serde(default)]
    pub ip: Option<String>,
}

/// `port_raw` body: one open port with protocol and version detail.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PortRaw {
    /// Scanned host, when the device includes it.
    #[serde(default)]
    pub ip: Option<String>,
    /// Port number.
    pub port: u16,
    /// Transport protocol.
    #[serde(default)]
    pub protocol: Option<String>,
    /// Service name guess.
    #[serde(default)]
    pub service: Option<String>,
    /// Captured banner.
    #[serde(default)]
    pub banner: Option<String>,
    /// Probed service version.
    #[serde(default)]
    pub version: Option<String>,
}

/// `port_summary` body: the device's own summary of a finished port scan.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PortSummary {
    /// Scanned host.
    #[serde(default)]
    pub target: Option<String>,
    /// First port of the scanned range.
    #[serde(default)]
    pub start: Option<u32>,
    /// Last port of the scanned range.
    #[serde(default)]
    pub end: Option<u32>,
    /// OS guess from the advanced scan.
    #[serde(default)]
    pub os: Option<String>,
    /// Open ports found.
    #[serde(default, alias = "openPorts")]
    pub open_ports: Vec<PortInfo>,
}

/// `progress` body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Progress {
    /// Name of the running operation.
    #[serde(default)]
    pub stage: Option<String>,
    /// Legacy name for `stage`.
    #[serde(default)]
    pub operation: Option<String>,
    /// Units completed so far.
    #[serde(default)]
    pub current: Option<u32>,
    /// Total units.
    #[serde(default)]
    pub total: Option<u32>,
    /// Percent complete, for firmware that precomputes it.
    #[serde(default)]
    pub percent: Option<u32>,
}

impl Progress {
    /// Name of the running operation, whichever field carried it.
    pub fn stage_name(&self) -> Option<&str> {
        self.stage.as_deref().or(self.operation.as_deref())
    }

    /// Completion as a fraction in [0, 1], preferring current/total.
    pub fn fraction(&self) -> f64 {
        match (self.current, self.total) {
            (Some(current), Some(total)) if total > 0 => f64::from(current) / f64::from(total),
            _ => f64::from(self.percent.unwrap_or(0)) / 100.0,
        }
    }
}

/// `analysis_complete` body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalysisComplete {
    /// Analyzed host.
    #[serde(default)]
    pub ip: Option<String>,
    /// Number of vulnerabilities found.
    #[serde(default)]
    pub vulns: Option<u32>,
    /// Highest severity among the findings.
    #[serde(default, alias = "maxSeverity")]
    pub max_severity: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ack() {
        let resp = Response::decode(r#"{"type":"ack","cmd":"wifi_scan"}"#).unwrap();
        match resp {
            Response::Ack(ack) => {
                assert_eq!(ack.command(), Some("wifi_scan"));
                assert!(!ack.is_error());
            }
            other => panic!("expected ack, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_ack() {
        let resp =
            Response::decode(r#"{"type":"ack","action":"wifi_scan","status":"error","message":"busy"}"#)
                .unwrap();
        match resp {
            Response::Ack(ack) => {
                assert!(ack.is_error());
                assert_eq!(ack.command(), Some("wifi_scan"));
                assert_eq!(ack.message.as_deref(), Some("busy"));
            }
            other => panic!("expected ack, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_proto_error() {
        let resp = Response::decode(
            r#"{"type":"error","code":7,"message":"scan failed","requestId":"r1"}"#,
        )
        .unwrap();
        match resp {
            Response::Error(err) => {
                assert_eq!(err.code, Some(7));
                assert_eq!(err.message, "scan failed");
                assert_eq!(err.effective_request_id(), Some("r1"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_chunk_with_inline_payload() {
        let json = r#"{"type":"wifi_scan_chunk","seq":0,"total":2,"request_id":"r1",
            "payload":[{"ssid":"lab","bssid":"aa:bb:cc:dd:ee:ff","rssi":-40,"channel":6,"encryption":"wpa2"}]}"#;
        let resp = Response::decode(json).unwrap();
        match resp {
            Response::ScanChunk(chunk) => {
                assert_eq!(chunk.seq, 0);
                assert_eq!(chunk.total, 2);
                assert_eq!(chunk.effective_request_id(), Some("r1"));
                assert!(chunk.is_wifi());
                match chunk.payload {
                    ChunkPayload::Networks(nets) => assert_eq!(nets.len(), 1),
                    other => panic!("expected inline payload, got {:?}", other),
                }
            }
            other => panic!("expected chunk, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_chunk_legacy_spellings() {
        // Short discriminator plus the legacy `id` correlation field.
        let json = r#"{"type":"chunk","seq":1,"total":3,"id":"r2","payload":"W10=","crc":"00000000"}"#;
        let resp = Response::decode(json).unwrap();
        match resp {
            Response::ScanChunk(chunk) => {
                assert_eq!(chunk.effective_request_id(), Some("r2"));
                assert!(matches!(chunk.payload, ChunkPayload::Encoded(_)));
            }
            other => panic!("expected chunk, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_complete_aliases() {
        let resp = Response::decode(r#"{"type":"complete","count":12,"requestId":"r3"}"#).unwrap();
        match resp {
            Response::ScanComplete(complete) => {
                assert_eq!(complete.count, Some(12));
                assert_eq!(complete.effective_request_id(), Some("r3"));
            }
            other => panic!("expected complete, got {:?}", other),
        }
    }

    #[test]
    fn test_non_wifi_domain_guard() {
        let resp = Response::decode(
            r#"{"type":"chunk","seq":0,"total":1,"domain":"ble","payload":[],"id":"r4"}"#,
        )
        .unwrap();
        match resp {
            Response::ScanChunk(chunk) => assert!(!chunk.is_wifi()),
            other => panic!("expected chunk, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_port_summary() {
        let json = r#"{"type":"port_summary","target":"10.0.0.9","start":1,"end":1024,"os":"linux",
            "open_ports":[{"port":22,"protocol":"tcp","service":"ssh"},{"port":80,"service":"http","banner":"nginx"}]}"#;
        let resp = Response::decode(json).unwrap();
        match resp {
            Response::PortSummary(summary) => {
                assert_eq!(summary.target.as_deref(), Some("10.0.0.9"));
                assert_eq!(summary.open_ports.len(), 2);
                assert_eq!(summary.open_ports[1].banner.as_deref(), Some("nginx"));
            }
            other => panic!("expected port summary, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_progress_fraction() {
        let resp = Response::decode(
            r#"{"type":"progress","stage":"port_scan","current":250,"total":1000,"percent":25}"#,
        )
        .unwrap();
        match resp {
            Response::Progress(progress) => {
                assert_eq!(progress.stage_name(), Some("port_scan"));
                assert!((progress.fraction() - 0.25).abs() < f64::EPSILON);
            }
            other => panic!("expected progress, got {:?}", other),
        }

        let resp = Response::decode(r#"{"type":"progress","operation":"analysis","percent":40}"#)
            .unwrap();
        match resp {
            Response::Progress(progress) => {
                assert_eq!(progress.stage_name(), Some("analysis"));
                assert!((progress.fraction() - 0.40).abs() < f64::EPSILON);
            }
            other => panic!("expected progress, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_discriminator_is_an_error() {
        assert!(matches!(
            Response::decode(r#"{"type":"firmware_update","stage":1}"#),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_missing_discriminator_is_an_error() {
        assert!(matches!(
            Response::decode(r#"{"seq":1,"total":2}"#),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_lenient_decoding_tolerates_unknown_fields() {
        let resp = Response::decode(
            r#"{"type":"net_done","count":4,"elapsed_ms":9000,"subnet":"192.168.1.0/24"}"#,
        )
        .unwrap();
        assert!(matches!(resp, Response::NetDone { count: Some(4) }));
    }
}
