//! Reassembly of chunked scan-result transfers.
//!
//! Large Wi-Fi scan results do not fit the transport payload budget, so the
//! device streams them as numbered chunks correlated by request id and
//! closes the transfer with a completion message. Chunks carry their items
//! either inline or as a base64-encoded JSON array protected by a CRC-32.
//!
//! A CRC mismatch is treated as a diagnostic, not a transfer abort: the
//! payload is still used, the mismatch is logged, and the outcome reports
//! `crc_ok = false` so callers can count integrity warnings.

use std::collections::{HashMap, HashSet};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::warn;

use crate::error::ProtocolError;
use crate::responses::{ChunkPayload, ScanChunk};
use crate::types::WifiNetwork;

/// Reassembly state for one in-flight transfer.
///
/// Created on the first chunk for a request id and destroyed on
/// completion, cancellation, or timeout. Items accumulate in chunk arrival
/// order; duplicate or out-of-order sequence numbers are not deduplicated.
/// The seen-sequence set and declared total only feed stall detection.
#[derive(Debug, Default)]
pub struct PendingTransfer {
    seen_seqs: HashSet<u32>,
    declared_total: u32,
    networks: Vec<WifiNetwork>,
}

impl PendingTransfer {
    /// Number of distinct chunk sequence numbers seen so far.
    pub fn received(&self) -> usize {
        self.seen_seqs.len()
    }

    /// Total chunk count most recently declared by the device.
    pub fn declared_total(&self) -> u32 {
        self.declared_total
    }

    /// Items accumulated so far, in arrival order.
    pub fn networks(&self) -> &[WifiNetwork] {
        &self.networks
    }
}

/// Outcome of accepting one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkUpdate {
    /// Transfer the chunk belongs to.
    pub request_id: String,
    /// Sequence number of the accepted chunk.
    pub seq: u32,
    /// Declared total chunk count.
    pub total: u32,
    /// Whether the payload CRC matched (inline payloads always do).
    pub crc_ok: bool,
    /// Distinct sequence numbers seen so far.
    pub received: usize,
    /// All items accumulated for the transfer so far.
    pub networks: Vec<WifiNetwork>,
}

/// Reassembles chunked transfers, keyed by request id.
///
/// Transfers are independent records: chunks for different request ids
/// never mix, and removing one transfer leaves the others untouched.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    transfers: HashMap<String, PendingTransfer>,
}

impl ChunkAssembler {
    /// Create a new assembler with no pending transfers.
    pub fn new() -> Self {
        ChunkAssembler::default()
    }

    /// Accept one chunk, creating the transfer on first contact.
    ///
    /// Fails if the chunk has no request id or its payload cannot be
    /// decoded; a failed chunk leaves the transfer state unchanged.
    pub fn accept(&mut self, chunk: &ScanChunk) -> Result<ChunkUpdate, ProtocolError> {
        let request_id = chunk
            .effective_request_id()
            .ok_or(ProtocolError::MissingRequestId)?
            .to_string();
        let (items, crc_ok) = decode_payload(chunk)?;

        let transfer = self.transfers.entry(request_id.clone()).or_default();
        transfer.seen_seqs.insert(chunk.seq);
        transfer.declared_total = chunk.total;
        transfer.networks.extend(items);

        Ok(ChunkUpdate {
            request_id,
            seq: chunk.seq,
            total: chunk.total,
            crc_ok,
            received: transfer.seen_seqs.len(),
            networks: transfer.networks.clone(),
        })
    }

    /// Close a transfer and take its accumulated items.
    ///
    /// Returns `None` if no transfer exists for the id, which makes a
    /// repeated completion a no-op.
    pub fn complete(&mut self, request_id: &str) -> Option<Vec<WifiNetwork>> {
        self.transfers.remove(request_id).map(|t| t.networks)
    }

    /// Drop a transfer without taking its items (timeout or cancel).
    pub fn discard(&mut self, request_id: &str) -> bool {
        self.transfers.remove(request_id).is_some()
    }

    /// Drop every pending transfer (link loss).
    pub fn clear(&mut self) {
        self.transfers.clear();
    }

    /// Look up the pending transfer for a request id.
    pub fn transfer(&self, request_id: &str) -> Option<&PendingTransfer> {
        self.transfers.get(request_id)
    }

    /// Number of pending transfers.
    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    /// Whether no transfers are pending.
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

/// Decode a chunk payload into result items.
///
/// Encoded payloads go base64 → UTF-8 → CRC-32 check → JSON array. The CRC
/// comparison is case-insensitive against the declared 8-digit hex value.
fn decode_payload(chunk: &ScanChunk) -> Result<(Vec<WifiNetwork>, bool), ProtocolError> {
    match &chunk.payload {
        ChunkPayload::Networks(networks) => Ok((networks.clone(), true)),
        ChunkPayload::Encoded(encoded) => {
            let declared = chunk.crc.as_deref().ok_or(ProtocolError::MissingCrc)?;
            let raw = BASE64
                .decode(encoded)
                .map_err(|e| ProtocolError::InvalidPayload(format!("base64: {e}")))?;
            let text = String::from_utf8(raw)
                .map_err(|_| ProtocolError::InvalidPayload("payload is not UTF-8".to_string()))?;

            let computed = crc32_hex(text.as_bytes());
            let crc_ok = computed.eq_ignore_ascii_case(declared);
            if !crc_ok {
                warn!(
                    "chunk seq {} crc mismatch: declared {}, computed {}",
                    chunk.seq, declared, computed
                );
            }

            let networks: Vec<WifiNetwork> = serde_json::from_str(&text)
                .map_err(|e| ProtocolError::InvalidPayload(format!("items: {e}")))?;
            Ok((networks, crc_ok))
        }
    }
}

/// CRC-32 (reflected 0xEDB88320, init and xorout 0xFFFFFFFF) as 8 uppercase
/// hex digits, matching the device's checksum format.
fn crc32_hex(data: &[u8]) -> String {
    format!("{:08X}", crc32fast::hash(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responses::Response;

    fn network(ssid: &str) -> WifiNetwork {
        WifiNetwork {
            ssid: ssid.to_string(),
            bssid: "aa:bb:cc:dd:ee:ff".to_string(),
            rssi: -50,
            channel: 1,
            encryption: "wpa2".to_string(),
        }
    }

    fn inline_chunk(request_id: &str, seq: u32, total: u32, ssids: &[&str]) -> ScanChunk {
        let payload: Vec<WifiNetwork> = ssids.iter().map(|s| network(s)).collect();
        ScanChunk {
            seq,
            total,
            payload: ChunkPayload::Networks(payload),
            request_id: Some(request_id.to_string()),
            id: None,
            crc: None,
            domain: None,
        }
    }

    fn encoded_chunk(request_id: &str, seq: u32, total: u32, text: &str, crc: &str) -> ScanChunk {
        ScanChunk {
            seq,
            total,
            payload: ChunkPayload::Encoded(BASE64.encode(text)),
            request_id: Some(request_id.to_string()),
            id: None,
            crc: Some(crc.to_string()),
            domain: None,
        }
    }

    #[test]
    fn test_crc32_check_value() {
        // Standard CRC-32 check value.
        assert_eq!(crc32_hex(b"123456789"), "CBF43926");
    }

    #[test]
    fn test_accumulation_follows_arrival_order() {
        let mut assembler = ChunkAssembler::new();

        // Chunks 1, 0, 2 of 3 arrive out of numeric order.
        let update = assembler
            .accept(&inline_chunk("r1", 1, 3, &["bravo"]))
            .unwrap();
        assert_eq!(update.received, 1);
        assert_eq!(update.networks.len(), 1);
        assert_eq!(update.networks[0].ssid, "bravo");

        assembler
            .accept(&inline_chunk("r1", 0, 3, &["alpha"]))
            .unwrap();
        let update = assembler
            .accept(&inline_chunk("r1", 2, 3, &["charlie"]))
            .unwrap();
        assert_eq!(update.received, 3);

        let ssids: Vec<&str> = update.networks.iter().map(|n| n.ssid.as_str()).collect();
        assert_eq!(ssids, ["bravo", "alpha", "charlie"]);
    }

    #[test]
    fn test_complete_removes_transfer_and_repeat_is_noop() {
        let mut assembler = ChunkAssembler::new();
        assembler
            .accept(&inline_chunk("r1", 0, 1, &["alpha"]))
            .unwrap();

        let networks = assembler.complete("r1").expect("first completion");
        assert_eq!(networks.len(), 1);
        assert!(assembler.transfer("r1").is_none());

        assert!(assembler.complete("r1").is_none());
    }

    #[test]
    fn test_transfers_are_keyed_by_request_id() {
        let mut assembler = ChunkAssembler::new();
        assembler
            .accept(&inline_chunk("r1", 0, 2, &["alpha"]))
            .unwrap();
        assembler
            .accept(&inline_chunk("r2", 0, 1, &["other"]))
            .unwrap();

        assert_eq!(assembler.len(), 2);
        assert_eq!(assembler.transfer("r1").unwrap().networks().len(), 1);

        let networks = assembler.complete("r2").unwrap();
        assert_eq!(networks[0].ssid, "other");
        assert!(assembler.transfer("r1").is_some());
    }

    #[test]
    fn test_duplicate_seq_is_not_deduplicated() {
        let mut assembler = ChunkAssembler::new();
        assembler
            .accept(&inline_chunk("r1", 0, 2, &["alpha"]))
            .unwrap();
        let update = assembler
            .accept(&inline_chunk("r1", 0, 2, &["alpha"]))
            .unwrap();

        // The item list concatenates; only the seen-seq count collapses.
        assert_eq!(update.networks.len(), 2);
        assert_eq!(update.received, 1);
    }

    #[test]
    fn test_encoded_payload_with_matching_crc() {
        let text = r#"[{"ssid":"lab","bssid":"aa:bb:cc:dd:ee:ff","rssi":-40,"channel":6,"encryption":"wpa3"}]"#;
        let crc = crc32_hex(text.as_bytes());
        let lower = crc.to_ascii_lowercase();

        let mut assembler = ChunkAssembler::new();
        // Case-insensitive comparison.
        let update = assembler
            .accept(&encoded_chunk("r1", 0, 1, text, &lower))
            .unwrap();
        assert!(update.crc_ok);
        assert_eq!(update.networks[0].ssid, "lab");
    }

    #[test]
    fn test_crc_mismatch_is_accepted_with_diagnostic() {
        let text = r#"[{"ssid":"lab","bssid":"aa:bb:cc:dd:ee:ff","rssi":-40,"channel":6,"encryption":"wpa3"}]"#;

        let mut assembler = ChunkAssembler::new();
        let update = assembler
            .accept(&encoded_chunk("r1", 0, 1, text, "DEADBEEF"))
            .unwrap();

        // The payload is still used; the mismatch is only flagged.
        assert!(!update.crc_ok);
        assert_eq!(update.networks.len(), 1);
        assert_eq!(assembler.transfer("r1").unwrap().received(), 1);
    }

    #[test]
    fn test_encoded_payload_without_crc_is_rejected() {
        let mut chunk = encoded_chunk("r1", 0, 1, "[]", "00000000");
        chunk.crc = None;

        let mut assembler = ChunkAssembler::new();
        assert_eq!(assembler.accept(&chunk), Err(ProtocolError::MissingCrc));
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let chunk = ScanChunk {
            seq: 0,
            total: 1,
            payload: ChunkPayload::Encoded("not base64!!".to_string()),
            request_id: Some("r1".to_string()),
            id: None,
            crc: Some("00000000".to_string()),
            domain: None,
        };

        let mut assembler = ChunkAssembler::new();
        assert!(matches!(
            assembler.accept(&chunk),
            Err(ProtocolError::InvalidPayload(_))
        ));
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_chunk_without_request_id_is_rejected() {
        let mut chunk = inline_chunk("r1", 0, 1, &["alpha"]);
        chunk.request_id = None;

        let mut assembler = ChunkAssembler::new();
        assert_eq!(
            assembler.accept(&chunk),
            Err(ProtocolError::MissingRequestId)
        );
    }

    #[test]
    fn test_end_to_end_from_wire_message() {
        let text = r#"[{"ssid":"lab","bssid":"aa:bb:cc:dd:ee:ff","rssi":-40,"channel":6,"encryption":"wpa2"}]"#;
        let json = format!(
            r#"{{"type":"wifi_scan_chunk","seq":0,"total":1,"request_id":"r9","payload":"{}","crc":"{}"}}"#,
            BASE64.encode(text),
            crc32_hex(text.as_bytes()),
        );

        let mut assembler = ChunkAssembler::new();
        match Response::decode(&json).unwrap() {
            Response::ScanChunk(chunk) => {
                let update = assembler.accept(&chunk).unwrap();
                assert!(update.crc_ok);
                assert_eq!(update.networks[0].ssid, "lab");
            }
            other => panic!("expected chunk, got {:?}", other),
        }
        assert_eq!(assembler.complete("r9").unwrap().len(), 1);
    }
}
