//! The protocol session engine.
//!
//! One [`Engine`] instance owns all session state: the receive buffer, the
//! chunk assembler, the active operation with its armed timer, the result
//! stores, and the outbound event queue. All of it is mutated only by the
//! engine's input methods, which the host must serialize with each other
//! (one logical thread of control; the transport's own machinery may run
//! wherever it likes as long as deliveries are marshaled in).

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use log::{debug, warn};
use rand::Rng;

use probestick_protocol::{
    Ack, AnalysisComplete, ChunkAssembler, Command, DeviceRecord, DeviceStatus, FrameCodec,
    PortInfo, PortOpen, PortRaw, PortSummary, Progress, ProtoError, Response, ScanChunk,
    ScanComplete, VulnerabilityReport, WifiNetwork, WifiScanParams,
};

use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::operation::{FailureCause, Operation, OperationKind, Phase, TimerTier};
use crate::transport::Transport;

/// Protocol session engine for one connected scanner.
pub struct Engine<T: Transport> {
    transport: T,
    codec: FrameCodec,
    assembler: ChunkAssembler,

    // Active operation, if any. `next_seq` gives each attempt an identity.
    op: Option<Operation>,
    next_seq: u64,
    wifi_request_id: Option<String>,
    current_target: Option<String>,

    // Accumulated results
    devices: Vec<DeviceRecord>,
    ports: HashMap<String, Vec<PortInfo>>,
    vulns: HashMap<String, Vec<VulnerabilityReport>>,
    status: Option<DeviceStatus>,
    connected_ssid: Option<String>,

    events: VecDeque<EngineEvent>,
}

impl<T: Transport> Engine<T> {
    /// Create an engine over a connected transport.
    pub fn new(transport: T) -> Self {
        Engine {
            transport,
            codec: FrameCodec::new(),
            assembler: ChunkAssembler::new(),
            op: None,
            next_seq: 0,
            wifi_request_id: None,
            current_target: None,
            devices: Vec::new(),
            ports: HashMap::new(),
            vulns: HashMap::new(),
            status: None,
            connected_ssid: None,
            events: VecDeque::new(),
        }
    }

    // ========================================================================
    // Command issuing
    // ========================================================================

    /// Start a Wi-Fi scan and return the generated request id.
    pub fn start_wifi_scan(
        &mut self,
        params: Option<WifiScanParams>,
        now: Instant,
    ) -> Result<String, EngineError> {
        self.ensure_idle()?;
        let request_id = generate_request_id();
        self.send(&Command::ScanWifi {
            request_id: request_id.clone(),
            params,
        })?;
        self.begin(OperationKind::Wifi, now);
        self.wifi_request_id = Some(request_id.clone());
        Ok(request_id)
    }

    /// Start a host-discovery scan of the joined network.
    pub fn start_network_scan(&mut self, now: Instant) -> Result<(), EngineError> {
        self.ensure_idle()?;
        self.send(&Command::ScanNetwork)?;
        self.devices.clear();
        self.begin(OperationKind::Network, now);
        Ok(())
    }

    /// Start a port-range scan of one host.
    pub fn start_port_scan(
        &mut self,
        target: &str,
        start: u16,
        end: u16,
        now: Instant,
    ) -> Result<(), EngineError> {
        self.ensure_idle()?;
        self.send(&Command::ScanPorts {
            target: target.to_string(),
            start,
            end,
        })?;
        self.ports.insert(target.to_string(), Vec::new());
        self.current_target = Some(target.to_string());
        self.begin(OperationKind::Port, now);
        Ok(())
    }

    /// Start an advanced scan of one host.
    pub fn start_advanced_scan(
        &mut self,
        target: &str,
        os_detect: bool,
        service_version: bool,
        now: Instant,
    ) -> Result<(), EngineError> {
        self.ensure_idle()?;
        self.send(&Command::AdvancedScan {
            target: target.to_string(),
            os_detect,
            service_version,
        })?;
        self.ports.insert(target.to_string(), Vec::new());
        self.current_target = Some(target.to_string());
        self.begin(OperationKind::Advanced, now);
        Ok(())
    }

    /// Start a vulnerability analysis of one host.
    pub fn start_analysis(&mut self, target: &str, now: Instant) -> Result<(), EngineError> {
        self.ensure_idle()?;
        self.send(&Command::Analyze {
            target: target.to_string(),
        })?;
        self.vulns.insert(target.to_string(), Vec::new());
        self.current_target = Some(target.to_string());
        self.begin(OperationKind::Analysis, now);
        Ok(())
    }

    /// Ask the device to join a Wi-Fi network. Fire-and-forget: the result
    /// comes back as an ack or error event, with no operation tracking.
    pub fn connect_wifi(&mut self, ssid: &str, password: &str) -> Result<(), EngineError> {
        self.send(&Command::ConnectWifi {
            ssid: ssid.to_string(),
            password: password.to_string(),
        })
    }

    /// Request a device status snapshot.
    pub fn request_status(&mut self) -> Result<(), EngineError> {
        self.send(&Command::Status)
    }

    /// Cancel the running operation.
    ///
    /// Every timer tier is disarmed synchronously and the pending Wi-Fi
    /// transfer dropped; the device's own confirmation arrives later as a
    /// [`EngineEvent::Cancelled`].
    pub fn cancel(&mut self) -> Result<(), EngineError> {
        self.send(&Command::Cancel)?;
        if let Some(kind) = self.abort_operation() {
            debug!("{kind} cancelled by caller");
        }
        Ok(())
    }

    // ========================================================================
    // Inbound events
    // ========================================================================

    /// Feed received transport bytes into the engine.
    ///
    /// Extracts and routes every complete message currently buffered.
    /// Fragment arrival itself counts as activity for the inactivity tier.
    pub fn handle_rx(&mut self, data: &[u8], now: Instant) {
        self.codec.push(data);
        if let Some(op) = &mut self.op {
            op.touch(now);
        }
        while let Some(json) = self.codec.decode() {
            match Response::decode(&json) {
                Ok(response) => self.route(response, now),
                Err(err) => {
                    let preview: String = json.chars().take(120).collect();
                    warn!("dropping message ({err}): {preview}");
                }
            }
        }
    }

    /// Earliest armed deadline, for the host's timer scheduling.
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.op.as_ref().map(|op| op.armed().1)
    }

    /// Fire the armed timer if its deadline has passed.
    ///
    /// Safe to call spuriously: if no operation is active or the deadline
    /// has not arrived (the operation was replaced or rearmed since the
    /// host scheduled the wakeup), nothing happens.
    pub fn handle_timeout(&mut self, now: Instant) {
        let Some(tier) = self.op.as_ref().and_then(|op| op.expired(now)) else {
            return;
        };
        let Some(kind) = self.abort_operation() else {
            return;
        };

        // A stalled network scan still publishes what it found.
        if kind == OperationKind::Network {
            self.events.push_back(EngineEvent::NetworkScanFinished {
                devices: self.devices.clone(),
                complete: false,
            });
        }

        let (cause, message) = match tier {
            TimerTier::Ack => (
                FailureCause::NoAck,
                format!("{kind} got no ack from the device"),
            ),
            TimerTier::Inactivity => (FailureCause::Stalled, format!("{kind} stalled (no data)")),
            TimerTier::Chunk => (
                FailureCause::IncompleteData,
                format!("{kind} transfer incomplete"),
            ),
        };
        warn!("{message}");
        self.events
            .push_back(EngineEvent::OperationFailed { kind, cause, message });
    }

    /// The transport link dropped or errored out.
    ///
    /// Terminal regardless of phase: the receive buffer, pending transfers
    /// and the active operation are all discarded.
    pub fn link_closed(&mut self, reason: Option<String>) {
        self.codec.clear();
        self.assembler.clear();
        self.wifi_request_id = None;
        if let Some(op) = self.op.take() {
            let kind = op.kind();
            self.current_target = None;
            self.events.push_back(EngineEvent::OperationFailed {
                kind,
                cause: FailureCause::LinkLost,
                message: format!("{kind} aborted: link lost"),
            });
        }
        self.events.push_back(EngineEvent::LinkClosed { reason });
    }

    /// Take the next queued event.
    pub fn poll_event(&mut self) -> Option<EngineEvent> {
        self.events.pop_front()
    }

    // ========================================================================
    // State accessors
    // ========================================================================

    /// Kind of the operation currently in flight.
    pub fn active_operation(&self) -> Option<OperationKind> {
        self.op.as_ref().map(Operation::kind)
    }

    /// Request id of the Wi-Fi scan currently in flight.
    pub fn current_wifi_request(&self) -> Option<&str> {
        self.wifi_request_id.as_deref()
    }

    /// Hosts discovered by the last network scan.
    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    /// Open ports recorded for a host.
    pub fn ports(&self, target: &str) -> Option<&[PortInfo]> {
        self.ports.get(target).map(Vec::as_slice)
    }

    /// Vulnerabilities recorded for a host.
    pub fn vulnerabilities(&self, target: &str) -> Option<&[VulnerabilityReport]> {
        self.vulns.get(target).map(Vec::as_slice)
    }

    /// Latest device status snapshot.
    pub fn device_status(&self) -> Option<&DeviceStatus> {
        self.status.as_ref()
    }

    /// SSID the device is joined to, per its status reports.
    pub fn connected_ssid(&self) -> Option<&str> {
        self.connected_ssid.as_deref()
    }

    /// The transport collaborator.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_idle(&self) -> Result<(), EngineError> {
        match &self.op {
            Some(op) => Err(EngineError::Busy { current: op.kind() }),
            None => Ok(()),
        }
    }

    fn send(&mut self, command: &Command) -> Result<(), EngineError> {
        let json = command.encode()?;
        debug!("sending {}: {}", command.name(), json);
        self.transport.send(json.as_bytes())?;
        Ok(())
    }

    fn begin(&mut self, kind: OperationKind, now: Instant) {
        self.next_seq += 1;
        self.op = Some(Operation::new(kind, self.next_seq, now));
    }

    /// End the active operation without a result, dropping any state tied
    /// to it. Returns its kind if one was active.
    fn abort_operation(&mut self) -> Option<OperationKind> {
        let op = self.op.take()?;
        if op.kind() == OperationKind::Wifi {
            if let Some(id) = self.wifi_request_id.take() {
                self.assembler.discard(&id);
            }
        }
        self.current_target = None;
        Some(op.kind())
    }

    /// An operation-relevant message arrived: promote `AwaitingAck` to
    /// `AwaitingData` (kinds without an explicit ack), otherwise rearm.
    fn note_activity(&mut self, now: Instant) {
        if let Some(op) = &mut self.op {
            match op.phase() {
                Phase::AwaitingAck => op.await_data(now),
                _ => op.touch(now),
            }
        }
    }

    fn route(&mut self, response: Response, now: Instant) {
        match response {
            Response::Ack(ack) => self.on_ack(ack, now),
            Response::Error(err) => self.on_proto_error(err),
            Response::ScanChunk(chunk) => self.on_chunk(chunk, now),
            Response::ScanComplete(complete) => self.on_complete(complete),
            Response::WifiResults { networks } => self.on_wifi_results(networks),
            Response::DeviceFound(device) => self.on_device(device, now),
            Response::NetDone { count } => self.on_net_done(count),
            Response::PortOpen(open) => self.on_port_open(open, now),
            Response::PortRaw(raw) => self.on_port_raw(raw, now),
            Response::PortDone { ip, .. } => self.on_port_done(ip, now),
            Response::PortSummary(summary) => self.on_port_summary(summary, now),
            Response::Progress(progress) => self.on_progress(progress, now),
            Response::Cancelled => self.on_cancelled(),
            Response::Status(status) => self.on_status(status, now),
            Response::Vulnerability(report) => self.on_vulnerability(report, now),
            Response::AnalysisComplete(done) => self.on_analysis_complete(done),
        }
    }

    fn on_ack(&mut self, ack: Ack, now: Instant) {
        if ack.is_error() {
            let message = ack
                .message
                .clone()
                .unwrap_or_else(|| "command failed".to_string());
            warn!(
                "command {} rejected: {message}",
                ack.command().unwrap_or("unknown")
            );
            let request_id = ack.effective_request_id().map(str::to_string);
            self.abort_operation();
            self.events.push_back(EngineEvent::RemoteError {
                code: None,
                message,
                request_id,
            });
            return;
        }

        debug!("ack for {}", ack.command().unwrap_or("unknown"));
        if let Some(op) = &mut self.op {
            match op.phase() {
                Phase::AwaitingAck => op.await_data(now),
                _ => op.touch(now),
            }
        }
        self.events.push_back(EngineEvent::AckReceived {
            command: ack.command().map(str::to_string),
            request_id: ack.effective_request_id().map(str::to_string),
        });
    }

    fn on_proto_error(&mut self, err: ProtoError) {
        warn!("device error (code {:?}): {}", err.code, err.message);
        let request_id = err.effective_request_id().map(str::to_string);
        self.abort_operation();
        self.events.push_back(EngineEvent::RemoteError {
            code: err.code,
            message: err.message,
            request_id,
        });
    }

    fn on_chunk(&mut self, chunk: ScanChunk, now: Instant) {
        if !chunk.is_wifi() {
            debug!("ignoring chunk for domain {:?}", chunk.domain);
            return;
        }
        if self.active_operation() != Some(OperationKind::Wifi) {
            debug!(
                "dropping chunk for request {:?}: no Wi-Fi scan in flight",
                chunk.effective_request_id()
            );
            return;
        }

        match self.assembler.accept(&chunk) {
            Ok(update) => {
                if self.wifi_request_id.as_deref() == Some(update.request_id.as_str()) {
                    if let Some(op) = &mut self.op {
                        op.await_chunk(now);
                    }
                    self.events.push_back(EngineEvent::WifiScanProgress {
                        request_id: update.request_id,
                        received: update.received,
                        total: update.total,
                        networks: update.networks,
                    });
                } else {
                    debug!("chunk for inactive request {}", update.request_id);
                }
            }
            Err(err) => warn!("dropping chunk: {err}"),
        }
    }

    fn on_complete(&mut self, complete: ScanComplete) {
        if !complete.is_wifi() {
            debug!("ignoring completion for domain {:?}", complete.domain);
            return;
        }
        let Some(request_id) = complete.effective_request_id().map(str::to_string) else {
            warn!("scan completion without request id");
            return;
        };

        if self.wifi_request_id.as_deref() == Some(request_id.as_str()) {
            // A scan that found nothing completes without ever chunking.
            let networks = self.assembler.complete(&request_id).unwrap_or_default();
            self.wifi_request_id = None;
            self.op = None;
            debug!(
                "Wi-Fi scan {request_id} complete: {} networks",
                networks.len()
            );
            self.events.push_back(EngineEvent::WifiScanFinished {
                request_id: Some(request_id),
                networks,
            });
        } else if self.assembler.complete(&request_id).is_some() {
            debug!("closed transfer for inactive request {request_id}");
        }
    }

    /// Legacy single-shot result list; terminal for an active Wi-Fi scan.
    fn on_wifi_results(&mut self, networks: Vec<WifiNetwork>) {
        let request_id = if self.active_operation() == Some(OperationKind::Wifi) {
            let id = self.wifi_request_id.take();
            if let Some(id) = &id {
                self.assembler.discard(id);
            }
            self.op = None;
            id
        } else {
            None
        };
        self.events.push_back(EngineEvent::WifiScanFinished {
            request_id,
            networks,
        });
    }

    fn on_device(&mut self, device: DeviceRecord, now: Instant) {
        self.note_activity(now);
        if self.devices.iter().any(|d| d.ip == device.ip) {
            return;
        }
        self.devices.push(device.clone());
        self.events.push_back(EngineEvent::DeviceFound(device));
    }

    fn on_net_done(&mut self, count: Option<u32>) {
        if self.active_operation() == Some(OperationKind::Network) {
            self.op = None;
        }
        debug!(
            "network scan done: {} devices",
            count.unwrap_or(self.devices.len() as u32)
        );
        self.events.push_back(EngineEvent::NetworkScanFinished {
            devices: self.devices.clone(),
            complete: true,
        });
    }

    fn on_port_open(&mut self, open: PortOpen, now: Instant) {
        self.note_activity(now);
        let Some(target) = open.ip.clone().or_else(|| self.current_target.clone()) else {
            warn!("port result without a target");
            return;
        };
        self.store_port(
            &target,
            PortInfo {
                port: open.port,
                protocol: None,
                service: open.service,
                banner: open.banner,
                version: None,
            },
        );
    }

    fn on_port_raw(&mut self, raw: PortRaw, now: Instant) {
        self.note_activity(now);
        let Some(target) = raw.ip.clone().or_else(|| self.current_target.clone()) else {
            warn!("port result without a target");
            return;
        };
        self.store_port(
            &target,
            PortInfo {
                port: raw.port,
                protocol: raw.protocol,
                service: raw.service,
                banner: raw.banner,
                version: raw.version,
            },
        );
    }

    /// Insert or replace the record for a port number.
    fn store_port(&mut self, target: &str, info: PortInfo) {
        let ports = self.ports.entry(target.to_string()).or_default();
        match ports.iter_mut().find(|p| p.port == info.port) {
            Some(existing) => *existing = info.clone(),
            None => ports.push(info.clone()),
        }
        self.events.push_back(EngineEvent::PortFound {
            target: target.to_string(),
            port: info,
        });
    }

    fn on_port_done(&mut self, ip: Option<String>, now: Instant) {
        match self.active_operation() {
            Some(OperationKind::Port) | Some(OperationKind::Advanced) => {
                let target = ip.or_else(|| self.current_target.take());
                self.op = None;
                self.current_target = None;
                let ports = target
                    .as_deref()
                    .and_then(|t| self.ports.get(t))
                    .cloned()
                    .unwrap_or_default();
                self.events
                    .push_back(EngineEvent::PortScanFinished { target, ports });
            }
            Some(OperationKind::Analysis) => {
                // The device moves on to the analysis stage; publish the
                // interim port list but keep the operation running.
                self.note_activity(now);
                let target = ip.or_else(|| self.current_target.clone());
                let ports = target
                    .as_deref()
                    .and_then(|t| self.ports.get(t))
                    .cloned()
                    .unwrap_or_default();
                self.events
                    .push_back(EngineEvent::PortScanFinished { target, ports });
            }
            _ => debug!("port_done with no matching scan"),
        }
    }

    fn on_port_summary(&mut self, summary: PortSummary, now: Instant) {
        self.note_activity(now);
        let Some(target) = summary.target.clone().or_else(|| self.current_target.clone()) else {
            warn!("port summary without a target");
            return;
        };

        let ports = dedupe_ports(summary.open_ports);
        self.ports.insert(target.clone(), ports.clone());

        if matches!(
            self.active_operation(),
            Some(OperationKind::Port) | Some(OperationKind::Advanced)
        ) {
            self.op = None;
            self.current_target = None;
        }
        self.events.push_back(EngineEvent::PortScanFinished {
            target: Some(target),
            ports,
        });
    }

    fn on_progress(&mut self, progress: Progress, now: Instant) {
        self.note_activity(now);
        self.events.push_back(EngineEvent::ProgressUpdated {
            stage: progress.stage_name().unwrap_or_default().to_string(),
            fraction: progress.fraction(),
        });
    }

    fn on_cancelled(&mut self) {
        if let Some(kind) = self.abort_operation() {
            debug!("{kind} cancelled by device");
        }
        self.events.push_back(EngineEvent::Cancelled);
    }

    fn on_status(&mut self, status: DeviceStatus, now: Instant) {
        if let Some(op) = &mut self.op {
            op.touch(now);
        }
        match status.wifi_connected {
            Some(true) => self.connected_ssid = status.reported_ssid().map(str::to_string),
            Some(false) => self.connected_ssid = None,
            None => {
                if let Some(ssid) = status.reported_ssid() {
                    self.connected_ssid = Some(ssid.to_string());
                }
            }
        }
        self.status = Some(status.clone());
        self.events.push_back(EngineEvent::StatusUpdated(status));
    }

    fn on_vulnerability(&mut self, report: VulnerabilityReport, now: Instant) {
        self.note_activity(now);
        let Some(target) = report.ip.clone().or_else(|| self.current_target.clone()) else {
            warn!("vulnerability report without a target");
            return;
        };
        self.vulns.entry(target).or_default().push(report.clone());
        self.events
            .push_back(EngineEvent::VulnerabilityFound(report));
    }

    fn on_analysis_complete(&mut self, done: AnalysisComplete) {
        let target = done.ip.clone().or_else(|| self.current_target.clone());
        if self.active_operation() == Some(OperationKind::Analysis) {
            self.op = None;
            self.current_target = None;
        }

        let stored = target.as_deref().and_then(|t| self.vulns.get(t));
        let vulns = done
            .vulns
            .unwrap_or_else(|| stored.map_or(0, |v| v.len() as u32));
        let max_severity = done.max_severity.unwrap_or_else(|| {
            stored.map_or(0, |v| {
                v.iter().map(|r| u32::from(r.severity)).max().unwrap_or(0)
            })
        });
        self.events.push_back(EngineEvent::AnalysisFinished {
            target,
            vulns,
            max_severity,
        });
    }
}

/// Keep the first record per port number, sorted by port.
fn dedupe_ports(entries: Vec<PortInfo>) -> Vec<PortInfo> {
    let mut seen = HashSet::new();
    let mut ports: Vec<PortInfo> = entries
        .into_iter()
        .filter(|p| seen.insert(p.port))
        .collect();
    ports.sort_by_key(|p| p.port);
    ports
}

/// Generate a fresh request id for a correlatable command.
fn generate_request_id() -> String {
    let mut rng = rand::thread_rng();
    format!("{:016x}{:016x}", rng.gen::<u64>(), rng.gen::<u64>())
}
