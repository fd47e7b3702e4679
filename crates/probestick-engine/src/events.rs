//! Typed notifications emitted by the engine.

use probestick_protocol::{
    DeviceRecord, DeviceStatus, PortInfo, VulnerabilityReport, WifiNetwork,
};

use crate::operation::{FailureCause, OperationKind};

/// Notifications the engine queues for the application.
///
/// Drained with [`Engine::poll_event`] after every engine call; the order
/// of events matches the order the triggering inputs were processed in.
///
/// [`Engine::poll_event`]: crate::Engine::poll_event
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The device acknowledged a command.
    AckReceived {
        /// Name of the acknowledged command.
        command: Option<String>,
        /// Correlation id, for Wi-Fi scans.
        request_id: Option<String>,
    },

    /// The device reported an error (explicit error message, or an ack
    /// with error status). Terminal for the active operation.
    RemoteError {
        /// Numeric error code, if assigned.
        code: Option<i64>,
        /// Error message.
        message: String,
        /// Correlation id, if the error names one.
        request_id: Option<String>,
    },

    /// A chunk of the active Wi-Fi scan arrived.
    WifiScanProgress {
        /// Transfer the chunk belongs to.
        request_id: String,
        /// Distinct chunks received so far.
        received: usize,
        /// Declared total chunk count.
        total: u32,
        /// Networks accumulated so far, in arrival order.
        networks: Vec<WifiNetwork>,
    },

    /// A Wi-Fi scan finished and its transfer closed.
    WifiScanFinished {
        /// Correlation id, absent for legacy single-shot results.
        request_id: Option<String>,
        /// The complete network list.
        networks: Vec<WifiNetwork>,
    },

    /// A host was discovered during a network scan.
    DeviceFound(DeviceRecord),

    /// A network scan ended.
    NetworkScanFinished {
        /// Every host discovered so far.
        devices: Vec<DeviceRecord>,
        /// False when the list is a partial publish after a stall.
        complete: bool,
    },

    /// An open port was found.
    PortFound {
        /// Scanned host.
        target: String,
        /// The port record.
        port: PortInfo,
    },

    /// A port scan ended.
    PortScanFinished {
        /// Scanned host.
        target: Option<String>,
        /// Open ports found, one record per port number.
        ports: Vec<PortInfo>,
    },

    /// A vulnerability was reported during analysis.
    VulnerabilityFound(VulnerabilityReport),

    /// A vulnerability analysis ended.
    AnalysisFinished {
        /// Analyzed host.
        target: Option<String>,
        /// Number of findings.
        vulns: u32,
        /// Highest severity among the findings.
        max_severity: u32,
    },

    /// A device status snapshot arrived.
    StatusUpdated(DeviceStatus),

    /// A progress report arrived for the running operation.
    ProgressUpdated {
        /// Name of the running operation.
        stage: String,
        /// Completion in [0, 1].
        fraction: f64,
    },

    /// The device confirmed a cancellation.
    Cancelled,

    /// The active operation ended without a result.
    OperationFailed {
        /// Kind of the failed operation.
        kind: OperationKind,
        /// Which tier fired, or that the link dropped.
        cause: FailureCause,
        /// Human-readable failure description.
        message: String,
    },

    /// The transport link closed.
    LinkClosed {
        /// Reason reported by the transport, if any.
        reason: Option<String>,
    },
}
