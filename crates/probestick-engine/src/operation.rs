//! The single-active-operation state machine.
//!
//! At most one operation (scan, analysis) is in flight at a time. Each
//! operation moves through phases that name the timeout tier currently
//! governing the wait:
//!
//! - `AwaitingAck`: a short timer armed when the command is sent.
//! - `AwaitingData`: a kind-specific inactivity timer, rearmed on every
//!   activity signal, raw fragment arrival included.
//! - `AwaitingChunk`: Wi-Fi only, rearmed per accepted chunk, so a stalled
//!   multi-chunk transfer is distinguishable from plain silence.
//!
//! Exactly one timer is armed at any moment, matching the phase. Arming is
//! rearm-by-replacement; there is never more than one pending deadline. A
//! timer that fires for an operation that has already ended is a no-op
//! (the engine drops the operation record on every terminal transition).

use std::fmt;
use std::time::{Duration, Instant};

/// Time allowed for the device to acknowledge a scan command.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Inactivity budget for a Wi-Fi scan, also the per-chunk budget.
pub const WIFI_TIMEOUT: Duration = Duration::from_secs(8);

/// Inactivity budget for a network scan.
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(20);

/// Inactivity budget for port, advanced, and analysis scans.
pub const PORT_TIMEOUT: Duration = Duration::from_secs(60);

/// Kind of the in-flight operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Wi-Fi network scan (chunked transfer).
    Wifi,
    /// Host discovery on the joined network.
    Network,
    /// Port-range scan of one host.
    Port,
    /// Advanced scan with OS/service probes.
    Advanced,
    /// Vulnerability analysis of one host.
    Analysis,
}

impl OperationKind {
    /// Inactivity budget for this kind.
    pub fn inactivity_timeout(self) -> Duration {
        match self {
            OperationKind::Wifi => WIFI_TIMEOUT,
            OperationKind::Network => NETWORK_TIMEOUT,
            OperationKind::Port | OperationKind::Advanced | OperationKind::Analysis => {
                PORT_TIMEOUT
            }
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Wifi => "Wi-Fi scan",
            OperationKind::Network => "network scan",
            OperationKind::Port => "port scan",
            OperationKind::Advanced => "advanced scan",
            OperationKind::Analysis => "analysis",
        };
        f.write_str(name)
    }
}

/// Timeout tier currently governing the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the command acknowledgement.
    AwaitingAck,
    /// Waiting for substantive responses.
    AwaitingData,
    /// Waiting for the next chunk of a Wi-Fi transfer.
    AwaitingChunk,
}

/// The timer tier that expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTier {
    /// Ack timer.
    Ack,
    /// Inactivity timer.
    Inactivity,
    /// Chunk timer.
    Chunk,
}

/// Why an operation ended without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// No acknowledgement within the ack budget.
    NoAck,
    /// No activity within the inactivity budget.
    Stalled,
    /// A chunked transfer stopped before all chunks arrived.
    IncompleteData,
    /// The transport link went down.
    LinkLost,
}

/// The single in-flight operation and its armed timer.
#[derive(Debug, Clone)]
pub struct Operation {
    kind: OperationKind,
    seq: u64,
    phase: Phase,
    started_at: Instant,
    last_activity: Instant,
    deadline: (TimerTier, Instant),
}

impl Operation {
    /// Start an operation in `AwaitingAck` with the ack timer armed.
    pub fn new(kind: OperationKind, seq: u64, now: Instant) -> Self {
        Operation {
            kind,
            seq,
            phase: Phase::AwaitingAck,
            started_at: now,
            last_activity: now,
            deadline: (TimerTier::Ack, now + ACK_TIMEOUT),
        }
    }

    /// Kind of this operation.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Identity of this operation attempt.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// When the operation was started.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// When the last activity signal arrived.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// The armed timer tier and its deadline.
    pub fn armed(&self) -> (TimerTier, Instant) {
        self.deadline
    }

    /// Move to `AwaitingData`, replacing the armed timer with the
    /// kind-specific inactivity timer.
    pub fn await_data(&mut self, now: Instant) {
        self.phase = Phase::AwaitingData;
        self.last_activity = now;
        self.deadline = (TimerTier::Inactivity, now + self.kind.inactivity_timeout());
    }

    /// Move to `AwaitingChunk` (or rearm it), replacing the armed timer
    /// with the per-chunk timer.
    pub fn await_chunk(&mut self, now: Instant) {
        self.phase = Phase::AwaitingChunk;
        self.last_activity = now;
        self.deadline = (TimerTier::Chunk, now + WIFI_TIMEOUT);
    }

    /// Record an activity signal.
    ///
    /// In `AwaitingData` this rearms the inactivity timer. In other phases
    /// only the activity timestamp moves: the ack timer is satisfied by an
    /// ack alone, and the chunk timer only by an accepted chunk.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
        if self.phase == Phase::AwaitingData {
            self.deadline = (TimerTier::Inactivity, now + self.kind.inactivity_timeout());
        }
    }

    /// The tier whose deadline has passed, if any.
    pub fn expired(&self, now: Instant) -> Option<TimerTier> {
        let (tier, deadline) = self.deadline;
        (now >= deadline).then_some(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_operation_awaits_ack() {
        let t0 = Instant::now();
        let op = Operation::new(OperationKind::Wifi, 1, t0);

        assert_eq!(op.phase(), Phase::AwaitingAck);
        assert_eq!(op.armed(), (TimerTier::Ack, t0 + ACK_TIMEOUT));
        assert!(op.expired(t0 + Duration::from_secs(4)).is_none());
        assert_eq!(op.expired(t0 + ACK_TIMEOUT), Some(TimerTier::Ack));
    }

    #[test]
    fn test_await_data_uses_kind_budget() {
        let t0 = Instant::now();

        let mut op = Operation::new(OperationKind::Network, 1, t0);
        op.await_data(t0);
        assert_eq!(op.armed(), (TimerTier::Inactivity, t0 + NETWORK_TIMEOUT));

        let mut op = Operation::new(OperationKind::Analysis, 2, t0);
        op.await_data(t0);
        assert_eq!(op.armed(), (TimerTier::Inactivity, t0 + PORT_TIMEOUT));
    }

    #[test]
    fn test_touch_rearms_only_in_awaiting_data() {
        let t0 = Instant::now();
        let mut op = Operation::new(OperationKind::Wifi, 1, t0);

        // In AwaitingAck a fragment does not extend the ack deadline.
        op.touch(t0 + Duration::from_secs(2));
        assert_eq!(op.armed(), (TimerTier::Ack, t0 + ACK_TIMEOUT));

        op.await_data(t0 + Duration::from_secs(3));
        let t1 = t0 + Duration::from_secs(6);
        op.touch(t1);
        assert_eq!(op.armed(), (TimerTier::Inactivity, t1 + WIFI_TIMEOUT));
        assert_eq!(op.last_activity(), t1);
    }

    #[test]
    fn test_chunk_timer_rearms_per_chunk() {
        let t0 = Instant::now();
        let mut op = Operation::new(OperationKind::Wifi, 1, t0);

        op.await_chunk(t0 + Duration::from_secs(1));
        assert_eq!(op.phase(), Phase::AwaitingChunk);

        let t1 = t0 + Duration::from_secs(5);
        op.await_chunk(t1);
        assert_eq!(op.armed(), (TimerTier::Chunk, t1 + WIFI_TIMEOUT));

        // A raw fragment does not push the chunk deadline.
        op.touch(t1 + Duration::from_secs(2));
        assert_eq!(op.armed(), (TimerTier::Chunk, t1 + WIFI_TIMEOUT));

        assert_eq!(op.expired(t1 + WIFI_TIMEOUT), Some(TimerTier::Chunk));
    }
}
