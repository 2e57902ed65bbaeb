//! Worker startup handshake
//!
//! The worker reports its startup outcome exactly once, as a single JSON line
//! on its stdout. The host reads that line into a [`ReadinessCell`] which it
//! polls until the outcome is no longer pending.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;
use crate::protocol::{MessageEnvelope, PROTOCOL_VERSION};

const PENDING: i32 = 0;
const FAILED: i32 = -1;

/// What the worker writes once it is listening, or once it gave up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReadinessReport {
    Ready { port: u16, pid: u32 },
    Failed { reason: String },
}

/// Tri-state startup outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready(u16),
    Failed,
}

/// Single-slot cell holding the startup outcome.
///
/// Stored as one integer: 0 while pending, the port once ready, -1 on failure.
/// Only the first report is kept.
#[derive(Debug, Default)]
pub struct ReadinessCell {
    state: AtomicI32,
    reason: Mutex<Option<String>>,
}

impl ReadinessCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Readiness {
        match self.state.load(Ordering::Acquire) {
            PENDING => Readiness::Pending,
            port if port > 0 => Readiness::Ready(port as u16),
            _ => Readiness::Failed,
        }
    }

    /// Record the report; returns false if an outcome was already recorded
    pub fn set(&self, report: &ReadinessReport) -> bool {
        let (value, reason) = match report {
            ReadinessReport::Ready { port: 0, .. } => {
                (FAILED, Some("worker reported port 0".to_string()))
            }
            ReadinessReport::Ready { port, .. } => (i32::from(*port), None),
            ReadinessReport::Failed { reason } => (FAILED, Some(reason.clone())),
        };
        self.store(value, reason)
    }

    /// Mark the startup as failed unless an outcome is already known
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.store(FAILED, Some(reason.into()))
    }

    pub fn failure_reason(&self) -> Option<String> {
        self.reason.lock().ok().and_then(|r| r.clone())
    }

    fn store(&self, value: i32, reason: Option<String>) -> bool {
        if reason.is_some() {
            if let Ok(mut slot) = self.reason.lock() {
                if slot.is_none() && self.state.load(Ordering::Acquire) == PENDING {
                    *slot = reason;
                }
            }
        }
        self.state
            .compare_exchange(PENDING, value, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Write one report line and flush
pub async fn write_report<W>(writer: &mut W, report: &ReadinessReport) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(&MessageEnvelope::new(report.clone()))?;
    writer.write_all(format!("{}\n", json).as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the next report line; `Ok(None)` on EOF
pub async fn read_report<R>(reader: &mut R) -> Result<Option<ReadinessReport>, WireError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let envelope: MessageEnvelope<ReadinessReport> = serde_json::from_str(line.trim_end())?;
    if !envelope.is_compatible() {
        return Err(WireError::ProtocolVersionMismatch {
            expected: PROTOCOL_VERSION,
            actual: envelope.protocol_version,
        });
    }
    Ok(Some(envelope.message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test]
    fn test_cell_keeps_first_outcome() {
        let cell = ReadinessCell::new();
        assert_eq!(cell.get(), Readiness::Pending);
        assert!(cell.set(&ReadinessReport::Ready {
            port: 4242,
            pid: 1
        }));
        assert!(!cell.fail("late"));
        assert_eq!(cell.get(), Readiness::Ready(4242));
        assert_eq!(cell.failure_reason(), None);
    }

    #[test]
    fn test_cell_failure_keeps_reason() {
        let cell = ReadinessCell::new();
        assert!(cell.set(&ReadinessReport::Failed {
            reason: "no display".to_string()
        }));
        assert_eq!(cell.get(), Readiness::Failed);
        assert_eq!(cell.failure_reason().as_deref(), Some("no display"));
    }

    #[tokio::test]
    async fn test_report_line_round_trip() {
        let mut out = Vec::new();
        let report = ReadinessReport::Ready { port: 5000, pid: 77 };
        write_report(&mut out, &report).await.unwrap();
        assert_eq!(out.last(), Some(&b'\n'));

        let mut reader = BufReader::new(out.as_slice());
        assert_eq!(read_report(&mut reader).await.unwrap(), Some(report));
        assert_eq!(read_report(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_garbage_line_is_an_error() {
        let mut reader = BufReader::new(&b"not json\n"[..]);
        assert!(read_report(&mut reader).await.is_err());
    }
}
