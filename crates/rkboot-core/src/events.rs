//! Event system for UI decoupling.
//!
//! Allows the CLI (or any other front end) to follow a boot session
//! without tight coupling to the core logic.

use std::path::PathBuf;

use crate::device::Selection;
use crate::protocol::Stage;
use crate::state::{BootState, BootStep};

/// Events emitted by a boot session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootEvent {
    /// A maskrom device was seen during enumeration.
    DeviceFound { index: usize, pid: u16, location: String },
    /// The device that will be booted.
    DeviceSelected {
        selection: Selection,
        index: usize,
        pid: u16,
    },
    /// State machine transition.
    StateChanged { from: BootState, to: BootState },
    /// An image download is starting.
    StageStarted {
        stage: Stage,
        path: PathBuf,
        encrypted: bool,
    },
    /// Image bytes sent so far; `total` is known for regular files.
    Progress {
        stage: Stage,
        sent: u64,
        total: Option<u64>,
    },
    /// The ROM accepted the terminal frame of an image.
    StageFinished {
        stage: Stage,
        frames: usize,
        checksum: u16,
    },
    /// A step failed; the session is over.
    Failed { step: BootStep, message: String },
    /// Both images delivered and the device released.
    Complete,
}

/// Observer trait for receiving boot events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait BootObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &BootEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl BootObserver for NullObserver {
    fn on_event(&self, _event: &BootEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl BootObserver for TracingObserver {
    fn on_event(&self, event: &BootEvent) {
        match event {
            BootEvent::DeviceFound {
                index,
                pid,
                location,
            } => {
                tracing::info!(index, pid = %format!("{:04X}", pid), location = %location, "Maskrom device");
            }
            BootEvent::DeviceSelected {
                selection,
                index,
                pid,
            } => {
                tracing::info!(selection = %selection, index, pid = %format!("{:04X}", pid), "Device selected");
            }
            BootEvent::StateChanged { from, to } => {
                tracing::debug!(from = %from, to = %to, "Session state");
            }
            BootEvent::StageStarted {
                stage,
                path,
                encrypted,
            } => {
                tracing::info!(stage = %stage, path = %path.display(), encrypted, "Download started");
            }
            BootEvent::Progress { stage, sent, total } => match total {
                Some(total) if *total > 0 => {
                    let pct = (*sent * 100) / *total;
                    tracing::debug!(stage = %stage, progress = %format!("{}%", pct), "Progress");
                }
                _ => tracing::debug!(stage = %stage, sent, "Progress"),
            },
            BootEvent::StageFinished {
                stage,
                frames,
                checksum,
            } => {
                tracing::info!(stage = %stage, frames, crc = %format!("{:04X}", checksum), "Download finished");
            }
            BootEvent::Failed { step, message } => {
                tracing::error!(step = %step, "Boot failed: {}", message);
            }
            BootEvent::Complete => {
                tracing::info!("Boot complete");
            }
        }
    }
}
