//! Boot session error taxonomy.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::device::Selection;
use crate::payload::BufferError;
use crate::protocol::Stage;
use crate::state::BootStep;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum BootError {
    #[error("USB enumeration failed")]
    Enumeration(#[source] TransportError),

    #[error("Conflicting device selection: {0}")]
    SelectionConflict(String),

    #[error("No maskrom device found for {0}")]
    NotFound(Selection),

    #[error("No {0} image given")]
    MissingImage(Stage),

    #[error("Device unavailable")]
    DeviceOpen(#[source] TransportError),

    #[error("Boot interface unavailable")]
    InterfaceClaim(#[source] TransportError),

    #[error("Failed to open {stage} image {}", .path.display())]
    FileOpen {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to allocate transfer buffers")]
    Allocation(#[from] BufferError),

    #[error("Failed to read {stage} image")]
    ImageRead {
        stage: Stage,
        #[source]
        source: io::Error,
    },

    #[error("Transfer of {stage} image failed")]
    Transfer {
        stage: Stage,
        #[source]
        source: TransportError,
    },
}

impl BootError {
    /// The step of the boot sequence that failed.
    pub fn step(&self) -> BootStep {
        match self {
            BootError::Enumeration(_) => BootStep::Enumerate,
            BootError::SelectionConflict(_) | BootError::NotFound(_) => BootStep::Select,
            BootError::MissingImage(stage) => BootStep::OpenImage(*stage),
            BootError::DeviceOpen(_) => BootStep::Open,
            BootError::InterfaceClaim(_) => BootStep::Claim,
            BootError::FileOpen { stage, .. } => BootStep::OpenImage(*stage),
            BootError::Allocation(_) => BootStep::Allocate,
            BootError::ImageRead { stage, .. } | BootError::Transfer { stage, .. } => {
                BootStep::Send(*stage)
            }
        }
    }

    /// This error and its sources, outermost first.
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    /// Whether the device itself could not be acquired.
    pub fn is_device_unavailable(&self) -> bool {
        matches!(
            self,
            BootError::DeviceOpen(_) | BootError::InterfaceClaim(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_names_each_cause_once() {
        let err = BootError::Enumeration(TransportError::EnumerationFailed(
            "bus unavailable".into(),
        ));
        assert_eq!(
            err.chain(),
            "USB enumeration failed: Failed to enumerate devices: bus unavailable"
        );

        let err = BootError::Transfer {
            stage: Stage::Two,
            source: TransportError::Disconnected,
        };
        assert_eq!(err.chain(), "Transfer of stage 2 image failed: Device disconnected");
    }

    #[test]
    fn test_undersized_block_is_allocation_step() {
        let err = BootError::from(BufferError::BlockTooSmall { block_size: 1 });
        assert_eq!(err.step(), BootStep::Allocate);
        assert!(err.chain().starts_with("Failed to allocate transfer buffers: block size 1"));
    }
}
