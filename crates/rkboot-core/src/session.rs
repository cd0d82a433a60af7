//! Boot session - high-level orchestrator for the maskrom download.
//!
//! A session selects one maskrom device, opens and claims it, then sends
//! the stage-1 and stage-2 images. Resources are plain owned values, so a
//! failure at any step releases exactly what was acquired so far, in
//! reverse order: buffers, image files, interface, device handle.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::device::{DeviceSelector, ListedDevice, MaskromDevice, Selection};
use crate::error::BootError;
use crate::events::{BootEvent, BootObserver, TracingObserver};
use crate::payload::{BlockFramer, CipherMode, TransferBuffers};
use crate::protocol::Stage;
use crate::protocol::constants::{BLOCK_SIZE, BOOT_INTERFACE, DEFAULT_PACING};
use crate::state::{BootMachine, BootState};
use crate::transport::{
    DeviceDescriptor, NusbBackend, TransferChannel, UsbBackend, UsbDevice, UsbTransport,
};

fn default_pacing_ms() -> u64 {
    DEFAULT_PACING.as_millis() as u64
}

/// Configuration for a boot session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Path to the stage-1 (TPL) image.
    pub stage1_path: Option<PathBuf>,
    /// Path to the stage-2 (SPL) image.
    pub stage2_path: Option<PathBuf>,
    /// Boot the N-th maskrom device.
    pub index: Option<usize>,
    /// Boot the first maskrom device with this product id.
    pub product_id: Option<u16>,
    /// Pause after each interior frame, in milliseconds.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stage1_path: None,
            stage2_path: None,
            index: None,
            product_id: None,
            pacing_ms: default_pacing_ms(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The device selection; index and product id are mutually exclusive.
    pub fn selection(&self) -> Result<Selection, BootError> {
        match (self.index, self.product_id) {
            (Some(_), Some(_)) => Err(BootError::SelectionConflict(
                "index and product id".to_string(),
            )),
            (Some(n), None) => Ok(Selection::Index(n)),
            (None, Some(pid)) => Ok(Selection::ProductId(pid)),
            (None, None) => Ok(Selection::First),
        }
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    fn image_path(&self, stage: Stage) -> Result<PathBuf, BootError> {
        let path = match stage {
            Stage::One => &self.stage1_path,
            Stage::Two => &self.stage2_path,
        };
        path.clone().ok_or(BootError::MissingImage(stage))
    }
}

/// Boot session - drives one device from maskrom through both stages.
pub struct BootSession<B: UsbBackend, O: BootObserver> {
    backend: B,
    config: SessionConfig,
    observer: Arc<O>,
    machine: BootMachine,
}

impl BootSession<NusbBackend, TracingObserver> {
    /// Create a session on the host USB stack with the tracing observer.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_backend(NusbBackend::new(), config, Arc::new(TracingObserver))
    }
}

impl<B: UsbBackend, O: BootObserver> BootSession<B, O> {
    pub fn with_backend(backend: B, config: SessionConfig, observer: Arc<O>) -> Self {
        Self {
            backend,
            config,
            observer,
            machine: BootMachine::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// State of the most recent boot attempt.
    pub fn machine(&self) -> &BootMachine {
        &self.machine
    }

    /// Enumerate maskrom devices.
    pub fn list(&self) -> Result<Vec<ListedDevice>, BootError> {
        let selector = DeviceSelector::scan(&self.backend)?;
        self.announce(&selector);
        Ok(selector.list())
    }

    /// Select a device per the configuration and boot it.
    ///
    /// Configuration problems are reported before the bus is touched. When
    /// no explicit device was requested and a candidate cannot be opened or
    /// claimed, the next candidate is tried.
    #[instrument(skip(self))]
    pub fn run(&mut self) -> Result<(), BootError> {
        let selection = match self.preflight() {
            Ok(selection) => selection,
            Err(e) => return Err(self.report_failure(e)),
        };

        let selector = match DeviceSelector::scan(&self.backend) {
            Ok(selector) => selector,
            Err(e) => return Err(self.report_failure(e)),
        };
        self.announce(&selector);

        let targets: Vec<&MaskromDevice<B::Info>> = if selection.is_explicit() {
            match selector.select(selection) {
                Ok(target) => vec![target],
                Err(e) => return Err(self.report_failure(e)),
            }
        } else {
            selector.candidates().iter().collect()
        };

        let mut last_error = None;
        for target in targets {
            self.emit(BootEvent::DeviceSelected {
                selection,
                index: target.index,
                pid: target.product_id(),
            });
            match self.boot(&target.info) {
                Ok(()) => return Ok(()),
                Err(e) if !selection.is_explicit() && e.is_device_unavailable() => {
                    warn!(index = target.index, error = %e, "Device unavailable, trying next");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Err(self.report_failure(BootError::NotFound(selection))),
        }
    }

    /// Boot one specific device.
    #[instrument(skip(self, info), fields(pid = %format!("{:04X}", info.product_id())))]
    pub fn boot(&mut self, info: &B::Info) -> Result<(), BootError> {
        self.machine = BootMachine::new();
        match self.boot_device(info) {
            Ok(()) => {
                // Every session resource was dropped on return.
                self.transition(BootState::Done);
                self.emit(BootEvent::Complete);
                Ok(())
            }
            Err(e) => Err(self.report_failure(e)),
        }
    }

    fn preflight(&self) -> Result<Selection, BootError> {
        let selection = self.config.selection()?;
        for stage in Stage::all() {
            self.config.image_path(stage)?;
        }
        Ok(selection)
    }

    fn boot_device(&mut self, info: &B::Info) -> Result<(), BootError> {
        let stage1_path = self.config.image_path(Stage::One)?;
        let stage2_path = self.config.image_path(Stage::Two)?;
        let mode = CipherMode::for_product(info.product_id());
        info!(location = %info.location(), cipher = %mode, "Booting device");

        let device = self.backend.open(info).map_err(BootError::DeviceOpen)?;
        self.transition(BootState::Opened);

        let interface = device
            .claim_interface(BOOT_INTERFACE)
            .map_err(BootError::InterfaceClaim)?;
        self.transition(BootState::Claimed);

        let mut stage1 = open_image(Stage::One, &stage1_path)?;
        let mut stage2 = open_image(Stage::Two, &stage2_path)?;
        let mut buffers = TransferBuffers::allocate(BLOCK_SIZE, mode)?;
        let channel = TransferChannel::with_pacing(&interface, self.config.pacing());

        let total = stage1.metadata().ok().map(|m| m.len());
        self.send_image(&channel, &mut buffers, Stage::One, &stage1_path, &mut stage1, total)?;
        self.transition(BootState::Stage1Sent);

        let total = stage2.metadata().ok().map(|m| m.len());
        self.send_image(&channel, &mut buffers, Stage::Two, &stage2_path, &mut stage2, total)?;
        self.transition(BootState::Stage2Sent);

        Ok(())
    }

    #[instrument(skip(self, channel, buffers, image))]
    fn send_image<T: UsbTransport, R: Read>(
        &self,
        channel: &TransferChannel<'_, T>,
        buffers: &mut TransferBuffers,
        stage: Stage,
        path: &Path,
        image: R,
        total: Option<u64>,
    ) -> Result<(), BootError> {
        self.emit(BootEvent::StageStarted {
            stage,
            path: path.to_path_buf(),
            encrypted: buffers.mode().is_encrypted(),
        });

        let mut framer = BlockFramer::new(image, buffers);
        let mut frames = 0usize;
        while let Some(frame) = framer
            .next_frame()
            .map_err(|source| BootError::ImageRead { stage, source })?
        {
            channel
                .send(&frame, stage.function_code())
                .map_err(|source| BootError::Transfer { stage, source })?;
            frames += 1;
            self.emit(BootEvent::Progress {
                stage,
                sent: framer.bytes_read(),
                total,
            });
        }

        self.emit(BootEvent::StageFinished {
            stage,
            frames,
            checksum: framer.checksum(),
        });
        Ok(())
    }

    fn transition(&mut self, to: BootState) {
        let from = self.machine.goto_state(to);
        self.emit(BootEvent::StateChanged { from, to });
    }

    fn report_failure(&mut self, error: BootError) -> BootError {
        let step = error.step();
        let from = self.machine.fail(step);
        self.emit(BootEvent::StateChanged {
            from,
            to: BootState::Error,
        });
        self.emit(BootEvent::Failed {
            step,
            message: error.chain(),
        });
        error
    }

    fn announce(&self, selector: &DeviceSelector<B::Info>) {
        for candidate in selector.candidates() {
            self.emit(BootEvent::DeviceFound {
                index: candidate.index,
                pid: candidate.product_id(),
                location: candidate.info.location(),
            });
        }
    }

    fn emit(&self, event: BootEvent) {
        self.observer.on_event(&event);
    }
}

fn open_image(stage: Stage, path: &Path) -> Result<File, BootError> {
    File::open(path).map_err(|source| BootError::FileOpen {
        stage,
        path: path.to_path_buf(),
        source,
    })
}
