//! Console progress output.

use rkboot_core::{BootEvent, BootObserver, Selection, TracingObserver};

/// Prints the user-facing progress lines on stdout and forwards every
/// event to tracing.
pub struct ConsoleObserver {
    inner: TracingObserver,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self {
            inner: TracingObserver,
        }
    }
}

impl BootObserver for ConsoleObserver {
    fn on_event(&self, event: &BootEvent) {
        match event {
            BootEvent::DeviceSelected {
                selection: Selection::ProductId(_),
                pid,
                ..
            } => println!("Boot PID 0x{:04x}", pid),
            BootEvent::DeviceSelected { index, .. } => println!("Boot #{}", index),
            BootEvent::StageStarted {
                path, encrypted, ..
            } => {
                if *encrypted {
                    println!("Download encrypted {}", path.display());
                } else {
                    println!("Download {}", path.display());
                }
            }
            BootEvent::StageFinished { .. } => println!("Done."),
            _ => {}
        }
        self.inner.on_event(event);
    }
}
