//! Scan Controller
//!
//! Single writer of the scan state. Everything that needs the radio to scan
//! or stop scanning goes through here.

use crate::domain::models::ScanState;
use crate::infrastructure::bluetooth::radio::RadioManager;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ScanController {
    radio: Arc<dyn RadioManager>,
    state: ScanState,
}

impl ScanController {
    pub fn new(radio: Arc<dyn RadioManager>) -> Self {
        Self {
            radio,
            state: ScanState::Idle,
        }
    }

    /// Start scanning unless already scanning
    pub fn ensure_scanning(&mut self) {
        if self.state == ScanState::Scanning {
            if self.radio.is_scanning() {
                return;
            }
            warn!("Radio stopped scanning on its own, restarting");
        }

        info!("Starting BLE scan");
        match self.radio.start_scan() {
            Ok(()) => self.state = ScanState::Scanning,
            Err(e) => {
                warn!("Failed to start scan: {}", e);
                self.state = ScanState::Idle;
            }
        }
    }

    /// Stop scanning if currently scanning
    pub fn ensure_stopped(&mut self) {
        if self.state == ScanState::Idle {
            return;
        }

        info!("Stopping BLE scan");
        if let Err(e) = self.radio.stop_scan() {
            warn!("Failed to stop scan: {}", e);
        }
        self.state = ScanState::Idle;
    }

    pub fn is_scanning(&self) -> bool {
        self.state == ScanState::Scanning
    }
}
