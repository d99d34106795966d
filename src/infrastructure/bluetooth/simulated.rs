//! Simulated Radio
//!
//! In-process [`RadioManager`] used by the console binary. Advertises a fixed
//! set of beacons while scanning and plays a scripted pairing sequence on
//! connect.

use crate::domain::models::{AdvertisedPeripheral, PeripheralRecord};
use crate::domain::session::ConnectionStatus;
use crate::infrastructure::bluetooth::protocol::TriggerConfig;
use crate::infrastructure::bluetooth::radio::{
    ConnectionSink, PasswordRequest, RadioError, RadioManager, RadioSink, TriggerSink,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Delay between scripted connection steps
const STEP_DELAY: Duration = Duration::from_millis(200);

#[derive(Default)]
struct SimState {
    sink: Option<RadioSink>,
    scan_task: Option<JoinHandle<()>>,
}

#[derive(Debug)]
pub struct SimulatedRadio {
    beacons: Arc<Vec<AdvertisedPeripheral>>,
    scan_interval: Duration,
    password: String,
    state: Mutex<SimState>,
}

impl std::fmt::Debug for SimState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimState")
            .field("attached", &self.sink.is_some())
            .field("scanning", &self.scan_task.is_some())
            .finish()
    }
}

impl SimulatedRadio {
    pub fn new(
        beacons: Vec<AdvertisedPeripheral>,
        scan_interval: Duration,
        password: &str,
    ) -> Self {
        Self {
            beacons: Arc::new(beacons),
            scan_interval,
            password: password.to_string(),
            state: Mutex::new(SimState::default()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SimState>, RadioError> {
        self.state
            .lock()
            .map_err(|_| RadioError::Failed("radio state poisoned".to_string()))
    }

    fn knows(&self, address: &str) -> bool {
        self.beacons
            .iter()
            .any(|beacon| beacon.address.eq_ignore_ascii_case(address))
    }
}

impl RadioManager for SimulatedRadio {
    fn attach(&self, sink: RadioSink) {
        if let Ok(mut state) = self.state.lock() {
            state.sink = Some(sink);
        }
    }

    fn start_scan(&self) -> Result<(), RadioError> {
        let mut state = self.lock()?;
        if state.scan_task.is_some() {
            return Ok(());
        }
        let sink = state.sink.clone().ok_or(RadioError::AdapterUnavailable)?;

        let beacons = self.beacons.clone();
        let mut interval = tokio::time::interval(self.scan_interval);
        state.scan_task = Some(tokio::spawn(async move {
            loop {
                interval.tick().await;
                sink.discovered(beacons.as_ref().clone());
            }
        }));
        info!("Simulated scan started");
        Ok(())
    }

    fn stop_scan(&self) -> Result<(), RadioError> {
        if let Some(task) = self.lock()?.scan_task.take() {
            task.abort();
            info!("Simulated scan stopped");
        }
        Ok(())
    }

    fn is_scanning(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.scan_task.is_some())
            .unwrap_or(false)
    }

    fn clear_cache(&self) -> Result<(), RadioError> {
        debug!("Simulated advertisement cache cleared");
        Ok(())
    }

    fn connect(
        &self,
        peripheral: &PeripheralRecord,
        sink: ConnectionSink,
    ) -> Result<(), RadioError> {
        if !self.knows(&peripheral.address) {
            return Err(RadioError::Unreachable(peripheral.address.clone()));
        }

        let expected = self.password.clone();
        tokio::spawn(async move {
            sink.status(ConnectionStatus::Connecting);
            tokio::time::sleep(STEP_DELAY).await;
            sink.status(ConnectionStatus::Connected);

            let (tx, rx) = oneshot::channel();
            sink.update(
                ConnectionStatus::PasswordValidating,
                Some(PasswordRequest::new(tx)),
            );
            match rx.await {
                Ok(secret) if secret == expected => {
                    tokio::time::sleep(STEP_DELAY).await;
                    sink.status(ConnectionStatus::Completed);
                }
                Ok(_) => sink.error(RadioError::PasswordRejected),
                Err(_) => sink.error(RadioError::Failed("no password supplied".to_string())),
            }
        });
        Ok(())
    }

    fn disconnect(&self, peripheral: &PeripheralRecord) -> Result<(), RadioError> {
        debug!("Simulated disconnect from {}", peripheral.address);
        Ok(())
    }

    fn set_trigger(
        &self,
        peripheral: &PeripheralRecord,
        trigger: TriggerConfig,
        sink: TriggerSink,
    ) -> Result<(), RadioError> {
        debug!("Simulated trigger {:?} on {}", trigger, peripheral.address);
        tokio::spawn(async move {
            tokio::time::sleep(STEP_DELAY).await;
            sink.result(Ok(()));
        });
        Ok(())
    }

    fn shutdown(&self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(task) = state.scan_task.take() {
                task.abort();
            }
            state.sink = None;
        }
        info!("Simulated radio shut down");
    }
}
