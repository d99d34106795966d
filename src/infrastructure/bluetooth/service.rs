//! Coordinator Service
//!
//! Actor that owns the discovery registry, the scan controller, the clear-scan
//! debouncer and the active connection session. Commands arrive through a
//! [`CoordinatorHandle`]; radio callbacks and timers arrive on a loopback
//! channel. All state is mutated from the actor task only.

use crate::domain::models::{
    AdvertisedPeripheral, BoundaryEvent, Command, CommandReply, PeripheralRecord,
};
use crate::domain::registry::DiscoveryRegistry;
use crate::domain::session::{
    ConnectionSession, ConnectionStatus, SessionEffect, SessionEvent, SessionId,
};
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::debounce::ClearScanDebouncer;
use crate::infrastructure::bluetooth::protocol::{self, TriggerConfig};
use crate::infrastructure::bluetooth::radio::{
    ConnectionSink, PasswordRequest, RadioError, RadioManager, RadioSink, TriggerSink,
};
use crate::infrastructure::bluetooth::scanner::ScanController;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("a connection session is already active")]
    SessionActive,
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
    #[error("coordinator is not running")]
    Stopped,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub clear_scan_delay: Duration,
    pub connect_timeout: Option<Duration>,
    pub scan_on_startup: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            clear_scan_delay: protocol::CLEAR_SCAN_DELAY,
            connect_timeout: Some(Duration::from_secs(30)),
            scan_on_startup: true,
        }
    }
}

impl From<&Settings> for CoordinatorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            clear_scan_delay: Duration::from_millis(settings.clear_scan_delay_ms),
            connect_timeout: settings.connect_timeout_ms.map(Duration::from_millis),
            scan_on_startup: settings.scan_on_startup,
        }
    }
}

#[derive(Debug)]
pub(crate) enum ConnectionUpdate {
    Status {
        status: ConnectionStatus,
        password: Option<PasswordRequest>,
    },
    Error(RadioError),
}

#[derive(Debug)]
pub(crate) enum CoordinatorMsg {
    Command {
        command: Command,
        reply: oneshot::Sender<Result<CommandReply, CoordinatorError>>,
    },
    Subscribe(mpsc::UnboundedSender<BoundaryEvent>),
    Unsubscribe,
    Teardown(oneshot::Sender<()>),

    Discovery(Vec<AdvertisedPeripheral>),
    Connection {
        session: SessionId,
        update: ConnectionUpdate,
    },
    TriggerResult {
        address: String,
        result: Result<(), RadioError>,
    },
    ClearScanDue,
    SessionTimeout(SessionId),
}

/// Cloneable entry point to a running coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    inbox: mpsc::UnboundedSender<CoordinatorMsg>,
}

impl CoordinatorHandle {
    pub async fn execute(&self, command: Command) -> Result<CommandReply, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.inbox
            .send(CoordinatorMsg::Command { command, reply: tx })
            .map_err(|_| CoordinatorError::Stopped)?;
        rx.await.map_err(|_| CoordinatorError::Stopped)?
    }

    pub async fn start(&self) -> Result<(), CoordinatorError> {
        self.execute(Command::Start).await.map(|_| ())
    }

    pub async fn stop(&self) -> Result<(), CoordinatorError> {
        self.execute(Command::Stop).await.map(|_| ())
    }

    pub async fn is_running(&self) -> Result<bool, CoordinatorError> {
        let reply = self.execute(Command::IsRunning).await?;
        Ok(matches!(reply, CommandReply::Running(true)))
    }

    /// Request pairing-and-configure of `address`. `Ok` means the request was
    /// accepted; the outcome follows as a `ProcessResult` event.
    pub async fn process_address(&self, address: &str) -> Result<(), CoordinatorError> {
        self.execute(Command::ProcessAddress(address.to_string()))
            .await
            .map(|_| ())
    }

    pub async fn clear_scanning(&self) -> Result<(), CoordinatorError> {
        self.execute(Command::ClearScanning).await.map(|_| ())
    }

    /// Attach a new event subscriber, replacing any previous one
    pub fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<BoundaryEvent>, CoordinatorError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inbox
            .send(CoordinatorMsg::Subscribe(tx))
            .map_err(|_| CoordinatorError::Stopped)?;
        Ok(rx)
    }

    /// Detach the current subscriber. Never fails, even if nothing is attached
    /// or the coordinator is gone.
    pub fn unsubscribe(&self) {
        let _ = self.inbox.send(CoordinatorMsg::Unsubscribe);
    }

    /// Stop scanning, release the radio and end the actor. Waits for the
    /// actor to finish its cleanup.
    pub async fn teardown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.inbox.send(CoordinatorMsg::Teardown(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

/// Spawn the coordinator actor on the current tokio runtime
pub fn spawn(radio: Arc<dyn RadioManager>, config: CoordinatorConfig) -> CoordinatorHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (loopback_tx, loopback_rx) = mpsc::unbounded_channel();

    radio.attach(RadioSink::new(loopback_tx.clone()));
    let coordinator = Coordinator::new(radio, config, loopback_tx);
    tokio::spawn(coordinator.run(command_rx, loopback_rx));

    CoordinatorHandle { inbox: command_tx }
}

struct ActiveSession {
    session: ConnectionSession,
    timeout: Option<JoinHandle<()>>,
}

struct Coordinator {
    radio: Arc<dyn RadioManager>,
    config: CoordinatorConfig,
    loopback: mpsc::UnboundedSender<CoordinatorMsg>,

    registry: DiscoveryRegistry,
    scanner: ScanController,
    debouncer: ClearScanDebouncer,
    session: Option<ActiveSession>,
    next_session: u64,
    /// Cleared by a `Stop` command issued while a session is running
    resume_after_session: bool,
    subscriber: Option<mpsc::UnboundedSender<BoundaryEvent>>,
}

impl Coordinator {
    fn new(
        radio: Arc<dyn RadioManager>,
        config: CoordinatorConfig,
        loopback: mpsc::UnboundedSender<CoordinatorMsg>,
    ) -> Self {
        Self {
            scanner: ScanController::new(radio.clone()),
            debouncer: ClearScanDebouncer::new(config.clear_scan_delay),
            radio,
            config,
            loopback,
            registry: DiscoveryRegistry::new(),
            session: None,
            next_session: 1,
            resume_after_session: true,
            subscriber: None,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<CoordinatorMsg>,
        mut loopback: mpsc::UnboundedReceiver<CoordinatorMsg>,
    ) {
        info!("Beacon coordinator starting");
        if self.config.scan_on_startup {
            self.scanner.ensure_scanning();
        }

        loop {
            let flow = tokio::select! {
                msg = commands.recv() => {
                    let Some(msg) = msg else {
                        info!("All coordinator handles dropped");
                        self.shutdown();
                        break;
                    };
                    self.handle(msg)
                }
                Some(msg) = loopback.recv() => self.handle(msg),
            };
            if flow.is_break() {
                break;
            }
        }

        info!("Beacon coordinator stopped");
    }

    fn handle(&mut self, msg: CoordinatorMsg) -> ControlFlow<()> {
        match msg {
            CoordinatorMsg::Command { command, reply } => {
                let result = self.on_command(command);
                let _ = reply.send(result);
            }
            CoordinatorMsg::Subscribe(subscriber) => {
                info!("Event subscriber attached");
                self.subscriber = Some(subscriber);
            }
            CoordinatorMsg::Unsubscribe => {
                if self.subscriber.take().is_some() {
                    info!("Event subscriber detached");
                } else {
                    debug!("Detach requested with no subscriber attached");
                }
            }
            CoordinatorMsg::Teardown(done) => {
                self.shutdown();
                let _ = done.send(());
                return ControlFlow::Break(());
            }
            CoordinatorMsg::Discovery(batch) => self.on_discovery_batch(batch),
            CoordinatorMsg::Connection { session, update } => {
                self.on_connection_update(session, update)
            }
            CoordinatorMsg::TriggerResult { address, result } => match result {
                Ok(()) => info!(
                    "Double-tap trigger configured on {} (slot {})",
                    address,
                    protocol::TRIGGER_SLOT
                ),
                Err(e) => warn!("Failed to configure trigger on {}: {}", address, e),
            },
            CoordinatorMsg::ClearScanDue => {
                self.debouncer.fire();
                if self.session.is_some() {
                    debug!("Skipping clear-scan while a session is active");
                } else {
                    self.clear_scanning();
                }
            }
            CoordinatorMsg::SessionTimeout(id) => {
                if self.active_session_id() == Some(id) {
                    warn!("Session {} timed out", id);
                    self.drive_session(SessionEvent::TimedOut, None);
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn on_command(&mut self, command: Command) -> Result<CommandReply, CoordinatorError> {
        debug!("Command: {:?}", command);
        match command {
            Command::Start => {
                if self.session.is_some() {
                    self.resume_after_session = true;
                } else {
                    self.scanner.ensure_scanning();
                }
                Ok(CommandReply::Done)
            }
            Command::Stop => {
                if self.session.is_some() {
                    self.resume_after_session = false;
                } else {
                    self.scanner.ensure_stopped();
                }
                Ok(CommandReply::Done)
            }
            Command::IsRunning => Ok(CommandReply::Running(self.scanner.is_scanning())),
            Command::ProcessAddress(address) => self.process_address(address),
            Command::ClearScanning => {
                if self.session.is_some() {
                    return Err(CoordinatorError::SessionActive);
                }
                self.clear_scanning();
                Ok(CommandReply::Done)
            }
        }
    }

    fn on_discovery_batch(&mut self, batch: Vec<AdvertisedPeripheral>) {
        if self.session.is_some() {
            debug!(
                "Dropping discovery batch of {} while a session is active",
                batch.len()
            );
            return;
        }

        let snapshot = self.registry.replace(&batch).to_vec();
        debug!("Discovery batch: {} peripherals", snapshot.len());
        for record in &snapshot {
            trace!("Device found: {:?}", record);
        }

        let taps: Vec<String> = snapshot
            .iter()
            .filter(|record| record.has_url())
            .map(|record| record.address.clone())
            .collect();

        self.emit(BoundaryEvent::DiscoveryUpdated {
            peripherals: snapshot,
        });

        for mac in taps {
            debug!("Tap detected on {}", mac);
            self.emit(BoundaryEvent::TapDetected { mac });
            self.debouncer
                .trigger(&self.loopback, CoordinatorMsg::ClearScanDue);
        }
    }

    fn process_address(&mut self, address: String) -> Result<CommandReply, CoordinatorError> {
        if address.trim().is_empty() {
            return Err(CoordinatorError::InvalidAddress(address));
        }
        if let Some(active) = &self.session {
            warn!(
                "Rejecting {}: session {} still active",
                address,
                active.session.id()
            );
            return Err(CoordinatorError::SessionActive);
        }

        info!("Processing MAC: {}", address);
        let Some(record) = self.registry.find_by_address(&address).cloned() else {
            info!("No peripheral found with MAC: {}", address);
            self.emit(BoundaryEvent::ProcessResult { success: false });
            return Ok(CommandReply::Accepted);
        };

        self.scanner.ensure_stopped();
        self.resume_after_session = true;

        let id = SessionId(self.next_session);
        self.next_session += 1;
        info!(
            "Connecting to peripheral {} (session {})",
            record.address, id
        );

        let timeout = self.config.connect_timeout.map(|after| {
            let loopback = self.loopback.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                let _ = loopback.send(CoordinatorMsg::SessionTimeout(id));
            })
        });
        let sink = ConnectionSink::new(id, self.loopback.clone());
        let connect = self.radio.connect(&record, sink);

        self.session = Some(ActiveSession {
            session: ConnectionSession::start(id, record),
            timeout,
        });

        if let Err(e) = connect {
            error!("Connect request failed: {}", e);
            self.drive_session(SessionEvent::Error(e.to_string()), None);
        }
        Ok(CommandReply::Accepted)
    }

    fn on_connection_update(&mut self, id: SessionId, update: ConnectionUpdate) {
        if self.active_session_id() != Some(id) {
            debug!("Ignoring update for stale session {}: {:?}", id, update);
            return;
        }

        match update {
            ConnectionUpdate::Status { status, password } => {
                debug!("Session {} status: {:?}", id, status);
                self.drive_session(SessionEvent::Status(status), password);
            }
            ConnectionUpdate::Error(e) => {
                error!("Connection error: {}", e);
                self.drive_session(SessionEvent::Error(e.to_string()), None);
            }
        }
    }

    /// Feed `event` to the active session and carry out the resulting effects
    fn drive_session(&mut self, event: SessionEvent, mut password: Option<PasswordRequest>) {
        let mut next = Some(event);

        while let Some(event) = next.take() {
            let Some(active) = self.session.as_mut() else {
                return;
            };
            let before = active.session.state();
            let effects = active.session.handle(&event);
            let after = active.session.state();
            let target = active.session.target().clone();
            if before != after {
                info!(
                    "Session {}: {:?} -> {:?}",
                    active.session.id(),
                    before,
                    after
                );
            }

            for effect in effects {
                match effect {
                    SessionEffect::SupplyPassword => match password.take() {
                        Some(request) => request.supply(protocol::BEACON_PASSWORD),
                        None => warn!("Password requested without a responder"),
                    },
                    SessionEffect::ConfigureTrigger => {
                        self.configure_trigger(&target);
                        next = Some(SessionEvent::ConfigurationIssued);
                    }
                    SessionEffect::Disconnect => {
                        if let Err(e) = self.radio.disconnect(&target) {
                            warn!("Disconnect from {} failed: {}", target.address, e);
                        }
                    }
                    SessionEffect::Finish { success } => self.finish_session(success),
                }
            }
        }
    }

    /// Fire-and-forget; the outcome is only logged
    fn configure_trigger(&self, target: &PeripheralRecord) {
        let sink = TriggerSink::new(target.address.clone(), self.loopback.clone());
        if let Err(e) = self
            .radio
            .set_trigger(target, TriggerConfig::double_tap(), sink)
        {
            warn!("Error configuring trigger on {}: {}", target.address, e);
        }
    }

    fn finish_session(&mut self, success: bool) {
        let Some(active) = self.session.take() else {
            return;
        };
        if let Some(timeout) = active.timeout {
            timeout.abort();
        }
        info!(
            "Session {} for {} finished (success: {}) after {:?}",
            active.session.id(),
            active.session.target().address,
            success,
            active.session.elapsed()
        );

        if self.resume_after_session {
            self.scanner.ensure_scanning();
        } else {
            info!("Not resuming scan: stop requested during session");
        }
        self.emit(BoundaryEvent::ProcessResult { success });
    }

    /// Reset the radio's advertisement cache. Scanning is only resumed if it
    /// was running, so a `Stop` issued before the reset stays in effect.
    fn clear_scanning(&mut self) {
        let was_scanning = self.scanner.is_scanning();
        info!("Clearing scan cache (scanning: {})", was_scanning);
        self.scanner.ensure_stopped();
        if let Err(e) = self.radio.clear_cache() {
            warn!("Failed to clear radio cache: {}", e);
        }
        if was_scanning {
            self.scanner.ensure_scanning();
        }
    }

    fn active_session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|active| active.session.id())
    }

    fn emit(&mut self, event: BoundaryEvent) {
        let Some(subscriber) = &self.subscriber else {
            trace!("No subscriber, dropping {:?}", event);
            return;
        };
        if subscriber.send(event).is_err() {
            debug!("Subscriber went away, detaching");
            self.subscriber = None;
        }
    }

    fn shutdown(&mut self) {
        info!("Tearing down coordinator");
        self.debouncer.cancel();
        if let Some(active) = self.session.take() {
            if let Some(timeout) = active.timeout {
                timeout.abort();
            }
            warn!(
                "Abandoning session {} for {}",
                active.session.id(),
                active.session.target().address
            );
            if let Err(e) = self.radio.disconnect(active.session.target()) {
                warn!("Disconnect during teardown failed: {}", e);
            }
        }
        self.scanner.ensure_stopped();
        self.radio.shutdown();
        self.registry.clear();
        self.subscriber = None;
    }
}
