//! Radio Manager Capability
//!
//! The vendor radio stack is injected into the coordinator as a
//! [`RadioManager`]. Every callback the radio makes goes through one of the
//! sinks below, which post a message onto the coordinator's inbox instead of
//! touching coordinator state directly.

use crate::domain::models::{AdvertisedPeripheral, PeripheralRecord};
use crate::domain::session::{ConnectionStatus, SessionId};
use crate::infrastructure::bluetooth::protocol::TriggerConfig;
use crate::infrastructure::bluetooth::service::{ConnectionUpdate, CoordinatorMsg};
use std::fmt::Debug;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("bluetooth adapter unavailable")]
    AdapterUnavailable,
    #[error("peripheral {0} unreachable")]
    Unreachable(String),
    #[error("password rejected")]
    PasswordRejected,
    #[error("radio operation failed: {0}")]
    Failed(String),
}

/// Scan, connect and configure primitives of the vendor radio.
///
/// Calls must not block: outcomes of `connect` and `set_trigger` are reported
/// later through the sink passed in.
pub trait RadioManager: Send + Sync + Debug {
    /// Register where discovery batches go. Called once at coordinator start.
    fn attach(&self, sink: RadioSink);
    fn start_scan(&self) -> Result<(), RadioError>;
    fn stop_scan(&self) -> Result<(), RadioError>;
    fn is_scanning(&self) -> bool;
    /// Drop the radio's internal advertisement cache
    fn clear_cache(&self) -> Result<(), RadioError>;
    fn connect(
        &self,
        peripheral: &PeripheralRecord,
        sink: ConnectionSink,
    ) -> Result<(), RadioError>;
    fn disconnect(&self, peripheral: &PeripheralRecord) -> Result<(), RadioError>;
    fn set_trigger(
        &self,
        peripheral: &PeripheralRecord,
        trigger: TriggerConfig,
        sink: TriggerSink,
    ) -> Result<(), RadioError>;
    /// Release the radio stack. Called once on teardown.
    fn shutdown(&self);
}

/// Receives discovery batches from the radio
#[derive(Debug, Clone)]
pub struct RadioSink {
    inbox: mpsc::UnboundedSender<CoordinatorMsg>,
}

impl RadioSink {
    pub(crate) fn new(inbox: mpsc::UnboundedSender<CoordinatorMsg>) -> Self {
        Self { inbox }
    }

    pub fn discovered(&self, batch: Vec<AdvertisedPeripheral>) {
        if self.inbox.send(CoordinatorMsg::Discovery(batch)).is_err() {
            trace!("Coordinator gone, discovery batch dropped");
        }
    }
}

/// Credential request handed out with [`ConnectionStatus::PasswordValidating`]
#[derive(Debug)]
pub struct PasswordRequest {
    responder: oneshot::Sender<String>,
}

impl PasswordRequest {
    pub fn new(responder: oneshot::Sender<String>) -> Self {
        Self { responder }
    }

    pub fn supply(self, secret: &str) {
        let _ = self.responder.send(secret.to_string());
    }
}

/// Status sink for one connection attempt
#[derive(Debug, Clone)]
pub struct ConnectionSink {
    session: SessionId,
    inbox: mpsc::UnboundedSender<CoordinatorMsg>,
}

impl ConnectionSink {
    pub(crate) fn new(session: SessionId, inbox: mpsc::UnboundedSender<CoordinatorMsg>) -> Self {
        Self { session, inbox }
    }

    pub fn update(&self, status: ConnectionStatus, password: Option<PasswordRequest>) {
        self.post(ConnectionUpdate::Status { status, password });
    }

    pub fn status(&self, status: ConnectionStatus) {
        self.update(status, None);
    }

    pub fn error(&self, error: RadioError) {
        self.post(ConnectionUpdate::Error(error));
    }

    fn post(&self, update: ConnectionUpdate) {
        let msg = CoordinatorMsg::Connection {
            session: self.session,
            update,
        };
        if self.inbox.send(msg).is_err() {
            trace!("Coordinator gone, connection update dropped");
        }
    }
}

/// Result sink for a trigger configuration request
#[derive(Debug, Clone)]
pub struct TriggerSink {
    address: String,
    inbox: mpsc::UnboundedSender<CoordinatorMsg>,
}

impl TriggerSink {
    pub(crate) fn new(address: String, inbox: mpsc::UnboundedSender<CoordinatorMsg>) -> Self {
        Self { address, inbox }
    }

    pub fn result(&self, result: Result<(), RadioError>) {
        let msg = CoordinatorMsg::TriggerResult {
            address: self.address.clone(),
            result,
        };
        let _ = self.inbox.send(msg);
    }
}
