#![allow(dead_code)]

use beacon_coordinator::domain::models::{
    AdvFrame, AdvertisedPeripheral, BoundaryEvent, PeripheralRecord,
};
use beacon_coordinator::infrastructure::bluetooth::protocol::TriggerConfig;
use beacon_coordinator::infrastructure::bluetooth::radio::{
    ConnectionSink, RadioError, RadioManager, RadioSink, TriggerSink,
};
use beacon_coordinator::{CoordinatorConfig, CoordinatorHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    StartScan,
    StopScan,
    ClearCache,
    Connect(String),
    Disconnect(String),
    SetTrigger(String, TriggerConfig),
    Shutdown,
}

/// Radio double that records every call and lets the test play callbacks
#[derive(Debug, Default)]
pub struct RecordingRadio {
    calls: Mutex<Vec<RadioCall>>,
    scanning: AtomicBool,
    sink: Mutex<Option<RadioSink>>,
    connections: Mutex<Vec<ConnectionSink>>,
    triggers: Mutex<Vec<TriggerSink>>,
    pub fail_connect: AtomicBool,
    pub fail_trigger: AtomicBool,
}

impl RecordingRadio {
    fn record(&self, call: RadioCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &RadioCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn discover(&self, batch: Vec<AdvertisedPeripheral>) {
        let sink = self.sink.lock().unwrap().clone();
        sink.expect("radio not attached").discovered(batch);
    }

    /// Sink of the most recent connect call
    pub fn connection(&self) -> ConnectionSink {
        self.connections
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connect call")
    }

    pub fn trigger(&self) -> TriggerSink {
        self.triggers
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no set_trigger call")
    }
}

impl RadioManager for RecordingRadio {
    fn attach(&self, sink: RadioSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn start_scan(&self) -> Result<(), RadioError> {
        self.record(RadioCall::StartScan);
        self.scanning.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_scan(&self) -> Result<(), RadioError> {
        self.record(RadioCall::StopScan);
        self.scanning.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    fn clear_cache(&self) -> Result<(), RadioError> {
        self.record(RadioCall::ClearCache);
        Ok(())
    }

    fn connect(
        &self,
        peripheral: &PeripheralRecord,
        sink: ConnectionSink,
    ) -> Result<(), RadioError> {
        self.record(RadioCall::Connect(peripheral.address.clone()));
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(RadioError::Unreachable(peripheral.address.clone()));
        }
        self.connections.lock().unwrap().push(sink);
        Ok(())
    }

    fn disconnect(&self, peripheral: &PeripheralRecord) -> Result<(), RadioError> {
        self.record(RadioCall::Disconnect(peripheral.address.clone()));
        Ok(())
    }

    fn set_trigger(
        &self,
        peripheral: &PeripheralRecord,
        trigger: TriggerConfig,
        sink: TriggerSink,
    ) -> Result<(), RadioError> {
        self.record(RadioCall::SetTrigger(peripheral.address.clone(), trigger));
        if self.fail_trigger.load(Ordering::SeqCst) {
            return Err(RadioError::Failed("gatt write failed".to_string()));
        }
        self.triggers.lock().unwrap().push(sink);
        Ok(())
    }

    fn shutdown(&self) {
        self.record(RadioCall::Shutdown);
    }
}

pub fn beacon(address: &str, name: Option<&str>, url: Option<&str>) -> AdvertisedPeripheral {
    let mut frames = vec![AdvFrame::Tlm { battery_mv: 2950 }];
    if let Some(url) = url {
        frames.push(AdvFrame::Url {
            url: url.to_string(),
        });
    }
    AdvertisedPeripheral {
        address: address.to_string(),
        name: name.map(str::to_string),
        frames,
    }
}

pub struct Harness {
    pub radio: Arc<RecordingRadio>,
    pub handle: CoordinatorHandle,
    pub events: mpsc::UnboundedReceiver<BoundaryEvent>,
}

impl Harness {
    pub async fn start(config: CoordinatorConfig) -> Self {
        let radio = Arc::new(RecordingRadio::default());
        let handle = beacon_coordinator::spawn(radio.clone(), config);
        let events = handle.subscribe().unwrap();
        // Commands are handled in order, so the subscriber is attached once this returns
        handle.is_running().await.unwrap();
        Self {
            radio,
            handle,
            events,
        }
    }

    pub async fn next_event(&mut self) -> BoundaryEvent {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream closed")
    }

    /// Assert no event arrives within a second
    pub async fn assert_quiet(&mut self) {
        let next = tokio::time::timeout(Duration::from_secs(1), self.events.recv()).await;
        assert!(next.is_err(), "unexpected event: {:?}", next);
    }

    /// Deliver a batch and wait for its discovery event
    pub async fn discover(&mut self, batch: Vec<AdvertisedPeripheral>) -> BoundaryEvent {
        self.radio.discover(batch);
        self.next_event().await
    }
}
