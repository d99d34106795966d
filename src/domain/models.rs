use serde::{Deserialize, Serialize};

/// One advertisement frame reported by the radio for a peripheral.
///
/// Only URL frames carry meaning for the coordinator; the other frame kinds are
/// kept so that the advertisement can be passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdvFrame {
    Url { url: String },
    Uid { namespace: String, instance: String },
    IBeacon {
        uuid: String,
        major: u16,
        minor: u16,
    },
    Tlm { battery_mv: u16 },
    Other { code: u8 },
}

/// A peripheral as the radio reports it in a discovery batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisedPeripheral {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub frames: Vec<AdvFrame>,
}

/// One observed beacon, keyed by its hardware address.
///
/// Records are never mutated; a new batch replaces them wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralRecord {
    #[serde(rename = "mac")]
    pub address: String,
    pub name: Option<String>,
    #[serde(rename = "url", skip_serializing_if = "Option::is_none")]
    pub advertised_url: Option<String>,
}

impl PeripheralRecord {
    /// Build a record from a raw advertisement. The URL comes from the first URL
    /// frame; every other frame is ignored.
    pub fn from_advertisement(peripheral: &AdvertisedPeripheral) -> Self {
        let advertised_url = peripheral.frames.iter().find_map(|frame| match frame {
            AdvFrame::Url { url } => Some(url.clone()),
            _ => None,
        });

        Self {
            address: peripheral.address.clone(),
            name: peripheral.name.clone(),
            advertised_url,
        }
    }

    pub fn has_url(&self) -> bool {
        self.advertised_url.is_some()
    }

    /// Case-insensitive address comparison
    pub fn matches(&self, address: &str) -> bool {
        normalize_address(&self.address) == normalize_address(address)
    }
}

/// Canonical form used for address comparison: trimmed, upper case.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_uppercase()
}

/// Events delivered to the external subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BoundaryEvent {
    DiscoveryUpdated { peripherals: Vec<PeripheralRecord> },
    TapDetected { mac: String },
    ProcessResult { success: bool },
}

/// Commands accepted from the external boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    IsRunning,
    ProcessAddress(String),
    ClearScanning,
}

/// Synchronous answer to a [`Command`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandReply {
    Done,
    Running(bool),
    /// The request was taken; its outcome arrives later as a `ProcessResult` event
    Accepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
}
