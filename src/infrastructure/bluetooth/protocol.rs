//! Beacon Protocol
//!
//! Fixed values used when pairing with and configuring a beacon.
//! None of these are user-configurable: every beacon in the fleet ships with
//! the same shared secret and receives the same trigger.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shared secret supplied whenever a beacon asks for its password
pub const BEACON_PASSWORD: &str = "minew123";

/// Logical slot the double-tap trigger is bound to
pub const TRIGGER_SLOT: u8 = 2;

/// Trigger timing condition in milliseconds
pub const TRIGGER_CONDITION_MS: u32 = 5000;

/// Default delay before the advertisement cache is reset
pub const CLEAR_SCAN_DELAY: Duration = Duration::from_millis(5000);

/// Behaviour bound to the trigger slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    ButtonDoubleTap,
}

/// A single on-device trigger as sent to the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub slot: u8,
    pub kind: TriggerKind,
    pub condition_ms: u32,
    pub always_advertising: bool,
}

impl TriggerConfig {
    /// The post-connect configuration every processed beacon receives
    pub fn double_tap() -> Self {
        Self {
            slot: TRIGGER_SLOT,
            kind: TriggerKind::ButtonDoubleTap,
            condition_ms: TRIGGER_CONDITION_MS,
            always_advertising: false,
        }
    }
}
