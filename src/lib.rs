//! Beacon Coordinator
//!
//! Discovers nearby BLE beacons through an injected radio manager and pairs
//! with and configures one beacon on request, while keeping a background scan
//! running.

pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use infrastructure::bluetooth::service::{
    spawn, CoordinatorConfig, CoordinatorError, CoordinatorHandle,
};
