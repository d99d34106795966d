//! Bluetooth Module
//!
//! Coordinates background beacon discovery and on-demand pairing through an
//! injected radio manager.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Coordinator (service)                    │
//! │   actor task: registry, session, subscriber slot         │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Scanner  │  │  Debounce  │  │  Radio   │
//! │           │  │            │  │          │
//! │ - scan    │  │ - delayed  │  │ - vendor │
//! │   state   │  │   cache    │  │   trait  │
//! │           │  │   reset    │  │ - sinks  │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Shared secret and trigger constants
//! - [`radio`] - Radio manager capability and callback sinks
//! - [`scanner`] - Scan state controller
//! - [`debounce`] - Clear-scan debouncer
//! - [`service`] - Coordinator actor and its handle
//! - [`simulated`] - In-process radio for the console binary

pub mod debounce;
pub mod protocol;
pub mod radio;
pub mod scanner;
pub mod service;
pub mod simulated;

pub use service::{CoordinatorConfig, CoordinatorHandle};
