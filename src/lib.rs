//! `twai-backend` library: a small adapter over a TWAI (CAN) peripheral driver
//! for `no_std` targets. It provides validated configuration, bounded
//! send/receive, and automatic bus-off and restart recovery.
#![no_std]
//==================================================================================
/// Frame length constants and controller status types.
pub mod core;
/// Configuration and runtime errors.
pub mod error;
/// Wiring, controller parameters, timing/filter and timeout configuration.
pub mod config;
/// Frame type and the traits implemented by a concrete TWAI driver.
pub mod driver;
/// Controller adapter, recovery supervisor and delivery buffer.
pub mod backend;
//==================================================================================
pub use backend::adapter::TwaiBackend;
pub use backend::recovery::{RecoveryOutcome, RecoverySupervisor};
pub use config::BackendConfig;
pub use driver::message::TwaiMessage;
pub use error::{ErrorKind, TwaiError};
