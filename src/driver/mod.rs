//! Driver-facing side of the crate: the frame type exchanged with the TWAI
//! peripheral and the traits a concrete driver implements.
//!
//! ## Reference timeouts
//!
//! Values of the reference hardware profile, used by
//! [`TimeoutConfig::default`](crate::config::TimeoutConfig).

pub mod message;
pub mod traits;

/// Receive wait per poll (ms). Short enough for a producer task to poll in a
/// tight loop without starving other tasks.
pub const RECEIVE_TIMEOUT_MS: u64 = 100;

/// Transmit wait for room in the TX queue (ms).
pub const TRANSMIT_TIMEOUT_MS: u64 = 100;

/// Wait after requesting a bus-off recovery (ms).
///
/// Recovery needs 128 occurrences of 11 consecutive recessive bits; at
/// 25 kbit/s that is roughly 56 ms, so one second leaves a wide margin on a
/// busy bus.
pub const BUS_OFF_TIMEOUT_MS: u64 = 1000;

/// Wait between stopping and restarting a controller that is not running (ms).
pub const BUS_NOT_RUNNING_TIMEOUT_MS: u64 = 100;
