//! Minimal abstraction over the vendor TWAI driver. The backend only needs the
//! lifecycle calls, bounded transmit/receive, a status query and the bus-off
//! recovery trigger; everything below that stays in the driver.
use embassy_time::Duration;
use futures_util::Future;

use crate::config::{FilterConfig, GeneralConfig, TimingConfig};
use crate::core::StatusInfo;
use crate::driver::message::TwaiMessage;

/// Error reported by a [`TwaiDriver`].
pub trait DriverError: core::fmt::Debug {
    /// `true` when the call only ran out of time (no frame, full queue).
    fn is_timeout(&self) -> bool;
}

/// Contract implemented by the underlying TWAI peripheral driver.
pub trait TwaiDriver {
    type Error: DriverError;

    /// Install the driver with the merged general configuration, bit timing and
    /// acceptance filter. The controller is left stopped.
    fn install(
        &mut self,
        general: &GeneralConfig,
        timing: &TimingConfig,
        filter: &FilterConfig,
    ) -> Result<(), Self::Error>;

    /// Move the controller to the running state.
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Move the controller to the stopped state.
    fn stop(&mut self) -> Result<(), Self::Error>;

    /// Release every resource acquired by `install`.
    fn uninstall(&mut self) -> Result<(), Self::Error>;

    /// Queue a frame for transmission, waiting at most `timeout` for room.
    fn transmit<'a>(
        &'a mut self,
        message: &'a TwaiMessage,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;

    /// Pop the next received frame, waiting at most `timeout`.
    fn receive<'a>(
        &'a mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<TwaiMessage, Self::Error>> + 'a;

    /// Query the controller status.
    fn status(&mut self) -> Result<StatusInfo, Self::Error>;

    /// Start the bus-off recovery sequence. Returns immediately.
    fn initiate_recovery(&mut self) -> Result<(), Self::Error>;
}
