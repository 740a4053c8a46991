//! Error definitions shared across library modules.
//! Configuration problems are reported before any hardware access; runtime
//! failures carry the driver error when one exists.
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Reasons a [`BackendConfig`](crate::config::BackendConfig) is rejected.
pub enum ConfigError {
    /// TX and RX are wired to the same GPIO.
    #[error("TX and RX share GPIO {pin}")]
    SameTxRxPin { pin: u8 },
    /// GPIO number beyond the last pin of the chip.
    #[error("GPIO {pin} is out of range")]
    PinOutOfRange { pin: u8 },
    /// An optional pin reuses a GPIO already assigned to another signal.
    #[error("GPIO {pin} is assigned twice")]
    PinConflict { pin: u8 },
    /// Queue depth must be at least one frame.
    #[error("{queue} queue length must be positive")]
    EmptyQueue { queue: &'static str },
    /// Clock-out divider must be 0, 1 or an even value up to 14.
    #[error("Invalid clock-out divider: {divider}")]
    InvalidClockDivider { divider: u32 },
    /// A clock-out divider was set but no clock-out pin is wired.
    #[error("Clock-out divider set without a clock-out GPIO")]
    ClockOutPinMissing,
    /// Bit timing field outside the range supported by the controller.
    #[error("Invalid bit timing field: {field}")]
    InvalidTiming { field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Driver lifecycle step that failed during init/deinit.
pub enum LifecycleStage {
    Install,
    Start,
    Stop,
    Uninstall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Coarse classification of [`TwaiError`].
pub enum ErrorKind {
    /// Rejected locally before touching the controller.
    ConfigInvalid,
    /// Nothing happened within the configured timeout.
    Timeout,
    /// Controller was found bus-off and a recovery was started.
    BusOff,
    /// Any other driver-reported failure or corrupt data.
    DriverFault,
    /// Install/start/stop/uninstall failure or wrong lifecycle state.
    LifecycleFault,
}

//==================================================================================BACKEND_ERROR
#[derive(Error, Debug)]
/// Errors returned by [`TwaiBackend`](crate::backend::adapter::TwaiBackend).
pub enum TwaiError<E: core::fmt::Debug> {
    /// Configuration failed validation; the driver was not touched.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// Outgoing message carries a data length code above 8.
    #[error("Invalid message length: {dlc}")]
    InvalidLength { dlc: u8 },
    /// A received frame carried a data length code above 8 and was discarded.
    #[error("Received message with invalid DLC: {dlc}")]
    CorruptFrame { dlc: u8 },
    /// `init` has not been called, or `deinit` already released the driver.
    #[error("Backend not initialized")]
    NotInitialized,
    /// `init` called on a backend that still holds an installed driver.
    #[error("Backend already initialized")]
    AlreadyInitialized,
    /// Transmit or receive timed out.
    #[error("Operation timed out")]
    Timeout,
    /// Operation failed and the controller was found bus-off.
    #[error("Controller bus-off: {0:?}")]
    BusOff(E),
    /// Operation failed with a driver error.
    #[error("Driver error: {0:?}")]
    Driver(E),
    /// A lifecycle step failed.
    #[error("Failed to {stage:?} TWAI driver: {error:?}")]
    Lifecycle { stage: LifecycleStage, error: E },
}

impl<E: core::fmt::Debug> TwaiError<E> {
    /// Collapse the error into its [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            TwaiError::Config(_) | TwaiError::InvalidLength { .. } => ErrorKind::ConfigInvalid,
            TwaiError::Timeout => ErrorKind::Timeout,
            TwaiError::BusOff(_) => ErrorKind::BusOff,
            TwaiError::CorruptFrame { .. } | TwaiError::Driver(_) => ErrorKind::DriverFault,
            TwaiError::NotInitialized
            | TwaiError::AlreadyInitialized
            | TwaiError::Lifecycle { .. } => ErrorKind::LifecycleFault,
        }
    }

    /// `true` for the expected "no frame within the timeout" outcome.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, TwaiError::Timeout)
    }
}
