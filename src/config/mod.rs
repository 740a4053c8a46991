//! Backend configuration split into logical groups: wiring, controller
//! parameters, timing/filter and runtime timeouts.
//!
//! A [`BackendConfig`] is built once by the caller, validated by
//! [`BackendConfig::validate`] and copied into the backend on a successful
//! `init`.
use bitflags::bitflags;
use embassy_time::Duration;

use crate::driver::{
    BUS_NOT_RUNNING_TIMEOUT_MS, BUS_OFF_TIMEOUT_MS, RECEIVE_TIMEOUT_MS, TRANSMIT_TIMEOUT_MS,
};
use crate::error::ConfigError;

mod timing;
pub use timing::{FilterConfig, TimingConfig, TimingFilterConfig, DEFAULT_SOURCE_CLOCK_HZ};

/// Highest GPIO number available on the largest supported chip.
pub const GPIO_NUM_MAX: u8 = 48;

/// Marker for an optional pin that is not wired.
pub const IO_UNUSED: Option<u8> = None;

//==================================================================================WIRING
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// GPIO wiring of the controller.
pub struct WiringConfig {
    /// TX pin (to the transceiver TX input).
    pub tx_gpio: u8,
    /// RX pin (from the transceiver RX output).
    pub rx_gpio: u8,
    /// Clock output pin, [`IO_UNUSED`] when not wired.
    pub clkout_gpio: Option<u8>,
    /// Bus-off indicator pin, [`IO_UNUSED`] when not wired.
    pub bus_off_gpio: Option<u8>,
}

impl WiringConfig {
    /// TX/RX wiring with both optional pins unused.
    pub const fn new(tx_gpio: u8, rx_gpio: u8) -> Self {
        Self {
            tx_gpio,
            rx_gpio,
            clkout_gpio: IO_UNUSED,
            bus_off_gpio: IO_UNUSED,
        }
    }

    /// TX and RX must be valid and distinct; optional pins must be valid and
    /// must not reuse another signal's GPIO.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pin in [self.tx_gpio, self.rx_gpio] {
            if pin > GPIO_NUM_MAX {
                return Err(ConfigError::PinOutOfRange { pin });
            }
        }
        if self.tx_gpio == self.rx_gpio {
            return Err(ConfigError::SameTxRxPin { pin: self.tx_gpio });
        }

        for pin in [self.clkout_gpio, self.bus_off_gpio].into_iter().flatten() {
            if pin > GPIO_NUM_MAX {
                return Err(ConfigError::PinOutOfRange { pin });
            }
            if pin == self.tx_gpio || pin == self.rx_gpio {
                return Err(ConfigError::PinConflict { pin });
            }
        }
        if let (Some(clkout), Some(bus_off)) = (self.clkout_gpio, self.bus_off_gpio) {
            if clkout == bus_off {
                return Err(ConfigError::PinConflict { pin: clkout });
            }
        }
        Ok(())
    }
}

impl Default for WiringConfig {
    fn default() -> Self {
        Self::new(39, 40)
    }
}

//==================================================================================PARAMS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Controller operating mode.
pub enum TwaiMode {
    /// Transmit, receive and acknowledge.
    #[default]
    Normal,
    /// Transmit without requiring an acknowledgement (self test).
    NoAck,
    /// Receive only; never drives the bus.
    ListenOnly,
}

bitflags! {
    /// Driver alerts to enable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AlertFlags: u32 {
        const TX_IDLE = 0x0000_0001;
        const TX_SUCCESS = 0x0000_0002;
        const RX_DATA = 0x0000_0004;
        const BELOW_ERR_WARN = 0x0000_0008;
        const ERR_ACTIVE = 0x0000_0010;
        const RECOVERY_IN_PROGRESS = 0x0000_0020;
        const BUS_RECOVERED = 0x0000_0040;
        const ARB_LOST = 0x0000_0080;
        const ABOVE_ERR_WARN = 0x0000_0100;
        const BUS_ERROR = 0x0000_0200;
        const TX_FAILED = 0x0000_0400;
        const RX_QUEUE_FULL = 0x0000_0800;
        const ERR_PASS = 0x0000_1000;
        const BUS_OFF = 0x0000_2000;
        const RX_FIFO_OVERRUN = 0x0000_4000;
        const TX_RETRIED = 0x0000_8000;
        const PERIPH_RESET = 0x0001_0000;
    }
}

bitflags! {
    /// Interrupt allocation flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InterruptFlags: u32 {
        const LEVEL1 = 1 << 1;
        const LEVEL2 = 1 << 2;
        const LEVEL3 = 1 << 3;
        const LEVEL4 = 1 << 4;
        const LEVEL5 = 1 << 5;
        const LEVEL6 = 1 << 6;
        const NMI = 1 << 7;
        const SHARED = 1 << 8;
        const EDGE = 1 << 9;
        const IRAM = 1 << 10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Controller parameters that are not GPIO related.
pub struct ControllerParams {
    /// Controller index (0 on single-controller chips).
    pub controller_id: u8,
    pub mode: TwaiMode,
    /// Transmit queue depth in frames.
    pub tx_queue_len: u32,
    /// Receive queue depth in frames.
    pub rx_queue_len: u32,
    pub alerts: AlertFlags,
    /// Clock output divider; `0` disables the clock output.
    pub clkout_divider: u32,
    pub intr_flags: InterruptFlags,
}

impl ControllerParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tx_queue_len == 0 {
            return Err(ConfigError::EmptyQueue { queue: "TX" });
        }
        if self.rx_queue_len == 0 {
            return Err(ConfigError::EmptyQueue { queue: "RX" });
        }
        let divider = self.clkout_divider;
        if divider > 14 || (divider > 1 && divider % 2 != 0) {
            return Err(ConfigError::InvalidClockDivider { divider });
        }
        Ok(())
    }
}

impl Default for ControllerParams {
    fn default() -> Self {
        Self {
            controller_id: 0,
            mode: TwaiMode::Normal,
            tx_queue_len: 20,
            rx_queue_len: 20,
            alerts: AlertFlags::empty(),
            clkout_divider: 0,
            intr_flags: InterruptFlags::LEVEL1,
        }
    }
}

//==================================================================================TIMEOUTS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Runtime timeouts used by send/receive and by recovery.
pub struct TimeoutConfig {
    /// Maximum wait for a received frame.
    pub receive: Duration,
    /// Maximum wait for room in the transmit queue.
    pub transmit: Duration,
    /// Suspension after requesting a bus-off recovery.
    pub bus_off: Duration,
    /// Suspension between stopping and restarting the controller.
    pub bus_not_running: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            receive: Duration::from_millis(RECEIVE_TIMEOUT_MS),
            transmit: Duration::from_millis(TRANSMIT_TIMEOUT_MS),
            bus_off: Duration::from_millis(BUS_OFF_TIMEOUT_MS),
            bus_not_running: Duration::from_millis(BUS_NOT_RUNNING_TIMEOUT_MS),
        }
    }
}

//==================================================================================GENERAL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Wiring and controller parameters merged into the shape the driver installs.
pub struct GeneralConfig {
    pub controller_id: u8,
    pub mode: TwaiMode,
    pub tx_gpio: u8,
    pub rx_gpio: u8,
    pub clkout_gpio: Option<u8>,
    pub bus_off_gpio: Option<u8>,
    pub tx_queue_len: u32,
    pub rx_queue_len: u32,
    pub alerts: AlertFlags,
    pub clkout_divider: u32,
    pub intr_flags: InterruptFlags,
}

//==================================================================================BACKEND
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Complete backend configuration.
pub struct BackendConfig {
    pub wiring: WiringConfig,
    pub params: ControllerParams,
    pub tf: TimingFilterConfig,
    pub timeouts: TimeoutConfig,
}

impl BackendConfig {
    pub fn with_wiring(mut self, wiring: WiringConfig) -> Self {
        self.wiring = wiring;
        self
    }

    pub fn with_params(mut self, params: ControllerParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_mode(mut self, mode: TwaiMode) -> Self {
        self.params.mode = mode;
        self
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.tf.timing = timing;
        self
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.tf.filter = filter;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Validate every group, then the cross-group constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.wiring.validate()?;
        self.params.validate()?;
        self.tf.timing.validate()?;
        if self.params.clkout_divider > 0 && self.wiring.clkout_gpio.is_none() {
            return Err(ConfigError::ClockOutPinMissing);
        }
        Ok(())
    }

    /// Merge wiring and parameters for
    /// [`TwaiDriver::install`](crate::driver::traits::twai_driver::TwaiDriver::install).
    pub fn general_config(&self) -> GeneralConfig {
        GeneralConfig {
            controller_id: self.params.controller_id,
            mode: self.params.mode,
            tx_gpio: self.wiring.tx_gpio,
            rx_gpio: self.wiring.rx_gpio,
            clkout_gpio: self.wiring.clkout_gpio,
            bus_off_gpio: self.wiring.bus_off_gpio,
            tx_queue_len: self.params.tx_queue_len,
            rx_queue_len: self.params.rx_queue_len,
            alerts: self.params.alerts,
            clkout_divider: self.params.clkout_divider,
            intr_flags: self.params.intr_flags,
        }
    }
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
