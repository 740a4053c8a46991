//! Shared data types describing a classic CAN frame and the controller state
//! as reported by the underlying TWAI peripheral driver.

/// Largest data length code accepted for a classic CAN frame.
pub const MAX_DLC: u8 = 8;

/// Size of the payload buffer carried by every message.
pub const MAX_DATA_LEN: usize = MAX_DLC as usize;

/// Error counter value above which the controller leaves the error-active state.
pub const ERROR_PASSIVE_THRESHOLD: u32 = 127;

/// Operating state of the TWAI controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerState {
    /// Installed but not participating in bus activity.
    Stopped,
    /// Started and able to transmit and receive.
    Running,
    /// Transmit error counter overflowed; an explicit recovery is required.
    BusOff,
    /// Bus-off recovery in progress (waiting for 128 × 11 recessive bits).
    Recovering,
}

impl ControllerState {
    /// `true` only for [`ControllerState::Running`].
    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self, ControllerState::Running)
    }
}

/// Fault confinement state derived from the error counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorState {
    Active,
    Passive,
    BusOff,
}

/// Snapshot of the controller status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInfo {
    /// Current controller state.
    pub state: ControllerState,
    /// Frames waiting in the transmit queue.
    pub msgs_to_tx: u32,
    /// Frames waiting in the receive queue.
    pub msgs_to_rx: u32,
    /// Transmit error counter (TEC).
    pub tx_error_counter: u32,
    /// Receive error counter (REC).
    pub rx_error_counter: u32,
    /// Transmissions that ended in failure.
    pub tx_failed_count: u32,
    /// Frames lost because the receive queue was full.
    pub rx_missed_count: u32,
    /// Frames lost because the hardware FIFO overran.
    pub rx_overrun_count: u32,
    /// Arbitration losses.
    pub arb_lost_count: u32,
    /// Bus errors observed.
    pub bus_error_count: u32,
}

impl StatusInfo {
    /// Status with the given state and every counter cleared.
    pub const fn with_state(state: ControllerState) -> Self {
        Self {
            state,
            msgs_to_tx: 0,
            msgs_to_rx: 0,
            tx_error_counter: 0,
            rx_error_counter: 0,
            tx_failed_count: 0,
            rx_missed_count: 0,
            rx_overrun_count: 0,
            arb_lost_count: 0,
            bus_error_count: 0,
        }
    }

    /// Fault confinement state.
    ///
    /// Bus-off wins over the counters; otherwise the controller is error passive
    /// once either counter exceeds [`ERROR_PASSIVE_THRESHOLD`].
    pub fn error_state(&self) -> ErrorState {
        if self.state == ControllerState::BusOff {
            ErrorState::BusOff
        } else if self.tx_error_counter > ERROR_PASSIVE_THRESHOLD
            || self.rx_error_counter > ERROR_PASSIVE_THRESHOLD
        {
            ErrorState::Passive
        } else {
            ErrorState::Active
        }
    }
}

impl Default for StatusInfo {
    fn default() -> Self {
        Self::with_state(ControllerState::Stopped)
    }
}
