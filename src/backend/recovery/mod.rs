//! Controller recovery after a failed transmit or receive.
//!
//! The supervisor is reactive: every call queries the controller status once and
//! applies one of two coarse policies.
//!
//! * **Bus-off**: request the bus-off recovery sequence, then suspend the caller
//!   for `timeouts.bus_off`. The outcome is not re-checked; the next send or
//!   receive reveals whether the bus came back.
//! * **Not running** (stopped, or still recovering): stop the controller,
//!   suspend for `timeouts.bus_not_running`, start it again. Stop/start errors
//!   are logged and absorbed; a stopped controller rejects the stop and a
//!   controller still recovering rejects both, which shows up as
//!   [`RecoveryOutcome::RestartFailed`].
//!
//! A running controller (transient, one-off error) is left untouched, and a
//! failing status query aborts the cycle without any action.
use embassy_time::Duration;

use crate::config::TimeoutConfig;
use crate::core::ControllerState;
use crate::driver::traits::{twai_driver::TwaiDriver, twai_timer::TwaiTimer};

/// Intervention chosen for a controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryAction {
    /// Controller is running; nothing to do.
    None,
    /// Request bus-off recovery and wait.
    InitiateBusOffRecovery,
    /// Stop, wait, start.
    Restart,
}

impl RecoveryAction {
    /// Policy decision for a given controller state.
    pub fn for_state(state: ControllerState) -> Self {
        match state {
            ControllerState::Running => RecoveryAction::None,
            ControllerState::BusOff => RecoveryAction::InitiateBusOffRecovery,
            ControllerState::Stopped | ControllerState::Recovering => RecoveryAction::Restart,
        }
    }
}

/// What a recovery cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryOutcome {
    /// Controller was running.
    NoActionNeeded,
    /// Bus-off recovery was requested and the bus-off wait elapsed.
    BusOffRecoveryStarted,
    /// Controller was started again.
    Restarted,
    /// The restart sequence ran but the controller refused to start.
    RestartFailed,
    /// Status query failed; nothing was attempted.
    StatusUnavailable,
}

impl RecoveryOutcome {
    /// `true` when the controller was found bus-off.
    #[inline]
    pub fn was_bus_off(&self) -> bool {
        matches!(self, RecoveryOutcome::BusOffRecoveryStarted)
    }
}

/// Recovery policy parameterized by the configured waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverySupervisor {
    bus_off_wait: Duration,
    restart_wait: Duration,
}

impl RecoverySupervisor {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        Self {
            bus_off_wait: timeouts.bus_off,
            restart_wait: timeouts.bus_not_running,
        }
    }

    /// Run one recovery cycle against `driver`, suspending through `timer`.
    pub async fn check<D: TwaiDriver, T: TwaiTimer>(
        &self,
        driver: &mut D,
        timer: &mut T,
    ) -> RecoveryOutcome {
        let status = match driver.status() {
            Ok(status) => status,
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::debug!(
                    "Status query failed, skipping recovery: {:?}",
                    defmt::Debug2Format(&_e)
                );
                return RecoveryOutcome::StatusUnavailable;
            }
        };

        match RecoveryAction::for_state(status.state) {
            RecoveryAction::None => RecoveryOutcome::NoActionNeeded,
            RecoveryAction::InitiateBusOffRecovery => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Bus-off detected, initiating recovery...");

                if let Err(_e) = driver.initiate_recovery() {
                    #[cfg(feature = "defmt")]
                    defmt::warn!(
                        "Failed to initiate bus-off recovery: {:?}",
                        defmt::Debug2Format(&_e)
                    );
                }
                timer.delay(self.bus_off_wait).await;
                RecoveryOutcome::BusOffRecoveryStarted
            }
            RecoveryAction::Restart => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Controller not running (state={}), restarting...", status.state);

                if let Err(_e) = driver.stop() {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Failed to stop TWAI: {:?}", defmt::Debug2Format(&_e));
                }
                timer.delay(self.restart_wait).await;
                match driver.start() {
                    Ok(()) => RecoveryOutcome::Restarted,
                    Err(_e) => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("Failed to start TWAI: {:?}", defmt::Debug2Format(&_e));
                        RecoveryOutcome::RestartFailed
                    }
                }
            }
        }
    }
}
