//! High-level TWAI backend: owns the driver, the timer and the single active
//! configuration, and funnels every failure through the recovery supervisor.
use crate::{
    backend::recovery::{RecoveryOutcome, RecoverySupervisor},
    config::BackendConfig,
    core::{StatusInfo, MAX_DLC},
    driver::{
        message::TwaiMessage,
        traits::{
            twai_driver::{DriverError, TwaiDriver},
            twai_timer::TwaiTimer,
        },
    },
    error::{LifecycleStage, TwaiError},
};
use embassy_time::Duration;

/// Controller adapter bound to one driver instance.
///
/// The backend starts uninitialized. [`init`](Self::init) installs and starts the
/// controller and keeps a copy of the configuration; [`deinit`](Self::deinit)
/// releases it. Send and receive use the configured timeouts and, on a
/// controller fault, run one recovery cycle before reporting the failure.
pub struct TwaiBackend<D: TwaiDriver, T: TwaiTimer> {
    /// Underlying peripheral driver.
    driver: D,
    /// Suspends the caller during recovery waits.
    timer: T,
    /// Configuration copied on a successful `init`, `None` otherwise.
    config: Option<BackendConfig>,
}

impl<D: TwaiDriver, T: TwaiTimer> TwaiBackend<D, T> {
    /// Wrap a driver and a timer. Does not touch the hardware.
    pub fn new(driver: D, timer: T) -> Self {
        Self {
            driver,
            timer,
            config: None,
        }
    }

    /// `true` between a successful `init` and a successful `deinit`.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    /// Active configuration, if initialized.
    pub fn config(&self) -> Option<&BackendConfig> {
        self.config.as_ref()
    }

    /// Direct access to the wrapped driver, e.g. for alert configuration the
    /// backend does not cover.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Install and start the controller.
    ///
    /// The configuration is validated first; nothing reaches the driver when it is
    /// rejected. If `start` fails after a successful install, the driver is
    /// uninstalled before the error is returned and the configuration is not kept.
    pub fn init(&mut self, config: &BackendConfig) -> Result<(), TwaiError<D::Error>> {
        if self.config.is_some() {
            return Err(TwaiError::AlreadyInitialized);
        }
        config.validate()?;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Initializing TWAI driver: tx={} rx={} mode={}",
            config.wiring.tx_gpio,
            config.wiring.rx_gpio,
            config.params.mode
        );

        let general = config.general_config();
        self.driver
            .install(&general, &config.tf.timing, &config.tf.filter)
            .map_err(|error| {
                #[cfg(feature = "defmt")]
                defmt::error!(
                    "Failed to install TWAI driver: {:?}",
                    defmt::Debug2Format(&error)
                );
                TwaiError::Lifecycle {
                    stage: LifecycleStage::Install,
                    error,
                }
            })?;

        if let Err(error) = self.driver.start() {
            #[cfg(feature = "defmt")]
            defmt::error!("Failed to start TWAI: {:?}", defmt::Debug2Format(&error));

            if let Err(_cleanup) = self.driver.uninstall() {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "Failed to uninstall TWAI driver after start failure: {:?}",
                    defmt::Debug2Format(&_cleanup)
                );
            }
            return Err(TwaiError::Lifecycle {
                stage: LifecycleStage::Start,
                error,
            });
        }

        self.config = Some(*config);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "TWAI started successfully (rx_timeout={}ms, tx_timeout={}ms)",
            config.timeouts.receive.as_millis(),
            config.timeouts.transmit.as_millis()
        );

        Ok(())
    }

    /// Stop and uninstall the controller.
    ///
    /// The controller is only stopped when it reports running; a stopped or
    /// bus-off controller goes straight to uninstall. Both steps are attempted
    /// even if stopping fails, and the first failure is returned. The
    /// configuration is dropped once the driver is uninstalled.
    pub fn deinit(&mut self) -> Result<(), TwaiError<D::Error>> {
        if self.config.is_none() {
            return Err(TwaiError::NotInitialized);
        }

        // Unknown status: try to stop anyway.
        let running = self
            .driver
            .status()
            .map_or(true, |status| status.state.is_running());

        let stopped = if running {
            self.driver.stop().map_err(|error| {
                #[cfg(feature = "defmt")]
                defmt::warn!("Failed to stop TWAI: {:?}", defmt::Debug2Format(&error));
                TwaiError::Lifecycle {
                    stage: LifecycleStage::Stop,
                    error,
                }
            })
        } else {
            Ok(())
        };

        let uninstalled = self.driver.uninstall().map_err(|error| {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "Failed to uninstall TWAI driver: {:?}",
                defmt::Debug2Format(&error)
            );
            TwaiError::Lifecycle {
                stage: LifecycleStage::Uninstall,
                error,
            }
        });

        if uninstalled.is_ok() {
            self.config = None;
        }
        stopped.and(uninstalled)
    }

    /// Transmit a frame with the configured transmit timeout.
    ///
    /// Frames with a data length code above 8 are rejected before the driver is
    /// called. Any driver failure (timeouts included) triggers one recovery cycle.
    pub async fn send(&mut self, message: &TwaiMessage) -> Result<(), TwaiError<D::Error>> {
        let timeouts = self.active_config()?.timeouts;

        if message.dlc > MAX_DLC {
            #[cfg(feature = "defmt")]
            defmt::error!("Invalid message length: {}", message.dlc);
            return Err(TwaiError::InvalidLength { dlc: message.dlc });
        }

        match self.driver.transmit(message, timeouts.transmit).await {
            Ok(()) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("Message sent: ID={=u32:#x}", message.raw_id());
                Ok(())
            }
            Err(error) => {
                #[cfg(feature = "defmt")]
                defmt::error!("Failed to send message: {:?}", defmt::Debug2Format(&error));

                Err(self.supervise(error).await)
            }
        }
    }

    /// Receive a frame with the configured receive timeout.
    ///
    /// A timeout is the expected idle outcome: it is neither logged as an error
    /// nor followed by recovery. A frame with an out-of-range data length code
    /// is discarded without recovery.
    pub async fn receive(&mut self) -> Result<TwaiMessage, TwaiError<D::Error>> {
        match self.receive_attempt().await {
            ReceiveAttempt::Frame(message) => Ok(message),
            ReceiveAttempt::Rejected(error) => Err(error),
            ReceiveAttempt::Fault(error) => Err(self.supervise(error).await),
        }
    }

    /// One receive call without recovery.
    ///
    /// Dropping the returned future only abandons the wait for a frame, so it
    /// can be raced against other work. A [`ReceiveAttempt::Fault`] must then be
    /// passed to [`supervise`](Self::supervise).
    pub(crate) async fn receive_attempt(&mut self) -> ReceiveAttempt<D::Error> {
        let timeouts = match self.active_config() {
            Ok(config) => config.timeouts,
            Err(error) => return ReceiveAttempt::Rejected(error),
        };

        match self.driver.receive(timeouts.receive).await {
            Ok(message) if message.has_valid_dlc() => {
                #[cfg(feature = "defmt")]
                defmt::debug!(
                    "Received ID={=u32:#x} LEN={}",
                    message.raw_id(),
                    message.dlc
                );
                ReceiveAttempt::Frame(message)
            }
            Ok(message) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Received message with invalid DLC: {}", message.dlc);
                ReceiveAttempt::Rejected(TwaiError::CorruptFrame { dlc: message.dlc })
            }
            Err(error) if error.is_timeout() => {
                #[cfg(feature = "defmt")]
                defmt::trace!("No frame within receive timeout");
                ReceiveAttempt::Rejected(TwaiError::Timeout)
            }
            Err(error) => {
                #[cfg(feature = "defmt")]
                defmt::error!(
                    "Error receiving message: {:?}",
                    defmt::Debug2Format(&error)
                );
                ReceiveAttempt::Fault(error)
            }
        }
    }

    /// Inspect the controller and recover it when needed.
    ///
    /// Called automatically after failed operations; safe to call at any time.
    /// A running controller is left untouched and no wait occurs.
    pub async fn recover_if_needed(&mut self) -> Result<RecoveryOutcome, TwaiError<D::Error>> {
        self.active_config()?;
        Ok(self.run_recovery().await)
    }

    /// Current controller status as reported by the driver.
    pub fn status(&mut self) -> Result<StatusInfo, TwaiError<D::Error>> {
        self.active_config()?;
        self.driver.status().map_err(TwaiError::Driver)
    }

    /// Suspend the caller through the backend timer.
    pub(crate) async fn pause(&mut self, duration: Duration) {
        self.timer.delay(duration).await;
    }

    fn active_config(&self) -> Result<&BackendConfig, TwaiError<D::Error>> {
        self.config.as_ref().ok_or(TwaiError::NotInitialized)
    }

    async fn run_recovery(&mut self) -> RecoveryOutcome {
        // Callers check initialization first.
        let supervisor = match self.config.as_ref() {
            Some(config) => RecoverySupervisor::new(&config.timeouts),
            None => return RecoveryOutcome::StatusUnavailable,
        };
        supervisor.check(&mut self.driver, &mut self.timer).await
    }

    /// Run one recovery cycle for a failed driver call and map the failure.
    pub(crate) async fn supervise(&mut self, error: D::Error) -> TwaiError<D::Error> {
        let outcome = self.run_recovery().await;
        Self::classify(error, outcome)
    }

    /// Bus-off takes precedence: a transmit timeout on a bus-off controller is
    /// reported as bus-off.
    fn classify(error: D::Error, outcome: RecoveryOutcome) -> TwaiError<D::Error> {
        if outcome.was_bus_off() {
            TwaiError::BusOff(error)
        } else if error.is_timeout() {
            TwaiError::Timeout
        } else {
            TwaiError::Driver(error)
        }
    }
}

/// Result of [`TwaiBackend::receive_attempt`].
pub(crate) enum ReceiveAttempt<E: core::fmt::Debug> {
    /// A well-formed frame.
    Frame(TwaiMessage),
    /// Settled without recovery: timeout, corrupt frame, not initialized.
    Rejected(TwaiError<E>),
    /// Controller fault still waiting for the supervisor.
    Fault(E),
}
