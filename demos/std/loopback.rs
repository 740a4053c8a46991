//! # Host loopback example
//!
//! Runs the backend on the host against an in-memory controller in self-test
//! mode: every transmitted frame is received back. The controller can be
//! pushed into bus-off to watch both recovery policies at work.
//!
//! ```bash
//! cargo run --example loopback
//! ```

use std::collections::VecDeque;

use embassy_time::{Duration, Timer};
use embedded_can::{ExtendedId, Frame, StandardId};
use twai_backend::{
    backend::delivery::{DeliveryChannel, FrameConsumer, FrameProducer, PollOutcome},
    config::{BackendConfig, FilterConfig, GeneralConfig, TimingConfig, TwaiMode, WiringConfig},
    core::{ControllerState, StatusInfo},
    driver::traits::{
        twai_driver::{DriverError, TwaiDriver},
        twai_timer::EmbassyTimer,
    },
    TwaiBackend, TwaiMessage,
};

// ============================================================================
// In-memory controller
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopbackError {
    Timeout,
    NotRunning,
    BusError,
}

impl DriverError for LoopbackError {
    fn is_timeout(&self) -> bool {
        matches!(self, LoopbackError::Timeout)
    }
}

/// Self-test controller: transmit feeds its own receive queue.
#[derive(Default)]
struct LoopbackDriver {
    filter: Option<FilterConfig>,
    state: Option<ControllerState>,
    rx_queue: VecDeque<TwaiMessage>,
    status: StatusInfo,
}

impl LoopbackDriver {
    fn force_bus_off(&mut self) {
        self.state = Some(ControllerState::BusOff);
        self.status.tx_error_counter = 256;
    }
}

impl TwaiDriver for LoopbackDriver {
    type Error = LoopbackError;

    fn install(
        &mut self,
        general: &GeneralConfig,
        timing: &TimingConfig,
        filter: &FilterConfig,
    ) -> Result<(), Self::Error> {
        println!(
            "install: tx={} rx={} mode={:?} bitrate={} bit/s",
            general.tx_gpio,
            general.rx_gpio,
            general.mode,
            timing.bitrate(twai_backend::config::DEFAULT_SOURCE_CLOCK_HZ)
        );
        self.filter = Some(*filter);
        self.state = Some(ControllerState::Stopped);
        Ok(())
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        self.state = Some(ControllerState::Running);
        self.status.tx_error_counter = 0;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        self.state = Some(ControllerState::Stopped);
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), Self::Error> {
        self.filter = None;
        self.state = None;
        self.rx_queue.clear();
        Ok(())
    }

    async fn transmit<'a>(
        &'a mut self,
        message: &'a TwaiMessage,
        _timeout: Duration,
    ) -> Result<(), Self::Error> {
        match self.state {
            Some(ControllerState::Running) => {}
            Some(ControllerState::BusOff) => return Err(LoopbackError::BusError),
            _ => return Err(LoopbackError::NotRunning),
        }
        if self.filter.map_or(true, |filter| filter.matches(message)) {
            self.rx_queue.push_back(*message);
        }
        Ok(())
    }

    async fn receive<'a>(&'a mut self, timeout: Duration) -> Result<TwaiMessage, Self::Error> {
        match self.rx_queue.pop_front() {
            Some(message) => Ok(message),
            None => {
                Timer::after(timeout).await;
                Err(LoopbackError::Timeout)
            }
        }
    }

    fn status(&mut self) -> Result<StatusInfo, Self::Error> {
        let state = self.state.ok_or(LoopbackError::NotRunning)?;
        Ok(StatusInfo {
            state,
            msgs_to_rx: self.rx_queue.len() as u32,
            ..self.status
        })
    }

    fn initiate_recovery(&mut self) -> Result<(), Self::Error> {
        if self.state != Some(ControllerState::BusOff) {
            return Err(LoopbackError::NotRunning);
        }
        // Recovery completes instantly; the controller comes back stopped.
        self.state = Some(ControllerState::Stopped);
        Ok(())
    }
}

// ============================================================================
// Scenario
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config = BackendConfig::default()
        .with_wiring(WiringConfig::new(5, 4))
        .with_mode(TwaiMode::NoAck)
        .with_timing(TimingConfig::BITRATE_500K)
        .with_filter(FilterConfig::ACCEPT_ALL);

    let mut backend = TwaiBackend::new(LoopbackDriver::default(), EmbassyTimer);
    if let Err(error) = backend.init(&config) {
        println!("init failed: {error}");
        return;
    }

    let frames = [
        TwaiMessage::new(StandardId::new(0x123).unwrap(), &[0xDE, 0xAD, 0xBE, 0xEF]),
        TwaiMessage::new(ExtendedId::new(0x18FE_F100).unwrap(), &[1, 2, 3, 4, 5, 6, 7, 8]),
        TwaiMessage::new_remote(StandardId::new(0x7DF).unwrap(), 8),
    ];
    for frame in frames.iter().flatten() {
        match backend.send(frame).await {
            Ok(()) => println!("sent   id={:#x} dlc={}", frame.raw_id(), frame.dlc),
            Err(error) => println!("send failed: {error}"),
        }
    }

    // Drain the controller through the delivery buffer.
    let channel: DeliveryChannel<4> = DeliveryChannel::new();
    {
        let backoff = Duration::from_millis(1);
        let mut producer = FrameProducer::<_, _, 4, 0>::new(&mut backend, &channel, None, backoff);
        while producer.poll_once().await == PollOutcome::Delivered {}
    }
    let mut consumer = FrameConsumer::new(&channel);
    while let Some(frame) = consumer.try_next() {
        println!(
            "recv   id={:#x} ext={} rtr={} data={:02x?}",
            frame.raw_id(),
            frame.is_extended(),
            frame.is_remote_frame(),
            frame.data()
        );
    }

    // Bus-off, then a controller left stopped after recovery.
    let heartbeat = TwaiMessage::new(StandardId::new(0x100).unwrap(), &[0x55]).unwrap_or_default();
    backend.driver_mut().force_bus_off();
    for attempt in 1..=3 {
        let outcome = backend.send(&heartbeat).await;
        let state = backend.status().map(|status| status.state);
        println!("attempt {attempt}: {outcome:?} -> controller {state:?}");
    }

    match backend.deinit() {
        Ok(()) => println!("driver released"),
        Err(error) => println!("deinit failed: {error}"),
    }
}

