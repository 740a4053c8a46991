/// Test doubles simulating the TWAI driver and the recovery timer.
use embassy_time::Duration;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use twai_backend::{
    config::{FilterConfig, GeneralConfig, TimingConfig},
    core::{ControllerState, StatusInfo},
    driver::{
        message::TwaiMessage,
        traits::{
            twai_driver::{DriverError, TwaiDriver},
            twai_timer::TwaiTimer,
        },
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
/// Errors the mock driver can report.
pub enum MockError {
    Timeout,
    InvalidState,
    Fail,
}

impl DriverError for MockError {
    fn is_timeout(&self) -> bool {
        matches!(self, MockError::Timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
/// Every driver entry point, recorded in call order.
pub enum Call {
    Install,
    Start,
    Stop,
    Uninstall,
    Transmit(u32),
    Receive,
    Status,
    InitiateRecovery,
}

/// Frames in flight between two linked drivers.
type Wire = Arc<Mutex<VecDeque<TwaiMessage>>>;

#[derive(Default)]
#[allow(dead_code)]
/// Scriptable driver state, shared between the test and the backend.
pub struct MockState {
    pub calls: Vec<Call>,
    pub installed: Option<(GeneralConfig, TimingConfig, FilterConfig)>,
    pub state: Option<ControllerState>,
    pub fail_install: bool,
    pub fail_start: bool,
    pub fail_stop: bool,
    pub fail_uninstall: bool,
    pub fail_status: bool,
    /// Errors returned by the next transmit calls, in order.
    pub transmit_errors: VecDeque<MockError>,
    /// Results returned by the next receive calls before the wire is read.
    pub receive_script: VecDeque<Result<TwaiMessage, MockError>>,
    /// Frames transmitted while no wire is linked.
    pub sent: Vec<TwaiMessage>,
    outbound: Option<Wire>,
    inbound: Option<Wire>,
}

#[derive(Clone, Default)]
#[allow(dead_code)]
/// In-memory driver reproducing the `TwaiDriver` contract.
pub struct MockTwaiDriver {
    pub shared: Arc<Mutex<MockState>>,
}

#[allow(dead_code)]
impl MockTwaiDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two drivers connected back to back (node A ↔ node B).
    pub fn create_pair() -> (Self, Self) {
        let a_to_b: Wire = Arc::new(Mutex::new(VecDeque::new()));
        let b_to_a: Wire = Arc::new(Mutex::new(VecDeque::new()));

        let a = Self::new();
        let b = Self::new();
        {
            let mut state = a.state();
            state.outbound = Some(a_to_b.clone());
            state.inbound = Some(b_to_a.clone());
        }
        {
            let mut state = b.state();
            state.outbound = Some(b_to_a);
            state.inbound = Some(a_to_b);
        }
        (a, b)
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.shared.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Force the controller state reported by `status()`.
    pub fn set_controller_state(&self, state: ControllerState) {
        self.state().state = Some(state);
    }

    pub fn controller_state(&self) -> Option<ControllerState> {
        self.state().state
    }

    /// Finish a pending bus-off recovery; the controller comes back stopped.
    pub fn complete_recovery(&self) {
        let mut state = self.state();
        if state.state == Some(ControllerState::Recovering) {
            state.state = Some(ControllerState::Stopped);
        }
    }
}

impl TwaiDriver for MockTwaiDriver {
    type Error = MockError;

    fn install(
        &mut self,
        general: &GeneralConfig,
        timing: &TimingConfig,
        filter: &FilterConfig,
    ) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.calls.push(Call::Install);
        if state.fail_install || state.installed.is_some() {
            return Err(MockError::InvalidState);
        }
        state.installed = Some((*general, *timing, *filter));
        state.state = Some(ControllerState::Stopped);
        Ok(())
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.calls.push(Call::Start);
        // Only a stopped controller can be started.
        if state.fail_start || state.state != Some(ControllerState::Stopped) {
            return Err(MockError::InvalidState);
        }
        state.state = Some(ControllerState::Running);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.calls.push(Call::Stop);
        // Only a running controller can be stopped.
        if state.fail_stop || state.state != Some(ControllerState::Running) {
            return Err(MockError::InvalidState);
        }
        state.state = Some(ControllerState::Stopped);
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.calls.push(Call::Uninstall);
        let releasable = matches!(
            state.state,
            Some(ControllerState::Stopped) | Some(ControllerState::BusOff)
        );
        if state.fail_uninstall || state.installed.is_none() || !releasable {
            return Err(MockError::InvalidState);
        }
        state.installed = None;
        state.state = None;
        Ok(())
    }

    async fn transmit<'a>(
        &'a mut self,
        message: &'a TwaiMessage,
        _timeout: Duration,
    ) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.calls.push(Call::Transmit(message.raw_id()));
        if let Some(error) = state.transmit_errors.pop_front() {
            return Err(error);
        }
        match state.outbound.clone() {
            Some(wire) => wire.lock().unwrap().push_back(*message),
            None => state.sent.push(*message),
        }
        Ok(())
    }

    async fn receive<'a>(&'a mut self, _timeout: Duration) -> Result<TwaiMessage, Self::Error> {
        let mut state = self.state();
        state.calls.push(Call::Receive);
        if let Some(result) = state.receive_script.pop_front() {
            return result;
        }
        let filter = state
            .installed
            .map(|(_, _, filter)| filter)
            .unwrap_or(FilterConfig::ACCEPT_ALL);
        if let Some(wire) = state.inbound.clone() {
            let mut wire = wire.lock().unwrap();
            while let Some(message) = wire.pop_front() {
                if filter.matches(&message) {
                    return Ok(message);
                }
            }
        }
        Err(MockError::Timeout)
    }

    fn status(&mut self) -> Result<StatusInfo, Self::Error> {
        let mut state = self.state();
        state.calls.push(Call::Status);
        if state.fail_status {
            return Err(MockError::Fail);
        }
        state
            .state
            .map(StatusInfo::with_state)
            .ok_or(MockError::InvalidState)
    }

    fn initiate_recovery(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.calls.push(Call::InitiateRecovery);
        if state.state != Some(ControllerState::BusOff) {
            return Err(MockError::InvalidState);
        }
        state.state = Some(ControllerState::Recovering);
        Ok(())
    }
}

#[derive(Clone, Default)]
#[allow(dead_code)]
/// Timer that returns immediately and records every requested delay.
pub struct RecordingTimer {
    pub delays: Arc<Mutex<Vec<Duration>>>,
}

#[allow(dead_code)]
impl RecordingTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl TwaiTimer for RecordingTimer {
    async fn delay(&mut self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}
