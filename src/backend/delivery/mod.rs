//! Delivery buffers between the task that owns the controller and the
//! application tasks.
//!
//! A [`FrameProducer`] owns the backend. It polls receive with the short
//! receive timeout and pushes every frame into a pre-allocated inbound
//! [`embassy_sync::channel::Channel`] without waiting; a [`FrameConsumer`]
//! drains that channel with an unbounded wait. When an outbound channel is
//! provided, other tasks queue frames through a [`FrameSender`] and the
//! producer transmits them between receive polls, so sending and receiving
//! proceed concurrently from different tasks. No allocation is performed by
//! the library.
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, Receiver, Sender, TrySendError},
};
use embassy_time::Duration;
use futures_util::{future::select, future::Either, pin_mut};

use crate::backend::adapter::{ReceiveAttempt, TwaiBackend};
use crate::driver::message::TwaiMessage;
use crate::driver::traits::{twai_driver::TwaiDriver, twai_timer::TwaiTimer};
use crate::error::{ErrorKind, TwaiError};

/// Channel type shared by the producer and its consumer/sender handles.
pub type DeliveryChannel<const N: usize> = Channel<CriticalSectionRawMutex, TwaiMessage, N>;

/// Pause after an empty poll so lower-priority tasks get CPU time.
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Result of a single producer poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollOutcome {
    /// A frame was received and queued.
    Delivered,
    /// A frame was received but the channel was full; it was dropped.
    QueueFull,
    /// No usable frame (timeout or corrupt frame).
    Idle,
    /// Receive failed; recovery already ran inside the backend.
    Failed(ErrorKind),
}

/// Bus-side task: backend → inbound channel, outbound channel → backend.
///
/// `M` is the outbound capacity; use `0` together with `None` when the
/// application never transmits through the producer.
pub struct FrameProducer<'a, D: TwaiDriver, T: TwaiTimer, const N: usize, const M: usize> {
    backend: &'a mut TwaiBackend<D, T>,
    sender: Sender<'a, CriticalSectionRawMutex, TwaiMessage, N>,
    outbound: Option<Receiver<'a, CriticalSectionRawMutex, TwaiMessage, M>>,
    idle_backoff: Duration,
    dropped: u32,
    send_failures: u32,
}

impl<'a, D: TwaiDriver, T: TwaiTimer, const N: usize, const M: usize>
    FrameProducer<'a, D, T, N, M>
{
    pub fn new(
        backend: &'a mut TwaiBackend<D, T>,
        inbound: &'a DeliveryChannel<N>,
        outbound: Option<&'a DeliveryChannel<M>>,
        idle_backoff: Duration,
    ) -> Self {
        Self {
            backend,
            sender: inbound.sender(),
            outbound: outbound.map(|channel| channel.receiver()),
            idle_backoff,
            dropped: 0,
            send_failures: 0,
        }
    }

    /// Frames dropped because the inbound channel was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Queued frames the backend failed to transmit.
    pub fn send_failures(&self) -> u32 {
        self.send_failures
    }

    /// Receive once and enqueue without waiting for channel space.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let received = self.backend.receive().await;
        self.deliver(received)
    }

    /// Transmit every frame already waiting in the outbound channel.
    ///
    /// Returns the number of frames taken from the channel.
    pub async fn flush_outbound(&mut self) -> usize {
        let Some(outbound) = self.outbound else {
            return 0;
        };
        let mut count = 0;
        while let Ok(message) = outbound.try_receive() {
            self.transmit(&message).await;
            count += 1;
        }
        count
    }

    /// Serve both directions forever.
    ///
    /// Queued outbound frames win over a pending receive. A receive wait that
    /// loses the race is abandoned; recovery after a receive fault always runs
    /// to completion before the next frame is transmitted.
    pub async fn run(mut self) -> ! {
        loop {
            match self.outbound {
                Some(outbound) => {
                    let mut to_transmit = None;
                    let mut attempt = None;

                    {
                        let outbound_future = outbound.receive();
                        let receive_future = self.backend.receive_attempt();
                        pin_mut!(outbound_future);
                        pin_mut!(receive_future);

                        match select(outbound_future, receive_future).await {
                            Either::Left((message, pending_receive)) => {
                                to_transmit = Some(message);
                                drop(pending_receive);
                            }
                            Either::Right((result, pending_outbound)) => {
                                attempt = Some(result);
                                drop(pending_outbound);
                            }
                        }
                    }

                    if let Some(message) = to_transmit {
                        self.transmit(&message).await;
                    }
                    if let Some(attempt) = attempt {
                        let received = match attempt {
                            ReceiveAttempt::Frame(message) => Ok(message),
                            ReceiveAttempt::Rejected(error) => Err(error),
                            ReceiveAttempt::Fault(error) => {
                                Err(self.backend.supervise(error).await)
                            }
                        };
                        let outcome = self.deliver(received);
                        self.back_off(outcome).await;
                    }
                }
                None => {
                    let outcome = self.poll_once().await;
                    self.back_off(outcome).await;
                }
            }
        }
    }

    fn deliver(&mut self, received: Result<TwaiMessage, TwaiError<D::Error>>) -> PollOutcome {
        match received {
            Ok(message) => match self.sender.try_send(message) {
                Ok(()) => PollOutcome::Delivered,
                Err(TrySendError::Full(_)) => {
                    self.dropped = self.dropped.wrapping_add(1);
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Delivery queue full, dropped {} frames", self.dropped);
                    PollOutcome::QueueFull
                }
            },
            Err(TwaiError::Timeout) | Err(TwaiError::CorruptFrame { .. }) => PollOutcome::Idle,
            Err(error) => PollOutcome::Failed(error.kind()),
        }
    }

    async fn back_off(&mut self, outcome: PollOutcome) {
        if matches!(outcome, PollOutcome::Idle | PollOutcome::Failed(_)) {
            self.backend.pause(self.idle_backoff).await;
        }
    }

    async fn transmit(&mut self, message: &TwaiMessage) {
        if let Err(_error) = self.backend.send(message).await {
            self.send_failures = self.send_failures.wrapping_add(1);
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "Queued frame ID={=u32:#x} not sent: {:?}",
                message.raw_id(),
                _error.kind()
            );
        }
    }
}

/// Processing side: inbound channel → application.
pub struct FrameConsumer<'a, const N: usize> {
    receiver: Receiver<'a, CriticalSectionRawMutex, TwaiMessage, N>,
}

impl<'a, const N: usize> FrameConsumer<'a, N> {
    pub fn new(channel: &'a DeliveryChannel<N>) -> Self {
        Self {
            receiver: channel.receiver(),
        }
    }

    /// Wait, without bound, for the next frame.
    pub async fn next(&mut self) -> TwaiMessage {
        self.receiver.receive().await
    }

    /// Next frame if one is already queued.
    pub fn try_next(&mut self) -> Option<TwaiMessage> {
        self.receiver.try_receive().ok()
    }
}

/// Transmission handle: application → outbound channel.
#[derive(Clone, Copy)]
pub struct FrameSender<'a, const M: usize> {
    sender: Sender<'a, CriticalSectionRawMutex, TwaiMessage, M>,
}

impl<'a, const M: usize> FrameSender<'a, M> {
    pub fn new(channel: &'a DeliveryChannel<M>) -> Self {
        Self {
            sender: channel.sender(),
        }
    }

    /// Queue a frame, waiting for room in the outbound channel.
    pub async fn send(&self, message: &TwaiMessage) {
        self.sender.send(*message).await;
    }

    /// Queue a frame if there is room; hands the frame back otherwise.
    pub fn try_send(&self, message: &TwaiMessage) -> Result<(), TwaiMessage> {
        self.sender.try_send(*message).map_err(|TrySendError::Full(message)| message)
    }
}
