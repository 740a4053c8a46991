//! Asynchronous delay used to suspend the calling task during recovery.
use embassy_time::{Duration, Timer};

/// Timer abstraction; suspends the current task for the given duration.
pub trait TwaiTimer {
    fn delay<'a>(&'a mut self, duration: Duration) -> impl core::future::Future<Output = ()> + 'a;
}

/// [`TwaiTimer`] backed by the embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyTimer;

impl TwaiTimer for EmbassyTimer {
    async fn delay(&mut self, duration: Duration) {
        Timer::after(duration).await;
    }
}
