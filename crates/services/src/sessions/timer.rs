//! Cancellable one-second deadline timer.
//!
//! The countdown arithmetic itself lives on the session
//! ([`super::SessionService::tick`]); this module only schedules the ticks.
//! Keeping scheduling out of the state machine means every timer behavior is
//! testable with a paused clock, and abandonment reduces to dropping or
//! cancelling the handle.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// One whole-second tick from the deadline timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick;

/// Spawns and owns the periodic tick task for one session.
pub struct DeadlineTimer;

impl DeadlineTimer {
    /// Start ticking once per second for at most `remaining_seconds` ticks.
    ///
    /// The task stops on its own after delivering the tick that reaches the
    /// deadline — it never fires again after the boundary tick — or as soon
    /// as the receiver is dropped (the session finished early). Explicit
    /// cancellation goes through [`DeadlineTimerHandle::cancel`].
    #[must_use]
    pub fn start(remaining_seconds: u32) -> (DeadlineTimerHandle, mpsc::Receiver<TimerTick>) {
        let (tx, rx) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            for _ in 0..remaining_seconds {
                interval.tick().await;
                if tx.send(TimerTick).await.is_err() {
                    // consumer gone: session finished or was abandoned
                    break;
                }
            }
        });

        (DeadlineTimerHandle { task }, rx)
    }
}

/// Cancellation handle for a running deadline timer.
///
/// Dropping the handle does not stop the task; abandonment must call
/// [`DeadlineTimerHandle::cancel`] so no tick can fire afterwards.
#[derive(Debug)]
pub struct DeadlineTimerHandle {
    task: JoinHandle<()>,
}

impl DeadlineTimerHandle {
    /// Stop the timer immediately; no further ticks are delivered.
    pub fn cancel(self) {
        self.task.abort();
    }

    /// True once the task has run to its deadline or was cancelled.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn delivers_one_tick_per_second_then_stops() {
        let (handle, mut rx) = DeadlineTimer::start(3);

        let mut ticks = 0;
        while rx.recv().await.is_some() {
            ticks += 1;
        }
        assert_eq!(ticks, 3);

        // channel closed because the task ran out of scheduled ticks
        handle.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn no_tick_before_a_full_second_elapses() {
        let (_handle, mut rx) = DeadlineTimer::start(5);

        time::advance(Duration::from_millis(999)).await;
        assert!(rx.try_recv().is_err());

        time::advance(Duration::from_millis(2)).await;
        // yield so the timer task gets to run and push the tick
        tokio::task::yield_now().await;
        assert_eq!(rx.try_recv(), Ok(TimerTick));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_any_further_tick() {
        let (handle, mut rx) = DeadlineTimer::start(60);

        time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(rx.recv().await, Some(TimerTick));

        handle.cancel();
        // once the abort lands, the sender is gone and the channel drains to None
        while rx.recv().await.is_some() {}
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_receiver_stops_the_task() {
        let (handle, rx) = DeadlineTimer::start(600);
        drop(rx);

        time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(handle.is_stopped());
    }
}
