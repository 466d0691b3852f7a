use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

pub(crate) struct Timer {
    interval: Interval,
    last_tick: Instant,
    interval_dur: Duration,
}

impl Timer {
    pub async fn new(interval_dur: Duration) -> Self {
        let mut interval = interval(interval_dur);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // NOTE: First tick completes instantly
        let last_tick = interval.tick().await;
        Self {
            interval,
            last_tick,
            interval_dur,
        }
    }

    /// Wait for the next tick and return the time since the previous one.
    pub async fn tick(&mut self) -> Duration {
        let next = self.interval.tick().await;
        let elapsed = self.last_tick.elapsed();
        self.last_tick = next;
        elapsed
    }

    /// Time since the previous tick, without waiting.
    pub fn since_last_tick(&self) -> Duration {
        self.last_tick.elapsed()
    }
}

impl std::fmt::Display for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", humantime::format_duration(self.interval_dur))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_report_interval() {
        let mut timer = Timer::new(Duration::from_millis(250)).await;
        assert_eq!(timer.to_string(), "250ms");

        let elapsed = timer.tick().await;
        assert!(elapsed >= Duration::from_millis(250));
        assert!(timer.since_last_tick() < Duration::from_millis(250));
    }
}
