use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Timelike, Utc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::orchestrator::{Ingestor, Trigger};

/// UTC hours at which the periodic trigger fires.
pub const SCHEDULE_HOURS_UTC: [u32; 4] = [0, 6, 12, 18];

/// The next slot strictly after `now`, rolling over to midnight of the next day.
pub fn next_scheduled_run(now: DateTime<Utc>) -> DateTime<Utc> {
    let date = now.date_naive();
    for hour in SCHEDULE_HOURS_UTC {
        if let Some(slot) = date.and_hms_opt(hour, 0, 0) {
            let slot = Utc.from_utc_datetime(&slot);
            if slot > now {
                return slot;
            }
        }
    }
    date.succ_opt()
        .and_then(|next_day| next_day.and_hms_opt(0, 0, 0))
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .unwrap_or_else(|| now + chrono::Duration::hours(6))
}

/// Drives an [`Ingestor`] from the startup trigger and the fixed UTC slots.
pub struct Scheduler {
    ingestor: Arc<Ingestor>,
    startup_delay: Duration,
}

impl Scheduler {
    pub fn new(ingestor: Arc<Ingestor>) -> Self {
        let startup_delay = ingestor.config().startup_delay;
        Self {
            ingestor,
            startup_delay,
        }
    }

    /// Spawn the startup run and the periodic loop on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run_forever().await })
    }

    async fn run_forever(self) {
        tokio::time::sleep(self.startup_delay).await;
        if self.ingestor.run(Trigger::Startup).await.is_none() {
            info!("⏰ startup ingestion skipped, a run is already in progress");
        }

        loop {
            let now = Utc::now();
            let next = next_scheduled_run(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next = %next, hour = next.hour(), "⏰ next scheduled ingestion");
            tokio::time::sleep(wait).await;

            if self.ingestor.run(Trigger::Scheduled).await.is_none() {
                warn!("⏰ scheduled ingestion skipped, a run is already in progress");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_next_run_same_day() {
        assert_eq!(next_scheduled_run(at(1, 5, 0)), at(1, 6, 0));
        assert_eq!(next_scheduled_run(at(1, 12, 30)), at(1, 18, 0));
    }

    #[test]
    fn test_next_run_is_strictly_after() {
        assert_eq!(next_scheduled_run(at(1, 6, 0)), at(1, 12, 0));
        assert_eq!(next_scheduled_run(at(1, 0, 0)), at(1, 6, 0));
    }

    #[test]
    fn test_next_run_rolls_over() {
        assert_eq!(next_scheduled_run(at(1, 23, 0)), at(2, 0, 0));
        assert_eq!(next_scheduled_run(at(1, 18, 0)), at(2, 0, 0));
        assert_eq!(
            next_scheduled_run(Utc.with_ymd_and_hms(2024, 12, 31, 19, 0, 0).unwrap()),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
    }
}
