//! Background Jobs
//!
//! The hold sweeper expires pending bookings whose seat hold has lapsed, so
//! abandoned checkouts release their seats even when nobody tries to book
//! the same showtime.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::services::BookingService;

pub struct HoldSweeper {
    bookings: Arc<dyn BookingService>,
    every: Duration,
}

impl HoldSweeper {
    pub fn new(bookings: Arc<dyn BookingService>, every_seconds: u64) -> Self {
        Self {
            bookings,
            every: Duration::from_secs(every_seconds.max(1)),
        }
    }

    /// Sweep forever. Meant to be spawned and aborted on shutdown.
    pub async fn run(self) {
        info!(interval = ?self.every, "Hold sweeper started");

        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.sweep_once(Utc::now()).await;
        }
    }

    /// One pass; errors are logged and the next tick retries.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> usize {
        debug!("Sweeping stale seat holds");
        match self.bookings.expire_stale_holds(now).await {
            Ok(expired) => expired,
            Err(e) => {
                error!(error = %e, "Hold sweep failed");
                0
            }
        }
    }
}
