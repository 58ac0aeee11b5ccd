use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::utils::clock::Clock;

use super::events::TrackerEvent;

/// Queues a [TrackerEvent::Tick] at a fixed interval so the active domain's total keeps moving
/// between browser events.
pub struct Ticker {
    next: mpsc::Sender<TrackerEvent>,
    shutdown: CancellationToken,
    interval: Duration,
    time_provider: Box<dyn Clock>,
}

impl Ticker {
    pub fn new(
        next: mpsc::Sender<TrackerEvent>,
        shutdown: CancellationToken,
        interval: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            shutdown,
            interval,
            time_provider,
        }
    }

    /// Executes the tick loop. Deadlines accumulate from the first one so the schedule doesn't
    /// drift. Ticks that were missed entirely are skipped, the tracker measures real elapsed time
    /// anyway.
    pub async fn run(self) -> Result<()> {
        let mut tick_point = self.time_provider.instant();
        loop {
            tick_point += self.interval;

            tokio::select! {
                // Cancelation means we stop the loop, which drops the sender and lets the
                // dispatcher finish once the remaining senders are gone too.
                _ = self.shutdown.cancelled() => {
                    info!("Ticker stopped");
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(tick_point) => ()
            }

            self.next
                .send(TrackerEvent::Tick)
                .await
                .map_err(|_| anyhow!("Dispatcher is gone"))
                .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;

            let now = self.time_provider.instant();
            if tick_point + self.interval < now {
                debug!("Ticker fell behind, skipping missed ticks");
                tick_point = now;
            }
        }
    }
}
