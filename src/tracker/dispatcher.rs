use anyhow::Result;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info};

use crate::{host::BrowserHost, notify::Notifier, storage::accounting_store::AccountingStore};

use super::{events::TrackerEvent, session::ActiveSessionTracker};

/// Feeds queued events to the tracker. Each event is handled to completion, store writes
/// included, before the next one is received, so flushes never overlap.
pub struct Dispatcher<S, N, H> {
    receiver: Receiver<TrackerEvent>,
    tracker: ActiveSessionTracker<S, N, H>,
}

impl<S: AccountingStore, N: Notifier, H: BrowserHost> Dispatcher<S, N, H> {
    pub fn new(receiver: Receiver<TrackerEvent>, tracker: ActiveSessionTracker<S, N, H>) -> Self {
        Self { receiver, tracker }
    }

    /// Runs until every sender is dropped, then commits what is left.
    pub async fn run(mut self) -> Result<()> {
        self.tracker.start();
        info!("Tracker started in {:?}", self.tracker.session().state);

        while let Some(event) = self.receiver.recv().await {
            debug!("Dispatching event {:?}", event);
            self.tracker.handle(event).await;
        }

        self.tracker.finish().await;
        self.receiver.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::sync::{mpsc, oneshot};

    use crate::{
        host::{MockBrowserHost, TabId},
        notify::MockNotifier,
        storage::{
            accounting_store::{AccountingStore, JsonAccountingStore},
            entities::Settings,
        },
        tracker::{events::TrackerEvent, session::ActiveSessionTracker},
        utils::clock::test_clock::ManualClock,
    };

    use super::Dispatcher;

    #[tokio::test]
    async fn test_events_handled_in_order_and_flushed_on_close() -> Result<()> {
        let dir = tempdir()?;
        let start = Utc.with_ymd_and_hms(2018, 7, 4, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let store = Arc::new(JsonAccountingStore::new(
            dir.path().join("state.json"),
            Box::new(clock.clone()),
        )?);
        store
            .save_settings(&Settings {
                show_overlay: false,
                timezone: "UTC".into(),
            })
            .await?;

        let mut host = MockBrowserHost::new();
        host.expect_focused_tab().returning(|| Ok(None));
        let mut notifier = MockNotifier::new();
        notifier.expect_on_time_updated().returning(|_| ());

        let (sender, receiver) = mpsc::channel(10);
        let tracker =
            ActiveSessionTracker::new(store.clone(), notifier, host, Box::new(clock.clone()));
        let dispatcher = Dispatcher::new(receiver, tracker);

        let (reply, response) = oneshot::channel();
        let driver = async move {
            sender
                .send(TrackerEvent::TabActivated {
                    tab_id: TabId(1),
                    url: Some("https://a.com/".into()),
                })
                .await
                .map_err(|_| anyhow!("Dispatcher is gone"))?;
            sender
                .send(TrackerEvent::GetTime {
                    domain: "a.com".into(),
                    reply,
                })
                .await
                .map_err(|_| anyhow!("Dispatcher is gone"))?;
            // The query is answered only after the activation was handled.
            let report = response.await?;
            clock.set(start + Duration::milliseconds(2500));
            drop(sender);
            anyhow::Ok(report)
        };
        let (run_result, driver_result) = tokio::join!(dispatcher.run(), driver);
        run_result?;
        let report = driver_result?;

        assert_eq!(report.time, 0);
        // The last stretch is committed when the queue closes.
        assert_eq!(store.load().await?.accounting.time_for("a.com"), 2500);
        Ok(())
    }
}
