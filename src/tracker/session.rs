use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use crate::{
    host::{BrowserHost, TabId},
    notify::{Notifier, TimeUpdate},
    storage::{
        accounting_store::{AccountingStore, StoreSnapshot},
        entities::{DailyAccounting, DailySummary, Settings},
    },
    utils::{
        clock::Clock,
        domain::{extract_domain, Domain},
        time::{format_duration, today},
    },
};

use super::events::{TimeReport, TrackerEvent};

/// Gaps at least this long are never attributed to a domain. They mean the process was
/// suspended, the machine slept or the clock jumped, not that somebody read a page for that long.
pub const MAX_FLUSH_GAP: Duration = Duration::seconds(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerState {
    /// Nothing trackable has focus.
    Idle,
    Tracking(Domain),
}

/// What the tracker knows about the present moment. Lives only as long as the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub state: TrackerState,
    /// Tab the state was derived from. Kept while idle on an untrackable page, so that the same
    /// tab navigating somewhere real starts tracking.
    pub active_tab: Option<TabId>,
    /// Moment up to which time has been committed to the store.
    pub last_flush: DateTime<Utc>,
}

/// Decides which domain is active and attributes elapsed wall clock time to it.
///
/// Every state change starts with a flush, so time always goes to the domain that was active
/// while it passed. The store is the single source of truth for totals, nothing is cached here
/// between events.
pub struct ActiveSessionTracker<S, N, H> {
    store: S,
    notifier: N,
    host: H,
    clock: Box<dyn Clock>,
    session: Session,
}

impl<S: AccountingStore, N: Notifier, H: BrowserHost> ActiveSessionTracker<S, N, H> {
    pub fn new(store: S, notifier: N, host: H, clock: Box<dyn Clock>) -> Self {
        let last_flush = clock.time();
        Self {
            store,
            notifier,
            host,
            clock,
            session: Session {
                state: TrackerState::Idle,
                active_tab: None,
                last_flush,
            },
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Picks up whatever is focused right now. Nothing is recovered from a previous run, only the
    /// persisted totals survive restarts.
    pub fn start(&mut self) {
        self.session.last_flush = self.clock.time();
        match self.host.focused_tab() {
            Ok(Some(tab)) => self.retarget(tab.tab_id, tab.url.as_deref()),
            Ok(None) => debug!("No focused tab on start"),
            Err(e) => warn!("Couldn't query focused tab on start {e:?}"),
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn handle(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::TabActivated { tab_id, url } => {
                self.flush().await;
                self.retarget(tab_id, url.as_deref());
            }
            TrackerEvent::TabUrlChanged { tab_id, url } => {
                if self.session.active_tab != Some(tab_id) {
                    debug!("Ignoring navigation in background tab {tab_id:?}");
                    return;
                }
                self.flush().await;
                self.retarget(tab_id, Some(&url));
            }
            TrackerEvent::TabRemoved { tab_id } => {
                if self.session.active_tab == Some(tab_id) {
                    self.flush().await;
                    self.go_idle();
                }
            }
            TrackerEvent::WindowFocusChanged { window_id: None } => {
                self.flush().await;
                self.go_idle();
            }
            TrackerEvent::WindowFocusChanged {
                window_id: Some(window_id),
            } => {
                self.flush().await;
                match self.host.active_tab(window_id) {
                    Ok(Some(tab)) => self.retarget(tab.tab_id, tab.url.as_deref()),
                    // Whatever was tracked before is in a window the user left.
                    Ok(None) => {
                        debug!("No known active tab in {window_id:?}");
                        self.go_idle();
                    }
                    Err(e) => {
                        warn!("Couldn't query active tab of {window_id:?} {e:?}");
                        self.go_idle();
                    }
                }
            }
            TrackerEvent::Tick => {
                if matches!(self.session.state, TrackerState::Tracking(_)) {
                    self.flush().await;
                }
            }
            TrackerEvent::GetTime { domain, reply } => {
                let report = self.current_time(&domain).await;
                if reply.send(report).is_err() {
                    debug!("Nobody is waiting for the time of {domain}");
                }
            }
            TrackerEvent::GetSummary { reply } => {
                let summary = self.summary().await;
                if reply.send(summary).is_err() {
                    debug!("Nobody is waiting for the summary");
                }
            }
            TrackerEvent::SaveSettings { settings } => self.save_settings(settings).await,
        }
    }

    /// Commits the time passed since the last flush to the active domain.
    pub async fn flush(&mut self) {
        let now = self.clock.time();
        let elapsed = now.timestamp_millis() - self.session.last_flush.timestamp_millis();
        self.session.last_flush = now;

        let TrackerState::Tracking(domain) = &self.session.state else {
            return;
        };
        if elapsed <= 0 || elapsed >= MAX_FLUSH_GAP.num_milliseconds() {
            debug!("Not attributing {elapsed}ms to {domain}");
            return;
        }

        let domain = domain.clone();
        match self.commit(&domain, elapsed as u64).await {
            Ok(total) => {
                debug!("{domain} is at {}", format_duration(total));
                self.notifier
                    .on_time_updated(TimeUpdate {
                        tab_id: self.session.active_tab,
                        domain,
                        total,
                    })
                    .await;
            }
            // The next flush does a full read-modify-write again, only this interval is lost.
            Err(e) => warn!("Failed to commit {elapsed}ms to {domain} {e:?}"),
        }
    }

    /// Commits whatever is left before the process goes away.
    pub async fn finish(&mut self) {
        self.flush().await;
        info!("Tracker stopped in {:?}", self.session.state);
    }

    /// Authoritative total of `domain` for today, straight from the store.
    pub async fn current_time(&self, domain: &str) -> TimeReport {
        match self.store.load().await {
            Ok(StoreSnapshot {
                accounting,
                settings,
            }) => TimeReport {
                time: accounting.time_for(domain),
                settings,
            },
            Err(e) => {
                warn!("Couldn't load accounting for {domain} {e:?}");
                TimeReport {
                    time: 0,
                    settings: Settings::default(),
                }
            }
        }
    }

    pub async fn summary(&self) -> DailySummary {
        match self.store.load().await {
            Ok(snapshot) => snapshot.accounting.summary(),
            Err(e) => {
                warn!("Couldn't load accounting for the summary {e:?}");
                let settings = Settings::default();
                DailyAccounting::empty(today(&settings.timezone, self.clock.time())).summary()
            }
        }
    }

    /// Persists new settings and tells every display surface about them. Settings with an
    /// unknown timezone are rejected, and nothing is announced if the settings couldn't be saved.
    pub async fn save_settings(&self, settings: Settings) {
        if let Err(e) = settings.timezone.parse::<Tz>() {
            warn!("Rejecting settings {settings:?}: {e}");
            return;
        }

        match self.store.save_settings(&settings).await {
            Ok(()) => {
                info!("Settings changed to {settings:?}");
                self.notifier.on_settings_changed(settings).await;
            }
            Err(e) => warn!("Failed to save settings {settings:?} {e:?}"),
        }
    }

    async fn commit(&self, domain: &Domain, millis: u64) -> Result<u64> {
        let StoreSnapshot {
            mut accounting, ..
        } = self.store.load().await?;
        let total = accounting.add(domain.clone(), millis);
        self.store.save(&accounting).await?;
        Ok(total)
    }

    fn retarget(&mut self, tab_id: TabId, url: Option<&str>) {
        self.session.active_tab = Some(tab_id);
        self.session.state = match url.and_then(extract_domain) {
            Some(domain) => TrackerState::Tracking(domain),
            None => TrackerState::Idle,
        };
        debug!("{:?} in {tab_id:?}", self.session.state);
    }

    fn go_idle(&mut self) {
        self.session.state = TrackerState::Idle;
        self.session.active_tab = None;
        debug!("Idle, no window focused");
    }
}
