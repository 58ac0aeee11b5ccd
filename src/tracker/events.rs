use tokio::sync::oneshot;

use crate::{
    host::{TabId, WindowId},
    storage::entities::{DailySummary, Settings},
    utils::domain::Domain,
};

/// Everything the tracker reacts to. Events are handled strictly one at a time, in the order
/// they were queued.
#[derive(Debug)]
pub enum TrackerEvent {
    TabActivated {
        tab_id: TabId,
        url: Option<String>,
    },
    TabUrlChanged {
        tab_id: TabId,
        url: String,
    },
    TabRemoved {
        tab_id: TabId,
    },
    /// `None` means no browser window has focus.
    WindowFocusChanged {
        window_id: Option<WindowId>,
    },
    Tick,
    GetTime {
        domain: Domain,
        reply: oneshot::Sender<TimeReport>,
    },
    GetSummary {
        reply: oneshot::Sender<DailySummary>,
    },
    SaveSettings {
        settings: Settings,
    },
}

/// Answer to a display surface asking for the current total of a domain.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeReport {
    pub time: u64,
    pub settings: Settings,
}
