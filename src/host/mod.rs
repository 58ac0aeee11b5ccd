//! Everything that talks to the browser. The extension forwards tab and window events over
//! native messaging ([native_messaging]), [reader::NativeHostReader] turns them into tracker
//! events and keeps [TabDirectory] up to date, so the tracker can ask which tab is active the
//! same way it would ask the browser.

pub mod messages;
pub mod native_messaging;
pub mod reader;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub i64);

impl WindowId {
    /// Browsers report "no window focused" as a negative id.
    pub fn from_raw(raw: Option<WindowId>) -> Option<WindowId> {
        raw.filter(|window| window.0 >= 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTab {
    pub tab_id: TabId,
    /// Missing when the browser didn't tell us yet, or won't (no permission for the page).
    pub url: Option<String>,
}

/// Intended to serve as a contract for querying browser state.
#[cfg_attr(test, mockall::automock)]
pub trait BrowserHost {
    /// Active tab of the focused window, if any window is focused.
    fn focused_tab(&self) -> Result<Option<ActiveTab>>;

    fn active_tab(&self, window_id: WindowId) -> Result<Option<ActiveTab>>;
}

/// Mirror of the browser tabs built from the events the extension forwards.
#[derive(Debug, Default)]
pub struct TabDirectory {
    focused_window: Option<WindowId>,
    active_tabs: HashMap<WindowId, TabId>,
    urls: HashMap<TabId, String>,
}

impl TabDirectory {
    pub fn tab_activated(&mut self, tab_id: TabId, window_id: Option<WindowId>, url: Option<&str>) {
        if let Some(url) = url {
            self.urls.insert(tab_id, url.to_owned());
        }
        let Some(window_id) = window_id.or(self.focused_window) else {
            return;
        };
        self.active_tabs.insert(window_id, tab_id);
        if self.focused_window.is_none() {
            self.focused_window = Some(window_id);
        }
    }

    pub fn tab_updated(&mut self, tab_id: TabId, url: &str) {
        self.urls.insert(tab_id, url.to_owned());
    }

    pub fn tab_removed(&mut self, tab_id: TabId) {
        self.urls.remove(&tab_id);
        self.active_tabs.retain(|_, active| *active != tab_id);
    }

    pub fn focus_changed(&mut self, window_id: Option<WindowId>) {
        self.focused_window = window_id;
    }

    fn tab_in(&self, window_id: WindowId) -> Option<ActiveTab> {
        self.active_tabs.get(&window_id).map(|tab_id| ActiveTab {
            tab_id: *tab_id,
            url: self.urls.get(tab_id).cloned(),
        })
    }
}

impl BrowserHost for Arc<Mutex<TabDirectory>> {
    fn focused_tab(&self) -> Result<Option<ActiveTab>> {
        let directory = self.lock().map_err(|_| anyhow!("Tab directory is poisoned"))?;
        Ok(directory
            .focused_window
            .and_then(|window_id| directory.tab_in(window_id)))
    }

    fn active_tab(&self, window_id: WindowId) -> Result<Option<ActiveTab>> {
        let directory = self.lock().map_err(|_| anyhow!("Tab directory is poisoned"))?;
        Ok(directory.tab_in(window_id))
    }
}
