//! Pushes live accounting updates and settings changes to display surfaces (the on page overlay,
//! the settings panel). Delivery is best effort: a surface that is gone simply misses the update
//! and catches up by asking for the current time on its own.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::{host::TabId, storage::entities::Settings, utils::domain::Domain};

/// New total for the domain that was just flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeUpdate {
    /// Tab the domain is shown in, if the tracker knows it.
    pub tab_id: Option<TabId>,
    pub domain: Domain,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceMessage {
    UpdateTime(TimeUpdate),
    SettingsChanged(Settings),
}

/// Receiver of the tracker's outputs. Implementations must swallow their own failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn on_time_updated(&self, update: TimeUpdate);

    async fn on_settings_changed(&self, settings: Settings);
}

/// Anything that displays accounting data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DisplaySurface: Send + Sync {
    async fn push(&self, message: SurfaceMessage) -> Result<()>;
}

#[async_trait]
impl<T: DisplaySurface + ?Sized> DisplaySurface for Arc<T> {
    async fn push(&self, message: SurfaceMessage) -> Result<()> {
        (**self).push(message).await
    }
}

/// Which time updates a surface wants to see. Settings changes go to every surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interest {
    Everything,
    Domain(Domain),
    Tab(TabId),
}

impl Interest {
    fn matches(&self, update: &TimeUpdate) -> bool {
        match self {
            Interest::Everything => true,
            Interest::Domain(domain) => *domain == update.domain,
            Interest::Tab(tab_id) => update.tab_id == Some(*tab_id),
        }
    }
}

/// [Notifier] that fans messages out to registered surfaces.
#[derive(Default)]
pub struct SurfaceRegistry {
    surfaces: Vec<(Interest, Box<dyn DisplaySurface>)>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, interest: Interest, surface: impl DisplaySurface + 'static) {
        self.surfaces.push((interest, Box::new(surface)));
    }

    async fn deliver<'a>(
        &self,
        surfaces: impl Iterator<Item = &'a dyn DisplaySurface>,
        message: SurfaceMessage,
    ) {
        let results = join_all(surfaces.map(|surface| surface.push(message.clone()))).await;
        let failed = results.into_iter().filter_map(Result::err).count();
        if failed > 0 {
            // Surfaces come and go with tabs, this is expected.
            debug!("{failed} surface(s) didn't accept {message:?}");
        }
    }
}

#[async_trait]
impl Notifier for SurfaceRegistry {
    async fn on_time_updated(&self, update: TimeUpdate) {
        let targets = self
            .surfaces
            .iter()
            .filter(|(interest, _)| interest.matches(&update))
            .map(|(_, surface)| surface.as_ref());
        self.deliver(targets, SurfaceMessage::UpdateTime(update.clone()))
            .await;
    }

    async fn on_settings_changed(&self, settings: Settings) {
        if self.surfaces.is_empty() {
            warn!("Settings changed with no surface to tell");
        }
        let targets = self.surfaces.iter().map(|(_, surface)| surface.as_ref());
        self.deliver(targets, SurfaceMessage::SettingsChanged(settings))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use crate::{host::TabId, storage::entities::Settings};

    use super::{Interest, MockDisplaySurface, Notifier, SurfaceMessage, SurfaceRegistry, TimeUpdate};

    fn update(domain: &str, tab_id: i64) -> TimeUpdate {
        TimeUpdate {
            tab_id: Some(TabId(tab_id)),
            domain: domain.into(),
            total: 1000,
        }
    }

    #[tokio::test]
    async fn test_time_update_routed_by_interest() {
        let mut everything = MockDisplaySurface::new();
        everything.expect_push().times(2).returning(|_| Ok(()));

        let mut domain = MockDisplaySurface::new();
        domain
            .expect_push()
            .withf(|message| {
                matches!(message, SurfaceMessage::UpdateTime(update) if &*update.domain == "a.com")
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut tab = MockDisplaySurface::new();
        tab.expect_push()
            .withf(|message| {
                matches!(message, SurfaceMessage::UpdateTime(update) if update.tab_id == Some(TabId(7)))
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut registry = SurfaceRegistry::new();
        registry.register(Interest::Everything, everything);
        registry.register(Interest::Domain("a.com".into()), domain);
        registry.register(Interest::Tab(TabId(7)), tab);

        registry.on_time_updated(update("a.com", 1)).await;
        registry.on_time_updated(update("b.com", 7)).await;
    }

    #[tokio::test]
    async fn test_settings_broadcast_once_to_everyone() {
        let settings = Settings {
            show_overlay: true,
            timezone: "UTC".into(),
        };

        let mut registry = SurfaceRegistry::new();
        for interest in [Interest::Everything, Interest::Domain("a.com".into())] {
            let expected = settings.clone();
            let mut surface = MockDisplaySurface::new();
            surface
                .expect_push()
                .withf(move |message| *message == SurfaceMessage::SettingsChanged(expected.clone()))
                .times(1)
                .returning(|_| Ok(()));
            registry.register(interest, surface);
        }

        registry.on_settings_changed(settings).await;
    }

    #[tokio::test]
    async fn test_failing_surface_does_not_stop_others() {
        let mut gone = MockDisplaySurface::new();
        gone.expect_push()
            .times(1)
            .returning(|_| Err(anyhow!("tab closed")));
        let mut alive = MockDisplaySurface::new();
        alive.expect_push().times(1).returning(|_| Ok(()));

        let mut registry = SurfaceRegistry::new();
        registry.register(Interest::Everything, gone);
        registry.register(Interest::Everything, alive);

        registry.on_time_updated(update("a.com", 1)).await;
    }
}
