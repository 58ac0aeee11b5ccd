use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{tracker::events::TrackerEvent, utils::domain::Domain};

use super::{
    messages::{InboundMessage, OutboundMessage},
    native_messaging::{read_frame, NativeMessageWriter},
    TabDirectory, WindowId,
};

/// Reads what the extension sends, keeps [TabDirectory] current and queues tracker events.
/// Queries are answered on the same output the pushed updates go to.
pub struct NativeHostReader<R, W> {
    input: R,
    next: mpsc::Sender<TrackerEvent>,
    directory: Arc<Mutex<TabDirectory>>,
    responses: Arc<NativeMessageWriter<W>>,
    shutdown: CancellationToken,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin + Send> NativeHostReader<R, W> {
    pub fn new(
        input: R,
        next: mpsc::Sender<TrackerEvent>,
        directory: Arc<Mutex<TabDirectory>>,
        responses: Arc<NativeMessageWriter<W>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            input,
            next,
            directory,
            responses,
            shutdown,
        }
    }

    /// Reads until the browser disconnects or a shutdown is requested. Either way the whole host
    /// shuts down afterwards, there is nothing to track without the browser.
    pub async fn run(mut self) -> Result<()> {
        let result = self.read_loop().await;
        self.shutdown.cancel();
        result
    }

    async fn read_loop(&mut self) -> Result<()> {
        loop {
            let frame = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                frame = read_frame(&mut self.input) => frame?,
            };
            let Some(frame) = frame else {
                info!("Browser closed the connection");
                return Ok(());
            };

            match serde_json::from_slice::<InboundMessage>(&frame) {
                Ok(message) => {
                    debug!("Received {message:?}");
                    self.process(message).await?;
                }
                Err(e) => warn!(
                    "Skipping message {}: {e}",
                    String::from_utf8_lossy(&frame)
                ),
            }
        }
    }

    async fn process(&mut self, message: InboundMessage) -> Result<()> {
        match message {
            InboundMessage::TabActivated {
                tab_id,
                window_id,
                url,
            } => {
                self.directory()?
                    .tab_activated(tab_id, WindowId::from_raw(window_id), url.as_deref());
                self.queue(TrackerEvent::TabActivated { tab_id, url }).await
            }
            InboundMessage::TabUpdated { tab_id, url } => {
                self.directory()?.tab_updated(tab_id, &url);
                self.queue(TrackerEvent::TabUrlChanged { tab_id, url }).await
            }
            InboundMessage::TabRemoved { tab_id } => {
                self.directory()?.tab_removed(tab_id);
                self.queue(TrackerEvent::TabRemoved { tab_id }).await
            }
            InboundMessage::WindowFocusChanged {
                window_id,
                tab_id,
                url,
            } => {
                let window_id = WindowId::from_raw(window_id);
                {
                    let mut directory = self.directory()?;
                    if let (Some(window_id), Some(tab_id)) = (window_id, tab_id) {
                        directory.tab_activated(tab_id, Some(window_id), url.as_deref());
                    }
                    directory.focus_changed(window_id);
                }
                self.queue(TrackerEvent::WindowFocusChanged { window_id })
                    .await
            }
            InboundMessage::SaveSettings { settings } => {
                self.queue(TrackerEvent::SaveSettings { settings }).await
            }
            InboundMessage::GetTime { request_id, domain } => {
                let domain = Domain::from(domain);
                let (reply, response) = oneshot::channel();
                self.queue(TrackerEvent::GetTime {
                    domain: domain.clone(),
                    reply,
                })
                .await?;
                let report = response.await?;
                self.respond(OutboundMessage::Time {
                    request_id,
                    domain,
                    time: report.time,
                    settings: report.settings,
                })
                .await;
                Ok(())
            }
            InboundMessage::GetSummary { request_id } => {
                let (reply, response) = oneshot::channel();
                self.queue(TrackerEvent::GetSummary { reply }).await?;
                let summary = response.await?;
                self.respond(OutboundMessage::Summary {
                    request_id,
                    summary,
                })
                .await;
                Ok(())
            }
        }
    }

    fn directory(&self) -> Result<std::sync::MutexGuard<'_, TabDirectory>> {
        self.directory
            .lock()
            .map_err(|_| anyhow!("Tab directory is poisoned"))
    }

    async fn queue(&self, event: TrackerEvent) -> Result<()> {
        self.next
            .send(event)
            .await
            .map_err(|_| anyhow!("Dispatcher is gone"))
    }

    async fn respond(&self, message: OutboundMessage) {
        if let Err(e) = self.responses.send(&message).await {
            warn!("Failed to answer with {message:?} {e:?}");
        }
    }
}
