use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

use crate::notify::{DisplaySurface, SurfaceMessage};

use super::messages::OutboundMessage;

/// Browsers accept at most 1 MiB from a host.
pub const MAX_OUTBOUND_MESSAGE: usize = 1024 * 1024;
/// Browsers send at most 64 MiB to a host.
pub const MAX_INBOUND_MESSAGE: usize = 64 * 1024 * 1024;

/// Reads one native messaging frame: a native endian u32 length followed by that many bytes of
/// json. Returns `None` once the browser closed the stream between frames.
pub async fn read_frame(reader: &mut (impl AsyncRead + Unpin)) -> Result<Option<Vec<u8>>> {
    let mut header = [0u8; 4];
    let mut received = 0;
    while received < header.len() {
        match reader.read(&mut header[received..]).await? {
            0 if received == 0 => return Ok(None),
            0 => bail!("Stream ended after {received} bytes of a frame header"),
            read => received += read,
        }
    }

    let length = u32::from_ne_bytes(header) as usize;
    if length > MAX_INBOUND_MESSAGE {
        bail!("Incoming message of {length} bytes is over the limit");
    }

    let mut body = vec![0; length];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

pub async fn write_frame(writer: &mut (impl AsyncWrite + Unpin), body: &[u8]) -> Result<()> {
    if body.len() > MAX_OUTBOUND_MESSAGE {
        bail!("Outgoing message of {} bytes is over the limit", body.len());
    }

    writer
        .write_all(&(body.len() as u32).to_ne_bytes())
        .await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Serializes messages onto the host's output. Shared between query responses and pushed
/// updates, the lock keeps their frames from interleaving.
pub struct NativeMessageWriter<W> {
    output: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> NativeMessageWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            output: Mutex::new(output),
        }
    }

    pub async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let body = serde_json::to_vec(message)?;
        let mut output = self.output.lock().await;
        write_frame(&mut *output, &body).await
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> DisplaySurface for NativeMessageWriter<W> {
    async fn push(&self, message: SurfaceMessage) -> Result<()> {
        self.send(&message.into()).await
    }
}
