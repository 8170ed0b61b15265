//! Native-messaging framing: a 32-bit native-endian length, then that many
//! bytes of UTF-8 JSON.

use std::io;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Browsers refuse host replies above 1 MiB.
pub const MAX_OUTBOUND_BYTES: usize = 1024 * 1024;
/// Browsers never send more than 64 MiB in one message.
pub const MAX_INBOUND_BYTES: usize = 64 * 1024 * 1024;

/// Next frame, or `None` once the browser closed the pipe.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err).context("failed to read message length"),
    }

    let len = u32::from_ne_bytes(len_buf) as usize;
    if len > MAX_INBOUND_BYTES {
        bail!("incoming message of {len} bytes exceeds the {MAX_INBOUND_BYTES} byte limit");
    }

    let mut frame = vec![0u8; len];
    reader
        .read_exact(&mut frame)
        .await
        .context("message ended before its declared length")?;
    Ok(Some(frame))
}

pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) -> Result<()> {
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_OUTBOUND_BYTES {
        bail!(
            "outgoing message of {} bytes exceeds the {MAX_OUTBOUND_BYTES} byte limit",
            body.len()
        );
    }
    writer.write_all(&(body.len() as u32).to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
