//! Dispatch loop between the browser pipe and the core message handlers.
//!
//! Each incoming frame is handled on its own task; replies and broadcast
//! events funnel through a single writer so frames never interleave.

use anyhow::Result;
use learnflow_core::api::v1::{handle_message, ApiState, Response};
use log::{error, info, warn};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

use crate::framing::{read_frame, write_message};

/// Serve until the reader reaches EOF or a broken frame, then drain
/// in-flight work. A framing error is returned after accepted requests have
/// been answered.
///
/// Takes ownership of `state` so the event stream closes once every handler
/// has finished.
pub async fn serve<R, W>(state: ApiState, mut reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound, mut queue) = mpsc::unbounded_channel::<Value>();

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(message) = queue.recv().await {
            if let Err(err) = write_message(&mut writer, &message).await {
                error!("failed to deliver message: {err:#}");
            }
        }
    });

    let mut events = state.events.subscribe();
    let event_sink = outbound.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_value(&event) {
                    Ok(value) => {
                        if event_sink.send(value).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!("could not encode event: {err}"),
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("dropped {missed} events")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut handlers = JoinSet::new();
    let mut read_error = None;
    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("browser closed the pipe");
                break;
            }
            Err(err) => {
                error!("stopped reading from the browser: {err:#}");
                read_error = Some(err);
                break;
            }
        };
        let state = state.clone();
        let outbound = outbound.clone();
        handlers.spawn(async move {
            let reply = match serde_json::from_slice::<Value>(&frame) {
                Ok(message) => handle_message(&state, message).await,
                Err(err) => Response::Failure(format!("Invalid JSON: {err}")).into_json(None),
            };
            let _ = outbound.send(reply);
        });
    }

    info!("finishing {} in-flight requests", handlers.len());
    while handlers.join_next().await.is_some() {}

    drop(state);
    let _ = forwarder.await;
    drop(outbound);
    writer_task.await?;
    match read_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
