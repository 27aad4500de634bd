//! Per-connection handler: welcome, intent routing, and event delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Assign a participant id and send `welcome`
//!   2. Loop: decode incoming intents and hand them to the processor,
//!      while forwarding events the sessions publish for this participant
//!   3. On close, take the participant out of their session

use std::sync::Arc;

use reaper_protocol::{Codec, ErrorCode, Intent, ParticipantId, ServerEvent};
use reaper_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::ReaperError;
use crate::server::ServerState;

/// Drop guard that removes the participant from their session when the
/// handler exits, even by panic. `Drop` is synchronous, so the async
/// cleanup runs in a spawned task.
struct ConnectionGuard<C: Codec> {
    participant_id: ParticipantId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let participant_id = self.participant_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.processor.disconnect(participant_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), ReaperError> {
    let conn_id = conn.id();
    let participant_id = ParticipantId(conn_id.into_inner());
    tracing::info!(%conn_id, %participant_id, peer = ?conn.peer_addr(), "participant connected");

    send_event(&conn, &state.codec, &ServerEvent::Welcome { participant_id }).await?;

    let _guard = ConnectionGuard {
        participant_id,
        state: Arc::clone(&state),
    };

    // Sessions publish into `tx`; this task is the only writer to `conn`.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    loop {
        tokio::select! {
            received = conn.recv() => {
                let data = match received {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%participant_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%participant_id, error = %e, "recv error");
                        break;
                    }
                };

                let intent: Intent = match state.codec.decode(&data) {
                    Ok(intent) => intent,
                    Err(e) => {
                        tracing::debug!(%participant_id, error = %e, "failed to decode intent");
                        let event = ServerEvent::error(ErrorCode::BadRequest, e.to_string());
                        send_event(&conn, &state.codec, &event).await?;
                        continue;
                    }
                };

                // Rejections already went to `tx` as an error event.
                let _ = state.processor.process(participant_id, intent, &tx).await;
            }
            Some(event) = rx.recv() => {
                send_event(&conn, &state.codec, &event).await?;
            }
        }
    }

    // _guard drops here and the disconnect cleanup fires.
    Ok(())
}

async fn send_event(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    event: &ServerEvent,
) -> Result<(), ReaperError> {
    let bytes = codec.encode(event)?;
    conn.send(&bytes).await?;
    Ok(())
}
