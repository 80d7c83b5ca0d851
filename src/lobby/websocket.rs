use std::sync::Arc;

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use crate::{
    common::{app_state::AppState, error::ServerError},
    lobby::player::PlayerFeed,
};

/// Streams a player's outbox over a WebSocket until the outbox closes or the
/// client goes away.
///
/// Lobby and session are checked before the upgrade so a bad path fails the
/// request. The feed itself is only taken once the socket is live.
pub async fn events_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path((lobby_id, session_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServerError> {
    state
        .get_registry()
        .check_subscription(&lobby_id, &session_id)?;

    let failed_session = session_id.clone();
    let ws = ws.on_failed_upgrade(move |e| {
        warn!("WebSocket upgrade failed for {}: {}", failed_session, e);
    });

    Ok(ws.on_upgrade(move |mut socket| async move {
        let feed = match state.get_registry().subscribe(&lobby_id, &session_id) {
            Ok(feed) => feed,
            Err(e) => {
                warn!("Session {} lost its subscription to lobby {}: {}", session_id, lobby_id, e);
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        };
        info!("Session {} subscribed to lobby {}", session_id, lobby_id);

        let Some(feed) = forward_feed(socket, feed, &session_id).await else {
            return;
        };

        // Client left while the lobby is still alive, keep the feed for a reconnect.
        if let Err(e) = state
            .get_registry()
            .restore_feed(&lobby_id, &session_id, feed)
        {
            debug!("Could not hand back feed for {}: {}", session_id, e);
        }
    }))
}

/// Returns the feed if the client disconnected before the outbox closed.
async fn forward_feed(socket: WebSocket, mut feed: PlayerFeed, session_id: &str) -> Option<PlayerFeed> {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = feed.recv() => {
                let Some(event) = event else {
                    info!("Feed for {} closed, closing socket", session_id);
                    let _ = sender.send(Message::Close(None)).await;
                    return None;
                };

                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!("Failed to serialize event for {}: {}", session_id, e);
                        continue;
                    }
                };

                debug!("Sending {} to {}", payload, session_id);
                if let Err(e) = sender.send(Message::Text(payload.into())).await {
                    warn!("Failed to send event to {}: {}", session_id, e);
                    feed.push_back(event);
                    return Some(feed);
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Session {} closed the socket", session_id);
                        return Some(feed);
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", session_id, e);
                        return Some(feed);
                    }
                    // Nothing is expected from the client on this socket.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
