use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use leadboard_types::events::BoardEvent;
use leadboard_types::view::BoardView;


/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serve one board subscription.
///
/// `events` must have been obtained from
/// [`Dispatcher::subscribe`](crate::dispatcher::Dispatcher::subscribe) before
/// `snapshot` was loaded. Anything committed in between arrives twice (once
/// inside the snapshot, once as an event), which the client's
/// last-writer-wins merge absorbs.
pub async fn handle_connection(
    socket: WebSocket,
    snapshot: BoardView,
    mut events: broadcast::Receiver<BoardEvent>,
    user_id: Uuid,
) {
    let board_id = snapshot.board.id;
    let (mut sender, mut receiver) = socket.split();

    info!("{} subscribed to board {}", user_id, board_id);

    let Some(text) = encode(&BoardEvent::Snapshot(snapshot)) else {
        return;
    };
    if sender.send(Message::Text(text.into())).await.is_err() {
        return;
    }

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward this board's events to the client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = events.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Board {} subscriber lagged by {} events", board_id, n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    if !forwards(board_id, &event) {
                        continue;
                    }
                    let closing = matches!(event, BoardEvent::BoardDeleted { .. });

                    let Some(text) = encode(&event) else { continue };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                    if closing {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // The feed is one-way; the client only answers pings and closes
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => pong_flag_recv.store(true, Ordering::Release),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("{} left board {}", user_id, board_id);
}

/// Whether an event belongs on the feed of `board_id`. Snapshots are only
/// sent once, at connect time.
fn forwards(board_id: Uuid, event: &BoardEvent) -> bool {
    !matches!(event, BoardEvent::Snapshot(_)) && event.board_id() == board_id
}

fn encode(event: &BoardEvent) -> Option<String> {
    serde_json::to_string(event)
        .map_err(|e| warn!("Failed to encode {} event: {}", event.kind(), e))
        .ok()
}
