//! WebSocket endpoint streaming instrument snapshots

use futures_util::{SinkExt, StreamExt};
use market_feed::{PriceStore, QuoteBroadcaster};
use std::sync::Arc;
use tracing::{debug, error, info};
use warp::ws::{Message, WebSocket};

/// Serve one WebSocket connection until the peer goes away.
///
/// The client receives the current snapshot on connect and the newest
/// snapshot after each simulator tick; a client that reads slowly skips
/// intermediate snapshots. Anything the client sends is ignored.
pub async fn handle_socket(socket: WebSocket, broadcaster: Arc<QuoteBroadcaster>, prices: Arc<PriceStore>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (subscriber_id, mut rx) = match broadcaster.subscribe(&prices).await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("Failed to subscribe WebSocket client: {}", e);
            return;
        }
    };
    info!("WebSocket subscriber {} connected", subscriber_id);

    // Spawn sender task
    let sender_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = ws_sender.send(Message::text(text.to_string())).await {
                debug!("WebSocket send failed for subscriber {}: {}", subscriber_id, e);
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(message) if message.is_close() => break,
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket error for subscriber {}: {}", subscriber_id, e);
                break;
            }
        }
    }

    broadcaster.unsubscribe(subscriber_id).await;
    sender_task.abort();

    info!("WebSocket subscriber {} disconnected", subscriber_id);
}
