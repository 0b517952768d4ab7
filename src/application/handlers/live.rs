use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::AppState;

/// How long a client has to send its subscribe message
pub const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Optional first client message: `{"subscribe": ["BTC"]}`
#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    #[serde(default)]
    subscribe: Vec<String>,
}

fn parse_subscription(text: &str) -> Vec<String> {
    match serde_json::from_str::<SubscribeRequest>(text) {
        Ok(request) => request.subscribe,
        Err(e) => {
            debug!("Ignoring malformed subscribe message: {}", e);
            Vec::new()
        }
    }
}

pub async fn live_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let symbols = match timeout(SUBSCRIBE_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => parse_subscription(&text),
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => return,
        Ok(Some(Ok(_))) => Vec::new(),
        Ok(Some(Err(e))) => {
            warn!("Live feed handshake failed: {}", e);
            return;
        }
        // No subscribe message in time: full feed
        Err(_) => Vec::new(),
    };

    let (id, mut frames) = state.feed.subscribe(symbols).await;

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => {
                    if sender.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!("Live feed subscriber {} errored: {}", id, e);
                    break;
                }
                // Client chatter after the handshake is ignored
                Some(Ok(_)) => {}
            },
        }
    }

    state.feed.unsubscribe(id).await;
}
