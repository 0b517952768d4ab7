mod common;

use chrono::{Duration, Utc};
use futures_util::{SinkExt, StreamExt};
use std::future::IntoFuture;
use std::time::Duration as StdDuration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use botwatch::application::actors::live_feed::{spawn_broadcaster, TickPayload};
use common::spawn_app;

async fn next_tick<S>(stream: &mut S) -> TickPayload
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(StdDuration::from_secs(5), stream.next())
            .await
            .expect("tick within timeout")
            .expect("stream open")
            .expect("valid frame");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_live_feed_pushes_filtered_ticks() {
    let app = spawn_app().await;
    let now = Utc::now();
    app.seed_balance("USDC", "500").await;
    app.seed_price("BTC", now, "30000").await;
    app.seed_trade("BTC", "BUY", "0.01", "30000", now - Duration::minutes(2)).await;
    app.seed_trade("ETH", "BUY", "1", "2000", now - Duration::minutes(1)).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(axum::serve(listener, app.router.clone()).into_future());
    let broadcaster = spawn_broadcaster(
        app.feed.clone(),
        app.service.clone(),
        StdDuration::from_millis(50),
    );

    let (mut socket, _) = connect_async(format!("ws://{}/ws/live", addr)).await.unwrap();
    socket
        .send(Message::Text(r#"{"subscribe": ["btc"]}"#.to_string()))
        .await
        .unwrap();

    let tick = next_tick(&mut socket).await;
    assert_eq!(tick.kind, "tick");
    assert!(tick.status.active);
    assert_eq!(tick.balances.len(), 1);
    assert_eq!(tick.trades.len(), 1);
    assert_eq!(tick.trades[0].symbol, "BTC");

    socket.close(None).await.unwrap();

    // The session unregisters once the socket is gone
    let mut remaining = app.feed.subscriber_count().await;
    for _ in 0..50 {
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        remaining = app.feed.subscriber_count().await;
    }
    assert_eq!(remaining, 0);

    broadcaster.abort();
    server.abort();
}

#[tokio::test]
async fn test_live_feed_without_subscribe_message_gets_everything() {
    let app = spawn_app().await;
    let now = Utc::now();
    app.seed_trade("BTC", "BUY", "0.01", "30000", now - Duration::minutes(2)).await;
    app.seed_trade("ETH", "BUY", "1", "2000", now - Duration::minutes(1)).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(axum::serve(listener, app.router.clone()).into_future());
    let broadcaster = spawn_broadcaster(
        app.feed.clone(),
        app.service.clone(),
        StdDuration::from_millis(50),
    );

    let (mut socket, _) = connect_async(format!("ws://{}/ws/live", addr)).await.unwrap();

    // Handshake window passes silently, then ticks carry all symbols
    let tick = next_tick(&mut socket).await;
    assert!(!tick.status.active);
    assert!(tick.status.last_trade.contains("ETH BUY"));
    assert_eq!(tick.trades.len(), 2);

    broadcaster.abort();
    server.abort();
}
