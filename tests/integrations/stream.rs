#[path = "../helpers/mod.rs"]
mod helpers;

use alertstream::{AlertEvent, IngestAck};
use helpers::app::TestAppBuilder;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn stream_response_declares_event_stream_headers() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let stream = app.subscribe().await;
    let headers = &stream.headers;
    assert_eq!(headers["content-type"].to_str().unwrap(), "text/event-stream");
    assert_eq!(headers["cache-control"].to_str().unwrap(), "no-cache");
    assert_eq!(headers["access-control-allow-origin"].to_str().unwrap(), "*");

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn alert_is_fanned_out_to_every_subscriber() {
    let app = TestAppBuilder::new().start().await.unwrap();
    let mut a = app.subscribe().await;
    let mut b = app.subscribe().await;
    assert_eq!(app.registry.active_count(), 2);

    let response = app
        .post_alert(r#"{"title":"T","message":"M","severity":"high"}"#)
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let ack: IngestAck = response.json().await.unwrap();

    for stream in [&mut a, &mut b] {
        let frame = stream.next_frame().await.unwrap();
        let alert: AlertEvent = serde_json::from_str(&frame).unwrap();
        assert_eq!(alert.title, "T");
        assert_eq!(alert.message, "M");
        assert_eq!(alert.severity, "high");
        assert!(!alert.timestamp.is_empty());
        assert!(!ack.timestamp.is_empty());

        assert!(stream.is_idle_for(Duration::from_millis(300)).await, "exactly one frame per alert");
    }

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn frames_carry_the_alert_as_broadcast() {
    let app = TestAppBuilder::new().start().await.unwrap();
    let mut stream = app.subscribe().await;

    app.post_alert(
        r#"{"title":"disk","message":"full","severity":"warning","timestamp":"2025-07-05T10:30:00Z","metadata":{"host":"db-1","usage":97}}"#,
    )
    .await;

    let frame: Value = serde_json::from_str(&stream.next_frame().await.unwrap()).unwrap();
    assert_eq!(frame["timestamp"], "2025-07-05T10:30:00Z");
    assert_eq!(frame["metadata"]["host"], "db-1");
    assert_eq!(frame["metadata"]["usage"], 97);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn rejected_alert_produces_no_frame() {
    let app = TestAppBuilder::new().start().await.unwrap();
    let mut stream = app.subscribe().await;

    let rejected = app.post_alert(r#"{"title":"broken""#).await;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    let accepted = app.post_alert(r#"{"title":"after"}"#).await;
    assert_eq!(accepted.status(), StatusCode::ACCEPTED);

    let alert: AlertEvent = serde_json::from_str(&stream.next_frame().await.unwrap()).unwrap();
    assert_eq!(alert.title, "after");

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn alerts_arrive_in_order_per_subscriber() {
    let app = TestAppBuilder::new().start().await.unwrap();
    let mut stream = app.subscribe().await;

    for i in 0..5 {
        app.post_alert(&format!(r#"{{"title":"alert-{}"}}"#, i)).await;
    }

    for i in 0..5 {
        let alert: AlertEvent = serde_json::from_str(&stream.next_frame().await.unwrap()).unwrap();
        assert_eq!(alert.title, format!("alert-{}", i));
    }

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn disconnecting_subscribers_are_removed_exactly() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let mut streams = Vec::new();
    for _ in 0..5 {
        streams.push(app.subscribe().await);
    }
    assert_eq!(app.registry.active_count(), 5);

    streams.truncate(2);
    app.wait_for_subscribers(2).await;

    app.post_alert(r#"{"title":"survivors"}"#).await;
    for stream in streams.iter_mut() {
        let alert: AlertEvent = serde_json::from_str(&stream.next_frame().await.unwrap()).unwrap();
        assert_eq!(alert.title, "survivors");
    }

    streams.clear();
    app.wait_for_subscribers(0).await;

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn connected_notice_is_the_first_frame_on_the_wire() {
    let app = TestAppBuilder::new()
        .with_config_modifier(|config| config.stream.keep_alive_seconds = 0)
        .start()
        .await
        .unwrap();

    let mut response = app.client.get(app.url("/events")).send().await.unwrap();
    let mut received: Vec<u8> = Vec::new();
    while !received.windows(2).any(|w| w == b"\n\n") {
        let chunk = timeout(Duration::from_secs(5), response.chunk())
            .await
            .expect("Timed out waiting for the first frame")
            .unwrap()
            .expect("Event stream ended");
        received.extend_from_slice(&chunk);
    }

    assert_eq!(
        std::str::from_utf8(&received).unwrap(),
        "data: {\"type\":\"connected\",\"message\":\"Connected to alert stream\"}\n\n"
    );

    drop(response);
    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn stream_without_keep_alive_delivers_and_unregisters() {
    let app = TestAppBuilder::new()
        .with_config_modifier(|config| config.stream.keep_alive_seconds = 0)
        .start()
        .await
        .unwrap();
    let mut stream = app.subscribe().await;
    assert_eq!(app.registry.active_count(), 1);

    let response = app.post_alert(r#"{"title":"quiet"}"#).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let alert: AlertEvent = serde_json::from_str(&stream.next_frame().await.unwrap()).unwrap();
    assert_eq!(alert.title, "quiet");

    drop(stream);
    app.wait_for_subscribers(0).await;

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}
