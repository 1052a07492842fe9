use std::{sync::Arc, time::Duration};

use position_sync::{
    models::FeedEvent,
    stream::{Backoff, ConnectionState, StreamConnection},
    test_helper::channel_feed,
};
use tokio::sync::mpsc;

fn backoff(attempt: u32, secs: u64) -> ConnectionState {
    ConnectionState::Backoff {
        attempt,
        delay: Duration::from_secs(secs),
    }
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_with_exponential_backoff_and_resets_after_open() {
    let (transport, feed) = channel_feed();
    let connection = StreamConnection::new(
        Arc::new(transport),
        Backoff::new(Duration::from_secs(5), Duration::from_secs(60)),
    );
    let mut health = connection.health();
    let (sender, mut events) = mpsc::channel(10);
    let task = tokio::spawn(connection.run(sender));

    feed.refuse();
    health.wait_for(|s| *s == backoff(1, 5)).await.unwrap();

    feed.refuse();
    health.wait_for(|s| *s == backoff(2, 10)).await.unwrap();

    let open = feed.open();
    health
        .wait_for(|s| *s == ConnectionState::Open)
        .await
        .unwrap();
    assert_eq!(feed.attempts(), 3);

    open.send_position("503123456", -33.86, 151.22, None).await;
    let Some(FeedEvent::Position { mmsi, .. }) = events.recv().await else {
        panic!("expected a position event");
    };
    assert_eq!(mmsi.into_inner(), 503123456);

    drop(open);
    health.wait_for(|s| *s == backoff(1, 5)).await.unwrap();

    drop(events);
    task.await.unwrap();
    assert_eq!(*health.borrow(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_on_open_connection_schedules_reconnect() {
    let (transport, feed) = channel_feed();
    let connection = StreamConnection::new(
        Arc::new(transport),
        Backoff::new(Duration::from_secs(5), Duration::from_secs(60)),
    );
    let mut health = connection.health();
    let (sender, events) = mpsc::channel(10);
    let task = tokio::spawn(connection.run(sender));

    let open = feed.open();
    health
        .wait_for(|s| *s == ConnectionState::Open)
        .await
        .unwrap();

    open.fail().await;
    health.wait_for(|s| *s == backoff(1, 5)).await.unwrap();

    let _reopened = feed.open();
    health
        .wait_for(|s| *s == ConnectionState::Open)
        .await
        .unwrap();
    assert_eq!(feed.attempts(), 2);

    drop(events);
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_delay_is_capped_at_max() {
    let (transport, feed) = channel_feed();
    let connection = StreamConnection::new(
        Arc::new(transport),
        Backoff::new(Duration::from_secs(5), Duration::from_secs(12)),
    );
    let mut health = connection.health();
    let (sender, events) = mpsc::channel(10);
    let task = tokio::spawn(connection.run(sender));

    for _ in 0..3 {
        feed.refuse();
    }
    health.wait_for(|s| *s == backoff(3, 12)).await.unwrap();

    drop(events);
    task.await.unwrap();
}
