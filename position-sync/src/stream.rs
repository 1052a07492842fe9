use std::{sync::Arc, time::Duration};

use fleet_core::{FeedStream, FeedTransport};
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, instrument, warn};

use crate::models::{FeedEvent, parse_feed_message};

/// Health of the live feed connection as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    /// Waiting `delay` before reconnecting after `attempt` consecutive closes.
    Backoff { attempt: u32, delay: Duration },
}

/// Exponential reconnect delay, `min(base * 2^attempt, max)`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

/// Owns the connection to the live feed and keeps it open for as long as the
/// receiving side is alive.
///
/// Connection failures are never fatal, they are surfaced through the health
/// channel and retried with an exponential backoff.
pub struct StreamConnection {
    transport: Arc<dyn FeedTransport>,
    backoff: Backoff,
    health: watch::Sender<ConnectionState>,
}

/// The receiving side of the feed is gone.
struct Closed;

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    /// Number of consecutive closes since the last successful open.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next reconnect, each call counts as one more close.
    pub fn next_delay(&mut self) -> Duration {
        let delay = 2_u32
            .checked_pow(self.attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |d| d.min(self.max));

        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl StreamConnection {
    pub fn new(transport: Arc<dyn FeedTransport>, backoff: Backoff) -> Self {
        let (health, _) = watch::channel(ConnectionState::Idle);
        Self {
            transport,
            backoff,
            health,
        }
    }

    pub fn health(&self) -> watch::Receiver<ConnectionState> {
        self.health.subscribe()
    }

    /// Runs until `sender` is closed.
    pub async fn run(mut self, sender: mpsc::Sender<FeedEvent>) {
        loop {
            self.health.send_replace(ConnectionState::Connecting);

            match self.transport.connect().await {
                Ok(stream) => {
                    self.backoff.reset();
                    self.health.send_replace(ConnectionState::Open);
                    info!("live feed connection opened");

                    if let Err(Closed) = consume(stream, &sender).await {
                        break;
                    }
                    info!("live feed connection closed");
                }
                Err(e) => error!("failed to connect to live feed: {e:?}"),
            }

            let delay = self.backoff.next_delay();
            let attempt = self.backoff.attempt();
            self.health
                .send_replace(ConnectionState::Backoff { attempt, delay });
            warn!("reconnecting to live feed in {delay:?}, attempt: {attempt}");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = sender.closed() => break,
            }
        }

        self.health.send_replace(ConnectionState::Idle);
        info!("live feed stopped");
    }
}

#[instrument(skip_all)]
async fn consume(mut stream: FeedStream, sender: &mpsc::Sender<FeedEvent>) -> Result<(), Closed> {
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(raw)) => {
                    if let Some(event) = parse_feed_message(&raw) {
                        sender.send(event).await.map_err(|_| Closed)?;
                    }
                }
                Some(Err(e)) => {
                    warn!("live feed connection failed: {e:?}");
                    return Ok(());
                }
                None => return Ok(()),
            },
            _ = sender.closed() => return Err(Closed),
        }
    }
}
