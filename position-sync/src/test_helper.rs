use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use fleet_core::{
    BoxedError, Bounds, CachedPosition, Coordinates, CoreResult, FeedStream, FeedTransport,
    MarkerHandle, MarkerSink, MarkerSpec, SnapshotSource, SnapshotVessel, VesselId,
    core_error::{SinkSnafu, TransportSnafu},
};
use futures::StreamExt;
use serde_json::json;
use snafu::IntoError;
use tokio::sync::{Notify, mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Create {
        handle: MarkerHandle,
        marker: MarkerSpec,
    },
    Move {
        handle: MarkerHandle,
        coordinates: Coordinates,
        rotation: f64,
    },
    Restyle {
        handle: MarkerHandle,
        marker: MarkerSpec,
    },
    AttachHandlers {
        handle: MarkerHandle,
        vessel_id: VesselId,
    },
    Remove {
        handle: MarkerHandle,
    },
    FitBounds {
        bounds: Bounds,
    },
}

/// Marker sink recording every call, optionally holding calls while its gate is closed.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<SinkCall>>,
    next_handle: AtomicU64,
    fail_next: Mutex<Option<&'static str>>,
    gate: Option<watch::Sender<bool>>,
    entered: Notify,
}

impl RecordingSink {
    /// Every call waits for [RecordingSink::open_gate], the gate starts closed.
    pub fn gated() -> Self {
        Self {
            gate: Some(watch::channel(false).0),
            ..Default::default()
        }
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.send_replace(true);
        }
    }

    /// Calls made from now on wait until the gate is opened again.
    pub fn close_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.send_replace(false);
        }
    }

    /// Resolves once a call has reached the sink.
    pub async fn entered(&self) {
        self.entered.notified().await
    }

    /// Makes the next call of `operation` fail.
    pub fn fail_next(&self, operation: &'static str) {
        *self.fail_next.lock().unwrap() = Some(operation);
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn created(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, SinkCall::Create { .. }))
            .count()
    }

    pub fn last_bounds(&self) -> Option<Bounds> {
        self.calls().iter().rev().find_map(|c| match c {
            SinkCall::FitBounds { bounds } => Some(*bounds),
            _ => None,
        })
    }

    /// Calls made against a single marker, in order.
    pub fn calls_for(&self, handle: MarkerHandle) -> Vec<SinkCall> {
        self.calls()
            .into_iter()
            .filter(|c| match c {
                SinkCall::Create { handle: h, .. }
                | SinkCall::Move { handle: h, .. }
                | SinkCall::Restyle { handle: h, .. }
                | SinkCall::AttachHandlers { handle: h, .. }
                | SinkCall::Remove { handle: h } => *h == handle,
                SinkCall::FitBounds { .. } => false,
            })
            .collect()
    }

    async fn enter(&self, operation: &'static str) -> CoreResult<()> {
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.subscribe().wait_for(|open| *open).await.unwrap();
        }

        let mut fail_next = self.fail_next.lock().unwrap();
        if *fail_next == Some(operation) {
            *fail_next = None;
            return SinkSnafu {
                operation,
                reason: "rejected by test",
            }
            .fail();
        }
        Ok(())
    }

    fn record(&self, call: SinkCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MarkerSink for RecordingSink {
    async fn create(&self, marker: &MarkerSpec) -> CoreResult<MarkerHandle> {
        self.enter("create").await?;
        let handle = MarkerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.record(SinkCall::Create {
            handle,
            marker: marker.clone(),
        });
        Ok(handle)
    }

    async fn move_to(
        &self,
        handle: MarkerHandle,
        coordinates: Coordinates,
        rotation: f64,
    ) -> CoreResult<()> {
        self.enter("move_to").await?;
        self.record(SinkCall::Move {
            handle,
            coordinates,
            rotation,
        });
        Ok(())
    }

    async fn restyle(&self, handle: MarkerHandle, marker: &MarkerSpec) -> CoreResult<()> {
        self.enter("restyle").await?;
        self.record(SinkCall::Restyle {
            handle,
            marker: marker.clone(),
        });
        Ok(())
    }

    async fn attach_handlers(&self, handle: MarkerHandle, vessel_id: &VesselId) -> CoreResult<()> {
        self.enter("attach_handlers").await?;
        self.record(SinkCall::AttachHandlers {
            handle,
            vessel_id: vessel_id.clone(),
        });
        Ok(())
    }

    async fn remove(&self, handle: MarkerHandle) -> CoreResult<()> {
        self.enter("remove").await?;
        self.record(SinkCall::Remove { handle });
        Ok(())
    }

    async fn fit_bounds(&self, bounds: Bounds) -> CoreResult<()> {
        self.enter("fit_bounds").await?;
        self.record(SinkCall::FitBounds { bounds });
        Ok(())
    }
}

/// Snapshot source serving whatever the test put into it.
#[derive(Debug, Default)]
pub struct StaticSnapshot {
    fleet: Mutex<Vec<SnapshotVessel>>,
    cached_positions: Mutex<Vec<CachedPosition>>,
    fail: AtomicBool,
    fetches: AtomicUsize,
}

impl StaticSnapshot {
    pub fn set_fleet(&self, fleet: Vec<SnapshotVessel>) {
        *self.fleet.lock().unwrap() = fleet;
    }

    pub fn set_cached_positions(&self, positions: Vec<CachedPosition>) {
        *self.cached_positions.lock().unwrap() = positions;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn check(&self) -> CoreResult<()> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(TransportSnafu {
                target: "static snapshot",
            }
            .into_error(BoxedError::from("snapshot unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotSource for StaticSnapshot {
    async fn fleet(&self) -> CoreResult<Vec<SnapshotVessel>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.check()?;
        Ok(self.fleet.lock().unwrap().clone())
    }

    async fn cached_positions(&self) -> CoreResult<Vec<CachedPosition>> {
        self.check()?;
        Ok(self.cached_positions.lock().unwrap().clone())
    }
}

/// Live feed whose connections are opened and refused by a [FeedController].
pub struct ChannelFeed {
    connections: tokio::sync::Mutex<mpsc::UnboundedReceiver<CoreResult<FeedStream>>>,
    attempts: Arc<AtomicUsize>,
}

pub struct FeedController {
    connections: mpsc::UnboundedSender<CoreResult<FeedStream>>,
    attempts: Arc<AtomicUsize>,
}

/// The feed side of one open connection, dropping it closes the connection.
pub struct FeedConnection {
    frames: mpsc::Sender<CoreResult<String>>,
}

pub fn channel_feed() -> (ChannelFeed, FeedController) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let attempts = Arc::new(AtomicUsize::new(0));

    (
        ChannelFeed {
            connections: tokio::sync::Mutex::new(receiver),
            attempts: attempts.clone(),
        },
        FeedController {
            connections: sender,
            attempts,
        },
    )
}

fn transport_error(reason: &'static str) -> fleet_core::Error {
    TransportSnafu {
        target: "channel feed",
    }
    .into_error(BoxedError::from(reason))
}

#[async_trait]
impl FeedTransport for ChannelFeed {
    async fn connect(&self) -> CoreResult<FeedStream> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        match self.connections.lock().await.recv().await {
            Some(connection) => connection,
            None => Err(transport_error("feed controller dropped")),
        }
    }
}

impl FeedController {
    /// Accepts the next connection attempt.
    pub fn open(&self) -> FeedConnection {
        let (frames, receiver) = mpsc::channel(100);
        self.connections
            .send(Ok(ReceiverStream::new(receiver).boxed()))
            .unwrap();
        FeedConnection { frames }
    }

    /// Refuses the next connection attempt.
    pub fn refuse(&self) {
        self.connections
            .send(Err(transport_error("connection refused")))
            .unwrap();
    }

    /// Number of connection attempts made so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl FeedConnection {
    pub async fn send_raw(&self, raw: impl Into<String>) {
        self.frames.send(Ok(raw.into())).await.unwrap();
    }

    pub async fn send_position(&self, mmsi: &str, lat: f64, lng: f64, heading: Option<f64>) {
        let raw = json!({
            "MessageType": "PositionReport",
            "MetaData": {
                "MMSI": mmsi,
                "latitude": lat,
                "longitude": lng,
            },
            "Message": {
                "PositionReport": {
                    "UserID": mmsi,
                    "Latitude": lat,
                    "Longitude": lng,
                    "Sog": 12.5,
                    "Cog": 90.0,
                    "TrueHeading": heading.unwrap_or(511.0),
                    "NavigationalStatus": 0,
                }
            }
        });
        self.send_raw(raw.to_string()).await
    }

    pub async fn send_static(&self, mmsi: &str, name: &str, destination: &str) {
        let raw = json!({
            "MessageType": "ShipStaticData",
            "MetaData": { "MMSI": mmsi, "ShipName": name },
            "Message": {
                "ShipStaticData": {
                    "UserID": mmsi,
                    "Name": name,
                    "Destination": destination,
                }
            }
        });
        self.send_raw(raw.to_string()).await
    }

    /// Fails the connection with a transport error.
    pub async fn fail(self) {
        let _ = self
            .frames
            .send(Err(transport_error("connection reset")))
            .await;
    }
}
