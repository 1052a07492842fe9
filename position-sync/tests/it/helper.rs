use std::{collections::HashMap, sync::Arc, sync::Once};

use fleet_core::{
    Coordinates, MarkerHandle, RawPosition, SnapshotVessel, SourceKind, TypeCategory, Vessel,
};
use futures::Future;
use position_sync::{
    engine::EngineHandle,
    settings::Settings,
    startup::App,
    test_helper::{FeedController, RecordingSink, SinkCall, StaticSnapshot, channel_feed},
};
use tracing_subscriber::FmtSubscriber;

static TRACING: Once = Once::new();

pub struct TestHelper {
    pub engine: EngineHandle,
    pub sink: Arc<RecordingSink>,
    pub snapshot: Arc<StaticSnapshot>,
    pub feed: FeedController,
}

impl TestHelper {
    /// Replaces the fleet served by the snapshot source and reloads it.
    pub async fn load_fleet(&self, fleet: Vec<SnapshotVessel>) {
        self.snapshot.set_fleet(fleet);
        self.engine.refresh_snapshot().await.unwrap();
        self.engine.flush().await.unwrap();
    }

    /// Markers currently on the surface, by handle.
    pub fn live_markers(&self) -> HashMap<MarkerHandle, Coordinates> {
        let mut markers = HashMap::new();
        for call in self.sink.calls() {
            match call {
                SinkCall::Create { handle, marker } => {
                    markers.insert(handle, marker.coordinates);
                }
                SinkCall::Move {
                    handle,
                    coordinates,
                    ..
                } => {
                    markers.insert(handle, coordinates);
                }
                SinkCall::Restyle { handle, marker } => {
                    markers.insert(handle, marker.coordinates);
                }
                SinkCall::Remove { handle } => {
                    markers.remove(&handle);
                }
                SinkCall::AttachHandlers { .. } | SinkCall::FitBounds { .. } => {}
            }
        }
        markers
    }
}

pub fn snapshot_vessel(id: &str, mmsi: Option<&str>, type_category: TypeCategory) -> SnapshotVessel {
    SnapshotVessel {
        vessel: Vessel::test_default(id, mmsi, type_category),
        live_position: None,
        voyage: None,
    }
}

pub fn snapshot_vessel_at(
    id: &str,
    type_category: TypeCategory,
    lat: f64,
    lng: f64,
) -> SnapshotVessel {
    SnapshotVessel {
        vessel: Vessel::test_default(id, None, type_category),
        live_position: Some(RawPosition::at(
            Coordinates::new(lat, lng).unwrap(),
            SourceKind::ApiLive,
        )),
        voyage: None,
    }
}

pub async fn test<T, Fut>(test_closure: T)
where
    T: FnOnce(TestHelper) -> Fut,
    Fut: Future<Output = ()>,
{
    test_with_settings(|_| {}, test_closure).await
}

pub async fn test_with_settings<S, T, Fut>(settings_closure: S, test_closure: T)
where
    S: FnOnce(&mut Settings),
    T: FnOnce(TestHelper) -> Fut,
    Fut: Future<Output = ()>,
{
    test_with_sink(RecordingSink::default(), settings_closure, test_closure).await
}

/// Runs the test against `sink`, a gated sink must be opened for the initial load to finish.
pub async fn test_with_sink<S, T, Fut>(sink: RecordingSink, settings_closure: S, test_closure: T)
where
    S: FnOnce(&mut Settings),
    T: FnOnce(TestHelper) -> Fut,
    Fut: Future<Output = ()>,
{
    TRACING.call_once(|| {
        tracing::subscriber::set_global_default(
            FmtSubscriber::builder()
                .with_max_level(tracing::Level::DEBUG)
                .with_test_writer()
                .finish(),
        )
        .unwrap();
    });

    let mut settings = Settings::test_default("http://127.0.0.1:1");
    settings_closure(&mut settings);

    let sink = Arc::new(sink);
    let snapshot = Arc::new(StaticSnapshot::default());
    let (transport, feed) = channel_feed();

    let app = App::build_with(&settings, snapshot.clone(), Arc::new(transport), sink.clone());
    let engine = app.start();

    // Commands are served after the initial snapshot load.
    engine.flush().await.unwrap();
    sink.clear_calls();

    let helper = TestHelper {
        engine,
        sink,
        snapshot,
        feed,
    };

    test_closure(helper).await;
}
