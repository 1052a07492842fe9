use std::sync::Arc;

use fleet_core::{FeedTransport, MarkerSink, SnapshotSource};
use tracing::{error, info};

use crate::{
    engine::{EngineHandle, SyncEngine},
    error::Result,
    marker::MarkerController,
    settings::Settings,
    sink::LoggingSink,
    snapshot::HttpSnapshotSource,
    websocket::WebSocketFeed,
};

pub struct App {
    engine: SyncEngine,
}

impl App {
    pub fn build(settings: &Settings) -> Result<App> {
        settings.validate()?;
        let snapshot = HttpSnapshotSource::new(settings)?;
        let transport = WebSocketFeed::new(&settings.stream);

        Ok(Self::build_with(
            settings,
            Arc::new(snapshot),
            Arc::new(transport),
            Arc::new(LoggingSink::new()),
        ))
    }

    pub fn build_with(
        settings: &Settings,
        snapshot: Arc<dyn SnapshotSource>,
        transport: Arc<dyn FeedTransport>,
        sink: Arc<dyn MarkerSink>,
    ) -> App {
        let markers = MarkerController::new(sink);
        App {
            engine: SyncEngine::new(settings, snapshot, transport, markers),
        }
    }

    pub fn start(self) -> EngineHandle {
        self.engine.start()
    }

    /// Runs until the process receives ctrl-c.
    pub async fn run(self) {
        let handle = self.start();

        let mut health = handle.health();
        let health_log = tokio::spawn(async move {
            while health.changed().await.is_ok() {
                let state = *health.borrow_and_update();
                info!("live feed connection: {state:?}");
            }
        });

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for shutdown signal: {e:?}");
        }

        info!("shutting down");
        handle.stop().await;
        health_log.abort();
    }
}
