use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{CoreResult, Mmsi, RawPosition, Vessel, Voyage};

/// Raw text frames of one live feed connection, ends when the connection closes.
pub type FeedStream = BoxStream<'static, CoreResult<String>>;

/// A vessel as reported by the fleet snapshot endpoint.
#[derive(Debug, Clone)]
pub struct SnapshotVessel {
    pub vessel: Vessel,
    pub live_position: Option<RawPosition>,
    pub voyage: Option<Voyage>,
}

/// A position from the backend cache of the live feed.
#[derive(Debug, Clone)]
pub struct CachedPosition {
    pub mmsi: Mmsi,
    pub ship_name: Option<String>,
    pub position: RawPosition,
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fleet(&self) -> CoreResult<Vec<SnapshotVessel>>;
    async fn cached_positions(&self) -> CoreResult<Vec<CachedPosition>>;
}

#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Opens a new connection to the live feed.
    async fn connect(&self) -> CoreResult<FeedStream>;
}
