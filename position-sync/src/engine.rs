use std::{
    collections::{BTreeMap, HashMap, HashSet},
    future::pending,
    sync::Arc,
};

use chrono::{DateTime, Utc};
use fleet_core::{
    Bounds, CoreResult, FeedTransport, FilterState, FleetDirectory, FleetId, Mmsi,
    NavigationStatus, ResolvedPosition, SnapshotSource, StaticInfo, TypeFilter, Vessel, VesselId,
    VesselKey, Voyage,
};
use snafu::OptionExt;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::{JoinHandle, JoinSet},
    time::{Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::{Result, error::EngineStoppedSnafu},
    marker::{MarkerController, MarkerUpdate},
    models::FeedEvent,
    resolver::PositionResolver,
    scheduler::UpdateScheduler,
    settings::Settings,
    store::PositionStore,
    stream::{Backoff, ConnectionState, StreamConnection},
    visibility::is_visible,
};

/// A row of the vessel list.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleVessel {
    pub vessel: Vessel,
    pub resolved: ResolvedPosition,
}

/// Everything the popup of a single vessel shows.
#[derive(Debug, Clone, PartialEq)]
pub struct VesselDetail {
    pub vessel: Vessel,
    /// The fleet name, or the name broadcast by the vessel when the fleet has none.
    pub display_name: String,
    pub resolved: ResolvedPosition,
    pub speed: Option<f64>,
    pub course: Option<f64>,
    pub heading: Option<f64>,
    pub navigational_status: Option<NavigationStatus>,
    pub timestamp: Option<DateTime<Utc>>,
    pub destination: Option<String>,
    pub voyage: Option<Voyage>,
    pub static_info: Option<StaticInfo>,
}

enum Command {
    SetTypeFilter(TypeFilter, oneshot::Sender<()>),
    SetFleetFilter(Option<FleetId>, oneshot::Sender<()>),
    SetFleets(FleetDirectory, oneshot::Sender<()>),
    RefreshSnapshot(oneshot::Sender<CoreResult<usize>>),
    VisibleVessels(oneshot::Sender<Vec<VisibleVessel>>),
    VesselDetail(VesselId, oneshot::Sender<Option<VesselDetail>>),
    Flush(oneshot::Sender<()>),
    Stop,
}

/// Merges the snapshot, the live feed and the fallback heuristics into one
/// position per vessel and keeps the markers of the shown vessels in sync.
///
/// The engine owns the position store and all filter state, they are only
/// touched from the engine task. Marker passes run as separate tasks and are
/// serialized per vessel by the [MarkerController].
pub struct SyncEngine {
    snapshot: Arc<dyn SnapshotSource>,
    transport: Arc<dyn FeedTransport>,
    markers: MarkerController,
    resolver: PositionResolver,
    backoff: Backoff,
    channel_buffer_size: usize,
    reconcile_interval: std::time::Duration,
    snapshot_refresh_interval: Option<std::time::Duration>,
    stale_after: chrono::Duration,

    vessels: BTreeMap<VesselId, Vessel>,
    by_mmsi: HashMap<Mmsi, Vec<VesselId>>,
    store: PositionStore,
    filter: FilterState,
    fleets: FleetDirectory,
    scheduler: UpdateScheduler,
    passes: JoinSet<(VesselId, MarkerUpdate)>,
}

/// Control surface of a started [SyncEngine].
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    health: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl SyncEngine {
    pub fn new(
        settings: &Settings,
        snapshot: Arc<dyn SnapshotSource>,
        transport: Arc<dyn FeedTransport>,
        markers: MarkerController,
    ) -> Self {
        Self {
            snapshot,
            transport,
            markers,
            resolver: PositionResolver::new(&settings.resolver),
            backoff: Backoff::new(settings.stream.base_delay, settings.stream.max_delay),
            channel_buffer_size: settings.channel_buffer_size.max(1),
            reconcile_interval: settings.scheduler.reconcile_interval,
            snapshot_refresh_interval: settings.scheduler.snapshot_refresh_interval,
            stale_after: chrono::Duration::from_std(settings.resolver.stale_after)
                .unwrap_or(chrono::Duration::MAX),
            vessels: BTreeMap::new(),
            by_mmsi: HashMap::new(),
            store: PositionStore::new(),
            filter: FilterState::default(),
            fleets: FleetDirectory::default(),
            scheduler: UpdateScheduler::new(settings.scheduler.debounce),
            passes: JoinSet::new(),
        }
    }

    /// Spawns the engine and its live feed connection.
    pub fn start(self) -> EngineHandle {
        let (feed_sender, feed) = mpsc::channel(self.channel_buffer_size);
        let (commands, command_receiver) = mpsc::channel(self.channel_buffer_size);

        let connection = StreamConnection::new(self.transport.clone(), self.backoff.clone());
        let health = connection.health();
        let stream = tokio::spawn(connection.run(feed_sender));

        let task = tokio::spawn(self.run(command_receiver, feed, stream));

        EngineHandle {
            commands,
            health,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut feed: mpsc::Receiver<FeedEvent>,
        stream: JoinHandle<()>,
    ) {
        info!("starting position sync engine");

        if let Err(e) = self.load_snapshot().await {
            error!("failed to load initial snapshot: {e:?}");
        }

        let mut reconcile = tokio::time::interval_at(
            Instant::now() + self.reconcile_interval,
            self.reconcile_interval,
        );
        reconcile.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut refresh = self.snapshot_refresh_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let deadline = self.scheduler.deadline();

            tokio::select! {
                Some(event) = feed.recv() => self.on_feed_event(event),
                command = commands.recv() => match command {
                    Some(Command::Stop) | None => break,
                    Some(command) => self.handle(command).await,
                },
                _ = sleep_until(deadline) => self.run_batch(),
                _ = reconcile.tick() => self.reconcile().await,
                _ = tick(&mut refresh) => {
                    if let Err(e) = self.load_snapshot().await {
                        error!("failed to refresh snapshot: {e:?}");
                    }
                }
                Some(res) = self.passes.join_next() => log_pass(res),
            }
        }

        stream.abort();
        self.settle().await;
        info!("position sync engine stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::SetTypeFilter(filter, reply) => {
                self.filter.set_type_filter(filter);
                info!("type filter set to {}", filter.as_ref());
                self.apply_visibility().await;
                let _ = reply.send(());
            }
            Command::SetFleetFilter(fleet, reply) => {
                info!(
                    "fleet filter set to {}",
                    fleet.as_ref().map_or("none", |f| f.as_str())
                );
                self.filter.set_fleet_filter(fleet);
                self.apply_visibility().await;
                let _ = reply.send(());
            }
            Command::SetFleets(fleets, reply) => {
                self.fleets = fleets;
                if self.filter.selected_fleet().is_some() {
                    self.apply_visibility().await;
                }
                let _ = reply.send(());
            }
            Command::RefreshSnapshot(reply) => {
                let res = self.load_snapshot().await;
                if let Err(e) = &res {
                    error!("failed to refresh snapshot: {e:?}");
                }
                let _ = reply.send(res);
            }
            Command::VisibleVessels(reply) => {
                let _ = reply.send(self.visible_vessels());
            }
            Command::VesselDetail(vessel_id, reply) => {
                let _ = reply.send(self.vessel_detail(&vessel_id));
            }
            Command::Flush(reply) => {
                self.run_batch();
                self.settle().await;
                let _ = reply.send(());
            }
            // Handled by the loop.
            Command::Stop => {}
        }
    }

    fn on_feed_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Position {
                mmsi,
                ship_name,
                mut position,
            } => {
                // Stale marking needs an age, feeds without timestamps are
                // stamped on arrival.
                if position.timestamp.is_none() {
                    position.timestamp = Some(Utc::now());
                }
                self.store.record_stream(mmsi, position, ship_name);

                let now = Instant::now();
                if let Some(ids) = self.by_mmsi.get(&mmsi) {
                    for id in ids {
                        self.scheduler.touch(id.clone(), now);
                    }
                }
            }
            FeedEvent::Static { mmsi, info } => self.store.record_static(mmsi, info),
        }
    }

    /// One marker pass per vessel touched since the batch started.
    #[instrument(skip_all, fields(app.batch_size))]
    fn run_batch(&mut self) {
        let batch = self.scheduler.drain();
        tracing::Span::current().record("app.batch_size", batch.len());

        for id in batch {
            let Some(vessel) = self.vessels.get(&id) else {
                continue;
            };
            if !is_visible(vessel, &self.filter, &self.fleets) {
                continue;
            }
            let resolved = self.resolver.resolve(vessel, &self.store);
            spawn_apply(&mut self.passes, &self.markers, resolved);
        }
    }

    /// Marks old stream positions stale and re-runs the marker pass of every
    /// shown vessel whose marker no longer matches its resolved position,
    /// including vessels whose last pass was dropped.
    #[instrument(skip_all)]
    async fn reconcile(&mut self) {
        let stale = self.store.mark_stale(Utc::now(), self.stale_after);
        if !stale.is_empty() {
            debug!("marked {} stream positions as stale", stale.len());
        }

        let dropped: HashSet<VesselId> = self.markers.take_dropped().await.into_iter().collect();

        let mut applies = Vec::new();
        let mut releases = Vec::new();

        for vessel in self.vessels.values() {
            let marker = self.markers.marker(&vessel.id).await;

            if !is_visible(vessel, &self.filter, &self.fleets) {
                if marker.is_some() || dropped.contains(&vessel.id) {
                    releases.push(vessel.id.clone());
                }
                continue;
            }

            let resolved = self.resolver.resolve(vessel, &self.store);
            let in_sync = match (&marker, resolved.marker_spec()) {
                (None, None) => true,
                (Some(marker), Some(spec)) => {
                    marker.state == spec.state && marker.is_placed_at(&spec)
                }
                (Some(_), None) | (None, Some(_)) => false,
            };

            if !in_sync || dropped.contains(&vessel.id) {
                applies.push(resolved);
            }
        }

        if !applies.is_empty() || !releases.is_empty() {
            debug!(
                "reconciling markers, updates: {}, removals: {}",
                applies.len(),
                releases.len()
            );
        }

        for resolved in applies {
            spawn_apply(&mut self.passes, &self.markers, resolved);
        }
        for vessel_id in releases {
            spawn_release(&mut self.passes, &self.markers, vessel_id);
        }
    }

    /// Replaces the fleet with a freshly fetched snapshot and rebuilds every marker.
    #[instrument(skip_all)]
    async fn load_snapshot(&mut self) -> CoreResult<usize> {
        let fleet = self.snapshot.fleet().await?;
        let cached = match self.snapshot.cached_positions().await {
            Ok(v) => v,
            Err(e) => {
                warn!("failed to fetch cached positions: {e:?}");
                Vec::new()
            }
        };

        self.vessels.clear();
        self.by_mmsi.clear();

        for snapshot in fleet {
            let vessel = snapshot.vessel;
            self.store
                .record_snapshot(vessel.key(), snapshot.live_position, snapshot.voyage);
            if let Some(mmsi) = vessel.mmsi {
                self.by_mmsi.entry(mmsi).or_default().push(vessel.id.clone());
            }
            self.vessels.insert(vessel.id.clone(), vessel);
        }

        let num_cached = cached.len();
        for cached in cached {
            // The cache lags behind the live feed, never replace a newer fix with it.
            let newer_known = self
                .store
                .get(&VesselKey::Mmsi(cached.mmsi))
                .and_then(|e| e.stream.as_ref())
                .is_some_and(|known| match (known.timestamp, cached.position.timestamp) {
                    (Some(known), Some(cached)) => known > cached,
                    (Some(_), None) => true,
                    (None, _) => false,
                });

            if !newer_known {
                self.store
                    .record_stream(cached.mmsi, cached.position, cached.ship_name);
            }
        }

        info!(
            "loaded snapshot, vessels: {}, cached positions: {num_cached}",
            self.vessels.len()
        );

        self.rebuild_markers().await;

        Ok(self.vessels.len())
    }

    async fn rebuild_markers(&mut self) {
        self.settle().await;
        self.scheduler.drain();

        let removed = self.markers.clear().await;
        debug!("removed {removed} markers for rebuild");

        self.apply_visibility().await;
    }

    /// Re-evaluates visibility of every vessel, places or removes markers
    /// accordingly and fits the viewport to the shown vessels.
    async fn apply_visibility(&mut self) {
        let mut shown = Vec::new();
        let mut hidden = Vec::new();

        for vessel in self.vessels.values() {
            if is_visible(vessel, &self.filter, &self.fleets) {
                shown.push(self.resolver.resolve(vessel, &self.store));
            } else {
                hidden.push(vessel.id.clone());
            }
        }

        let bounds = Bounds::containing(
            shown
                .iter()
                .filter(|r| r.is_renderable())
                .filter_map(|r| r.position.coordinates()),
        );

        debug!("visible vessels: {}, hidden: {}", shown.len(), hidden.len());

        for resolved in shown {
            spawn_apply(&mut self.passes, &self.markers, resolved);
        }
        for vessel_id in hidden {
            spawn_release(&mut self.passes, &self.markers, vessel_id);
        }

        if let Some(bounds) = bounds {
            if let Err(e) = self.markers.sink().fit_bounds(bounds).await {
                error!("failed to fit bounds: {e:?}");
            }
        }
    }

    fn visible_vessels(&self) -> Vec<VisibleVessel> {
        self.vessels
            .values()
            .filter(|v| is_visible(v, &self.filter, &self.fleets))
            .map(|v| VisibleVessel {
                vessel: v.clone(),
                resolved: self.resolver.resolve(v, &self.store),
            })
            .collect()
    }

    fn vessel_detail(&self, vessel_id: &VesselId) -> Option<VesselDetail> {
        let vessel = self.vessels.get(vessel_id)?;
        let entry = self.store.get(&vessel.key());
        let resolved = self.resolver.resolve(vessel, &self.store);

        let static_info = entry.and_then(|e| e.static_info.clone());
        let voyage = entry.and_then(|e| e.voyage.clone());

        let display_name = vessel
            .name
            .clone()
            .or_else(|| entry.and_then(|e| e.stream_ship_name.clone()))
            .or_else(|| static_info.as_ref().and_then(|s| s.name.clone()))
            .unwrap_or_else(|| vessel.display_name().to_owned());

        let destination = voyage
            .as_ref()
            .and_then(|v| v.destination.clone())
            .or_else(|| static_info.as_ref().and_then(|s| s.destination.clone()));

        Some(VesselDetail {
            vessel: vessel.clone(),
            display_name,
            speed: resolved.position.speed,
            course: resolved.position.course,
            heading: resolved.position.heading,
            navigational_status: resolved.position.navigational_status,
            timestamp: resolved.position.timestamp,
            resolved,
            destination,
            voyage,
            static_info,
        })
    }

    /// Waits for every in-flight marker pass.
    async fn settle(&mut self) {
        while let Some(res) = self.passes.join_next().await {
            log_pass(res);
        }
    }
}

impl EngineHandle {
    pub fn health(&self) -> watch::Receiver<ConnectionState> {
        self.health.clone()
    }

    /// Shows only vessels of the given type, clearing any fleet selection.
    pub async fn set_type_filter(&self, filter: TypeFilter) -> Result<()> {
        self.request(|reply| Command::SetTypeFilter(filter, reply))
            .await
    }

    /// Shows only members of the given fleet, `None` shows every vessel.
    pub async fn set_fleet_filter(&self, fleet: Option<FleetId>) -> Result<()> {
        self.request(|reply| Command::SetFleetFilter(fleet, reply))
            .await
    }

    pub async fn set_fleets(&self, fleets: FleetDirectory) -> Result<()> {
        self.request(|reply| Command::SetFleets(fleets, reply))
            .await
    }

    /// Re-fetches the snapshot and rebuilds all markers, returns the number of vessels.
    pub async fn refresh_snapshot(&self) -> Result<usize> {
        Ok(self.request(Command::RefreshSnapshot).await??)
    }

    pub async fn visible_vessels(&self) -> Result<Vec<VisibleVessel>> {
        self.request(Command::VisibleVessels).await
    }

    pub async fn vessel_detail(&self, vessel_id: VesselId) -> Result<Option<VesselDetail>> {
        self.request(|reply| Command::VesselDetail(vessel_id, reply))
            .await
    }

    /// Runs pending updates immediately and waits until all marker passes are done.
    pub async fn flush(&self) -> Result<()> {
        self.request(Command::Flush).await
    }

    /// Stops the engine and its live feed connection.
    pub async fn stop(self) {
        if self.commands.send(Command::Stop).await.is_ok() {
            if let Err(e) = self.task.await {
                error!("engine task failed: {e:?}");
            }
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, receiver) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .ok()
            .context(EngineStoppedSnafu)?;
        receiver.await.ok().context(EngineStoppedSnafu)
    }
}

fn spawn_apply(
    passes: &mut JoinSet<(VesselId, MarkerUpdate)>,
    markers: &MarkerController,
    resolved: ResolvedPosition,
) {
    let markers = markers.clone();
    passes.spawn(async move {
        let update = markers.apply(&resolved).await;
        (resolved.vessel_id, update)
    });
}

fn spawn_release(
    passes: &mut JoinSet<(VesselId, MarkerUpdate)>,
    markers: &MarkerController,
    vessel_id: VesselId,
) {
    let markers = markers.clone();
    passes.spawn(async move {
        let update = markers.release(&vessel_id).await;
        (vessel_id, update)
    });
}

fn log_pass(res: std::result::Result<(VesselId, MarkerUpdate), tokio::task::JoinError>) {
    match res {
        Ok((vessel_id, update)) => match update {
            MarkerUpdate::Unchanged => {}
            MarkerUpdate::Busy => debug!("marker pass for vessel {vessel_id} was dropped"),
            MarkerUpdate::Failed => warn!("marker pass for vessel {vessel_id} failed"),
            MarkerUpdate::Created(_)
            | MarkerUpdate::Moved
            | MarkerUpdate::Restyled
            | MarkerUpdate::Removed => debug!("marker of vessel {vessel_id}: {update:?}"),
        },
        Err(e) => error!("marker pass panicked: {e:?}"),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}
