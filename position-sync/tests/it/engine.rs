use std::time::Duration;

use chrono::{TimeZone, Utc};
use fleet_core::{
    CachedPosition, Coordinates, FleetDirectory, FleetId, MarkerState, Mmsi, RawPosition,
    SourceKind, TypeCategory, TypeFilter, VesselId,
};
use position_sync::{
    resolver::ExclusionRule,
    stream::ConnectionState,
    test_helper::{RecordingSink, SinkCall},
};

use crate::helper::{snapshot_vessel, snapshot_vessel_at, test, test_with_settings, test_with_sink};

const MMSI: &str = "503123456";

#[tokio::test(start_paused = true)]
async fn test_fallback_marker_becomes_live_when_stream_position_arrives() {
    test(|helper| async move {
        helper
            .load_fleet(vec![snapshot_vessel("v1", Some(MMSI), TypeCategory::Military)])
            .await;

        let visible = helper.engine.visible_vessels().await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(
            visible[0].resolved.position.source_kind,
            SourceKind::DeterministicFallback
        );
        assert_eq!(visible[0].resolved.marker_state, Some(MarkerState::Estimated));
        assert_eq!(helper.sink.created(), 1);

        let connection = helper.feed.open();
        let mut health = helper.engine.health();
        health
            .wait_for(|s| *s == ConnectionState::Open)
            .await
            .unwrap();

        connection
            .send_position(MMSI, -12.46, 130.84, Some(45.0))
            .await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        helper.engine.flush().await.unwrap();

        let visible = helper.engine.visible_vessels().await.unwrap();
        let resolved = &visible[0].resolved;
        assert_eq!(resolved.position.source_kind, SourceKind::StreamLive);
        assert_eq!(resolved.marker_state, Some(MarkerState::Live));
        assert_eq!(resolved.display_label, "Live (AIS stream)");
        assert_eq!(
            resolved.position.coordinates(),
            Coordinates::new(-12.46, 130.84)
        );

        // Same marker, restyled in place with its handlers attached again.
        assert_eq!(helper.sink.created(), 1);
        let handle = *helper.live_markers().keys().next().unwrap();
        let calls = helper.sink.calls_for(handle);
        let n = calls.len();
        assert!(matches!(calls[n - 2], SinkCall::Restyle { .. }));
        assert!(matches!(calls[n - 1], SinkCall::AttachHandlers { .. }));
        assert_eq!(
            helper.live_markers()[&handle],
            Coordinates::new(-12.46, 130.84).unwrap()
        );

        helper.engine.stop().await;
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_updates_within_debounce_window_results_in_one_move() {
    test(|helper| async move {
        helper
            .load_fleet(vec![snapshot_vessel("v1", Some(MMSI), TypeCategory::Military)])
            .await;

        let connection = helper.feed.open();
        connection.send_position(MMSI, -12.0, 130.0, None).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        helper.engine.flush().await.unwrap();
        helper.sink.clear_calls();

        for lat in [-12.01, -12.02, -12.03, -12.04, -12.05] {
            connection.send_position(MMSI, lat, 130.0, None).await;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        helper.engine.flush().await.unwrap();

        let moves: Vec<_> = helper
            .sink
            .calls()
            .into_iter()
            .filter(|c| matches!(c, SinkCall::Move { .. }))
            .collect();
        assert_eq!(moves.len(), 1);
        let SinkCall::Move { coordinates, .. } = moves[0] else {
            unreachable!()
        };
        assert_eq!(coordinates, Coordinates::new(-12.05, 130.0).unwrap());

        helper.engine.stop().await;
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_type_filter_clears_fleet_selection_and_fits_bounds() {
    test(|helper| async move {
        helper
            .load_fleet(vec![
                snapshot_vessel_at("a", TypeCategory::Military, -35.0, 150.0),
                snapshot_vessel_at("b", TypeCategory::Commercial, -33.0, 151.0),
                snapshot_vessel_at("c", TypeCategory::Commercial, -12.0, 130.0),
            ])
            .await;

        let mut fleets = FleetDirectory::default();
        fleets.insert(FleetId::new("f1"), [VesselId::new("a")]);
        helper.engine.set_fleets(fleets).await.unwrap();

        helper
            .engine
            .set_fleet_filter(Some(FleetId::new("f1")))
            .await
            .unwrap();
        helper.engine.flush().await.unwrap();

        let visible = helper.engine.visible_vessels().await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].vessel.id, VesselId::new("a"));
        assert_eq!(helper.live_markers().len(), 1);

        helper
            .engine
            .set_type_filter(TypeFilter::Commercial)
            .await
            .unwrap();
        helper.engine.flush().await.unwrap();

        let ids: Vec<_> = helper
            .engine
            .visible_vessels()
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.vessel.id)
            .collect();
        assert_eq!(ids, vec![VesselId::new("b"), VesselId::new("c")]);
        assert_eq!(helper.live_markers().len(), 2);

        let bounds = helper.sink.last_bounds().unwrap();
        assert_eq!(bounds.south_west, Coordinates::new(-33.0, 130.0).unwrap());
        assert_eq!(bounds.north_east, Coordinates::new(-12.0, 151.0).unwrap());

        helper.engine.stop().await;
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_unknown_fleet_shows_no_vessels() {
    test(|helper| async move {
        helper
            .load_fleet(vec![snapshot_vessel_at(
                "a",
                TypeCategory::Military,
                -35.0,
                150.0,
            )])
            .await;

        helper
            .engine
            .set_fleet_filter(Some(FleetId::new("missing")))
            .await
            .unwrap();
        helper.engine.flush().await.unwrap();

        assert!(helper.engine.visible_vessels().await.unwrap().is_empty());
        assert!(helper.live_markers().is_empty());

        helper.engine.stop().await;
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_refresh_rebuilds_every_marker() {
    test(|helper| async move {
        helper
            .load_fleet(vec![
                snapshot_vessel_at("a", TypeCategory::Military, -35.0, 150.0),
                snapshot_vessel_at("b", TypeCategory::Commercial, -33.0, 151.0),
            ])
            .await;
        assert_eq!(helper.sink.created(), 2);

        helper
            .load_fleet(vec![snapshot_vessel_at(
                "b",
                TypeCategory::Commercial,
                -33.5,
                151.0,
            )])
            .await;

        let markers = helper.live_markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(
            markers.values().next().copied(),
            Coordinates::new(-33.5, 151.0)
        );
        assert_eq!(helper.sink.created(), 3);
        // The initial load on start plus two refreshes.
        assert_eq!(helper.snapshot.fetches(), 3);

        helper.engine.stop().await;
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_snapshot_refresh_keeps_previous_state() {
    test(|helper| async move {
        helper
            .load_fleet(vec![snapshot_vessel_at(
                "a",
                TypeCategory::Military,
                -35.0,
                150.0,
            )])
            .await;

        helper.snapshot.set_failing(true);
        assert!(helper.engine.refresh_snapshot().await.is_err());
        helper.engine.flush().await.unwrap();

        assert_eq!(helper.engine.visible_vessels().await.unwrap().len(), 1);
        assert_eq!(helper.live_markers().len(), 1);

        helper.snapshot.set_failing(false);
        assert_eq!(helper.engine.refresh_snapshot().await.unwrap(), 1);

        helper.engine.stop().await;
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_stale_stream_position_falls_back_after_reconcile() {
    test(|helper| async move {
        helper
            .load_fleet(vec![snapshot_vessel("v1", Some(MMSI), TypeCategory::Military)])
            .await;

        let connection = helper.feed.open();
        connection
            .send_raw(format!(
                r#"{{"MessageType": "PositionReport", "MMSI": {MMSI}, "lat": -12.46, "lng": 130.84, "time_utc": "2020-01-01T00:00:00Z"}}"#
            ))
            .await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        helper.engine.flush().await.unwrap();

        let visible = helper.engine.visible_vessels().await.unwrap();
        assert_eq!(
            visible[0].resolved.position.source_kind,
            SourceKind::StreamLive
        );

        tokio::time::sleep(Duration::from_secs(6)).await;
        helper.engine.flush().await.unwrap();

        let visible = helper.engine.visible_vessels().await.unwrap();
        let resolved = &visible[0].resolved;
        assert_eq!(
            resolved.position.source_kind,
            SourceKind::DeterministicFallback
        );

        let markers = helper.live_markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(
            markers.values().next().copied(),
            resolved.position.coordinates()
        );

        helper.engine.stop().await;
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_feed_messages_do_not_break_the_connection() {
    test(|helper| async move {
        helper
            .load_fleet(vec![snapshot_vessel("v1", Some(MMSI), TypeCategory::Commercial)])
            .await;

        let connection = helper.feed.open();
        connection.send_raw("not json").await;
        connection
            .send_raw(format!(
                r#"{{"type": "PositionReport", "mmsi": {MMSI}, "lat": 0, "lng": 0}}"#
            ))
            .await;
        connection
            .send_raw(r#"{"type": "PositionReport", "lat": -33.0, "lng": 151.0}"#)
            .await;
        connection.send_position(MMSI, -33.86, 151.22, None).await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        helper.engine.flush().await.unwrap();

        assert_eq!(*helper.engine.health().borrow(), ConnectionState::Open);
        let visible = helper.engine.visible_vessels().await.unwrap();
        assert_eq!(
            visible[0].resolved.position.coordinates(),
            Coordinates::new(-33.86, 151.22)
        );

        helper.engine.stop().await;
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_excluded_vessel_without_position_has_no_marker() {
    test_with_settings(
        |settings| {
            settings.resolver.exclusions = vec![ExclusionRule {
                mmsi_prefix: Some("999".into()),
                name_contains: None,
            }]
        },
        |helper| async move {
            helper
                .load_fleet(vec![
                    snapshot_vessel("v1", Some("999000001"), TypeCategory::Commercial),
                    snapshot_vessel("v2", Some(MMSI), TypeCategory::Commercial),
                ])
                .await;

            let visible = helper.engine.visible_vessels().await.unwrap();
            assert_eq!(visible.len(), 2);
            assert_eq!(visible[0].resolved.marker_state, None);
            assert_eq!(visible[0].resolved.display_label, "Awaiting position data");
            assert_eq!(helper.live_markers().len(), 1);

            helper.engine.stop().await;
        },
    )
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_vessel_detail_uses_broadcast_name_when_fleet_has_none() {
    test(|helper| async move {
        let mut unnamed = snapshot_vessel("v1", Some(MMSI), TypeCategory::Commercial);
        unnamed.vessel.name = None;
        let mut named_like_id = snapshot_vessel("v2", Some("503123457"), TypeCategory::Commercial);
        named_like_id.vessel.name = Some("v2".into());
        helper.load_fleet(vec![unnamed, named_like_id]).await;

        let connection = helper.feed.open();
        connection.send_static(MMSI, "SIRIUS", "DARWIN").await;
        connection.send_static("503123457", "OTHER", "CAIRNS").await;
        connection.send_position(MMSI, -12.46, 130.84, Some(90.0)).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        helper.engine.flush().await.unwrap();

        let detail = helper
            .engine
            .vessel_detail(VesselId::new("v1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(detail.display_name, "SIRIUS");
        assert_eq!(detail.destination.as_deref(), Some("DARWIN"));
        assert_eq!(detail.heading, Some(90.0));
        assert_eq!(detail.speed, Some(12.5));
        assert!(detail.timestamp.is_some());

        let detail = helper
            .engine
            .vessel_detail(VesselId::new("v2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.display_name, "v2");
        assert_eq!(detail.destination.as_deref(), Some("CAIRNS"));

        assert!(
            helper
                .engine
                .vessel_detail(VesselId::new("missing"))
                .await
                .unwrap()
                .is_none()
        );

        helper.engine.stop().await;
    })
    .await;
}

fn cached(lat: f64, lng: f64, timestamp: chrono::DateTime<Utc>) -> CachedPosition {
    let mut position = RawPosition::at(Coordinates::new(lat, lng).unwrap(), SourceKind::StreamLive);
    position.timestamp = Some(timestamp);
    CachedPosition {
        mmsi: Mmsi::test_new(503123456),
        ship_name: Some("SIRIUS".into()),
        position,
    }
}

#[tokio::test(start_paused = true)]
async fn test_cached_positions_seed_stream_data_on_load() {
    test(|helper| async move {
        helper
            .snapshot
            .set_cached_positions(vec![cached(-33.86, 151.22, Utc::now())]);
        helper
            .load_fleet(vec![snapshot_vessel("v1", Some(MMSI), TypeCategory::Commercial)])
            .await;

        let visible = helper.engine.visible_vessels().await.unwrap();
        let resolved = &visible[0].resolved;
        assert_eq!(resolved.position.source_kind, SourceKind::StreamLive);
        assert_eq!(
            resolved.position.coordinates(),
            Coordinates::new(-33.86, 151.22)
        );

        helper.engine.stop().await;
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_cached_position_never_replaces_newer_stream_fix() {
    test(|helper| async move {
        helper
            .load_fleet(vec![snapshot_vessel("v1", Some(MMSI), TypeCategory::Commercial)])
            .await;

        let connection = helper.feed.open();
        connection.send_position(MMSI, -12.46, 130.84, None).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        helper.engine.flush().await.unwrap();

        let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        helper
            .snapshot
            .set_cached_positions(vec![cached(-33.86, 151.22, old)]);
        helper.engine.refresh_snapshot().await.unwrap();
        helper.engine.flush().await.unwrap();

        let visible = helper.engine.visible_vessels().await.unwrap();
        assert_eq!(
            visible[0].resolved.position.coordinates(),
            Coordinates::new(-12.46, 130.84)
        );

        helper.engine.stop().await;
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_update_dropped_while_marker_is_busy_is_caught_up_by_reconciliation() {
    let sink = RecordingSink::gated();
    sink.open_gate();

    test_with_sink(sink, |_| {}, |helper| async move {
        helper
            .load_fleet(vec![snapshot_vessel("v1", Some(MMSI), TypeCategory::Military)])
            .await;

        let connection = helper.feed.open();
        helper.sink.close_gate();

        // The pass for the first fix holds the marker until the gate opens.
        connection.send_position(MMSI, -12.0, 130.0, None).await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        // Finds the marker busy and is dropped.
        connection.send_position(MMSI, -12.5, 130.5, None).await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        helper.sink.open_gate();
        tokio::time::sleep(Duration::from_secs(6)).await;
        helper.engine.flush().await.unwrap();

        let markers = helper.live_markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(
            markers.values().next().copied(),
            Some(Coordinates::new(-12.5, 130.5).unwrap())
        );
        assert_eq!(helper.sink.created(), 1);

        helper.engine.stop().await;
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_is_refreshed_periodically() {
    test_with_settings(
        |settings| settings.scheduler.snapshot_refresh_interval = Some(Duration::from_secs(30)),
        |helper| async move {
            helper
                .load_fleet(vec![snapshot_vessel_at("a", TypeCategory::Military, -35.0, 150.0)])
                .await;
            let fetches = helper.snapshot.fetches();

            helper.snapshot.set_fleet(vec![
                snapshot_vessel_at("a", TypeCategory::Military, -35.0, 150.0),
                snapshot_vessel_at("b", TypeCategory::Commercial, -33.0, 151.0),
            ]);
            tokio::time::sleep(Duration::from_secs(31)).await;
            helper.engine.flush().await.unwrap();

            assert_eq!(helper.snapshot.fetches(), fetches + 1);
            assert_eq!(helper.engine.visible_vessels().await.unwrap().len(), 2);
            assert_eq!(helper.live_markers().len(), 2);

            helper.engine.stop().await;
        },
    )
    .await;
}
