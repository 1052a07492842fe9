use fleet_core::{Error, SnapshotSource, SourceKind, TypeCategory, VesselId};
use position_sync::{settings::Settings, snapshot::HttpSnapshotSource};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

async fn source(server: &MockServer, token: Option<&str>) -> HttpSnapshotSource {
    let mut settings = Settings::test_default(&server.uri());
    settings.api_token = token.map(From::from);
    HttpSnapshotSource::new(&settings).unwrap()
}

#[tokio::test]
async fn test_fetches_and_parses_fleet() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/fleet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "hmas-sirius",
                "mmsi": 503123456,
                "name": "HMAS Sirius",
                "typeCategory": "military",
                "livePosition": { "latitude": -12.46, "longitude": 130.84, "sog": 8.0 }
            },
            {
                "id": "tug-1",
                "type": "Commercial",
                "lastJobLocation": "Port Botany berth 3"
            },
            "garbage"
        ])))
        .mount(&server)
        .await;

    let fleet = source(&server, None).await.fleet().await.unwrap();

    assert_eq!(fleet.len(), 2);
    assert_eq!(fleet[0].vessel.id, VesselId::new("hmas-sirius"));
    assert_eq!(fleet[0].vessel.type_category, TypeCategory::Military);
    let position = fleet[0].live_position.as_ref().unwrap();
    assert_eq!(position.source_kind, SourceKind::ApiLive);
    assert_eq!(position.speed, Some(8.0));

    assert_eq!(fleet[1].vessel.mmsi, None);
    assert_eq!(
        fleet[1].vessel.last_job_location.as_deref(),
        Some("Port Botany berth 3")
    );
    assert!(fleet[1].live_position.is_none());
}

#[tokio::test]
async fn test_sends_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/ais/latest_positions"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "mmsi": "503123456", "lat": -33.86, "lng": 151.22, "shipName": "SIRIUS" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let cached = source(&server, Some("secret"))
        .await
        .cached_positions()
        .await
        .unwrap();

    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].ship_name.as_deref(), Some("SIRIUS"));
    assert_eq!(cached[0].position.source_kind, SourceKind::StreamLive);
}

#[tokio::test]
async fn test_error_status_is_reported_with_status_code() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/fleet"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let err = source(&server, None).await.fleet().await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(matches!(err, Error::FailedRequest { .. }));
}

#[tokio::test]
async fn test_invalid_json_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/fleet"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = source(&server, None).await.fleet().await.unwrap_err();

    assert!(matches!(err, Error::Json { .. }));
}
