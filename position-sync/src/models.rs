use std::str::FromStr;

use fleet_core::{
    CachedPosition, Mmsi, RawPosition, SnapshotVessel, SourceKind, StaticInfo, TypeCategory,
    Vessel, VesselId, Voyage,
};
use serde::Deserialize;
use serde_json::Value;
use strum::{AsRefStr, EnumString};
use tracing::debug;

use crate::normalizer::{self, integer, mmsi_value, normalize, text};

const SHIP_NAME: &[&str] = &["ShipName", "shipName", "Name", "name"];
const DESTINATION: &[&str] = &["Destination", "destination"];
const IMO_NUMBER: &[&str] = &["ImoNumber", "imoNumber", "imo", "IMO"];
const CALL_SIGN: &[&str] = &["CallSign", "callSign", "call_sign"];

/// A normalized event from the live feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Position {
        mmsi: Mmsi,
        ship_name: Option<String>,
        position: RawPosition,
    },
    Static {
        mmsi: Mmsi,
        info: StaticInfo,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
pub enum FeedMessageKind {
    /// A message containing position data.
    #[strum(serialize = "PositionReport", serialize = "Position")]
    PositionReport,
    /// A message containing vessel related data.
    #[strum(serialize = "ShipStaticData", serialize = "Staticdata")]
    ShipStaticData,
}

/// Convenience struct to deserialize the message type and the envelope prior to
/// reading the payload.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "MessageType", alias = "messageType", alias = "type")]
    message_type: String,
    #[serde(rename = "MetaData", alias = "metaData", alias = "metadata", default)]
    meta_data: Option<Value>,
    #[serde(rename = "Message", alias = "message", default)]
    message: Option<Value>,
}

/// A vessel as returned by the fleet endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetVessel {
    pub id: VesselId,
    #[serde(default)]
    pub mmsi: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "type", alias = "category")]
    pub type_category: Option<String>,
    #[serde(default, alias = "jobLocation", alias = "lastJob")]
    pub last_job_location: Option<String>,
    #[serde(default)]
    pub live_position: Option<Value>,
}

/// Reshapes a raw feed frame, returns `None` for anything that is not a usable
/// position or static data message.
pub fn parse_feed_message(raw: &str) -> Option<FeedEvent> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            debug!("discarding malformed feed message: {e}");
            return None;
        }
    };

    let envelope = match Envelope::deserialize(&value) {
        Ok(v) => v,
        Err(e) => {
            debug!("discarding feed message without a message type: {e}");
            return None;
        }
    };

    // The feed is allowed to evolve, other message types are not an error.
    let Ok(kind) = FeedMessageKind::from_str(&envelope.message_type) else {
        return None;
    };

    // Envelope style messages nest the payload under the message type name,
    // flat messages carry it at the top level.
    let body = envelope
        .message
        .as_ref()
        .and_then(|m| m.get(kind.as_ref()))
        .unwrap_or(&value);

    let mut layers = vec![body];
    if let Some(meta) = envelope.meta_data.as_ref() {
        layers.push(meta);
    }
    if !std::ptr::eq(body, &value) {
        layers.push(&value);
    }

    let Some(mmsi) = normalizer::mmsi(&layers) else {
        debug!("discarding feed message without a valid mmsi");
        return None;
    };

    match kind {
        FeedMessageKind::PositionReport => {
            let position = normalize(&layers, SourceKind::StreamLive);
            if !position.is_renderable() {
                debug!("discarding position report without valid coordinates, mmsi: {mmsi}");
                return None;
            }

            Some(FeedEvent::Position {
                mmsi,
                ship_name: text(&layers, SHIP_NAME),
                position,
            })
        }
        FeedMessageKind::ShipStaticData => Some(FeedEvent::Static {
            mmsi,
            info: StaticInfo {
                name: text(&layers, SHIP_NAME),
                destination: text(&layers, DESTINATION),
                imo_number: integer(&layers, IMO_NUMBER).and_then(|v| i32::try_from(v).ok()),
                call_sign: text(&layers, CALL_SIGN),
            },
        }),
    }
}

/// Parses the fleet endpoint response, vessels that fail to parse are skipped.
pub fn parse_fleet(values: Vec<Value>) -> Vec<SnapshotVessel> {
    values
        .into_iter()
        .filter_map(|v| match FleetVessel::deserialize(v) {
            Ok(v) => Some(SnapshotVessel::from(v)),
            Err(e) => {
                debug!("skipping malformed fleet vessel: {e}");
                None
            }
        })
        .collect()
}

/// Parses the cached positions response, entries without a valid mmsi are skipped.
pub fn parse_cached_positions(values: Vec<Value>) -> Vec<CachedPosition> {
    values
        .iter()
        .filter_map(|v| {
            let layers = [v];
            let Some(mmsi) = normalizer::mmsi(&layers) else {
                debug!("skipping cached position without a valid mmsi");
                return None;
            };

            Some(CachedPosition {
                mmsi,
                ship_name: text(&layers, SHIP_NAME),
                position: normalize(&layers, SourceKind::StreamLive),
            })
        })
        .collect()
}

fn snapshot_source_kind(source: Option<&str>) -> SourceKind {
    match source {
        Some("static") => SourceKind::ApiStatic,
        Some("last_known") => SourceKind::ApiLastKnown,
        _ => SourceKind::ApiLive,
    }
}

impl From<FleetVessel> for SnapshotVessel {
    fn from(v: FleetVessel) -> Self {
        let FleetVessel {
            id,
            mmsi: raw_mmsi,
            name,
            type_category,
            last_job_location,
            live_position,
        } = v;

        let mmsi = raw_mmsi.as_ref().and_then(mmsi_value);

        let type_category = type_category
            .and_then(|t| TypeCategory::from_str(t.trim()).ok())
            .unwrap_or_default();

        let (live_position, voyage) = match live_position {
            Some(lp) if lp.is_object() => {
                let layers = [&lp];
                let source = text(&layers, &["source"]);
                let position = normalize(&layers, snapshot_source_kind(source.as_deref()));
                let voyage = Voyage {
                    destination: text(&layers, DESTINATION),
                    eta: text(&layers, &["eta"]),
                    port: text(&layers, &["port"]),
                    note: text(&layers, &["note"]),
                };
                (Some(position), Some(voyage))
            }
            _ => (None, None),
        };

        SnapshotVessel {
            vessel: Vessel {
                name: name
                    .map(|n| n.trim().to_owned())
                    .filter(|n| !n.is_empty()),
                id,
                mmsi,
                type_category,
                last_job_location: last_job_location.filter(|l| !l.trim().is_empty()),
            },
            live_position,
            voyage,
        }
    }
}
