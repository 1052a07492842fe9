use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use snafu::ResultExt;
use strum::{AsRefStr, EnumString};

use crate::{
    MmsiError,
    mmsi_error::{ParseSnafu, RangeSnafu},
};

const MMSI_MAX: i64 = 999_999_999;

/// Opaque, stable identifier of a vessel as assigned by the fleet-data service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VesselId(String);

/// Maritime Mobile Service Identity, the key used to join fleet data with AIS data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct Mmsi(i32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TypeCategory {
    Military,
    Commercial,
    #[default]
    Other,
}

/// A tracked vessel. Owned by the fleet-data collaborator and replaced wholesale
/// on every snapshot load.
#[derive(Debug, Clone, PartialEq)]
pub struct Vessel {
    pub id: VesselId,
    pub mmsi: Option<Mmsi>,
    /// Name given by the fleet-data service, if any.
    pub name: Option<String>,
    pub type_category: TypeCategory,
    /// Free text location of the most recent job the vessel was assigned to.
    pub last_job_location: Option<String>,
}

/// Key of a position store entry, the mmsi when known and the vessel id otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VesselKey {
    Mmsi(Mmsi),
    Id(VesselId),
}

/// Voyage details reported alongside the snapshot position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Voyage {
    pub destination: Option<String>,
    pub eta: Option<String>,
    pub port: Option<String>,
    pub note: Option<String>,
}

/// Vessel related data received from `ShipStaticData` stream messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticInfo {
    pub name: Option<String>,
    pub destination: Option<String>,
    pub imo_number: Option<i32>,
    pub call_sign: Option<String>,
}

impl VesselId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sum of the character codes of the id, the seed of the deterministic fallback.
    pub fn char_code_sum(&self) -> u32 {
        self.0.chars().fold(0u32, |acc, c| acc.wrapping_add(c as u32))
    }
}

impl<'de> Deserialize<'de> for VesselId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // The fleet service has used both numeric and string ids.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(v) => Self(v),
            Raw::Number(v) => Self(v.to_string()),
        })
    }
}

impl Display for VesselId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for VesselId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Mmsi {
    pub fn into_inner(self) -> i32 {
        self.0
    }
}

impl TryFrom<i64> for Mmsi {
    type Error = MmsiError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (1..=MMSI_MAX).contains(&value) {
            Ok(Self(value as i32))
        } else {
            RangeSnafu { value }.fail()
        }
    }
}

impl FromStr for Mmsi {
    type Err = MmsiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s.trim().parse().context(ParseSnafu { value: s })?;
        Self::try_from(value)
    }
}

impl From<Mmsi> for i32 {
    fn from(value: Mmsi) -> Self {
        value.0
    }
}

impl Display for Mmsi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Vessel {
    /// The fleet name, or the id for vessels the fleet has not named.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn key(&self) -> VesselKey {
        match self.mmsi {
            Some(mmsi) => VesselKey::Mmsi(mmsi),
            None => VesselKey::Id(self.id.clone()),
        }
    }
}

impl Display for VesselKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VesselKey::Mmsi(mmsi) => write!(f, "mmsi:{mmsi}"),
            VesselKey::Id(id) => write!(f, "id:{id}"),
        }
    }
}

impl StaticInfo {
    /// Overlays `other` on top of `self`, keeping existing values where `other` has none.
    pub fn merge(&mut self, other: StaticInfo) {
        let StaticInfo {
            name,
            destination,
            imo_number,
            call_sign,
        } = other;

        if name.is_some() {
            self.name = name;
        }
        if destination.is_some() {
            self.destination = destination;
        }
        if imo_number.is_some() {
            self.imo_number = imo_number;
        }
        if call_sign.is_some() {
            self.call_sign = call_sign;
        }
    }
}

#[cfg(feature = "test")]
mod test {
    use super::*;

    impl Mmsi {
        pub fn test_new(mmsi: i32) -> Self {
            Self(mmsi)
        }
    }

    impl Vessel {
        pub fn test_default(id: &str, mmsi: Option<&str>, type_category: TypeCategory) -> Vessel {
            Vessel {
                id: VesselId::new(id),
                mmsi: mmsi.map(|m| m.parse().unwrap()),
                name: Some(format!("test vessel {id}")),
                type_category,
                last_job_location: None,
            }
        }
    }
}
