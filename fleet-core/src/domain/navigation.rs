use num_derive::FromPrimitive;
use serde_repr::{Deserialize_repr, Serialize_repr};
use strum::{AsRefStr, Display};

/// AIS navigational status as broadcast in position reports.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    FromPrimitive,
    Serialize_repr,
    Deserialize_repr,
    Display,
    AsRefStr,
)]
#[repr(i32)]
pub enum NavigationStatus {
    UnderWayUsingEngine = 0,
    AtAnchor = 1,
    NotUnderCommand = 2,
    RestrictedManoeuverability = 3,
    ConstrainedByDraught = 4,
    Moored = 5,
    Aground = 6,
    EngagedInFishing = 7,
    UnderWaySailing = 8,
    Reserved9 = 9,
    Reserved10 = 10,
    Reserved11 = 11,
    Reserved12 = 12,
    Reserved13 = 13,
    AisSartIsActive = 14,
    NotDefined = 15,
}

impl NavigationStatus {
    pub fn from_code(code: i64) -> Option<Self> {
        num_traits::FromPrimitive::from_i64(code)
    }
}
