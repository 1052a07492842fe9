use fleet_core::{Coordinates, TypeCategory, Vessel};

/// Maximum distance in degrees a fallback position is moved away from its base.
const JITTER_DEGREES: f64 = 0.01;
/// Offsets stay strictly inside the jitter band.
const JITTER_SCALE: f64 = 0.9;
/// Knuth's multiplicative hash constant, decorrelates the longitude offset from the latitude one.
const LNG_MIX: u32 = 2_654_435_761;

const MILITARY_BASES: &[(f64, f64)] = &[
    // Fleet Base East, Sydney
    (-33.8615, 151.2260),
    // HMAS Stirling
    (-32.2380, 115.6880),
    // Darwin
    (-12.4634, 130.8456),
    // Cairns
    (-16.9186, 145.7781),
];

const COMMERCIAL_BASES: &[(f64, f64)] = &[
    // Port Botany
    (-33.9700, 151.2100),
    // Melbourne
    (-37.8400, 144.9300),
    // Brisbane
    (-27.3833, 153.1667),
    // Fremantle
    (-32.0550, 115.7430),
    // Port Adelaide
    (-34.8300, 138.5000),
];

fn bases(type_category: TypeCategory) -> &'static [(f64, f64)] {
    match type_category {
        TypeCategory::Military => MILITARY_BASES,
        TypeCategory::Commercial | TypeCategory::Other => COMMERCIAL_BASES,
    }
}

/// Places a vessel without any known position at one of the base locations of
/// its type category. The result only depends on the vessel id and category.
pub fn deterministic_position(vessel: &Vessel) -> Coordinates {
    let hash = vessel.id.char_code_sum();
    let bases = bases(vessel.type_category);

    let (lat, lng) = bases[hash as usize % bases.len()];

    let d_lat = jitter(hash);
    let d_lng = jitter(hash.wrapping_mul(LNG_MIX));

    Coordinates { lat, lng }.offset(d_lat, d_lng)
}

/// Maps a hash to an offset in `[-JITTER_SCALE, JITTER_SCALE] * JITTER_DEGREES`.
fn jitter(hash: u32) -> f64 {
    ((hash % 1000) as f64 / 999.0 - 0.5) * 2.0 * JITTER_SCALE * JITTER_DEGREES
}

/// Whether the given coordinates are within jitter distance of one of the base
/// locations of the type category.
pub fn is_near_base(coordinates: Coordinates, type_category: TypeCategory) -> bool {
    bases(type_category).iter().any(|(lat, lng)| {
        (coordinates.lat - lat).abs() < JITTER_DEGREES
            && (coordinates.lng - lng).abs() < JITTER_DEGREES
    })
}
