use fleet_core::Coordinates;
use serde::Deserialize;

/// Reverse matches ("is the query part of a location name") need a minimum
/// length, otherwise a job location like "N" would match most names.
const MIN_REVERSE_MATCH_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NamedLocation {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

/// Static list of named ports and bases used to place vessels by their job location.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    // Lowercased name next to the location, longest names first so that the
    // most specific name wins.
    entries: Vec<(String, NamedLocation)>,
}

impl NamedLocation {
    fn new(name: &str, lat: f64, lng: f64) -> Self {
        Self {
            name: name.to_owned(),
            lat,
            lng,
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::new(self.lat, self.lng)
    }
}

impl Gazetteer {
    pub fn new(locations: Vec<NamedLocation>) -> Self {
        let mut entries: Vec<_> = locations
            .into_iter()
            .filter(|l| l.coordinates().is_some())
            .map(|l| (l.name.trim().to_lowercase(), l))
            .filter(|(name, _)| !name.is_empty())
            .collect();

        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self { entries }
    }

    /// Case-insensitive substring match in both directions.
    pub fn find(&self, query: &str) -> Option<&NamedLocation> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }

        self.entries
            .iter()
            .find(|(name, _)| {
                query.contains(name.as_str())
                    || (query.len() >= MIN_REVERSE_MATCH_LEN && name.contains(query.as_str()))
            })
            .map(|(_, location)| location)
    }

    /// Exact, case-insensitive lookup by name.
    pub fn get(&self, name: &str) -> Option<&NamedLocation> {
        let name = name.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, location)| location)
    }
}

impl Default for Gazetteer {
    fn default() -> Self {
        Self::new(vec![
            NamedLocation::new("Fleet Base East", -33.8615, 151.2260),
            NamedLocation::new("Garden Island", -33.8615, 151.2260),
            NamedLocation::new("Fleet Base West", -32.2380, 115.6880),
            NamedLocation::new("HMAS Stirling", -32.2380, 115.6880),
            NamedLocation::new("HMAS Coonawarra", -12.4400, 130.8600),
            NamedLocation::new("HMAS Cairns", -16.9300, 145.7800),
            NamedLocation::new("Sydney", -33.8568, 151.2153),
            NamedLocation::new("Port Botany", -33.9700, 151.2100),
            NamedLocation::new("Newcastle", -32.9200, 151.7800),
            NamedLocation::new("Jervis Bay", -35.0900, 150.7000),
            NamedLocation::new("Brisbane", -27.3833, 153.1667),
            NamedLocation::new("Gladstone", -23.8400, 151.2600),
            NamedLocation::new("Townsville", -19.2520, 146.8320),
            NamedLocation::new("Cairns", -16.9186, 145.7781),
            NamedLocation::new("Darwin", -12.4634, 130.8456),
            NamedLocation::new("Port Hedland", -20.3100, 118.5800),
            NamedLocation::new("Dampier", -20.6600, 116.7100),
            NamedLocation::new("Fremantle", -32.0550, 115.7430),
            NamedLocation::new("Henderson", -32.1500, 115.7700),
            NamedLocation::new("Adelaide", -34.8300, 138.5000),
            NamedLocation::new("Osborne", -34.7900, 138.5000),
            NamedLocation::new("Melbourne", -37.8400, 144.9300),
            NamedLocation::new("Williamstown", -37.8600, 144.9000),
            NamedLocation::new("Geelong", -38.1400, 144.3700),
            NamedLocation::new("Hobart", -42.8821, 147.3372),
        ])
    }
}
