//! Fixed-list country extraction from free-text locations.
//!
//! Plain case-insensitive substring containment against a known list of
//! region names, checked in order; the first hit wins. This is not a
//! geocoder: "New Kuwait Street, London" buckets as Kuwait.

/// Bucket name for locations that match no known region.
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// (needle, country). Longer and more specific needles come first.
const KNOWN_REGIONS: &[(&str, &str)] = &[
    ("united arab emirates", "UAE"),
    ("uae", "UAE"),
    ("dubai", "UAE"),
    ("abu dhabi", "UAE"),
    ("sharjah", "UAE"),
    ("ajman", "UAE"),
    ("ras al khaimah", "UAE"),
    ("qatar", "Qatar"),
    ("doha", "Qatar"),
    ("saudi arabia", "Saudi Arabia"),
    ("ksa", "Saudi Arabia"),
    ("riyadh", "Saudi Arabia"),
    ("jeddah", "Saudi Arabia"),
    ("dammam", "Saudi Arabia"),
    ("kuwait", "Kuwait"),
    ("bahrain", "Bahrain"),
    ("manama", "Bahrain"),
    ("oman", "Oman"),
    ("muscat", "Oman"),
    ("egypt", "Egypt"),
    ("cairo", "Egypt"),
    ("jordan", "Jordan"),
    ("amman", "Jordan"),
    ("lebanon", "Lebanon"),
    ("beirut", "Lebanon"),
];

/// Country for a location string, if any known region name occurs in it.
pub fn extract_country(location: &str) -> Option<&'static str> {
    let haystack = location.to_lowercase();
    KNOWN_REGIONS
        .iter()
        .find(|(needle, _)| haystack.contains(needle))
        .map(|(_, country)| *country)
}

/// Like [`extract_country`] but never drops a record.
pub fn country_bucket(location: &str) -> &'static str {
    extract_country(location).unwrap_or(UNKNOWN_COUNTRY)
}
