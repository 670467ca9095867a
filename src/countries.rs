//! Canonical country matching for location filters.
//!
//! Each canonical country maps to a set of name variants (full names, ISO
//! codes) and major-city variants. Matching is word-boundary on the lowercase
//! location string, so "in" never matches inside "Berlin" but "India" does
//! match "Remote - India".

/// Location strings that match every configured country.
pub const REMOTE_SENTINELS: &[&str] = &["remote", "remote position", "worldwide", "anywhere"];

/// Static variant table. Variants are lowercase; city variants are folded into
/// the same list since matching semantics are identical.
const COUNTRY_VARIANTS: &[(&str, &[&str])] = &[
    (
        "united states",
        &[
            "united states", "usa", "u.s.", "u.s.a.", "us", "america", "new york", "san francisco",
            "seattle", "austin", "boston", "chicago", "los angeles", "denver", "atlanta",
        ],
    ),
    (
        "canada",
        &["canada", "toronto", "vancouver", "montreal", "ottawa", "calgary"],
    ),
    (
        "united kingdom",
        &[
            "united kingdom", "uk", "u.k.", "great britain", "england", "scotland", "london",
            "manchester", "edinburgh", "cambridge",
        ],
    ),
    (
        "germany",
        &["germany", "deutschland", "berlin", "munich", "hamburg", "frankfurt", "cologne"],
    ),
    ("france", &["france", "paris", "lyon", "toulouse"]),
    (
        "netherlands",
        &["netherlands", "holland", "amsterdam", "rotterdam", "utrecht", "eindhoven"],
    ),
    ("spain", &["spain", "madrid", "barcelona", "valencia"]),
    ("poland", &["poland", "warsaw", "krakow", "wroclaw", "gdansk"]),
    ("ireland", &["ireland", "dublin", "cork"]),
    (
        "india",
        &[
            "india", "bangalore", "bengaluru", "hyderabad", "mumbai", "pune", "chennai",
            "gurgaon", "gurugram", "noida", "new delhi", "delhi",
        ],
    ),
    ("singapore", &["singapore"]),
    ("japan", &["japan", "tokyo", "osaka", "kyoto"]),
    (
        "australia",
        &["australia", "sydney", "melbourne", "brisbane", "perth"],
    ),
    (
        "brazil",
        &["brazil", "brasil", "sao paulo", "são paulo", "rio de janeiro"],
    ),
    ("israel", &["israel", "tel aviv", "jerusalem", "haifa"]),
];

/// Whether `needle` occurs in `haystack` with non-alphanumeric characters (or
/// string edges) on both sides. Both inputs must already be lowercase.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut search_from = 0;
    while let Some(pos) = haystack[search_from..].find(needle) {
        let start = search_from + pos;
        let end = start + needle.len();
        let boundary_before = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let boundary_after = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if boundary_before && boundary_after {
            return true;
        }
        search_from = start + needle.len().max(1);
    }
    false
}

/// Whether a lowercase location string is exactly one of the remote
/// sentinels. "Remote - India" is not a sentinel: it names a country and is
/// matched against the variant table like any other location.
pub fn is_remote_sentinel(location_lower: &str) -> bool {
    let trimmed = location_lower.trim();
    REMOTE_SENTINELS.iter().any(|s| trimmed == *s)
}

/// Whether `location` refers to `country` (canonical name, code, or a major
/// city in it). Remote sentinels match every country. A country absent from
/// the variant table matches on its own name only.
pub fn location_matches_country(location: &str, country: &str) -> bool {
    let loc = location.trim().to_lowercase();
    let country_key = country.trim().to_lowercase();
    if loc.is_empty() || country_key.is_empty() {
        return false;
    }
    if is_remote_sentinel(&loc) {
        return true;
    }

    let variants = COUNTRY_VARIANTS
        .iter()
        .find(|(canonical, _)| *canonical == country_key)
        .map(|(_, variants)| *variants);

    match variants {
        Some(variants) => variants.iter().any(|v| contains_word(&loc, v)),
        None => contains_word(&loc, &country_key),
    }
}
