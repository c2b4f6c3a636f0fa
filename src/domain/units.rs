//! Station and generating-unit label handling
//!
//! Monthly reports group several units under one label (`#1~4호기`) while the
//! daily exports list each unit separately, and both use slightly different
//! station names. These helpers bring both sides onto one key.

/// Suffix every unit label carries ("unit no.")
pub const UNIT_SUFFIX: &str = "호기";

/// Station that owns the A/B split units
pub const SPLIT_UNIT_STATION: &str = "삼천포";

/// Organisational suffixes stripped from station names, longest first
const STATION_SUFFIXES: [&str; 5] = ["발전본부", "화력본부", "복합발전처", "본부", "처"];

/// Expand a monthly unit label into the individual unit labels it covers.
///
/// `#1~4호기` and `#5~6호기` are reported per boiler half (A/B) in the daily
/// data; other `#`-prefixed ranges expand numerically; a single `#X호기`
/// drops the `#`.
/// Anything unrecognised is returned as-is.
pub fn expand_unit_label(label: &str) -> Vec<String> {
    let label = label.trim();

    match label {
        "#1~4호기" => return split_units(&["3A", "3B", "4A", "4B"]),
        "#5~6호기" => return split_units(&["5A", "5B", "6A", "6B"]),
        _ => {}
    }

    let (hashed, body) = match label.strip_prefix('#') {
        Some(body) => (true, body),
        None => (false, label),
    };
    if let Some(idx) = body.find(UNIT_SUFFIX) {
        let id = &body[..idx];

        if let Some((start, end)) = id.split_once('~') {
            if !hashed {
                return vec![label.to_string()];
            }
            if let (Ok(start), Ok(end)) = (start.parse::<u32>(), end.parse::<u32>()) {
                if start <= end {
                    return (start..=end).map(|n| format!("{n}{UNIT_SUFFIX}")).collect();
                }
            }
        } else if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return vec![format!("{id}{UNIT_SUFFIX}")];
        }
    }

    vec![label.to_string()]
}

fn split_units(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| format!("{id}{UNIT_SUFFIX}")).collect()
}

/// Strip organisational suffixes so monthly and daily station names agree
pub fn normalize_station(name: &str) -> String {
    STATION_SUFFIXES
        .iter()
        .fold(name.to_string(), |acc, suffix| acc.replace(suffix, ""))
        .trim()
        .to_string()
}

/// A/B half-units only exist at one station, whatever the export says
pub fn is_split_unit(unit: &str) -> bool {
    unit.contains(&format!("A{UNIT_SUFFIX}")) || unit.contains(&format!("B{UNIT_SUFFIX}"))
}

/// Normalised station name for a unit, applying the split-unit override
pub fn resolve_station(station: &str, unit: &str) -> String {
    if is_split_unit(unit) {
        SPLIT_UNIT_STATION.to_string()
    } else {
        normalize_station(station)
    }
}
