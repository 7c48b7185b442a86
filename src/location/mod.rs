use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::thing::Thing;

/// Two unsigned decimals separated by a comma, anywhere in the text
const LOCATION_PATTERN: &str = r"([0-9]+\.[0-9]+),([0-9]+\.[0-9]+)";

fn location_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(LOCATION_PATTERN).expect("location pattern is valid"))
}

/// Geographic coordinate derived from a `location` attribute
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Map centre used when no thing has a usable location.
    pub const DEFAULT_CENTER: Location = Location {
        latitude: 44.147388,
        longitude: 12.2313704,
    };
}

/// Location resolution errors
#[derive(Debug, Clone, PartialEq)]
pub enum LocationError {
    /// The text has no `lat,lon` match; callers must check `has_location` first
    NoLocation(String),
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationError::NoLocation(text) => {
                write!(f, "no valid location found in '{}'", text)
            }
        }
    }
}

impl std::error::Error for LocationError {}

/// True iff the text contains at least one `lat,lon` match.
pub fn has_location(text: Option<&str>) -> bool {
    match text {
        Some(t) if !t.is_empty() => location_regex().is_match(t),
        _ => false,
    }
}

/// Resolve the first `lat,lon` match in the text.
///
/// Later matches are ignored, so `"A 1.0,2.0 B 3.0,4.0"` resolves to
/// `(1.0, 2.0)`.
pub fn resolve(text: &str) -> Result<Location, LocationError> {
    let caps = location_regex()
        .captures(text)
        .ok_or_else(|| LocationError::NoLocation(text.to_string()))?;

    // Both groups are digit runs around a single dot, always valid f64
    let latitude = caps[1]
        .parse::<f64>()
        .map_err(|_| LocationError::NoLocation(text.to_string()))?;
    let longitude = caps[2]
        .parse::<f64>()
        .map_err(|_| LocationError::NoLocation(text.to_string()))?;

    Ok(Location {
        latitude,
        longitude,
    })
}

/// Location of the first thing (in iteration order) that has one.
pub fn first_location<'a, I>(things: I) -> Option<Location>
where
    I: IntoIterator<Item = &'a Thing>,
{
    things.into_iter().find_map(Thing::location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thing::normalize;
    use serde_json::json;

    #[test]
    fn test_free_text_location() {
        let text = "Office, 44.14,12.23";
        assert!(has_location(Some(text)));
        assert_eq!(
            resolve(text).unwrap(),
            Location {
                latitude: 44.14,
                longitude: 12.23
            }
        );
    }

    #[test]
    fn test_first_match_wins() {
        let loc = resolve("Office, 44.14,12.23 extra 1.0,2.0").unwrap();
        assert_eq!(loc.latitude, 44.14);
        assert_eq!(loc.longitude, 12.23);
    }

    #[test]
    fn test_no_match() {
        for text in ["", "Office", "44,12", "44.1, 12.2", "44.,12.5", "-.5,1.0"] {
            assert!(!has_location(Some(text)), "{text}");
            assert!(resolve(text).is_err(), "{text}");
        }
        assert!(!has_location(None));
    }

    #[test]
    fn test_match_inside_longer_numbers() {
        // "1.2.3,4.5" has no match starting at 0 but does at "2.3,4.5"
        let loc = resolve("1.2.3,4.5").unwrap();
        assert_eq!(loc.latitude, 2.3);
        assert_eq!(loc.longitude, 4.5);
    }

    #[test]
    fn test_negative_sign_is_not_captured() {
        let loc = resolve("-33.86,151.21").unwrap();
        assert_eq!(loc.latitude, 33.86);
        assert_eq!(loc.longitude, 151.21);
    }

    #[test]
    fn test_has_location_agrees_with_resolve() {
        let samples = [
            "[44.06, 12.56]",
            "[44.06,12.56]",
            "lat/lon 0.0,0.0",
            "nowhere",
            "1.5,",
            ",2.5",
            "9.99,8.88 and 7.77,6.66",
        ];
        for text in samples {
            assert_eq!(has_location(Some(text)), resolve(text).is_ok(), "{text}");
        }
    }

    #[test]
    fn test_no_location_error_message() {
        let err = resolve("nowhere").unwrap_err();
        assert_eq!(err, LocationError::NoLocation("nowhere".to_string()));
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_first_location_skips_unlocated() {
        let things = vec![
            normalize(&json!({"thingId": "a", "attributes": {"model": "x"}})),
            normalize(&json!({"thingId": "b", "attributes": {"location": "5.5,6.5"}})),
            normalize(&json!({"thingId": "c", "attributes": {"location": "7.5,8.5"}})),
        ];
        assert_eq!(
            first_location(&things),
            Some(Location {
                latitude: 5.5,
                longitude: 6.5
            })
        );
        assert_eq!(first_location(&things[..1]), None);
    }
}
