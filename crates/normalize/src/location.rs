//! Location name normalization
//!
//! Canonicalizes city and state names through the alias table (old names,
//! transliterations) and the known-city casing table.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Old names and common spellings -> canonical city name.
static CITY_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("bombay", "Mumbai"),
        ("bengaluru", "Bangalore"),
        ("bengalooru", "Bangalore"),
        ("calcutta", "Kolkata"),
        ("madras", "Chennai"),
        ("poona", "Pune"),
        ("gurgaon", "Gurugram"),
        ("mysore", "Mysuru"),
        ("baroda", "Vadodara"),
        ("cochin", "Kochi"),
        ("trivandrum", "Thiruvananthapuram"),
        ("benares", "Varanasi"),
        ("banaras", "Varanasi"),
        ("allahabad", "Prayagraj"),
        ("new delhi", "Delhi"),
    ])
});

/// Known cities with canonical casing.
static KNOWN_CITIES: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let cities = [
        "Mumbai",
        "Delhi",
        "Bangalore",
        "Hyderabad",
        "Chennai",
        "Kolkata",
        "Pune",
        "Ahmedabad",
        "Jaipur",
        "Surat",
        "Lucknow",
        "Kanpur",
        "Nagpur",
        "Indore",
        "Bhopal",
        "Patna",
        "Vadodara",
        "Gurugram",
        "Noida",
        "Chandigarh",
        "Kochi",
        "Coimbatore",
        "Mysuru",
        "Thiruvananthapuram",
        "Varanasi",
        "Prayagraj",
        "Goa",
    ];
    cities.iter().map(|c| (c.to_lowercase(), *c)).collect()
});

/// Known states with canonical casing.
static KNOWN_STATES: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let states = [
        "Maharashtra",
        "Karnataka",
        "Tamil Nadu",
        "Telangana",
        "West Bengal",
        "Delhi",
        "Gujarat",
        "Rajasthan",
        "Uttar Pradesh",
        "Madhya Pradesh",
        "Kerala",
        "Punjab",
        "Haryana",
        "Bihar",
        "Goa",
    ];
    states.iter().map(|s| (s.to_lowercase(), *s)).collect()
});

/// Canonicalize a city or state name.
///
/// Aliases resolve first (Bombay -> Mumbai), then the known-city and
/// known-state tables fix casing. Unknown names are title-cased rather than
/// rejected; callers that need strict membership check the tables directly.
pub fn normalize_location_name(input: &str) -> Option<String> {
    let cleaned = input
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    if cleaned.is_empty() {
        return None;
    }

    if let Some(canonical) = CITY_ALIASES.get(cleaned.as_str()) {
        return Some((*canonical).to_string());
    }
    if let Some(canonical) = KNOWN_CITIES.get(cleaned.as_str()) {
        return Some((*canonical).to_string());
    }
    if let Some(canonical) = KNOWN_STATES.get(cleaned.as_str()) {
        return Some((*canonical).to_string());
    }

    Some(title_case(&cleaned))
}

/// Whether a name (after aliasing) is a known city.
pub fn is_known_city(input: &str) -> bool {
    let cleaned = input.trim().to_lowercase();
    let resolved = CITY_ALIASES
        .get(cleaned.as_str())
        .map(|c| c.to_lowercase())
        .unwrap_or(cleaned);
    KNOWN_CITIES.contains_key(resolved.as_str())
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_resolution() {
        assert_eq!(normalize_location_name("bombay"), Some("Mumbai".to_string()));
        assert_eq!(
            normalize_location_name("Bengaluru"),
            Some("Bangalore".to_string())
        );
        assert_eq!(
            normalize_location_name("new delhi"),
            Some("Delhi".to_string())
        );
    }

    #[test]
    fn test_known_city_casing() {
        assert_eq!(normalize_location_name("MUMBAI"), Some("Mumbai".to_string()));
        assert_eq!(normalize_location_name("pune"), Some("Pune".to_string()));
    }

    #[test]
    fn test_state_casing() {
        assert_eq!(
            normalize_location_name("tamil nadu"),
            Some("Tamil Nadu".to_string())
        );
    }

    #[test]
    fn test_unknown_is_title_cased() {
        assert_eq!(
            normalize_location_name("shivaji nagar"),
            Some("Shivaji Nagar".to_string())
        );
    }

    #[test]
    fn test_punctuation_trimmed() {
        assert_eq!(
            normalize_location_name("  Mumbai, "),
            Some("Mumbai".to_string())
        );
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(normalize_location_name(""), None);
        assert_eq!(normalize_location_name(" , "), None);
    }

    #[test]
    fn test_is_known_city() {
        assert!(is_known_city("mumbai"));
        assert!(is_known_city("Bombay"));
        assert!(!is_known_city("Atlantis"));
    }
}
