//! Cache key scheme
//!
//! Colon-delimited human-readable keys, stable across instances so separate
//! deployments sharing one KV interoperate. Hashes are sha256 truncated to
//! hex prefixes; collisions on the similarity key are benign because the
//! filter hash is part of the key.

use localfind_core::geo::coarse_coords;
use sha2::{Digest, Sha256};

fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Hash of the query + filter record, shared by the three per-request keys.
pub fn query_hash(normalized_query: &str, filters_key_part: &str) -> String {
    sha256_hex(format!("{normalized_query}|{filters_key_part}").as_bytes())[..32].to_string()
}

pub fn analysis_key(normalized_query: &str, filters_key_part: &str) -> String {
    format!("query:{}:analysis", query_hash(normalized_query, filters_key_part))
}

pub fn embedding_key(model_version: &str, text: &str) -> String {
    format!("emb:{model_version}:{}", &sha256_hex(text.as_bytes())[..32])
}

pub fn results_key(normalized_query: &str, filters_key_part: &str) -> String {
    format!("query:{}:results", query_hash(normalized_query, filters_key_part))
}

/// NLP per-task memo key.
pub fn nlp_memo_key(task: &str, query: &str) -> String {
    format!("nlp:{task}:{}", &sha256_hex(query.as_bytes())[..32])
}

/// Semantic candidate-set key: category plus coarse (2-decimal) coordinates.
pub fn candidates_key(
    category: Option<&str>,
    location: Option<(f64, f64)>,
    radius_km: Option<f64>,
) -> String {
    let cat = category.unwrap_or("any");
    let loc = match location {
        Some((lat, lng)) => {
            let (lat2, lng2) = coarse_coords(lat, lng);
            format!("{lat2:.2},{lng2:.2}")
        }
        None => "any".to_string(),
    };
    let rad = radius_km
        .map(|km| format!("{km:.0}"))
        .unwrap_or_else(|| "any".to_string());
    format!("semantic:candidates:cat:{cat}:loc:{loc}:rad:{rad}")
}

/// Fingerprint of a query vector: its first `components` values, hashed.
/// The component count is a tuning parameter for collision risk.
pub fn vector_fingerprint(vector: &[f32], components: usize) -> String {
    let prefix: Vec<String> = vector
        .iter()
        .take(components)
        .map(|v| format!("{v:.6}"))
        .collect();
    sha256_hex(prefix.join(",").as_bytes())[..16].to_string()
}

/// Semantic similarity result-set key.
pub fn similarity_key(vector: &[f32], components: usize, filters_key_part: &str) -> String {
    let filter_hash = &sha256_hex(filters_key_part.as_bytes())[..16];
    format!(
        "semantic:similarity:{}:{filter_hash}",
        vector_fingerprint(vector, components)
    )
}

/// Reverse-geocode key at 4-decimal (~11 m) resolution.
pub fn geocode_key(lat: f64, lng: f64) -> String {
    format!("geocode:{lat:.4},{lng:.4}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_inputs_same_keys() {
        assert_eq!(
            results_key("coffee shops", "cat=;price="),
            results_key("coffee shops", "cat=;price=")
        );
        assert_ne!(
            results_key("coffee shops", "cat=;price="),
            results_key("coffee shops", "cat=food;price=")
        );
    }

    #[test]
    fn test_key_shapes() {
        let key = analysis_key("coffee", "");
        assert!(key.starts_with("query:"));
        assert!(key.ends_with(":analysis"));

        let key = embedding_key("v2", "coffee");
        assert!(key.starts_with("emb:v2:"));

        let key = candidates_key(Some("cafe"), Some((19.076032, 72.877718)), Some(5.0));
        assert_eq!(key, "semantic:candidates:cat:cafe:loc:19.08,72.88:rad:5");

        let key = candidates_key(None, None, None);
        assert_eq!(key, "semantic:candidates:cat:any:loc:any:rad:any");
    }

    #[test]
    fn test_fingerprint_uses_prefix_only() {
        let a = vec![0.1f32; 64];
        let mut b = a.clone();
        b[32] = 0.9; // change beyond the fingerprinted prefix
        assert_eq!(vector_fingerprint(&a, 10), vector_fingerprint(&b, 10));

        let mut c = a.clone();
        c[0] = 0.9;
        assert_ne!(vector_fingerprint(&a, 10), vector_fingerprint(&c, 10));
    }

    #[test]
    fn test_similarity_key_includes_filters() {
        let v = vec![0.5f32; 16];
        assert_ne!(similarity_key(&v, 10, "cat=food"), similarity_key(&v, 10, "cat=cafe"));
    }

    #[test]
    fn test_geocode_key_resolution() {
        assert_eq!(geocode_key(19.07603, 72.87771), "geocode:19.0760,72.8777");
    }
}
