//! Location resolution
//!
//! Resolves the search center using the declared priority: explicit entity
//! location, then device geolocation, then the stored user profile, then
//! the request IP, then none. Profile locations older than thirty days are
//! marked stale but still used. Reverse geocoding (when a geocoder is
//! wired) fills city and state, cached for a day.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use localfind_cache::{geocode_key, QueryCache};
use localfind_config::constants::{pipeline as pipeline_constants, ttl};
use localfind_core::{
    Geocoder, LocationSource, ResolvedLocation, ReverseGeocode, UserProfileStore,
};
use localfind_normalize::normalize_location_name;
use once_cell::sync::Lazy;

/// Approximate centroids of the known cities, for scoping explicit city
/// queries. City-scoped queries never apply a distance filter, so the
/// precision here only seeds the semantic candidate cache key.
static CITY_CENTROIDS: Lazy<HashMap<&'static str, (f64, f64)>> = Lazy::new(|| {
    HashMap::from([
        ("Mumbai", (19.0760, 72.8777)),
        ("Delhi", (28.7041, 77.1025)),
        ("Bangalore", (12.9716, 77.5946)),
        ("Hyderabad", (17.3850, 78.4867)),
        ("Chennai", (13.0827, 80.2707)),
        ("Kolkata", (22.5726, 88.3639)),
        ("Pune", (18.5204, 73.8567)),
        ("Ahmedabad", (23.0225, 72.5714)),
        ("Jaipur", (26.9124, 75.7873)),
        ("Lucknow", (26.8467, 80.9462)),
        ("Gurugram", (28.4595, 77.0266)),
        ("Noida", (28.5355, 77.3910)),
        ("Kochi", (9.9312, 76.2673)),
        ("Goa", (15.2993, 74.1240)),
    ])
});

/// Inputs available for resolution, in declared priority order.
#[derive(Debug, Clone, Default)]
pub struct LocationInputs<'a> {
    /// Location entities extracted from the query
    pub entity_locations: &'a [String],
    /// Device geolocation supplied with the request
    pub session_location: Option<(f64, f64)>,
    pub user_id: Option<&'a str>,
    pub ip: Option<&'a str>,
}

/// The location resolver component.
pub struct LocationResolver {
    geocoder: Option<Arc<dyn Geocoder>>,
    profiles: Option<Arc<dyn UserProfileStore>>,
    cache: Arc<QueryCache>,
    default_radius_m: u32,
}

impl LocationResolver {
    pub fn new(
        geocoder: Option<Arc<dyn Geocoder>>,
        profiles: Option<Arc<dyn UserProfileStore>>,
        cache: Arc<QueryCache>,
    ) -> Self {
        Self {
            geocoder,
            profiles,
            cache,
            default_radius_m: pipeline_constants::DEFAULT_RADIUS_M,
        }
    }

    /// Resolve the search center. Returns `None` when no source yields a
    /// location; failures of optional collaborators degrade silently to
    /// the next source.
    pub async fn resolve(&self, inputs: &LocationInputs<'_>) -> Option<ResolvedLocation> {
        // Explicit entity location
        if let Some(city) = inputs
            .entity_locations
            .first()
            .and_then(|raw| normalize_location_name(raw))
        {
            let (lat, lng) = CITY_CENTROIDS
                .get(city.as_str())
                .copied()
                .unwrap_or((0.0, 0.0));
            return Some(ResolvedLocation {
                lat,
                lng,
                radius_m: self.default_radius_m,
                source: LocationSource::Explicit,
                city: Some(city),
                state: None,
                stale: false,
            });
        }

        // Device geolocation
        if let Some((lat, lng)) = inputs.session_location {
            let geocoded = self.reverse_geocode(lat, lng).await;
            return Some(ResolvedLocation {
                lat,
                lng,
                radius_m: self.default_radius_m,
                source: LocationSource::Geolocation,
                city: geocoded.as_ref().and_then(|g| g.city.clone()),
                state: geocoded.as_ref().and_then(|g| g.state.clone()),
                stale: false,
            });
        }

        // User profile
        if let (Some(profiles), Some(user_id)) = (&self.profiles, inputs.user_id) {
            match profiles.get_user_location(user_id).await {
                Ok(Some(stored)) => {
                    let stale = stored
                        .last_updated_unix
                        .map(|updated| {
                            let age_days = (Utc::now().timestamp() - updated) / 86_400;
                            age_days > pipeline_constants::STALE_LOCATION_DAYS
                        })
                        .unwrap_or(false);
                    if stale {
                        tracing::debug!(user_id, "profile location is stale, using anyway");
                    }
                    let geocoded = self.reverse_geocode(stored.lat, stored.lng).await;
                    return Some(ResolvedLocation {
                        lat: stored.lat,
                        lng: stored.lng,
                        radius_m: self.default_radius_m,
                        source: LocationSource::Profile,
                        city: geocoded.as_ref().and_then(|g| g.city.clone()),
                        state: geocoded.as_ref().and_then(|g| g.state.clone()),
                        stale,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(user_id, "profile lookup failed: {e}");
                }
            }
        }

        // Request IP: no geo-IP collaborator is declared, so this source
        // resolves nothing beyond logging that it was consulted
        if let Some(ip) = inputs.ip {
            tracing::debug!(ip, "no location source above ip; ip resolution unavailable");
        }

        None
    }

    /// Reverse geocode through the optional collaborator, cached for a day.
    async fn reverse_geocode(&self, lat: f64, lng: f64) -> Option<ReverseGeocode> {
        let geocoder = self.geocoder.as_ref()?;
        let key = geocode_key(lat, lng);

        if let Some(cached) = self.cache.get_json::<ReverseGeocode>(&key).await {
            return Some(cached);
        }

        match geocoder.reverse_geocode(lat, lng).await {
            Ok(Some(geocoded)) => {
                let normalized = ReverseGeocode {
                    city: geocoded
                        .city
                        .as_deref()
                        .and_then(normalize_location_name),
                    ..geocoded
                };
                self.cache
                    .set_json(&key, &normalized, Duration::from_secs(ttl::GEOCODE_SECS))
                    .await;
                Some(normalized)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(lat, lng, "reverse geocode failed: {e}");
                None
            }
        }
    }
}
