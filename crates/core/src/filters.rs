//! The declared search filter record
//!
//! Filters arrive from two places: the caller's session (explicit) and the
//! query analysis (derived). Explicit values win on merge. Unknown fields in
//! incoming filter dictionaries are dropped during deserialization.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::business::{BusinessStatus, PriceTier};

/// Opening-hours filter options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoursFilter {
    /// Keep only businesses open at evaluation time
    #[serde(default)]
    pub open_now: bool,
    /// Weekday name ("monday".."sunday")
    pub day: Option<String>,
    /// 24h "HH:MM"
    pub time: Option<String>,
}

/// Allowed status values; defaults to active-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSet(pub HashSet<BusinessStatus>);

impl Default for StatusSet {
    fn default() -> Self {
        let mut set = HashSet::new();
        set.insert(BusinessStatus::Active);
        Self(set)
    }
}

impl StatusSet {
    pub fn allows(&self, status: BusinessStatus) -> bool {
        self.0.contains(&status)
    }
}

/// The full filter record applied after retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Canonical taxonomy ids
    #[serde(default)]
    pub categories: Vec<String>,
    /// Allowed price tiers; empty means any
    #[serde(default)]
    pub price_tiers: Vec<PriceTier>,
    /// Minimum rating, 0.0-5.0
    pub min_rating: Option<f64>,
    /// Maximum distance in meters from the resolved location
    pub max_distance_m: Option<u32>,
    #[serde(default)]
    pub hours: HoursFilter,
    #[serde(default)]
    pub statuses: StatusSet,
    pub verified: Option<bool>,
    #[serde(default)]
    pub cities: Vec<String>,
    #[serde(default)]
    pub states: Vec<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.price_tiers.is_empty()
            && self.min_rating.is_none()
            && self.max_distance_m.is_none()
            && !self.hours.open_now
            && self.hours.day.is_none()
            && self.verified.is_none()
            && self.cities.is_empty()
            && self.states.is_empty()
            && self.statuses == StatusSet::default()
    }

    /// Merge analysis-derived filters under explicit caller filters.
    /// Explicit values always win; derived values only fill gaps.
    pub fn merged_with_derived(mut self, derived: SearchFilters) -> SearchFilters {
        if self.categories.is_empty() {
            self.categories = derived.categories;
        }
        if self.price_tiers.is_empty() {
            self.price_tiers = derived.price_tiers;
        }
        if self.min_rating.is_none() {
            self.min_rating = derived.min_rating;
        }
        if self.max_distance_m.is_none() {
            self.max_distance_m = derived.max_distance_m;
        }
        if self.cities.is_empty() {
            self.cities = derived.cities;
        }
        if self.states.is_empty() {
            self.states = derived.states;
        }
        if self.verified.is_none() {
            self.verified = derived.verified;
        }
        self
    }

    /// Stable string form used as a cache-key component. Field order is
    /// fixed so identical filters always produce identical keys.
    pub fn cache_key_part(&self) -> String {
        let mut cats = self.categories.clone();
        cats.sort();
        let mut prices: Vec<&str> = self.price_tiers.iter().map(|p| p.as_str()).collect();
        prices.sort();
        let mut cities = self.cities.clone();
        cities.sort();
        let mut statuses: Vec<String> = self
            .statuses
            .0
            .iter()
            .map(|s| format!("{s:?}").to_lowercase())
            .collect();
        statuses.sort();
        format!(
            "cat={};price={};rating={};dist={};cities={};verified={};status={}",
            cats.join(","),
            prices.join(","),
            self.min_rating.map(|r| r.to_string()).unwrap_or_default(),
            self.max_distance_m.map(|d| d.to_string()).unwrap_or_default(),
            cities.join(","),
            self.verified.map(|v| v.to_string()).unwrap_or_default(),
            statuses.join(","),
        )
    }
}
