//! Filter stage
//!
//! Applies the declared filter record in a fixed order: category, location
//! (city name first, then distance), rating, price, verified, status, and
//! hours. The category filter honors a don't-over-filter guardrail: when it
//! would empty a non-empty list the pre-filter list is kept, trusting
//! retrieval. The distance filter only applies to user-centric ("near me")
//! queries; city-scoped queries skip it entirely.

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};

use localfind_core::geo::haversine_m;
use localfind_core::SearchFilters;
use localfind_normalize::taxonomy;

use crate::hybrid::HybridItem;

/// Guardrail configuration.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    /// Skip the category filter when it would empty a non-empty list
    pub keep_on_empty_category: bool,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            keep_on_empty_category: true,
        }
    }
}

/// Request-scoped context the filters need beyond the record itself.
#[derive(Debug, Clone, Default)]
pub struct FilterContext {
    /// City resolved by the analysis/location stage
    pub resolved_city: Option<String>,
    /// User-centric query with no city scope
    pub is_near_me: bool,
    /// Search origin for the distance filter
    pub origin: Option<(f64, f64)>,
    /// Evaluation instant for the hours filter
    pub now: Option<DateTime<Utc>>,
}

/// Apply the filter record in order.
pub fn apply_filters(
    items: Vec<HybridItem>,
    filters: &SearchFilters,
    ctx: &FilterContext,
    policy: &FilterPolicy,
) -> Vec<HybridItem> {
    let items = filter_category(items, filters, policy);
    let items = filter_location(items, filters, ctx);
    let items = filter_rating(items, filters);
    let items = filter_price(items, filters);
    let items = filter_verified(items, filters);
    let items = filter_status(items, filters);
    filter_hours(items, filters, ctx)
}

fn filter_category(
    items: Vec<HybridItem>,
    filters: &SearchFilters,
    policy: &FilterPolicy,
) -> Vec<HybridItem> {
    if filters.categories.is_empty() {
        return items;
    }
    let tax = taxonomy();

    let kept: Vec<HybridItem> = items
        .iter()
        .filter(|item| {
            let category = &item.business.category;
            filters.categories.iter().any(|wanted| {
                category == wanted
                    || tax.is_within(category, wanted)
                    || tax.normalize_category(category).as_deref() == Some(wanted.as_str())
            })
        })
        .cloned()
        .collect();

    if kept.is_empty() && !items.is_empty() && policy.keep_on_empty_category {
        tracing::debug!(
            categories = ?filters.categories,
            "category filter would empty the list, keeping pre-filter results"
        );
        return items;
    }
    kept
}

fn filter_location(
    items: Vec<HybridItem>,
    filters: &SearchFilters,
    ctx: &FilterContext,
) -> Vec<HybridItem> {
    // City-name filter first
    let city = ctx
        .resolved_city
        .as_deref()
        .or_else(|| filters.cities.first().map(|c| c.as_str()));

    let items: Vec<HybridItem> = match city {
        Some(city) => {
            let city_lower = city.to_lowercase();
            items
                .into_iter()
                .filter(|item| {
                    let business_city = item
                        .business
                        .city()
                        .map(|c| c.to_lowercase() == city_lower)
                        .unwrap_or(false);
                    let address_match = item
                        .business
                        .location
                        .address
                        .as_deref()
                        .map(|a| a.to_lowercase().contains(&city_lower))
                        .unwrap_or(false);
                    business_city || address_match
                })
                .collect()
        }
        None => items,
    };

    // Distance applies only to user-centric queries; city-scoped queries
    // skip it
    if !ctx.is_near_me {
        return items;
    }
    let (Some(max_distance_m), Some((lat, lng))) = (filters.max_distance_m, ctx.origin) else {
        return items;
    };

    items
        .into_iter()
        .filter(|item| {
            item.business.coordinates().is_some_and(|coords| {
                haversine_m(lat, lng, coords.lat, coords.lng) <= max_distance_m as f64
            })
        })
        .collect()
}

fn filter_rating(items: Vec<HybridItem>, filters: &SearchFilters) -> Vec<HybridItem> {
    let Some(min_rating) = filters.min_rating else {
        return items;
    };
    items
        .into_iter()
        .filter(|item| item.business.rating >= min_rating)
        .collect()
}

fn filter_price(items: Vec<HybridItem>, filters: &SearchFilters) -> Vec<HybridItem> {
    if filters.price_tiers.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| {
            item.business
                .price_range
                .is_some_and(|tier| filters.price_tiers.contains(&tier))
        })
        .collect()
}

fn filter_verified(items: Vec<HybridItem>, filters: &SearchFilters) -> Vec<HybridItem> {
    let Some(verified) = filters.verified else {
        return items;
    };
    items
        .into_iter()
        .filter(|item| item.business.verified == verified)
        .collect()
}

fn filter_status(items: Vec<HybridItem>, filters: &SearchFilters) -> Vec<HybridItem> {
    items
        .into_iter()
        .filter(|item| filters.statuses.allows(item.business.status))
        .collect()
}

fn filter_hours(
    items: Vec<HybridItem>,
    filters: &SearchFilters,
    ctx: &FilterContext,
) -> Vec<HybridItem> {
    let hours = &filters.hours;

    let day_time: Option<(Weekday, NaiveTime)> = if hours.open_now {
        ctx.now.map(|now| (now.date_naive().weekday(), now.time()))
    } else if let (Some(day), Some(time)) = (hours.day.as_deref(), hours.time.as_deref()) {
        parse_weekday(day).zip(NaiveTime::parse_from_str(time, "%H:%M").ok())
    } else {
        None
    };

    let Some((day, time)) = day_time else {
        return items;
    };

    items
        .into_iter()
        .filter(|item| item.business.is_open_at(day, time) == Some(true))
        .collect()
}

fn parse_weekday(day: &str) -> Option<Weekday> {
    match day.trim().to_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}
