//! Business records
//!
//! Value types for the businesses served out of the external store. The core
//! only ever holds transient copies; ownership stays with the store.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::geo::{BoundingBox, INDIA_BOUNDS};

/// Geographic coordinates (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check the coordinates against a declared country bounding box.
    pub fn within(&self, bounds: &BoundingBox) -> bool {
        bounds.contains(self.lat, self.lng)
    }
}

/// Price tier tokens. Exactly four values exist; cheaper words from user
/// queries are folded onto these by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriceTier {
    #[serde(rename = "$")]
    Budget,
    #[serde(rename = "$$")]
    Moderate,
    #[serde(rename = "$$$")]
    Premium,
    #[serde(rename = "$$$$")]
    Luxury,
}

impl PriceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceTier::Budget => "$",
            PriceTier::Moderate => "$$",
            PriceTier::Premium => "$$$",
            PriceTier::Luxury => "$$$$",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "$" => Some(PriceTier::Budget),
            "$$" => Some(PriceTier::Moderate),
            "$$$" => Some(PriceTier::Premium),
            "$$$$" => Some(PriceTier::Luxury),
            _ => None,
        }
    }
}

/// Business lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessStatus {
    Active,
    Inactive,
    Pending,
    Suspended,
}

/// Open/close interval for one weekday. `closed` takes precedence over the
/// times when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayHours {
    /// Opening time, 24h "HH:MM"
    pub open: Option<String>,
    /// Closing time, 24h "HH:MM"
    pub close: Option<String>,
    #[serde(default)]
    pub closed: bool,
}

impl DayHours {
    fn contains(&self, time: NaiveTime) -> bool {
        if self.closed {
            return false;
        }
        let (Some(open), Some(close)) = (&self.open, &self.close) else {
            return false;
        };
        let (Ok(open), Ok(close)) = (
            NaiveTime::parse_from_str(open, "%H:%M"),
            NaiveTime::parse_from_str(close, "%H:%M"),
        ) else {
            return false;
        };
        if close < open {
            // Past-midnight closing, e.g. 18:00-02:00
            time >= open || time < close
        } else {
            time >= open && time < close
        }
    }
}

/// Weekly opening hours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub monday: Option<DayHours>,
    pub tuesday: Option<DayHours>,
    pub wednesday: Option<DayHours>,
    pub thursday: Option<DayHours>,
    pub friday: Option<DayHours>,
    pub saturday: Option<DayHours>,
    pub sunday: Option<DayHours>,
}

impl BusinessHours {
    pub fn for_day(&self, day: Weekday) -> Option<&DayHours> {
        match day {
            Weekday::Mon => self.monday.as_ref(),
            Weekday::Tue => self.tuesday.as_ref(),
            Weekday::Wed => self.wednesday.as_ref(),
            Weekday::Thu => self.thursday.as_ref(),
            Weekday::Fri => self.friday.as_ref(),
            Weekday::Sat => self.saturday.as_ref(),
            Weekday::Sun => self.sunday.as_ref(),
        }
    }
}

/// Structured location attached to a business.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredLocation {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub timezone: Option<String>,
}

/// A business record as served by the external store.
///
/// Invariants enforced by `validate`: coordinates (when present) lie within
/// the declared country bounding box; the rating is 0.0-5.0; the price tier,
/// when present, is one of the four tokens (guaranteed by the enum).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub normalized_name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub subcategory: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub location: StructuredLocation,
    /// E.164
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    /// 0.0-5.0, one decimal
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u64,
    pub price_range: Option<PriceTier>,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub hours: Option<BusinessHours>,
    pub status: BusinessStatus,
    #[serde(default)]
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Embedding version tag this business was last indexed under
    pub embedding_version: Option<String>,
}

impl Business {
    /// City, preferring the structured location.
    pub fn city(&self) -> Option<&str> {
        self.location.city.as_deref()
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.location.coordinates
    }

    /// Whether the business is open at the given local weekday and time.
    pub fn is_open_at(&self, day: Weekday, time: NaiveTime) -> Option<bool> {
        let hours = self.hours.as_ref()?;
        let day_hours = hours.for_day(day)?;
        Some(day_hours.contains(time))
    }

    /// Validate the record invariants against a country bounding box.
    pub fn validate(&self, bounds: &BoundingBox) -> std::result::Result<(), String> {
        if self.id.is_empty() {
            return Err("empty business id".to_string());
        }
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(format!("rating out of range: {}", self.rating));
        }
        if let Some(coords) = self.location.coordinates {
            if !coords.within(bounds) {
                return Err(format!(
                    "coordinates ({}, {}) outside declared bounds",
                    coords.lat, coords.lng
                ));
            }
        }
        Ok(())
    }

    /// Validate against the default deployment bounds.
    pub fn validate_default(&self) -> std::result::Result<(), String> {
        self.validate(&INDIA_BOUNDS)
    }
}
