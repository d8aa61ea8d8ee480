//! Normalizers and the category taxonomy
//!
//! Pure canonicalization functions for the strings that flow through the
//! search pipeline: business names, categories, locations, price words,
//! ratings, and phone numbers. All of them return `Option`; `None` is the
//! explicit "could not normalize" signal, never an empty string.
//!
//! The taxonomy is static reference data embedded at compile time and
//! parsed once on first use.

pub mod location;
pub mod name;
pub mod phone;
pub mod plural;
pub mod price;
pub mod rating;
pub mod taxonomy;

pub use location::{is_known_city, normalize_location_name};
pub use name::normalize_business_name;
pub use phone::normalize_phone_number;
pub use plural::fold_plural;
pub use price::normalize_price_range;
pub use rating::{normalize_rating, normalize_rating_value};
pub use taxonomy::{taxonomy, Category, Taxonomy, GENERAL_CATEGORY};

use thiserror::Error;

/// Taxonomy load/parse errors. Only reachable when the embedded reference
/// data is malformed, which is a build-time defect.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Taxonomy parse error: {0}")]
    TaxonomyParse(String),

    #[error("Taxonomy integrity error: {0}")]
    TaxonomyIntegrity(String),
}

impl From<NormalizeError> for localfind_core::Error {
    fn from(err: NormalizeError) -> Self {
        localfind_core::Error::Normalize(err.to_string())
    }
}
