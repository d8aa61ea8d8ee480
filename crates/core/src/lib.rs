//! Core types and traits for the business search engine
//!
//! This crate provides the foundational types used across all other crates:
//! - Business records and their value types (hours, price tier, status)
//! - Query analysis results (intent, category, entities, resolved location)
//! - The declared search filter record
//! - Collaborator traits (business store, vector index, models, geocoder)
//! - Pipeline telemetry
//! - Error types and the error-kind taxonomy
//! - Geo math (haversine, bounding boxes)

pub mod analysis;
pub mod business;
pub mod error;
pub mod filters;
pub mod geo;
pub mod telemetry;
pub mod traits;

pub use analysis::{
    EntityConfidence, ExtractedEntities, LocationSource, QueryAnalysis, QueryIntent,
    ResolvedLocation,
};
pub use business::{
    Business, BusinessHours, BusinessStatus, Coordinates, DayHours, PriceTier, StructuredLocation,
};
pub use error::{Error, ErrorKind, Result};
pub use filters::{HoursFilter, SearchFilters, StatusSet};
pub use geo::{coarse_coords, haversine_m, BoundingBox, INDIA_BOUNDS};
pub use telemetry::{PipelineTelemetry, StepRecord, StepTimer};
pub use traits::{
    BusinessStore, EmbeddingModel, Geocoder, LanguageModel, ReverseGeocode, ScanField,
    UserLocation, UserProfileStore, VectorIndex,
};
