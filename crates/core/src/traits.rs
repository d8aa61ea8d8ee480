//! Collaborator traits
//!
//! The pipeline consumes every external system through these seams: the
//! business store, the vector index, the two model services, the geocoder,
//! and the user profile store. Tests supply in-memory fakes; deployments
//! supply clients backed by real services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::business::{Business, BusinessStatus};
use crate::error::Result;

/// Read access to the business table and its secondary indices.
#[async_trait]
pub trait BusinessStore: Send + Sync {
    async fn get_business(&self, id: &str) -> Result<Option<Business>>;

    /// Businesses in a category, optionally narrowed to a city. An empty
    /// city matches all cities (the store's category index).
    async fn query_by_category_and_city(
        &self,
        category_id: &str,
        city: &str,
        limit: usize,
    ) -> Result<Vec<Business>>;

    async fn query_by_city(&self, city: &str, limit: usize) -> Result<Vec<Business>>;

    /// Contains-filtered scan: OR over `terms` across the named fields
    /// (subset of {name, description, category}), restricted to statuses.
    async fn scan_with_contains(
        &self,
        fields: &[ScanField],
        terms: &[String],
        status_filter: &[BusinessStatus],
        limit: usize,
    ) -> Result<Vec<Business>>;

    /// Ids of businesses that have a stored vector for the given version.
    async fn list_vector_business_ids(&self, version: &str) -> Result<Vec<String>>;
}

/// Fields addressable by `scan_with_contains`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanField {
    Name,
    Description,
    Category,
}

#[async_trait]
impl<T: BusinessStore + ?Sized> BusinessStore for std::sync::Arc<T> {
    async fn get_business(&self, id: &str) -> Result<Option<Business>> {
        (**self).get_business(id).await
    }

    async fn query_by_category_and_city(
        &self,
        category_id: &str,
        city: &str,
        limit: usize,
    ) -> Result<Vec<Business>> {
        (**self)
            .query_by_category_and_city(category_id, city, limit)
            .await
    }

    async fn query_by_city(&self, city: &str, limit: usize) -> Result<Vec<Business>> {
        (**self).query_by_city(city, limit).await
    }

    async fn scan_with_contains(
        &self,
        fields: &[ScanField],
        terms: &[String],
        status_filter: &[BusinessStatus],
        limit: usize,
    ) -> Result<Vec<Business>> {
        (**self)
            .scan_with_contains(fields, terms, status_filter, limit)
            .await
    }

    async fn list_vector_business_ids(&self, version: &str) -> Result<Vec<String>> {
        (**self).list_vector_business_ids(version).await
    }
}

/// Read access to stored business embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn get_vector(&self, business_id: &str, version: &str) -> Result<Option<Vec<f32>>>;
}

#[async_trait]
impl<T: VectorIndex + ?Sized> VectorIndex for std::sync::Arc<T> {
    async fn get_vector(&self, business_id: &str, version: &str) -> Result<Option<Vec<f32>>> {
        (**self).get_vector(business_id, version).await
    }
}

/// The external embedding model service.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Deploy-time dimension contract.
    fn dimension(&self) -> usize;
}

/// The external text model service.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String>;
}

/// A reverse-geocoding result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseGeocode {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub formatted: Option<String>,
}

/// Optional reverse geocoder.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<Option<ReverseGeocode>>;
}

/// A stored user location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
    /// Unix seconds of the last profile update
    pub last_updated_unix: Option<i64>,
}

/// Optional user profile lookup.
#[async_trait]
pub trait UserProfileStore: Send + Sync {
    async fn get_user_location(&self, user_id: &str) -> Result<Option<UserLocation>>;
}
