//! Reporting API integration
//!
//! This module provides:
//! - delegated-access token acquisition and caching
//! - the HTTP client for reporting and SCIM endpoints
//! - the [`RecordSource`] trait the sync engine reads through

mod auth;
mod client;
mod error;
#[cfg(test)]
pub(crate) mod fake;

pub use auth::{CachedToken, CredentialProvider};
pub use client::{ReportingClient, default_agent};
pub use error::SourceError;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::Entity;
use api::ScimListResponse;

/// Where raw records come from
///
/// Records are returned as untyped JSON; decoding into typed records is the
/// engine's job so a malformed record fails the batch it belongs to.
pub trait RecordSource: Send + Sync {
    /// Records modified in `[start, end)`, or since `start` when `end` is
    /// `None`
    fn fetch_modified(
        &self,
        entity: Entity,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>>;

    /// The whole collection, unfiltered
    fn fetch_all(&self, entity: Entity) -> Result<Vec<Value>>;

    /// One SCIM page; `start_index` is 1-based
    fn fetch_page(&self, entity: Entity, start_index: usize, count: usize) -> Result<ScimListResponse>;
}

/// API response types
pub mod api {
    use serde::Deserialize;
    use serde_json::Value;

    /// Response from the token endpoint
    #[derive(Debug, Deserialize)]
    pub struct TokenResponse {
        pub access_token: String,
        pub expires_in: Option<i64>,
        pub token_type: Option<String>,
    }

    /// A page of a SCIM list query
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ScimListResponse {
        pub total_results: usize,
        pub start_index: Option<usize>,
        pub items_per_page: Option<usize>,
        #[serde(rename = "Resources", default)]
        pub resources: Vec<Value>,
    }
}
