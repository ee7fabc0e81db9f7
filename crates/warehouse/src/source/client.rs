//! Reporting and SCIM API HTTP client
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use ureq::Agent;
use url::Url;

use super::api::ScimListResponse;
use super::{CredentialProvider, RecordSource, SourceError};
use crate::config::{Endpoints, SourceCredentials};
use crate::models::Entity;
use crate::models::timestamp::format_query;

/// Whole-request timeout; full-collection reads can be large
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound on a single response body
const MAX_BODY_BYTES: u64 = 1024 * 1024 * 1024;

/// Client for the reporting (`reporting/v2`) and SCIM (`scim/v2`) APIs
pub struct ReportingClient {
    agent: Agent,
    api_base: Url,
    auth: CredentialProvider,
}

impl ReportingClient {
    pub fn new(agent: Agent, api_base: Url, auth: CredentialProvider) -> Self {
        Self {
            agent,
            api_base,
            auth,
        }
    }

    /// Build a client with its own agent and credential provider
    pub fn connect(credentials: SourceCredentials, endpoints: &Endpoints) -> Result<Self> {
        let agent = default_agent();
        let auth = CredentialProvider::new(agent.clone(), credentials, &endpoints.auth_base)?;
        Ok(Self::new(agent, endpoints.api_base.clone(), auth))
    }

    fn get_json<T: DeserializeOwned>(&self, entity: Entity, query: &[(&str, String)]) -> Result<T> {
        let endpoint = entity.endpoint();
        let url = self
            .api_base
            .join(endpoint)
            .with_context(|| format!("Could not build URL for {}", endpoint))?;
        let access_token = self.auth.access_token()?;

        log::debug!("GET {} {:?}", url, query);

        let mut request = self
            .agent
            .get(url.as_str())
            .header("Authorization", &format!("Bearer {}", access_token))
            .header("Accept", "application/json");
        for (name, value) in query {
            request = request.query(*name, value);
        }

        let mut response = request
            .call()
            .map_err(|e| SourceError::from_ureq(endpoint, e))?;

        let body: T = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_json()
            .with_context(|| format!("Failed to parse {} response", endpoint))?;

        Ok(body)
    }
}

/// Agent shared by the token exchange and data requests
pub fn default_agent() -> Agent {
    Agent::config_builder()
        .timeout_global(Some(REQUEST_TIMEOUT))
        .build()
        .into()
}

/// Query bounds for a modified-at window
fn window_query(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Vec<(&'static str, String)> {
    let mut query = vec![("modifiedAtStartTime", format_query(&start))];
    if let Some(end) = end {
        query.push(("modifiedAtEndTime", format_query(&end)));
    }
    query
}

impl RecordSource for ReportingClient {
    fn fetch_modified(
        &self,
        entity: Entity,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>> {
        self.get_json(entity, &window_query(start, end))
    }

    fn fetch_all(&self, entity: Entity) -> Result<Vec<Value>> {
        self.get_json(entity, &[])
    }

    fn fetch_page(&self, entity: Entity, start_index: usize, count: usize) -> Result<ScimListResponse> {
        self.get_json(
            entity,
            &[
                ("count", count.to_string()),
                ("startIndex", start_index.to_string()),
            ],
        )
    }
}
