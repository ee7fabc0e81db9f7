//! Scripted record source for engine tests

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::RecordSource;
use super::api::ScimListResponse;
use crate::models::Entity;
use crate::models::timestamp::parse_timestamp;

/// A recorded `fetch_*` call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Modified(Entity, DateTime<Utc>, Option<DateTime<Utc>>),
    All(Entity),
    Page(Entity, usize, usize),
}

/// Serves a fixed set of records per entity, filtering by `modifiedAt`
/// the way the API does
#[derive(Default)]
pub struct FakeSource {
    records: HashMap<Entity, Vec<Value>>,
    fail_after: Option<usize>,
    page_cap: Option<usize>,
    reported_total: Option<usize>,
    calls: Mutex<Vec<Call>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, entity: Entity, records: Vec<Value>) -> Self {
        self.records.insert(entity, records);
        self
    }

    /// Fail every call after the first `calls` succeed
    pub fn failing_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }

    /// Return at most `cap` resources per SCIM page, whatever `count` asks for
    pub fn with_page_cap(mut self, cap: usize) -> Self {
        self.page_cap = Some(cap);
        self
    }

    /// Report `total` as `totalResults` instead of the real record count
    pub fn with_reported_total(mut self, total: usize) -> Self {
        self.reported_total = Some(total);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<()> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        if let Some(limit) = self.fail_after
            && calls.len() > limit
        {
            bail!("connection reset by peer");
        }
        Ok(())
    }

    fn records(&self, entity: Entity) -> Vec<Value> {
        self.records.get(&entity).cloned().unwrap_or_default()
    }
}

impl RecordSource for FakeSource {
    fn fetch_modified(
        &self,
        entity: Entity,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>> {
        self.record(Call::Modified(entity, start, end))?;
        Ok(self
            .records(entity)
            .into_iter()
            .filter(|r| {
                let Some(at) = r["modifiedAt"].as_str().and_then(parse_timestamp) else {
                    return true;
                };
                at >= start && end.is_none_or(|end| at < end)
            })
            .collect())
    }

    fn fetch_all(&self, entity: Entity) -> Result<Vec<Value>> {
        self.record(Call::All(entity))?;
        Ok(self.records(entity))
    }

    fn fetch_page(&self, entity: Entity, start_index: usize, count: usize) -> Result<ScimListResponse> {
        self.record(Call::Page(entity, start_index, count))?;
        let all = self.records(entity);
        let count = self.page_cap.map_or(count, |cap| count.min(cap));
        let resources: Vec<Value> = all
            .iter()
            .skip(start_index.saturating_sub(1))
            .take(count)
            .cloned()
            .collect();
        Ok(ScimListResponse {
            total_results: self.reported_total.unwrap_or(all.len()),
            start_index: Some(start_index),
            items_per_page: Some(resources.len()),
            resources,
        })
    }
}
