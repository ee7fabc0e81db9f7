//! Activity history records: content usage, content views, searches

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::models::timestamp;
use crate::models::{Entity, Record, RecordKey, Row};

/// A content usage event (`contentUsageHistory`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentUsage {
    pub id: String,
    pub action: Option<String>,
    pub action_type: Option<String>,
    pub application: Option<String>,
    pub content_id: Option<String>,
    pub content_version_id: Option<String>,
    pub content_profile_id: Option<String>,
    pub content_profile_name: Option<String>,
    pub context_id: Option<String>,
    pub context_name: Option<String>,
    pub context_type: Option<String>,
    pub context_system_type: Option<String>,
    pub instance_name: Option<String>,
    pub is_bound_delivery: Option<bool>,
    pub library_content_id: Option<String>,
    pub library_content_version_id: Option<String>,
    pub livesend_link_content_id: Option<String>,
    pub livesend_link_id: Option<String>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub occurred_at: Option<DateTime<Utc>>,
    pub product_area: Option<String>,
    pub total_pages: Option<i64>,
    pub user_id: Option<String>,
    pub user_username: Option<String>,
    pub workspace_content_id: Option<String>,
    pub workspace_content_version_id: Option<String>,
    #[serde(deserialize_with = "timestamp::required")]
    pub modified_at: DateTime<Utc>,
    pub interaction_id: Option<String>,
}

impl Record for ContentUsage {
    const ENTITY: Entity = Entity::ContentUsageHistory;

    fn key(&self) -> RecordKey {
        RecordKey::single(&self.id)
    }

    fn into_row(self) -> Row {
        let key = self.key();
        Row::new(
            key,
            vec![
                self.id.into(),
                self.action.into(),
                self.action_type.into(),
                self.application.into(),
                self.content_id.into(),
                self.content_version_id.into(),
                self.content_profile_id.into(),
                self.content_profile_name.into(),
                self.context_id.into(),
                self.context_name.into(),
                self.context_type.into(),
                self.context_system_type.into(),
                self.instance_name.into(),
                self.is_bound_delivery.into(),
                self.library_content_id.into(),
                self.library_content_version_id.into(),
                self.livesend_link_content_id.into(),
                self.livesend_link_id.into(),
                self.occurred_at.into(),
                self.product_area.into(),
                self.total_pages.into(),
                self.user_id.into(),
                self.user_username.into(),
                self.workspace_content_id.into(),
                self.workspace_content_version_id.into(),
                self.modified_at.into(),
                self.interaction_id.into(),
            ],
        )
    }
}

/// A content view event (`contentViewHistory`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentView {
    pub id: String,
    pub action: Option<String>,
    pub application: Option<String>,
    pub content_id: Option<String>,
    pub content_version_id: Option<String>,
    pub content_profile_id: Option<String>,
    pub content_profile_name: Option<String>,
    pub context_id: Option<String>,
    pub context_name: Option<String>,
    pub context_type: Option<String>,
    pub context_system_type: Option<String>,
    pub instance_name: Option<String>,
    pub library_content_id: Option<String>,
    pub library_content_version_id: Option<String>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub occurred_at: Option<DateTime<Utc>>,
    pub product_area: Option<String>,
    pub user_id: Option<String>,
    pub user_username: Option<String>,
    pub workspace_content_id: Option<String>,
    pub workspace_content_version_id: Option<String>,
    #[serde(deserialize_with = "timestamp::required")]
    pub modified_at: DateTime<Utc>,
}

impl Record for ContentView {
    const ENTITY: Entity = Entity::ContentViewHistory;

    fn key(&self) -> RecordKey {
        RecordKey::single(&self.id)
    }

    fn into_row(self) -> Row {
        let key = self.key();
        Row::new(
            key,
            vec![
                self.id.into(),
                self.action.into(),
                self.application.into(),
                self.content_id.into(),
                self.content_version_id.into(),
                self.content_profile_id.into(),
                self.content_profile_name.into(),
                self.context_id.into(),
                self.context_name.into(),
                self.context_type.into(),
                self.context_system_type.into(),
                self.instance_name.into(),
                self.library_content_id.into(),
                self.library_content_version_id.into(),
                self.occurred_at.into(),
                self.product_area.into(),
                self.user_id.into(),
                self.user_username.into(),
                self.workspace_content_id.into(),
                self.workspace_content_version_id.into(),
                self.modified_at.into(),
            ],
        )
    }
}

/// A search step (`searchHistory`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEvent {
    pub id: String,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub occurred_at: Option<DateTime<Utc>>,
    pub active_scope: Option<String>,
    pub application: Option<String>,
    pub result_count: Option<i64>,
    pub result_count_content_manager: Option<i64>,
    pub result_count_control_center: Option<i64>,
    pub result_count_doc_center: Option<i64>,
    pub result_count_news_center: Option<i64>,
    pub result_count_workspace: Option<i64>,
    pub search_cycle_id: Option<String>,
    pub search_term_normalized: Option<String>,
    pub search_term_raw: Option<String>,
    pub search_type: Option<String>,
    pub sort_by: Option<String>,
    pub user_id: Option<String>,
    #[serde(deserialize_with = "timestamp::required")]
    pub modified_at: DateTime<Utc>,
    pub step_index: Option<i64>,
    pub step_type: Option<String>,
    pub was_clicked: Option<bool>,
    /// Stored as JSON text
    pub facet_values: Option<Value>,
}

impl Record for SearchEvent {
    const ENTITY: Entity = Entity::SearchHistory;

    fn key(&self) -> RecordKey {
        RecordKey::single(&self.id)
    }

    fn into_row(self) -> Row {
        let key = self.key();
        Row::new(
            key,
            vec![
                self.id.into(),
                self.occurred_at.into(),
                self.active_scope.into(),
                self.application.into(),
                self.result_count.into(),
                self.result_count_content_manager.into(),
                self.result_count_control_center.into(),
                self.result_count_doc_center.into(),
                self.result_count_news_center.into(),
                self.result_count_workspace.into(),
                self.search_cycle_id.into(),
                self.search_term_normalized.into(),
                self.search_term_raw.into(),
                self.search_type.into(),
                self.sort_by.into(),
                self.user_id.into(),
                self.modified_at.into(),
                self.step_index.into(),
                self.step_type.into(),
                self.was_clicked.into(),
                self.facet_values.into(),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use serde_json::json;

    #[test]
    fn test_search_facets_stored_as_json_text() {
        let event: SearchEvent = serde_json::from_value(json!({
            "id": "s-1",
            "modifiedAt": "2024-01-02T03:04:05",
            "searchTermRaw": "Pricing",
            "facetValues": [{"name": "format", "value": "pdf"}],
            "wasClicked": false
        }))
        .unwrap();

        let row = event.into_row();
        let entity = Entity::SearchHistory;
        assert_eq!(
            row.get(entity, "facet_values"),
            Some(&FieldValue::Text(r#"[{"name":"format","value":"pdf"}]"#.into()))
        );
        assert_eq!(row.get(entity, "was_clicked"), Some(&FieldValue::Bool(false)));
    }

    #[test]
    fn test_content_view_rejects_bad_timestamp() {
        let result: Result<ContentView, _> = serde_json::from_value(json!({
            "id": "v-1",
            "modifiedAt": "not a time"
        }));
        assert!(result.is_err());
    }
}
