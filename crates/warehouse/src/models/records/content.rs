//! Library and workspace content records

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::models::timestamp;
use crate::models::{Entity, Record, RecordKey, Row};

/// A library content item (`libraryContents`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryContent {
    pub id: String,
    pub name: Option<String>,
    pub version: Option<Value>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "timestamp::required")]
    pub modified_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub format: Option<String>,
    pub is_checked_out: Option<bool>,
    pub is_deleted: Option<bool>,
    pub is_published: Option<bool>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub published_version_expires_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub latest_library_content_version_created_at: Option<DateTime<Utc>>,
    pub latest_library_content_version_created_by: Option<String>,
    pub latest_library_content_version_created_by_username: Option<String>,
    pub latest_library_content_version_id: Option<String>,
    pub latest_library_content_version_size: Option<i64>,
    pub library_url: Option<String>,
    pub doc_center_url: Option<String>,
    pub news_center_url: Option<String>,
    pub owner_id: Option<String>,
    pub owner_username: Option<String>,
    pub owner_email: Option<String>,
    pub teamsite_id: Option<String>,
    pub teamsite_name: Option<String>,
    pub preview_image_id: Option<String>,
    pub preview_image_url: Option<String>,
    pub thumbnail_image_id: Option<String>,
    pub thumbnail_image_url: Option<String>,
    pub description: Option<String>,
    pub short_id: Option<String>,
    pub parent_folder_library_content_id: Option<String>,
    pub library_path: Option<String>,
    pub has_planner_associations: Option<bool>,
    pub origin_type: Option<String>,
    pub last_modified: Option<Value>,
}

impl Record for LibraryContent {
    const ENTITY: Entity = Entity::LibraryContents;

    fn key(&self) -> RecordKey {
        RecordKey::single(&self.id)
    }

    fn into_row(self) -> Row {
        let key = self.key();
        Row::new(
            key,
            vec![
                self.id.into(),
                self.name.into(),
                self.version.into(),
                self.created_at.into(),
                self.modified_at.into(),
                self.content_type.into(),
                self.format.into(),
                self.is_checked_out.into(),
                self.is_deleted.into(),
                self.is_published.into(),
                self.published_version_expires_at.into(),
                self.latest_library_content_version_created_at.into(),
                self.latest_library_content_version_created_by.into(),
                self.latest_library_content_version_created_by_username.into(),
                self.latest_library_content_version_id.into(),
                self.latest_library_content_version_size.into(),
                self.library_url.into(),
                self.doc_center_url.into(),
                self.news_center_url.into(),
                self.owner_id.into(),
                self.owner_username.into(),
                self.owner_email.into(),
                self.teamsite_id.into(),
                self.teamsite_name.into(),
                self.preview_image_id.into(),
                self.preview_image_url.into(),
                self.thumbnail_image_id.into(),
                self.thumbnail_image_url.into(),
                self.description.into(),
                self.short_id.into(),
                self.parent_folder_library_content_id.into(),
                self.library_path.into(),
                self.has_planner_associations.into(),
                self.origin_type.into(),
                self.last_modified.into(),
            ],
        )
    }
}

/// A version of a library content item (`libraryContentVersions`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryContentVersion {
    pub id: String,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_by_username: Option<String>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_deleted: Option<bool>,
    pub is_published: Option<bool>,
    pub library_content_id: Option<String>,
    #[serde(deserialize_with = "timestamp::required")]
    pub modified_at: DateTime<Utc>,
    pub name: Option<String>,
    pub preview_image_id: Option<String>,
    pub preview_image_url: Option<String>,
    pub thumbnail_image_id: Option<String>,
    pub thumbnail_image_url: Option<String>,
    pub size: Option<i64>,
    pub version: Option<Value>,
    pub teamsite_id: Option<String>,
}

impl Record for LibraryContentVersion {
    const ENTITY: Entity = Entity::LibraryContentVersions;

    fn key(&self) -> RecordKey {
        RecordKey::single(&self.id)
    }

    fn into_row(self) -> Row {
        let key = self.key();
        Row::new(
            key,
            vec![
                self.id.into(),
                self.created_at.into(),
                self.created_by.into(),
                self.created_by_username.into(),
                self.expires_at.into(),
                self.is_deleted.into(),
                self.is_published.into(),
                self.library_content_id.into(),
                self.modified_at.into(),
                self.name.into(),
                self.preview_image_id.into(),
                self.preview_image_url.into(),
                self.thumbnail_image_id.into(),
                self.thumbnail_image_url.into(),
                self.size.into(),
                self.version.into(),
                self.teamsite_id.into(),
            ],
        )
    }
}

/// A workspace content item (`workspaceContents`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceContent {
    pub id: String,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub is_cart_content: Option<bool>,
    pub is_contextual_folder_content: Option<bool>,
    pub is_deleted: Option<bool>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub latest_workspace_content_version_created_at: Option<DateTime<Utc>>,
    pub latest_workspace_content_version_id: Option<String>,
    pub latest_workspace_content_version_size: Option<i64>,
    pub origin_content_profile_id: Option<String>,
    pub library_content_id: Option<String>,
    pub materialized_path: Option<String>,
    #[serde(deserialize_with = "timestamp::required")]
    pub modified_at: DateTime<Utc>,
    pub name: Option<String>,
    pub preview_image_id: Option<String>,
    pub preview_image_url: Option<String>,
    pub thumbnail_image_id: Option<String>,
    pub thumbnail_image_url: Option<String>,
    pub version: Option<Value>,
    pub context_id: Option<String>,
    pub context_name: Option<String>,
    pub context_type: Option<String>,
    pub context_system_type: Option<String>,
    pub origin_application: Option<String>,
}

impl Record for WorkspaceContent {
    const ENTITY: Entity = Entity::WorkspaceContents;

    fn key(&self) -> RecordKey {
        RecordKey::single(&self.id)
    }

    fn into_row(self) -> Row {
        let key = self.key();
        Row::new(
            key,
            vec![
                self.id.into(),
                self.created_at.into(),
                self.created_by.into(),
                self.is_cart_content.into(),
                self.is_contextual_folder_content.into(),
                self.is_deleted.into(),
                self.latest_workspace_content_version_created_at.into(),
                self.latest_workspace_content_version_id.into(),
                self.latest_workspace_content_version_size.into(),
                self.origin_content_profile_id.into(),
                self.library_content_id.into(),
                self.materialized_path.into(),
                self.modified_at.into(),
                self.name.into(),
                self.preview_image_id.into(),
                self.preview_image_url.into(),
                self.thumbnail_image_id.into(),
                self.thumbnail_image_url.into(),
                self.version.into(),
                self.context_id.into(),
                self.context_name.into(),
                self.context_type.into(),
                self.context_system_type.into(),
                self.origin_application.into(),
            ],
        )
    }
}

/// A version of a workspace content item (`workspaceContentVersions`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceContentVersion {
    pub id: String,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub format: Option<String>,
    pub library_content_version_id: Option<String>,
    pub name: Option<String>,
    pub preview_image_id: Option<String>,
    pub preview_image_url: Option<String>,
    pub thumbnail_image_id: Option<String>,
    pub thumbnail_image_url: Option<String>,
    pub size: Option<i64>,
    pub version: Option<Value>,
    pub version_creation_method: Option<String>,
    pub workspace_content_id: Option<String>,
    #[serde(deserialize_with = "timestamp::required")]
    pub modified_at: DateTime<Utc>,
}

impl Record for WorkspaceContentVersion {
    const ENTITY: Entity = Entity::WorkspaceContentVersions;

    fn key(&self) -> RecordKey {
        RecordKey::single(&self.id)
    }

    fn into_row(self) -> Row {
        let key = self.key();
        Row::new(
            key,
            vec![
                self.id.into(),
                self.created_at.into(),
                self.created_by.into(),
                self.format.into(),
                self.library_content_version_id.into(),
                self.name.into(),
                self.preview_image_id.into(),
                self.preview_image_url.into(),
                self.thumbnail_image_id.into(),
                self.thumbnail_image_url.into(),
                self.size.into(),
                self.version.into(),
                self.version_creation_method.into(),
                self.workspace_content_id.into(),
                self.modified_at.into(),
            ],
        )
    }
}
