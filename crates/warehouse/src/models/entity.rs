//! Entity descriptors
//!
//! Every synced entity type is a variant of [`Entity`]. The descriptor
//! methods carry everything the engine needs to know about it: where it is
//! fetched from, how it is fetched, where it lands and how rows are keyed.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

/// A synced entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Entity {
    ContentUsageHistory,
    ContentViewHistory,
    LibraryContentVersions,
    LibraryContents,
    SearchHistory,
    Users,
    UserPropertyAssignments,
    WorkspaceContentVersions,
    WorkspaceContents,
    ScimUsers,
}

/// How records of an entity are retrieved from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// One open-ended query for everything modified since the watermark
    Since,
    /// Consecutive bounded queries of at most `step_days` each
    Windowed { step_days: i64 },
    /// One unfiltered read of the whole collection, committed in batches
    Collection { batch_size: usize },
    /// SCIM offset pagination over the whole collection
    ScimPages { page_size: usize },
}

/// What happens to rows missing from a completed snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Delete the row
    Delete,
    /// Keep the row and flag it `_deleted`
    SoftDelete,
}

impl Entity {
    /// All entity types, in job order
    pub const ALL: [Entity; 10] = [
        Entity::ContentUsageHistory,
        Entity::ContentViewHistory,
        Entity::LibraryContentVersions,
        Entity::LibraryContents,
        Entity::SearchHistory,
        Entity::Users,
        Entity::UserPropertyAssignments,
        Entity::WorkspaceContentVersions,
        Entity::WorkspaceContents,
        Entity::ScimUsers,
    ];

    /// Stable machine name (also the storage table name)
    pub fn name(&self) -> &'static str {
        match self {
            Entity::ContentUsageHistory => "content_usage_history",
            Entity::ContentViewHistory => "content_view_history",
            Entity::LibraryContentVersions => "library_content_versions",
            Entity::LibraryContents => "library_contents",
            Entity::SearchHistory => "search_history",
            Entity::Users => "users",
            Entity::UserPropertyAssignments => "user_property_assignments",
            Entity::WorkspaceContentVersions => "workspace_content_versions",
            Entity::WorkspaceContents => "workspace_contents",
            Entity::ScimUsers => "scim_users",
        }
    }

    /// Storage table
    pub fn table(&self) -> &'static str {
        self.name()
    }

    /// Human-readable label for log lines
    pub fn label(&self) -> &'static str {
        match self {
            Entity::ContentUsageHistory => "content usage history",
            Entity::ContentViewHistory => "content view history",
            Entity::LibraryContentVersions => "library content versions",
            Entity::LibraryContents => "library contents",
            Entity::SearchHistory => "search history",
            Entity::Users => "users",
            Entity::UserPropertyAssignments => "user property assignments",
            Entity::WorkspaceContentVersions => "workspace content versions",
            Entity::WorkspaceContents => "workspace contents",
            Entity::ScimUsers => "SCIM users",
        }
    }

    /// API path, relative to the API base URL
    pub fn endpoint(&self) -> &'static str {
        match self {
            Entity::ContentUsageHistory => "reporting/v2/contentUsageHistory",
            Entity::ContentViewHistory => "reporting/v2/contentViewHistory",
            Entity::LibraryContentVersions => "reporting/v2/libraryContentVersions",
            Entity::LibraryContents => "reporting/v2/libraryContents",
            Entity::SearchHistory => "reporting/v2/searchHistory",
            Entity::Users => "reporting/v2/users",
            Entity::UserPropertyAssignments => "reporting/v2/userPropertyAssignments",
            Entity::WorkspaceContentVersions => "reporting/v2/workspaceContentVersions",
            Entity::WorkspaceContents => "reporting/v2/workspaceContents",
            Entity::ScimUsers => "scim/v2/Users",
        }
    }

    pub fn strategy(&self) -> FetchStrategy {
        match self {
            Entity::ContentUsageHistory | Entity::ContentViewHistory => FetchStrategy::Since,
            Entity::SearchHistory => FetchStrategy::Windowed { step_days: 2 },
            Entity::WorkspaceContentVersions | Entity::WorkspaceContents => {
                FetchStrategy::Windowed { step_days: 7 }
            }
            Entity::LibraryContents => FetchStrategy::Windowed { step_days: 10 },
            Entity::LibraryContentVersions | Entity::Users => {
                FetchStrategy::Windowed { step_days: 30 }
            }
            Entity::UserPropertyAssignments => FetchStrategy::Collection { batch_size: 3000 },
            Entity::ScimUsers => FetchStrategy::ScimPages { page_size: 100 },
        }
    }

    /// Window step for windowed entities
    pub fn step(&self) -> Option<Duration> {
        match self.strategy() {
            FetchStrategy::Windowed { step_days } => Some(Duration::days(step_days)),
            _ => None,
        }
    }

    /// Whether the entity is synced incrementally from a watermark
    pub fn is_watermarked(&self) -> bool {
        matches!(
            self.strategy(),
            FetchStrategy::Since | FetchStrategy::Windowed { .. }
        )
    }

    /// Watermark used when no rows have been stored yet
    ///
    /// Chosen as a safe lower bound before the entity existed in the source.
    /// `None` for entities that are not watermarked.
    pub fn epoch(&self) -> Option<DateTime<Utc>> {
        let (year, month, day) = match self {
            Entity::ContentUsageHistory | Entity::ContentViewHistory | Entity::SearchHistory => {
                (2000, 1, 1)
            }
            Entity::LibraryContentVersions
            | Entity::WorkspaceContentVersions
            | Entity::WorkspaceContents => (2020, 1, 1),
            Entity::LibraryContents => (2023, 1, 20),
            Entity::Users => (2018, 1, 1),
            Entity::UserPropertyAssignments | Entity::ScimUsers => return None,
        };
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single()
    }

    /// Reconciliation policy for full-snapshot entities
    pub fn retention(&self) -> Option<Retention> {
        match self {
            Entity::UserPropertyAssignments => Some(Retention::Delete),
            Entity::ScimUsers => Some(Retention::SoftDelete),
            _ => None,
        }
    }

    /// Primary key columns
    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            Entity::UserPropertyAssignments => &["user_id", "user_property_id"],
            _ => &["id"],
        }
    }

    /// Data columns in row order (excludes the `_synced` / `_deleted` flags)
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Entity::ContentUsageHistory => CONTENT_USAGE_HISTORY,
            Entity::ContentViewHistory => CONTENT_VIEW_HISTORY,
            Entity::LibraryContentVersions => LIBRARY_CONTENT_VERSIONS,
            Entity::LibraryContents => LIBRARY_CONTENTS,
            Entity::SearchHistory => SEARCH_HISTORY,
            Entity::Users => USERS,
            Entity::UserPropertyAssignments => USER_PROPERTY_ASSIGNMENTS,
            Entity::WorkspaceContentVersions => WORKSPACE_CONTENT_VERSIONS,
            Entity::WorkspaceContents => WORKSPACE_CONTENTS,
            Entity::ScimUsers => SCIM_USERS,
        }
    }

    /// Position of a column within [`Entity::columns`]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns().iter().position(|c| *c == column)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error for an unrecognised entity name
#[derive(Debug, thiserror::Error)]
#[error("unknown entity: {0}")]
pub struct UnknownEntityError(pub String);

impl FromStr for Entity {
    type Err = UnknownEntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Entity::ALL
            .into_iter()
            .find(|e| e.name() == normalized)
            .ok_or_else(|| UnknownEntityError(s.to_string()))
    }
}

const CONTENT_USAGE_HISTORY: &[&str] = &[
    "id",
    "action",
    "action_type",
    "application",
    "content_id",
    "content_version_id",
    "content_profile_id",
    "content_profile_name",
    "context_id",
    "context_name",
    "context_type",
    "context_system_type",
    "instance_name",
    "is_bound_delivery",
    "library_content_id",
    "library_content_version_id",
    "livesend_link_content_id",
    "livesend_link_id",
    "occurred_at",
    "product_area",
    "total_pages",
    "user_id",
    "user_username",
    "workspace_content_id",
    "workspace_content_version_id",
    "modified_at",
    "interaction_id",
];

const CONTENT_VIEW_HISTORY: &[&str] = &[
    "id",
    "action",
    "application",
    "content_id",
    "content_version_id",
    "content_profile_id",
    "content_profile_name",
    "context_id",
    "context_name",
    "context_type",
    "context_system_type",
    "instance_name",
    "library_content_id",
    "library_content_version_id",
    "occurred_at",
    "product_area",
    "user_id",
    "user_username",
    "workspace_content_id",
    "workspace_content_version_id",
    "modified_at",
];

const LIBRARY_CONTENT_VERSIONS: &[&str] = &[
    "id",
    "created_at",
    "created_by",
    "created_by_username",
    "expires_at",
    "is_deleted",
    "is_published",
    "library_content_id",
    "modified_at",
    "name",
    "preview_image_id",
    "preview_image_url",
    "thumbnail_image_id",
    "thumbnail_image_url",
    "size",
    "version",
    "teamsite_id",
];

const LIBRARY_CONTENTS: &[&str] = &[
    "id",
    "name",
    "version",
    "created_at",
    "modified_at",
    "type",
    "format",
    "is_checked_out",
    "is_deleted",
    "is_published",
    "published_version_expires_at",
    "latest_library_content_version_created_at",
    "latest_library_content_version_created_by",
    "latest_library_content_version_created_by_username",
    "latest_library_content_version_id",
    "latest_library_content_version_size",
    "library_url",
    "doc_center_url",
    "news_center_url",
    "owner_id",
    "owner_username",
    "owner_email",
    "teamsite_id",
    "teamsite_name",
    "preview_image_id",
    "preview_image_url",
    "thumbnail_image_id",
    "thumbnail_image_url",
    "description",
    "short_id",
    "parent_folder_library_content_id",
    "library_path",
    "has_planner_associations",
    "origin_type",
    "last_modified",
];

const SEARCH_HISTORY: &[&str] = &[
    "id",
    "occurred_at",
    "active_scope",
    "application",
    "result_count",
    "result_count_content_manager",
    "result_count_control_center",
    "result_count_doc_center",
    "result_count_news_center",
    "result_count_workspace",
    "search_cycle_id",
    "search_term_normalized",
    "search_term_raw",
    "search_type",
    "sort_by",
    "user_id",
    "modified_at",
    "step_index",
    "step_type",
    "was_clicked",
    "facet_values",
];

const USERS: &[&str] = &[
    "id",
    "created_at",
    "default_content_profile_id",
    "default_content_profile_name",
    "deleted_at",
    "email",
    "email_domain",
    "first_name",
    "full_name",
    "is_deleted",
    "is_lessonly_enabled",
    "is_seismic_employee",
    "is_seismic_enabled",
    "is_system_admin",
    "last_name",
    "license_type",
    "modified_at",
    "organization",
    "sso_user_id",
    "title",
    "username",
    "is_locked",
    "address",
    "phone_number",
    "latest_activity_date",
    "external_id",
];

const USER_PROPERTY_ASSIGNMENTS: &[&str] = &[
    "user_id",
    "user_property_id",
    "modified_at",
    "user_property_name",
    "user_property_type",
    "user_property_value",
    "user_property_value_boolean",
    "user_property_value_datetime",
    "user_property_value_float",
    "user_property_value_integer",
];

const WORKSPACE_CONTENT_VERSIONS: &[&str] = &[
    "id",
    "created_at",
    "created_by",
    "format",
    "library_content_version_id",
    "name",
    "preview_image_id",
    "preview_image_url",
    "thumbnail_image_id",
    "thumbnail_image_url",
    "size",
    "version",
    "version_creation_method",
    "workspace_content_id",
    "modified_at",
];

const WORKSPACE_CONTENTS: &[&str] = &[
    "id",
    "created_at",
    "created_by",
    "is_cart_content",
    "is_contextual_folder_content",
    "is_deleted",
    "latest_workspace_content_version_created_at",
    "latest_workspace_content_version_id",
    "latest_workspace_content_version_size",
    "origin_content_profile_id",
    "library_content_id",
    "materialized_path",
    "modified_at",
    "name",
    "preview_image_id",
    "preview_image_url",
    "thumbnail_image_id",
    "thumbnail_image_url",
    "version",
    "context_id",
    "context_name",
    "context_type",
    "context_system_type",
    "origin_application",
];

const SCIM_USERS: &[&str] = &[
    "id",
    "user_name",
    "display_name",
    "given_name",
    "family_name",
    "email",
    "active",
    "title",
    "employee_number",
    "department",
    "organization",
    "manager_id",
    "created_at",
    "modified_at",
    "extended_properties",
];
