//! Typed source records, one struct per entity

mod activity;
mod content;
mod users;

pub use activity::{ContentUsage, ContentView, SearchEvent};
pub use content::{LibraryContent, LibraryContentVersion, WorkspaceContent, WorkspaceContentVersion};
pub use users::{
    EnterpriseExtension, ScimEmail, ScimManager, ScimMeta, ScimName, ScimUser, User,
    UserPropertyAssignment,
};

use anyhow::{Context, Result};
use serde_json::Value;

use super::{Entity, Record, Row};

/// Decode raw source JSON into storage rows for `entity`
///
/// A record that does not match the entity's shape fails the whole batch.
pub fn decode_rows(entity: Entity, values: Vec<Value>) -> Result<Vec<Row>> {
    match entity {
        Entity::ContentUsageHistory => decode::<ContentUsage>(values),
        Entity::ContentViewHistory => decode::<ContentView>(values),
        Entity::LibraryContentVersions => decode::<LibraryContentVersion>(values),
        Entity::LibraryContents => decode::<LibraryContent>(values),
        Entity::SearchHistory => decode::<SearchEvent>(values),
        Entity::Users => decode::<User>(values),
        Entity::UserPropertyAssignments => decode::<UserPropertyAssignment>(values),
        Entity::WorkspaceContentVersions => decode::<WorkspaceContentVersion>(values),
        Entity::WorkspaceContents => decode::<WorkspaceContent>(values),
        Entity::ScimUsers => decode::<ScimUser>(values),
    }
}

fn decode<R: Record>(values: Vec<Value>) -> Result<Vec<Row>> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let id = value
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default();
            serde_json::from_value::<R>(value)
                .map(Record::into_row)
                .with_context(|| {
                    format!("Malformed {} record at position {} (id {:?})", R::ENTITY, i, id)
                })
        })
        .collect()
}
