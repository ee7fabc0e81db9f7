//! User directory records: reporting users, property assignments, SCIM users

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::models::timestamp;
use crate::models::{Entity, FieldValue, Record, RecordKey, Row};

/// A user as seen by the reporting API (`users`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub created_at: Option<DateTime<Utc>>,
    pub default_content_profile_id: Option<String>,
    pub default_content_profile_name: Option<String>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub email: Option<String>,
    pub email_domain: Option<String>,
    pub first_name: Option<String>,
    pub full_name: Option<String>,
    pub is_deleted: Option<bool>,
    pub is_lessonly_enabled: Option<bool>,
    pub is_seismic_employee: Option<bool>,
    pub is_seismic_enabled: Option<bool>,
    pub is_system_admin: Option<bool>,
    pub last_name: Option<String>,
    pub license_type: Option<String>,
    #[serde(deserialize_with = "timestamp::required")]
    pub modified_at: DateTime<Utc>,
    pub organization: Option<String>,
    pub sso_user_id: Option<String>,
    pub title: Option<String>,
    pub username: Option<String>,
    pub is_locked: Option<bool>,
    pub address: Option<Value>,
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub latest_activity_date: Option<DateTime<Utc>>,
    pub external_id: Option<String>,
}

impl Record for User {
    const ENTITY: Entity = Entity::Users;

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
                self.default_content_profile_id.into(),
                self.default_content_profile_name.into(),
                self.deleted_at.into(),
                self.email.into(),
                self.email_domain.into(),
                self.first_name.into(),
                self.full_name.into(),
                self.is_deleted.into(),
                self.is_lessonly_enabled.into(),
                self.is_seismic_employee.into(),
                self.is_seismic_enabled.into(),
                self.is_system_admin.into(),
                self.last_name.into(),
                self.license_type.into(),
                self.modified_at.into(),
                self.organization.into(),
                self.sso_user_id.into(),
                self.title.into(),
                self.username.into(),
                self.is_locked.into(),
                self.address.into(),
                self.phone_number.into(),
                self.latest_activity_date.into(),
                self.external_id.into(),
            ],
        )
    }
}

/// A user property value assigned to a user (`userPropertyAssignments`)
///
/// Keyed by `(user_id, user_property_id)`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPropertyAssignment {
    pub user_id: String,
    pub user_property_id: String,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub modified_at: Option<DateTime<Utc>>,
    pub user_property_name: Option<String>,
    pub user_property_type: Option<String>,
    pub user_property_value: Option<Value>,
    pub user_property_value_boolean: Option<bool>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub user_property_value_datetime: Option<DateTime<Utc>>,
    pub user_property_value_float: Option<f64>,
    pub user_property_value_integer: Option<i64>,
}

impl Record for UserPropertyAssignment {
    const ENTITY: Entity = Entity::UserPropertyAssignments;

    fn key(&self) -> RecordKey {
        RecordKey::composite([self.user_id.as_str(), self.user_property_id.as_str()])
    }

    fn into_row(self) -> Row {
        let key = self.key();
        Row::new(
            key,
            vec![
                self.user_id.into(),
                self.user_property_id.into(),
                self.modified_at.into(),
                self.user_property_name.into(),
                self.user_property_type.into(),
                self.user_property_value.into(),
                self.user_property_value_boolean.into(),
                self.user_property_value_datetime.into(),
                self.user_property_value_float.into(),
                self.user_property_value_integer.into(),
            ],
        )
    }
}

/// A SCIM directory user (`scim/v2/Users`)
///
/// Extension blocks are optional: a user without the enterprise block gets
/// NULL enterprise columns, and vendor extension blocks are kept verbatim as
/// JSON text when present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUser {
    pub id: String,
    pub user_name: Option<String>,
    pub display_name: Option<String>,
    pub title: Option<String>,
    pub active: Option<bool>,
    pub name: Option<ScimName>,
    pub emails: Option<Vec<ScimEmail>>,
    pub meta: Option<ScimMeta>,
    #[serde(rename = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User")]
    pub enterprise: Option<EnterpriseExtension>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScimEmail {
    pub value: Option<String>,
    pub primary: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimMeta {
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterpriseExtension {
    pub employee_number: Option<String>,
    pub department: Option<String>,
    pub organization: Option<String>,
    pub manager: Option<ScimManager>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScimManager {
    pub value: Option<String>,
}

impl ScimUser {
    /// Primary email, falling back to the first listed
    pub fn primary_email(&self) -> Option<&str> {
        let emails = self.emails.as_deref()?;
        emails
            .iter()
            .find(|e| e.primary == Some(true))
            .or_else(|| emails.first())
            .and_then(|e| e.value.as_deref())
    }

    /// Extension blocks other than the enterprise one, as a JSON object
    fn extended_properties(&self) -> Option<Value> {
        let blocks: Map<String, Value> = self
            .other
            .iter()
            .filter(|(k, v)| k.starts_with("urn:") && !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if blocks.is_empty() {
            None
        } else {
            Some(Value::Object(blocks))
        }
    }
}

impl Record for ScimUser {
    const ENTITY: Entity = Entity::ScimUsers;

    fn key(&self) -> RecordKey {
        RecordKey::single(&self.id)
    }

    fn into_row(self) -> Row {
        let key = self.key();
        let email = self.primary_email().map(str::to_string);
        let extended = self
            .extended_properties()
            .map(|v| FieldValue::Text(v.to_string()))
            .unwrap_or(FieldValue::Null);

        let (given_name, family_name) = match self.name {
            Some(name) => (name.given_name, name.family_name),
            None => (None, None),
        };
        let (created_at, modified_at) = match self.meta {
            Some(meta) => (meta.created, meta.last_modified),
            None => (None, None),
        };
        let (employee_number, department, organization, manager_id) = match self.enterprise {
            Some(ext) => (
                ext.employee_number,
                ext.department,
                ext.organization,
                ext.manager.and_then(|m| m.value),
            ),
            None => (None, None, None, None),
        };

        Row::new(
            key,
            vec![
                self.id.into(),
                self.user_name.into(),
                self.display_name.into(),
                given_name.into(),
                family_name.into(),
                email.into(),
                self.active.into(),
                self.title.into(),
                employee_number.into(),
                department.into(),
                organization.into(),
                manager_id.into(),
                created_at.into(),
                modified_at.into(),
                extended,
            ],
        )
    }
}
