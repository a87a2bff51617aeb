//! Directory object types returned by the directory API
//!
//! These types are deserialized straight from Graph JSON and carry only
//! the attributes written to the output tables.

use serde::{Deserialize, Deserializer};

/// Canonical summary of a directory user
///
/// Returned when resolving a seed, and written once to the users table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    #[serde(alias = "objectId")]
    pub id: String,

    /// Member, Guest, or empty when the service does not say
    #[serde(default, deserialize_with = "null_as_empty")]
    pub user_type: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub user_principal_name: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub display_name: String,
}

/// Row written to the users table
pub type UserRecord = ObjectSummary;

/// One direct membership of a user or group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRecord {
    pub object_id: String,

    /// Relationship kind as reported by the service (`Group`, `Role`, ...)
    pub object_type: String,

    pub display_name: String,
}

impl MembershipRecord {
    pub fn new(
        object_id: impl Into<String>,
        object_type: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            object_type: object_type.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMembership {
    #[serde(alias = "objectId")]
    id: String,
    #[serde(default)]
    object_type: Option<String>,
    #[serde(rename = "@odata.type", default)]
    odata_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    display_name: String,
}

impl<'de> Deserialize<'de> for MembershipRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawMembership::deserialize(deserializer)?;
        let object_type = raw
            .object_type
            .or_else(|| raw.odata_type.as_deref().map(object_type_from_odata))
            .unwrap_or_default();

        Ok(Self {
            object_id: raw.id,
            object_type,
            display_name: raw.display_name,
        })
    }
}

/// Map an `@odata.type` annotation onto the legacy `objectType` names
fn object_type_from_odata(odata_type: &str) -> String {
    match odata_type {
        "#microsoft.graph.group" => "Group".to_string(),
        "#microsoft.graph.directoryRole" => "Role".to_string(),
        "#microsoft.graph.administrativeUnit" => "AdministrativeUnit".to_string(),
        other => other
            .strip_prefix("#microsoft.graph.")
            .unwrap_or(other)
            .to_string(),
    }
}

/// One direct member of a group
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    #[serde(rename = "id", alias = "objectId")]
    pub object_id: String,

    /// Empty for members that are not directory users (devices,
    /// service principals, nested groups)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub user_type: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub user_principal_name: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub display_name: String,
}

impl MemberRecord {
    /// Whether the member can be classified as an expandable user
    pub fn is_user(&self) -> bool {
        !self.user_type.is_empty()
    }

    /// Convert into the row written to the users table
    pub fn into_user_record(self) -> UserRecord {
        UserRecord {
            id: self.object_id,
            user_type: self.user_type,
            user_principal_name: self.user_principal_name,
            display_name: self.display_name,
        }
    }
}

/// Graph returns `null` for absent string attributes
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_membership_from_odata_type() {
        let value = json!({
            "@odata.type": "#microsoft.graph.directoryRole",
            "id": "r1",
            "displayName": "Global Administrator"
        });
        let m: MembershipRecord = serde_json::from_value(value).unwrap();
        assert_eq!(m.object_type, "Role");
        assert_eq!(m.display_name, "Global Administrator");
    }

    #[test]
    fn test_membership_legacy_object_type() {
        let value = json!({
            "objectId": "g1",
            "objectType": "Group",
            "displayName": "Engineering"
        });
        let m: MembershipRecord = serde_json::from_value(value).unwrap();
        assert_eq!(m.object_id, "g1");
        assert_eq!(m.object_type, "Group");
    }

    #[test]
    fn test_membership_unknown_odata_type() {
        let value = json!({ "@odata.type": "#microsoft.graph.device", "id": "d1" });
        let m: MembershipRecord = serde_json::from_value(value).unwrap();
        assert_eq!(m.object_type, "device");
        assert_eq!(m.display_name, "");
    }

    #[test]
    fn test_member_null_user_type() {
        let value = json!({
            "id": "sp1",
            "userType": null,
            "displayName": "Build Agent"
        });
        let m: MemberRecord = serde_json::from_value(value).unwrap();
        assert!(!m.is_user());
        assert_eq!(m.user_principal_name, "");
    }

    #[test]
    fn test_member_into_user_record() {
        let member = MemberRecord {
            object_id: "bob".into(),
            user_type: "Member".into(),
            user_principal_name: "bob@contoso.com".into(),
            display_name: "Bob".into(),
        };
        assert!(member.is_user());
        let user = member.into_user_record();
        assert_eq!(user.id, "bob");
        assert_eq!(user.user_principal_name, "bob@contoso.com");
    }
}
