use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum CollaborationStatus {
    #[serde(rename = "active")]
    #[sqlx(rename = "active")]
    Active,
    #[serde(rename = "inactive")]
    #[sqlx(rename = "inactive")]
    Inactive,
    #[serde(rename = "pending")]
    #[sqlx(rename = "pending")]
    Pending,
    #[serde(rename = "revoked")]
    #[sqlx(rename = "revoked")]
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PortalCollaborator {
    pub id: i32,
    pub portal_id: String,
    pub user_id: i32,
    pub permissions: serde_json::Value,
    pub status: CollaborationStatus,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct AddCollaboratorRequest {
    pub user_id: i32,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCollaboratorRequest {
    pub status: Option<CollaborationStatus>,
    pub permissions: Option<Vec<String>>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaboration_status_uses_lowercase_wire_names() {
        let json = serde_json::to_string(&CollaborationStatus::Revoked).unwrap();
        assert_eq!(json, "\"revoked\"");
        let parsed: CollaborationStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(parsed, CollaborationStatus::Pending);
    }
}
