use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::preview::SheetPreview;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(UserRole::User),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            UserRole::User => UserRole::Admin,
            UserRole::Admin => UserRole::User,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(UserStatus::Active),
            "inactive" => Some(UserStatus::Inactive),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            UserStatus::Active => UserStatus::Inactive,
            UserStatus::Inactive => UserStatus::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Up to two uppercase initials for the avatar badge
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|w| w.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "originalName")]
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, alias = "createdAt")]
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Display name of the uploader
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDetail {
    #[serde(flatten)]
    pub record: FileRecord,
    #[serde(default)]
    pub preview: Option<SheetPreview>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    #[serde(alias = "_id")]
    pub id: String,
    /// Display name of the acting user
    #[serde(default)]
    pub user: Option<String>,
    pub action: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(alias = "createdAt")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: u64,
    pub active_users: u64,
    pub admin_users: u64,
    pub total_files: u64,
    pub total_storage: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_accepts_mongo_style_ids() {
        let user: User = serde_json::from_value(json!({
            "_id": "64b7f0c2a1d3e4f5a6b7c8d9",
            "name": "Ada Lovelace",
            "email": "ada@example.test",
            "role": "admin",
            "createdAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(user.id, "64b7f0c2a1d3e4f5a6b7c8d9");
        assert!(user.is_admin());
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.initials(), "AL");
    }

    #[test]
    fn file_detail_flattens_record() {
        let detail: FileDetail = serde_json::from_value(json!({
            "_id": "f1",
            "originalName": "sales.csv",
            "size": 120,
            "preview": { "columns": ["a"], "rows": [["1"]] }
        }))
        .unwrap();
        assert_eq!(detail.record.filename, "sales.csv");
        assert_eq!(detail.preview.unwrap().columns, vec!["a"]);
    }

    #[test]
    fn role_and_status_toggle() {
        assert_eq!(UserRole::User.toggled(), UserRole::Admin);
        assert_eq!(UserStatus::Inactive.toggled(), UserStatus::Active);
        assert_eq!(UserRole::parse("admin"), Some(UserRole::Admin));
        assert_eq!(UserStatus::parse("banned"), None);
    }
}
