//! Client side of the analytics backend.
//!
//! Everything the UI needs from the backend goes through [`AnalyticsApi`]. `HttpApi`
//! talks to a real deployment; `MemoryApi` is a seeded stand-in for demos and tests.

mod types;

pub use types::*;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("not authenticated")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Text suitable for a toast or inline alert
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport(_) => "Could not reach the server. Please try again.".to_string(),
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Unauthorized => "Your session has expired. Please sign in again.".to_string(),
            ApiError::NotFound(what) => format!("{what} not found"),
            ApiError::Malformed(_) => "Unexpected response from the server".to_string(),
        }
    }
}

#[cfg(feature = "web")]
mod http;
#[cfg(feature = "web")]
mod memory;

#[cfg(feature = "web")]
pub use http::HttpApi;
#[cfg(feature = "web")]
pub use memory::MemoryApi;

#[cfg(feature = "web")]
#[async_trait::async_trait]
pub trait AnalyticsApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;
    async fn current_user(&self, token: &str) -> Result<User, ApiError>;
    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> Result<User, ApiError>;

    /// Sends the file and returns the backend's raw JSON answer
    async fn upload_file(
        &self,
        token: &str,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<serde_json::Value, ApiError>;
    async fn list_files(&self, token: &str) -> Result<Vec<FileRecord>, ApiError>;
    async fn get_file(&self, token: &str, id: &str) -> Result<FileDetail, ApiError>;
    async fn delete_file(&self, token: &str, id: &str) -> Result<(), ApiError>;

    async fn admin_stats(&self, token: &str) -> Result<AdminStats, ApiError>;
    async fn list_users(&self, token: &str) -> Result<Vec<User>, ApiError>;
    async fn get_user(&self, token: &str, id: &str) -> Result<User, ApiError>;
    async fn set_user_role(&self, token: &str, id: &str, role: UserRole) -> Result<User, ApiError>;
    async fn set_user_status(
        &self,
        token: &str,
        id: &str,
        status: UserStatus,
    ) -> Result<User, ApiError>;
    async fn delete_user(&self, token: &str, id: &str) -> Result<(), ApiError>;
    async fn list_all_files(&self, token: &str) -> Result<Vec<FileRecord>, ApiError>;
    async fn admin_delete_file(&self, token: &str, id: &str) -> Result<(), ApiError>;
    async fn list_activity(&self, token: &str) -> Result<Vec<ActivityEntry>, ApiError>;
}
