use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, RequestBuilder, StatusCode, multipart};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{
    ActivityEntry, AdminStats, AnalyticsApi, ApiError, FileDetail, FileRecord, LoginResponse,
    ProfileUpdate, User, UserRole, UserStatus,
};

const CONNECT_TIMEOUT_SECS: u64 = 10;

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Malformed(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// Collections come back either bare or wrapped in a named field
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Wrapped {
        #[serde(alias = "users", alias = "files", alias = "activities", alias = "activity")]
        data: Vec<T>,
    },
    Bare(Vec<T>),
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Wrapped { data } | Listing::Bare(data) => data,
        }
    }
}

/// Single records come back either bare or wrapped in a named field
#[derive(Deserialize)]
#[serde(untagged)]
enum Single<T> {
    Wrapped {
        #[serde(alias = "user", alias = "file", alias = "stats")]
        data: T,
    },
    Bare(T),
}

impl<T> Single<T> {
    fn into_inner(self) -> T {
        match self {
            Single::Wrapped { data } | Single::Bare(data) => data,
        }
    }
}

/// Backend client over HTTP with bearer-token auth
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(HttpApi {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        match token {
            Some(token) if !token.is_empty() => builder.bearer_auth(token),
            _ => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Value, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body: Value = if status == StatusCode::NO_CONTENT {
            Value::Null
        } else {
            let text = response.text().await?;
            if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            }
        };

        if status.is_success() {
            return Ok(body);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(what.to_string())),
            _ => Err(ApiError::Status {
                status: status.as_u16(),
                message: server_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string()),
            }),
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, ApiError> {
        let body = self.send(builder, what).await?;
        decode::<Single<T>>(body).map(Single::into_inner)
    }

    async fn fetch_list<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<Vec<T>, ApiError> {
        let body = self.send(builder, what).await?;
        decode::<Listing<T>>(body).map(Listing::into_vec)
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::Malformed(e.to_string()))
}

/// `message` or `error` string from an error body
fn server_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|k| body.get(k).and_then(Value::as_str))
        .map(str::to_string)
        .find(|m| !m.is_empty())
}

fn mime_for(filename: &str) -> &'static str {
    let ext = filename.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("xls") => "application/vnd.ms-excel",
        Some("csv") => "text/csv",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl AnalyticsApi for HttpApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let req = self
            .request(Method::POST, "/auth/login", None)
            .json(&json!({ "email": email, "password": password }));
        let body = self.send(req, "Account").await?;
        decode(body)
    }

    async fn current_user(&self, token: &str) -> Result<User, ApiError> {
        let req = self.request(Method::GET, "/auth/me", Some(token));
        self.fetch(req, "User").await
    }

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> Result<User, ApiError> {
        let req = self.request(Method::PUT, "/users/profile", Some(token)).json(update);
        self.fetch(req, "User").await
    }

    async fn upload_file(&self, token: &str, filename: &str, data: Vec<u8>) -> Result<Value, ApiError> {
        let part = multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(mime_for(filename))?;
        let form = multipart::Form::new().part("file", part);
        let req = self.request(Method::POST, "/files/upload", Some(token)).multipart(form);
        self.send(req, "Upload endpoint").await
    }

    async fn list_files(&self, token: &str) -> Result<Vec<FileRecord>, ApiError> {
        let req = self.request(Method::GET, "/files", Some(token));
        self.fetch_list(req, "Files").await
    }

    async fn get_file(&self, token: &str, id: &str) -> Result<FileDetail, ApiError> {
        let req = self.request(Method::GET, &format!("/files/{}", urlencoding::encode(id)), Some(token));
        self.fetch(req, "File").await
    }

    async fn delete_file(&self, token: &str, id: &str) -> Result<(), ApiError> {
        let req = self.request(Method::DELETE, &format!("/files/{}", urlencoding::encode(id)), Some(token));
        self.send(req, "File").await.map(|_| ())
    }

    async fn admin_stats(&self, token: &str) -> Result<AdminStats, ApiError> {
        let req = self.request(Method::GET, "/admin/stats", Some(token));
        self.fetch(req, "Statistics").await
    }

    async fn list_users(&self, token: &str) -> Result<Vec<User>, ApiError> {
        let req = self.request(Method::GET, "/admin/users", Some(token));
        self.fetch_list(req, "Users").await
    }

    async fn get_user(&self, token: &str, id: &str) -> Result<User, ApiError> {
        let path = format!("/admin/users/{}", urlencoding::encode(id));
        let req = self.request(Method::GET, &path, Some(token));
        self.fetch(req, "User").await
    }

    async fn set_user_role(&self, token: &str, id: &str, role: UserRole) -> Result<User, ApiError> {
        let path = format!("/admin/users/{}/role", urlencoding::encode(id));
        let req = self
            .request(Method::PUT, &path, Some(token))
            .json(&json!({ "role": role }));
        self.fetch(req, "User").await
    }

    async fn set_user_status(&self, token: &str, id: &str, status: UserStatus) -> Result<User, ApiError> {
        let path = format!("/admin/users/{}/status", urlencoding::encode(id));
        let req = self
            .request(Method::PUT, &path, Some(token))
            .json(&json!({ "status": status }));
        self.fetch(req, "User").await
    }

    async fn delete_user(&self, token: &str, id: &str) -> Result<(), ApiError> {
        let path = format!("/admin/users/{}", urlencoding::encode(id));
        let req = self.request(Method::DELETE, &path, Some(token));
        self.send(req, "User").await.map(|_| ())
    }

    async fn list_all_files(&self, token: &str) -> Result<Vec<FileRecord>, ApiError> {
        let req = self.request(Method::GET, "/admin/files", Some(token));
        self.fetch_list(req, "Files").await
    }

    async fn admin_delete_file(&self, token: &str, id: &str) -> Result<(), ApiError> {
        let path = format!("/admin/files/{}", urlencoding::encode(id));
        let req = self.request(Method::DELETE, &path, Some(token));
        self.send(req, "File").await.map(|_| ())
    }

    async fn list_activity(&self, token: &str) -> Result<Vec<ActivityEntry>, ApiError> {
        let req = self.request(Method::GET, "/admin/activity", Some(token));
        self.fetch_list(req, "Activity").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_and_bare_listings_decode() {
        let wrapped: Vec<User> = decode::<Listing<User>>(json!({
            "users": [{ "_id": "1", "name": "A", "email": "a@x.test" }]
        }))
        .unwrap()
        .into_vec();
        let bare: Vec<User> = decode::<Listing<User>>(json!([{ "id": "1", "name": "A", "email": "a@x.test" }]))
            .unwrap()
            .into_vec();
        assert_eq!(wrapped, bare);
    }

    #[test]
    fn wrapped_single_record_decodes() {
        let user = decode::<Single<User>>(json!({
            "success": true,
            "user": { "_id": "1", "name": "A", "email": "a@x.test", "role": "admin" }
        }))
        .unwrap()
        .into_inner();
        assert!(user.is_admin());
    }

    #[test]
    fn error_message_prefers_server_text() {
        assert_eq!(server_message(&json!({ "message": "Email taken" })).as_deref(), Some("Email taken"));
        assert_eq!(server_message(&json!({ "error": "Bad input" })).as_deref(), Some("Bad input"));
        assert_eq!(server_message(&json!({ "message": "" })), None);
        assert_eq!(server_message(&Value::Null), None);
    }

    #[test]
    fn upload_mime_follows_extension() {
        assert_eq!(mime_for("a.CSV"), "text/csv");
        assert_eq!(mime_for("a.xls"), "application/vnd.ms-excel");
        assert_eq!(mime_for("noext"), "application/octet-stream");
    }

    #[test]
    fn base_url_is_trimmed() {
        let api = HttpApi::new("http://localhost:5000/api/", 5).unwrap();
        assert_eq!(api.base_url, "http://localhost:5000/api");
    }
}
