use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::AppConfig;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Message shown when the backend accepted the file but returned no identifier
pub const MALFORMED_RESPONSE: &str = "Upload succeeded but the server response was malformed";

/// A file picked by the user, before it is sent anywhere
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSelection {
    pub name: String,
    pub size: u64,
}

impl FileSelection {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        FileSelection {
            name: name.into(),
            size,
        }
    }

    /// Lowercase extension with a leading dot, if the name has one
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(format!(".{}", ext.to_ascii_lowercase()))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File size exceeds {max_mb}MB limit")]
    TooLarge { size: u64, max_mb: u64 },

    #[error("Invalid file type. Accepted types: {}", .accepted.join(", "))]
    TypeMismatch {
        extension: Option<String>,
        accepted: Vec<String>,
    },

    #[error("The selected file is empty")]
    Empty,
}

/// Accepted extensions plus a size ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileValidator {
    accepted: Vec<String>,
    max_size_mb: u64,
}

impl FileValidator {
    pub fn new(accepted: Vec<String>, max_size_mb: u64) -> Self {
        FileValidator {
            accepted: accepted.into_iter().map(|t| t.to_ascii_lowercase()).collect(),
            max_size_mb,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.accepted_types.clone(), config.max_upload_mb)
    }

    pub fn accepted(&self) -> &[String] {
        &self.accepted
    }

    pub fn max_size_mb(&self) -> u64 {
        self.max_size_mb
    }

    /// Largest accepted file in bytes
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Value for an `<input type="file" accept=...>` attribute
    pub fn accept_attribute(&self) -> String {
        self.accepted.join(",")
    }

    /// Size is checked before type, so an oversize file always reports the size.
    /// Checks a selection against the size ceiling and the accepted extensions
    ///
    /// # Arguments
    /// * `file` - Name and size of the picked file
    ///
    /// # Returns
    /// * `Result<(), ValidationError>` - `TooLarge` is reported before any type mismatch,
    ///   so an oversized file is rejected for its size whatever its extension
    pub fn validate(&self, file: &FileSelection) -> Result<(), ValidationError> {
        if file.size > self.max_size_bytes() {
            return Err(ValidationError::TooLarge {
                size: file.size,
                max_mb: self.max_size_mb,
            });
        }

        let extension = file.extension();
        let known = extension
            .as_ref()
            .is_some_and(|ext| self.accepted.iter().any(|a| a == ext));
        if !known {
            return Err(ValidationError::TypeMismatch {
                extension,
                accepted: self.accepted.clone(),
            });
        }

        if file.size == 0 {
            return Err(ValidationError::Empty);
        }

        Ok(())
    }
}

/// Pulls the created file's identifier out of an upload response.
///
/// Accepts `file._id`, `file.id`, `fileId`, `_id` or `id`; the first non-empty string wins.
pub fn extract_file_id(response: &Value) -> Option<String> {
    let candidates = [
        response.pointer("/file/_id"),
        response.pointer("/file/id"),
        response.get("fileId"),
        response.get("_id"),
        response.get("id"),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

/// What the upload page does after the backend answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Navigate(String),
    Failed(String),
}

pub fn upload_outcome(response: &Value) -> UploadOutcome {
    match extract_file_id(response) {
        Some(id) => UploadOutcome::Navigate(format!("/files/{}", encode_segment(&id))),
        None => UploadOutcome::Failed(MALFORMED_RESPONSE.to_string()),
    }
}

#[cfg(feature = "web")]
fn encode_segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

#[cfg(not(feature = "web"))]
fn encode_segment(id: &str) -> String {
    id.to_string()
}

/// Human-readable size, e.g. `512 B`, `1.5 KB`, `2.25 MB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", text, UNITS[unit])
}

/// View model for the drag-and-drop upload widget
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadWidget {
    pub selection: Option<FileSelection>,
    pub size_label: Option<String>,
    pub error: Option<String>,
}

impl UploadWidget {
    pub fn rejected(selection: Option<FileSelection>, error: impl Into<String>) -> Self {
        let size_label = selection.as_ref().map(|s| format_size(s.size));
        UploadWidget {
            selection,
            size_label,
            error: Some(error.into()),
        }
    }
}

#[cfg(feature = "web")]
pub use self::handlers::{serve_upload_page, handle_upload};

#[cfg(feature = "web")]
mod handlers {
    use super::*;
    use crate::app::AppState;
    use crate::error::AppError;
    use crate::session::SessionHandle;
    use crate::toast::Toast;
    use axum::{
        Extension,
        extract::{Multipart, State, multipart::MultipartError},
        http::{HeaderMap, StatusCode, header},
        response::{Html, IntoResponse, Redirect, Response},
    };
    use log::{info, warn};
    use std::sync::Arc;

    /// Serve the upload page with an empty widget
    ///
    /// # Arguments
    /// * `state` - Shared application state holding the validator
    /// * `session` - The caller's session
    /// * `headers` - Request headers, for the theme
    ///
    /// # Returns
    /// * `Result<Html<String>, AppError>` - The rendered page
    pub async fn serve_upload_page(
        State(state): State<Arc<AppState>>,
        Extension(session): Extension<SessionHandle>,
        headers: HeaderMap,
    ) -> Result<Html<String>, AppError> {
        render_upload(&state, &session, &headers, UploadWidget::default())
    }

    fn render_upload(
        state: &AppState,
        session: &SessionHandle,
        headers: &HeaderMap,
        widget: UploadWidget,
    ) -> Result<Html<String>, AppError> {
        let validator = &state.validator;
        let body = serde_json::json!({
            "widget": widget,
            "accept": validator.accept_attribute(),
            "accepted": validator.accepted().join(", "),
            "max_mb": validator.max_size_mb(),
            "max_bytes": validator.max_size_bytes(),
        });
        state.views.page(state, session, headers, "/upload", "upload", "Upload", body)
    }

    /// What the multipart body carried in its `file` field
    enum Received {
        File(String, Vec<u8>),
        /// The field passed the size ceiling; reading stopped at that point
        Oversize(String),
        Nothing,
    }

    fn multipart_failure(e: MultipartError, name: &str) -> Result<Received, AppError> {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Ok(Received::Oversize(name.to_string()));
        }
        Err(AppError::Validation(format!("Malformed upload: {e}")))
    }

    /// Reads the `file` field chunk by chunk, giving up once it exceeds `limit` bytes
    async fn receive_file(multipart: &mut Multipart, limit: u64) -> Result<Received, AppError> {
        let mut received = Received::Nothing;
        loop {
            let mut field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => return Ok(received),
                Err(e) => return multipart_failure(e, ""),
            };
            if field.name() != Some("file") {
                continue;
            }

            let name = field.file_name().unwrap_or("").to_string();
            let mut data = Vec::new();
            loop {
                match field.chunk().await {
                    Ok(Some(chunk)) => {
                        data.extend_from_slice(&chunk);
                        if data.len() as u64 > limit {
                            return Ok(Received::Oversize(name));
                        }
                    }
                    Ok(None) => break,
                    Err(e) => return multipart_failure(e, &name),
                }
            }
            received = Received::File(name, data);
        }
    }

    /// Handle a multipart upload from the widget
    ///
    /// The file is re-validated here; client-side checks in the page are only a convenience.
    /// Oversized files are cut off as soon as they pass the configured ceiling and reported
    /// through the widget like any other validation failure.
    ///
    /// # Arguments
    /// * `state` - Shared application state holding the validator and the backend client
    /// * `session` - The caller's session, used for the token and the success toast
    /// * `headers` - Request headers, for the theme and the declared body length
    /// * `multipart` - The form body carrying the `file` field
    ///
    /// # Returns
    /// * `Result<Response, AppError>` - A redirect to the new file's page, or the upload page
    ///   re-rendered with the reason the file was not accepted
    pub async fn handle_upload(
        State(state): State<Arc<AppState>>,
        Extension(session): Extension<SessionHandle>,
        headers: HeaderMap,
        mut multipart: Multipart,
    ) -> Result<Response, AppError> {
        let limit = state.validator.max_size_bytes();
        let (name, data) = match receive_file(&mut multipart, limit).await? {
            Received::File(name, data) if !name.is_empty() => (name, data),
            Received::Oversize(name) => {
                let declared = headers
                    .get(header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0);
                let selection = FileSelection::new(name, declared.max(limit.saturating_add(1)));
                let message = ValidationError::TooLarge {
                    size: selection.size,
                    max_mb: state.validator.max_size_mb(),
                }
                .to_string();
                warn!("rejected upload {:?}: {}", selection.name, message);
                let widget = UploadWidget::rejected(Some(selection), message);
                return Ok(render_upload(&state, &session, &headers, widget)?.into_response());
            }
            _ => {
                let widget = UploadWidget::rejected(None, "Please select a file to upload");
                return Ok(render_upload(&state, &session, &headers, widget)?.into_response());
            }
        };

        let selection = FileSelection::new(name, data.len() as u64);
        if let Err(e) = state.validator.validate(&selection) {
            warn!("rejected upload {:?}: {}", selection.name, e);
            let widget = UploadWidget::rejected(Some(selection), e.to_string());
            return Ok(render_upload(&state, &session, &headers, widget)?.into_response());
        }

        let token = session.token().unwrap_or_default();
        let response = match state.api.upload_file(&token, &selection.name, data).await {
            Ok(response) => response,
            Err(e) => {
                warn!("upload of {:?} failed: {}", selection.name, e);
                let widget = UploadWidget::rejected(Some(selection), e.user_message());
                return Ok(render_upload(&state, &session, &headers, widget)?.into_response());
            }
        };

        match upload_outcome(&response) {
            UploadOutcome::Navigate(url) => {
                info!("uploaded {:?} -> {}", selection.name, url);
                session.push_toast(Toast::success(format!("{} uploaded", selection.name)));
                Ok(Redirect::to(&url).into_response())
            }
            UploadOutcome::Failed(message) => {
                warn!("upload response without identifier: {}", response);
                let widget = UploadWidget::rejected(Some(selection), message);
                Ok(render_upload(&state, &session, &headers, widget)?.into_response())
            }
        }
    }
}
