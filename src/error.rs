use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[cfg(feature = "web")]
    #[error("template error: {0}")]
    Template(#[from] Box<handlebars::RenderError>),

    #[cfg(feature = "web")]
    #[error(transparent)]
    Chart(#[from] crate::charts::ChartError),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),
}

#[cfg(feature = "web")]
impl From<handlebars::RenderError> for AppError {
    fn from(e: handlebars::RenderError) -> Self {
        AppError::Template(Box::new(e))
    }
}

#[cfg(feature = "web")]
mod response {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::{Html, IntoResponse, Response};
    use log::error;

    impl AppError {
        pub fn status(&self) -> StatusCode {
            match self {
                AppError::Validation(_) => StatusCode::BAD_REQUEST,
                AppError::NotFound(_) | AppError::Api(ApiError::NotFound(_)) => StatusCode::NOT_FOUND,
                AppError::Api(ApiError::Unauthorized) => StatusCode::UNAUTHORIZED,
                // the backend's own refusals (403 deactivated, 409 conflict, ...) reach the user as-is
                AppError::Api(ApiError::Status { status, .. }) if (400..500).contains(status) => {
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
                }
                AppError::Api(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }

        pub(crate) fn public_message(&self) -> String {
            match self {
                AppError::Validation(message) => message.clone(),
                AppError::NotFound(what) => format!("{what} not found"),
                AppError::Api(e) => e.user_message(),
                _ => "Something went wrong. Please try again.".to_string(),
            }
        }
    }

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let status = self.status();
            if status.is_server_error() {
                error!("{}", self);
            }
            let page = format!(
                "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{code} | Excel Analytics</title></head>\
                 <body style=\"font-family:sans-serif;padding:3rem\"><h1>{code}</h1><p>{message}</p>\
                 <p><a href=\"/\">Back to home</a></p></body></html>",
                code = status.as_u16(),
                message = handlebars::html_escape(&self.public_message()),
            );
            (status, Html(page)).into_response()
        }
    }
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn status_follows_variant() {
        assert_eq!(AppError::Validation("bad".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Api(ApiError::NotFound("File".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Api(ApiError::Unauthorized).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Api(ApiError::Transport("refused".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn backend_client_errors_keep_their_status() {
        let deactivated = AppError::Api(ApiError::Status {
            status: 403,
            message: "Account is deactivated".into(),
        });
        assert_eq!(deactivated.status(), StatusCode::FORBIDDEN);
        assert_eq!(deactivated.public_message(), "Account is deactivated");

        let conflict = AppError::Api(ApiError::Status { status: 409, message: "Taken".into() });
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let outage = AppError::Api(ApiError::Status { status: 503, message: "Down".into() });
        assert_eq!(outage.status(), StatusCode::BAD_GATEWAY);
    }
}
