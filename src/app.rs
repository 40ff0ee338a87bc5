use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use log::{info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::{AnalyticsApi, HttpApi, MemoryApi};
use crate::config::AppConfig;
use crate::session::{self, SessionStore};
use crate::upload::{self, FileValidator};
use crate::views::Views;
use crate::{admin, auth, pages};

/// Multipart framing on top of the file itself
const UPLOAD_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Shared state handed to every handler
pub struct AppState {
    pub config: AppConfig,
    pub api: Arc<dyn AnalyticsApi>,
    pub sessions: SessionStore,
    pub validator: FileValidator,
    pub views: Views,
}

impl AppState {
    pub fn new(config: AppConfig, api: Arc<dyn AnalyticsApi>) -> Result<Self, handlebars::TemplateError> {
        Ok(AppState {
            validator: FileValidator::from_config(&config),
            views: Views::new()?,
            sessions: SessionStore::new(),
            api,
            config,
        })
    }
}

fn upload_body_limit(max_upload_mb: u64) -> usize {
    let bytes = max_upload_mb
        .saturating_mul(1024 * 1024)
        .saturating_add(UPLOAD_OVERHEAD_BYTES);
    usize::try_from(bytes).unwrap_or(usize::MAX)
}

/// Builds the full route table
///
/// Signed-in pages sit behind `require_user`, the admin console behind `require_admin`.
/// Every page route runs inside the session middleware; static assets and the fallback
/// are served without touching the session store.
///
/// # Arguments
/// * `state` - Shared application state
///
/// # Returns
/// * `Router` - The complete application, ready to serve
pub fn router(state: Arc<AppState>) -> Router {
    let user_routes = Router::new()
        .route("/dashboard", get(pages::serve_dashboard))
        .route(
            "/upload",
            get(upload::serve_upload_page)
                .post(upload::handle_upload)
                .layer(DefaultBodyLimit::max(upload_body_limit(state.config.max_upload_mb))),
        )
        .route("/files/:id", get(pages::serve_file))
        .route("/files/:id/confirm-delete", post(pages::confirm_delete_file))
        .route("/files/:id/delete", post(pages::delete_file))
        .route("/profile", get(pages::serve_profile).post(pages::update_profile))
        .route_layer(middleware::from_fn(auth::require_user));

    let admin_routes = Router::new()
        .route("/admin", get(admin::serve_overview))
        .route("/admin/users", get(admin::serve_users))
        .route("/admin/users/:id", get(admin::serve_user))
        .route("/admin/users/:id/role", post(admin::toggle_role))
        .route("/admin/users/:id/status", post(admin::toggle_status))
        .route("/admin/users/:id/confirm-delete", post(admin::confirm_delete_user))
        .route("/admin/users/:id/delete", post(admin::delete_user))
        .route("/admin/files", get(admin::serve_files))
        .route("/admin/files/:id/confirm-delete", post(admin::confirm_delete_file))
        .route("/admin/files/:id/delete", post(admin::delete_file))
        .route("/admin/activity", get(admin::serve_activity))
        .route_layer(middleware::from_fn(auth::require_admin));

    Router::new()
        .route("/", get(pages::serve_landing))
        .route("/charts", get(pages::serve_charts))
        .route("/login", get(auth::serve_login).post(auth::handle_login))
        .route("/logout", post(auth::handle_logout))
        .route("/theme/toggle", post(pages::toggle_theme))
        .route("/ui/sidebar", post(pages::toggle_sidebar))
        .route("/ui/modal/close", post(pages::close_modal))
        .route("/ui/modal/open/:kind", post(pages::open_modal))
        .merge(user_routes)
        .merge(admin_routes)
        // only the page routes above get a session; assets and the 404 page never create one
        .layer(middleware::from_fn_with_state(state.clone(), session::session_layer))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .fallback(pages::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the web server
///
/// Talks to the backend at `api_url` when one is configured, otherwise serves the seeded
/// in-memory demo data.
///
/// # Arguments
/// * `config` - Settings loaded from the environment
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Ok once the server stops, or the error
///   that kept it from starting
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let api: Arc<dyn AnalyticsApi> = match &config.api_url {
        Some(url) => {
            info!("Using analytics backend at {}", url);
            Arc::new(HttpApi::new(url, config.api_timeout_secs)?)
        }
        None => {
            warn!("EXCEL_ANALYTICS_API_URL is not set; serving in-memory demo data");
            Arc::new(MemoryApi::seeded())
        }
    };

    let bind = config.bind.clone();
    let state = Arc::new(AppState::new(config, api)?);

    let listener = TcpListener::bind(&bind).await?;
    info!("Listening on http://{}", bind);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_limit_leaves_room_for_multipart_framing() {
        assert_eq!(upload_body_limit(10), 10 * 1024 * 1024 + 64 * 1024);
        assert_eq!(upload_body_limit(u64::MAX), usize::MAX);
    }
}
