//! Server-side rendering of every page.
//!
//! Templates are compiled into the binary and registered once at startup. Each page
//! body is rendered on its own and then wrapped in the layout shell, which carries the
//! theme, navigation, breadcrumbs, toasts and the modal.

use axum::http::HeaderMap;
use axum::response::Html;
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use handlebars::{Handlebars, TemplateError, handlebars_helper};
use serde::Serialize;
use serde_json::Value;

use crate::app::AppState;
use crate::breadcrumbs::{self, Crumb};
use crate::error::AppError;
use crate::nav::{self, NavItem, NavSet};
use crate::session::SessionHandle;
use crate::theme::{CookiePreferences, THEME_KEY, ThemeState, prefers_dark_scheme};
use crate::toast::Toast;
use crate::ui_state::UiState;
use crate::upload::format_size;

const LAYOUT: &str = include_str!("templates/layout.hbs");

const TEMPLATES: &[(&str, &str)] = &[
    ("navbar", include_str!("templates/navbar.hbs")),
    ("sidebar", include_str!("templates/sidebar.hbs")),
    ("footer", include_str!("templates/footer.hbs")),
    ("modal", include_str!("templates/modal.hbs")),
    ("toasts", include_str!("templates/toasts.hbs")),
    ("breadcrumbs", include_str!("templates/breadcrumbs.hbs")),
    ("landing", include_str!("templates/landing.hbs")),
    ("login", include_str!("templates/login.hbs")),
    ("dashboard", include_str!("templates/dashboard.hbs")),
    ("upload", include_str!("templates/upload.hbs")),
    ("file_detail", include_str!("templates/file_detail.hbs")),
    ("charts", include_str!("templates/charts.hbs")),
    ("profile", include_str!("templates/profile.hbs")),
    ("admin_overview", include_str!("templates/admin_overview.hbs")),
    ("admin_users", include_str!("templates/admin_users.hbs")),
    ("admin_user", include_str!("templates/admin_user.hbs")),
    ("admin_files", include_str!("templates/admin_files.hbs")),
    ("admin_activity", include_str!("templates/admin_activity.hbs")),
];

handlebars_helper!(filesize: |bytes: u64| format_size(bytes));
handlebars_helper!(datetime: |value: Json| format_timestamp(value));

/// `Oct 19, 2026 14:05` for RFC 3339 strings, `Never` for null
fn format_timestamp(value: &Value) -> String {
    match value {
        Value::String(s) => s
            .parse::<DateTime<Utc>>()
            .map(|t| t.format("%b %d, %Y %H:%M").to_string())
            .unwrap_or_else(|_| s.clone()),
        _ => "Never".to_string(),
    }
}

/// Resolves the theme for a request from the preference cookie and the OS hint
pub fn theme_for(headers: &HeaderMap) -> ThemeState {
    let prefs = CookiePreferences::new(CookieJar::from_headers(headers));
    ThemeState::init(&prefs, prefers_dark_scheme(headers))
}

#[derive(Debug, Clone, Serialize)]
pub struct ThemeVar {
    pub name: String,
    pub value: &'static str,
}

/// Signed-in user as the templates see them
#[derive(Debug, Clone, Serialize)]
pub struct Viewer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub initials: String,
    pub is_admin: bool,
}

/// Everything the layout shell needs besides the page body
#[derive(Debug, Clone, Serialize)]
pub struct PageContext {
    pub title: String,
    pub path: String,
    pub theme: &'static str,
    pub body_class: &'static str,
    pub theme_key: &'static str,
    pub theme_vars: Vec<ThemeVar>,
    pub ui: UiState,
    pub modal_title: Option<String>,
    pub nav: Vec<NavItem>,
    pub crumbs: Vec<Crumb>,
    pub toasts: Vec<Toast>,
    pub viewer: Option<Viewer>,
    pub demo: bool,
    pub accepted_types: String,
    pub max_upload_mb: u64,
}

impl PageContext {
    /// Drains the session's pending toasts.
    pub fn build(state: &AppState, session: &SessionHandle, theme: ThemeState, path: &str, title: &str) -> Self {
        let ui = session.ui();
        let viewer = session.user().map(|user| Viewer {
            initials: user.initials(),
            is_admin: user.is_admin(),
            id: user.id,
            name: user.name,
            email: user.email,
        });

        let crumbs = breadcrumbs::build(path);
        let crumbs = if crumbs.len() > 1 { crumbs } else { Vec::new() };

        let theme_vars = theme
            .palette()
            .entries()
            .into_iter()
            .map(|(name, value)| ThemeVar { name, value })
            .collect();

        PageContext {
            title: title.to_string(),
            path: path.to_string(),
            theme: theme.mode.as_str(),
            body_class: theme.body_class(),
            theme_key: THEME_KEY,
            theme_vars,
            modal_title: ui.modal.content.as_ref().map(|c| c.title()),
            ui,
            nav: nav::items(NavSet::for_path(path), path),
            crumbs,
            toasts: session.take_toasts(),
            viewer,
            demo: state.config.api_url.is_none(),
            accepted_types: state.validator.accepted().join(", "),
            max_upload_mb: state.validator.max_size_mb(),
        }
    }
}

#[derive(Serialize)]
struct Shell<'a> {
    #[serde(flatten)]
    context: &'a PageContext,
    content: String,
}

pub struct Views {
    registry: Handlebars<'static>,
}

impl Views {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_helper("filesize", Box::new(filesize));
        registry.register_helper("datetime", Box::new(datetime));
        registry.register_template_string("layout", LAYOUT)?;
        for (name, source) in TEMPLATES {
            registry.register_template_string(name, *source)?;
        }
        Ok(Views { registry })
    }

    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> Result<String, AppError> {
        Ok(self.registry.render(template, data)?)
    }

    /// Renders `template` with `body` and wraps it in the layout.
    ///
    /// `body` also receives `viewer`, `path` and `theme` so page templates can branch on them.
    /// Queued toasts are drained into this page.
    ///
    /// # Arguments
    /// * `state` - Shared application state
    /// * `session` - The caller's session, for navigation, UI state and toasts
    /// * `headers` - Request headers, for the theme cookie and the OS colour hint
    /// * `path` - Path used for breadcrumbs and the active navigation item
    /// * `template` - Name of the page template
    /// * `title` - Document title
    /// * `body` - Page-specific data
    ///
    /// # Returns
    /// * `Result<Html<String>, AppError>` - The complete HTML document
    #[allow(clippy::too_many_arguments)]
    pub fn page(
        &self,
        state: &AppState,
        session: &SessionHandle,
        headers: &HeaderMap,
        path: &str,
        template: &str,
        title: &str,
        body: Value,
    ) -> Result<Html<String>, AppError> {
        let context = PageContext::build(state, session, theme_for(headers), path, title);
        Ok(Html(self.render_page(&context, template, body)?))
    }

    pub fn render_page(&self, context: &PageContext, template: &str, mut body: Value) -> Result<String, AppError> {
        if let Value::Object(map) = &mut body {
            map.insert("path".into(), Value::String(context.path.clone()));
            map.insert("theme".into(), Value::String(context.theme.to_string()));
            map.insert("demo".into(), Value::Bool(context.demo));
            let viewer = match &context.viewer {
                Some(v) => serde_json::json!({ "id": v.id, "name": v.name, "email": v.email, "is_admin": v.is_admin }),
                None => Value::Null,
            };
            map.insert("viewer".into(), viewer);
        }
        let content = self.render(template, &body)?;
        self.render("layout", &Shell { context, content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeMode;
    use serde_json::json;

    fn context(path: &str) -> PageContext {
        let theme = ThemeState { mode: ThemeMode::Dark };
        PageContext {
            title: "Test".into(),
            path: path.into(),
            theme: theme.mode.as_str(),
            body_class: theme.body_class(),
            theme_key: THEME_KEY,
            theme_vars: theme
                .palette()
                .entries()
                .into_iter()
                .map(|(name, value)| ThemeVar { name, value })
                .collect(),
            ui: UiState::default(),
            modal_title: None,
            nav: nav::items(NavSet::for_path(path), path),
            crumbs: breadcrumbs::build(path),
            toasts: vec![Toast::error("Invalid user ID")],
            viewer: None,
            demo: true,
            accepted_types: ".csv".into(),
            max_upload_mb: 10,
        }
    }

    #[test]
    fn all_templates_compile() {
        assert!(Views::new().is_ok());
    }

    #[test]
    fn layout_carries_theme_crumbs_and_toasts() {
        let views = Views::new().unwrap();
        let html = views
            .render_page(&context("/admin/users/123"), "charts", json!({ "charts": [] }))
            .unwrap();
        assert!(html.contains("data-theme=\"dark\""));
        assert!(html.contains("--background:"));
        assert!(html.contains("aria-current=\"page\">Details<"));
        assert!(html.contains("Invalid user ID"));
    }

    #[test]
    fn timestamps_are_formatted() {
        assert_eq!(format_timestamp(&json!("2024-03-05T09:07:00Z")), "Mar 05, 2024 09:07");
        assert_eq!(format_timestamp(&Value::Null), "Never");
        assert_eq!(format_timestamp(&json!("yesterday")), "yesterday");
    }
}
