use std::sync::Arc;

use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::{ApiError, ProfileUpdate};
use crate::app::AppState;
use crate::auth::local_redirect;
use crate::carousel::{Carousel, ROTATION_INTERVAL_SECS, TESTIMONIALS};
use crate::charts::{self, ChartKind, ChartOptions};
use crate::error::AppError;
use crate::preview::SheetPreview;
use crate::session::SessionHandle;
use crate::theme::{CookiePreferences, ThemeState, prefers_dark_scheme};
use crate::toast::Toast;
use crate::ui_state::{ModalContent, ModalSize, UiAction};
use crate::views::theme_for;

/// Rows shown in the preview table under the chart
const PREVIEW_TABLE_ROWS: usize = 20;
const MAX_RATING: usize = 5;

#[derive(Debug, Default, Deserialize)]
pub struct ReturnTo {
    pub return_to: Option<String>,
}

/// Queues a toast for a failed backend call.
///
/// A rejected token is passed on so the route guard can send the user back to sign in.
pub(crate) fn report_failure(session: &SessionHandle, e: ApiError) -> Result<(), AppError> {
    if e == ApiError::Unauthorized {
        return Err(e.into());
    }
    warn!("backend call failed: {}", e);
    session.push_toast(Toast::error(e.user_message()));
    Ok(())
}

pub(crate) fn token(session: &SessionHandle) -> String {
    session.token().unwrap_or_default()
}

fn stars(rating: u8) -> String {
    let filled = usize::from(rating).min(MAX_RATING);
    format!("{}{}", "★".repeat(filled), "☆".repeat(MAX_RATING - filled))
}

#[derive(Debug, Default, Deserialize)]
pub struct LandingQuery {
    t: Option<String>,
}

/// Landing page with the testimonial carousel; `?t=<index>` picks the slide without JavaScript
pub async fn serve_landing(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    headers: HeaderMap,
    Query(query): Query<LandingQuery>,
) -> Result<Html<String>, AppError> {
    let mut carousel = Carousel::new(TESTIMONIALS.len());
    if let Some(index) = query.t.and_then(|t| t.trim().parse::<usize>().ok()) {
        carousel.go_to(index);
    }

    let testimonials: Vec<Value> = TESTIMONIALS
        .iter()
        .enumerate()
        .map(|(i, t)| {
            json!({
                "name": t.name,
                "role": t.role,
                "quote": t.quote,
                "rating": t.rating,
                "stars": stars(t.rating),
                "position": i + 1,
                "active": i == carousel.index(),
            })
        })
        .collect();

    let body = json!({
        "testimonials": testimonials,
        "prev": carousel.prev_index(),
        "next": carousel.next_index(),
        "rotation_secs": ROTATION_INTERVAL_SECS,
    });
    state.views.page(&state, &session, &headers, "/", "landing", "Home", body)
}

/// Gallery of every chart kind over the sample data
pub async fn serve_charts(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    let palette = theme_for(&headers).palette();
    let charts = charts::demo_gallery(&palette)?;
    let body = json!({ "charts": charts });
    state.views.page(&state, &session, &headers, "/charts", "charts", "Charts", body)
}

pub async fn serve_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    let files = state.api.list_files(&token(&session)).await?;
    let total_size: u64 = files.iter().map(|f| f.size).sum();
    let body = json!({
        "files": files,
        "file_count": files.len(),
        "total_size": total_size,
    });
    state.views.page(&state, &session, &headers, "/dashboard", "dashboard", "Dashboard", body)
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    kind: Option<String>,
    x: Option<String>,
    y: Option<String>,
    z: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Chart form state and the rendered chart (or why it could not be drawn)
fn chart_section(preview: &SheetPreview, query: ChartQuery, headers: &HeaderMap) -> Value {
    let numeric = preview.numeric_columns();
    let kind = query
        .kind
        .as_deref()
        .and_then(ChartKind::parse)
        .filter(|k| *k != ChartKind::Surface)
        .unwrap_or(ChartKind::Line);
    let x = non_empty(query.x)
        .or_else(|| preview.columns.first().cloned())
        .unwrap_or_default();
    let y = non_empty(query.y)
        .or_else(|| numeric.iter().find(|c| **c != x).cloned())
        .unwrap_or_else(|| x.clone());
    let z = non_empty(query.z);

    let title = match (&z, kind.is_3d()) {
        (Some(z), true) => format!("{y} and {z} by {x}"),
        _ => format!("{y} by {x}"),
    };
    let options = ChartOptions {
        title,
        x_label: x.clone(),
        y_label: y.clone(),
        kind,
        ..ChartOptions::default()
    };
    let palette = theme_for(headers).palette();
    let rendered = charts::series_from_preview(preview, kind, &x, &y, z.as_deref())
        .and_then(|data| charts::render(&data, &options, &palette));
    let (chart, chart_error) = match rendered {
        Ok(svg) => (Some(svg), None),
        Err(e) => {
            debug!("chart not drawn: {}", e);
            (None, Some(e.to_string()))
        }
    };

    let kinds: Vec<Value> = ChartKind::ALL
        .into_iter()
        .filter(|k| *k != ChartKind::Surface)
        .map(|k| json!({ "value": k.as_str(), "label": k.label(), "selected": k == kind }))
        .collect();
    let option = |name: &String, selected: bool| json!({ "name": name, "selected": selected });

    json!({
        "kinds": kinds,
        "x_options": preview.columns.iter().map(|c| option(c, *c == x)).collect::<Vec<_>>(),
        "y_options": numeric.iter().map(|c| option(c, *c == y)).collect::<Vec<_>>(),
        "z_options": numeric.iter().map(|c| option(c, z.as_ref() == Some(c))).collect::<Vec<_>>(),
        "chart": chart,
        "chart_error": chart_error,
    })
}

/// File detail with preview table and a chart built from chosen columns
pub async fn serve_file(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ChartQuery>,
) -> Result<Html<String>, AppError> {
    let detail = state.api.get_file(&token(&session), &id).await?;
    let path = format!("/files/{}", urlencoding::encode(&id));

    let mut body = json!({ "file": detail.record });
    if let Some(preview) = &detail.preview {
        if let (Value::Object(map), Value::Object(chart)) = (&mut body, chart_section(preview, query, &headers)) {
            map.extend(chart);
            let rows: Vec<&Vec<String>> = preview.rows.iter().take(PREVIEW_TABLE_ROWS).collect();
            map.insert("shown_rows".into(), json!(rows.len()));
            map.insert("total_rows".into(), json!(preview.rows.len()));
            map.insert("preview_rows".into(), json!(rows));
            map.insert("preview".into(), json!(preview));
        }
    }
    state
        .views
        .page(&state, &session, &headers, &path, "file_detail", &detail.record.filename, body)
}

/// Opens the delete confirmation for one of the user's own files
pub async fn confirm_delete_file(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
    Form(form): Form<ReturnTo>,
) -> Result<Redirect, AppError> {
    let target = local_redirect(form.return_to.as_deref(), "/dashboard");
    match state.api.get_file(&token(&session), &id).await {
        Ok(detail) => session.dispatch(UiAction::OpenModal {
            content: ModalContent::ConfirmDeleteFile {
                id: detail.record.id,
                name: detail.record.filename,
                admin: false,
            },
            size: ModalSize::Small,
        }),
        Err(e) => report_failure(&session, e)?,
    }
    Ok(Redirect::to(&target))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    session.dispatch(UiAction::CloseModal);
    match state.api.delete_file(&token(&session), &id).await {
        Ok(()) => {
            info!("file {} deleted", id);
            session.push_toast(Toast::success("File deleted"));
        }
        Err(e) => report_failure(&session, e)?,
    }
    Ok(Redirect::to("/dashboard"))
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

fn render_profile(
    state: &AppState,
    session: &SessionHandle,
    headers: &HeaderMap,
    form: Option<&ProfileForm>,
    error: Option<String>,
) -> Result<Html<String>, AppError> {
    let user = session
        .user()
        .ok_or_else(|| AppError::Api(ApiError::Unauthorized))?;
    let body = json!({
        "name": form.map_or(user.name.as_str(), |f| f.name.as_str()),
        "email": form.map_or(user.email.as_str(), |f| f.email.as_str()),
        "initials": user.initials(),
        "role": user.role.as_str(),
        "created_at": user.created_at,
        "error": error,
    });
    state.views.page(state, session, headers, "/profile", "profile", "Profile", body)
}

pub async fn serve_profile(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    render_profile(&state, &session, &headers, None, None)
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    headers: HeaderMap,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let update = ProfileUpdate {
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
    };
    match state.api.update_profile(&token(&session), &update).await {
        Ok(user) => {
            info!("profile updated for {}", user.email);
            session.update_user(user);
            session.push_toast(Toast::success("Profile updated"));
            Ok(Redirect::to("/profile").into_response())
        }
        Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized.into()),
        Err(e) => {
            let html = render_profile(&state, &session, &headers, Some(&form), Some(e.user_message()))?;
            Ok(html.into_response())
        }
    }
}

/// Flips the theme, persists it in the preference cookie and returns to the page
pub async fn toggle_theme(headers: HeaderMap, jar: CookieJar, Form(form): Form<ReturnTo>) -> (CookieJar, Redirect) {
    let mut prefs = CookiePreferences::new(jar);
    let mut theme = ThemeState::init(&prefs, prefers_dark_scheme(&headers));
    let mode = theme.toggle(&mut prefs);
    debug!("theme switched to {}", mode.as_str());
    let target = local_redirect(form.return_to.as_deref(), "/");
    (prefs.into_jar(), Redirect::to(&target))
}

pub async fn toggle_sidebar(Extension(session): Extension<SessionHandle>, Form(form): Form<ReturnTo>) -> Redirect {
    session.dispatch(UiAction::ToggleSidebar);
    Redirect::to(&local_redirect(form.return_to.as_deref(), "/"))
}

pub async fn close_modal(Extension(session): Extension<SessionHandle>, Form(form): Form<ReturnTo>) -> Redirect {
    session.dispatch(UiAction::CloseModal);
    Redirect::to(&local_redirect(form.return_to.as_deref(), "/"))
}

/// Opens one of the informational dialogs
pub async fn open_modal(
    Extension(session): Extension<SessionHandle>,
    Path(kind): Path<String>,
    Form(form): Form<ReturnTo>,
) -> Result<Redirect, AppError> {
    let (content, size) = match kind.as_str() {
        "upload-help" => (ModalContent::UploadHelp, ModalSize::Medium),
        "about" => (
            ModalContent::Message {
                title: "About Excel Analytics".to_string(),
                body: "Upload spreadsheets, explore them with charts and manage your data in one place."
                    .to_string(),
            },
            ModalSize::Small,
        ),
        _ => return Err(AppError::NotFound("Dialog".to_string())),
    };
    session.dispatch(UiAction::OpenModal { content, size });
    Ok(Redirect::to(&local_redirect(form.return_to.as_deref(), "/")))
}

pub async fn not_found() -> AppError {
    AppError::NotFound("Page".to_string())
}
