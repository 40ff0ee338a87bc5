//! Administrator console: user management, every uploaded file, and the activity log.

use std::sync::Arc;

use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
};
use log::info;
use serde::Deserialize;
use serde_json::json;

use crate::api::{ApiError, User};
use crate::app::AppState;
use crate::auth::local_redirect;
use crate::breadcrumbs::is_object_id;
use crate::error::AppError;
use crate::pages::{ReturnTo, report_failure, token};
use crate::session::SessionHandle;
use crate::toast::Toast;
use crate::ui_state::{ModalContent, ModalSize, UiAction};

pub const INVALID_USER_ID: &str = "Invalid user ID";
const RECENT_ACTIVITY: usize = 5;
const USERS_PATH: &str = "/admin/users";

/// Redirect used whenever a user id in the URL is not a backend id
fn invalid_user_id(session: &SessionHandle) -> Redirect {
    session.push_toast(Toast::error(INVALID_USER_ID));
    Redirect::to(USERS_PATH)
}

fn user_path(id: &str) -> String {
    format!("{}/{}", USERS_PATH, id)
}

fn is_self(session: &SessionHandle, id: &str) -> bool {
    session.user().is_some_and(|me| me.id == id)
}

/// Case-insensitive match on name or email
fn matches_query(user: &User, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    query.is_empty() || user.name.to_lowercase().contains(&query) || user.email.to_lowercase().contains(&query)
}

pub async fn serve_overview(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    let token = token(&session);
    let stats = state.api.admin_stats(&token).await?;
    let mut recent = state.api.list_activity(&token).await?;
    recent.truncate(RECENT_ACTIVITY);
    let body = json!({ "stats": stats, "recent": recent });
    state.views.page(&state, &session, &headers, "/admin", "admin_overview", "Admin", body)
}

#[derive(Debug, Default, Deserialize)]
pub struct UserSearch {
    q: Option<String>,
}

pub async fn serve_users(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    headers: HeaderMap,
    Query(search): Query<UserSearch>,
) -> Result<Html<String>, AppError> {
    let query = search.q.unwrap_or_default();
    let users: Vec<User> = state
        .api
        .list_users(&token(&session))
        .await?
        .into_iter()
        .filter(|u| matches_query(u, &query))
        .collect();
    let body = json!({ "users": users, "query": query });
    state.views.page(&state, &session, &headers, USERS_PATH, "admin_users", "Users", body)
}

/// User detail. A malformed id never reaches the backend.
pub async fn serve_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    if !is_object_id(&id) {
        return Ok(invalid_user_id(&session).into_response());
    }

    let user = match state.api.get_user(&token(&session), &id).await {
        Ok(user) => user,
        Err(e) => {
            report_failure(&session, e)?;
            return Ok(Redirect::to(USERS_PATH).into_response());
        }
    };

    let body = json!({
        "user": user,
        "initials": user.initials(),
        "is_self": is_self(&session, &id),
        "next_role": user.role.toggled().as_str(),
    });
    let html = state
        .views
        .page(&state, &session, &headers, &user_path(&id), "admin_user", &user.name, body)?;
    Ok(html.into_response())
}

/// Flips a user's role between user and admin
pub async fn toggle_role(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    if !is_object_id(&id) {
        return Ok(invalid_user_id(&session));
    }
    if is_self(&session, &id) {
        session.push_toast(Toast::error("You cannot change your own role"));
        return Ok(Redirect::to(&user_path(&id)));
    }

    let token = token(&session);
    let result = match state.api.get_user(&token, &id).await {
        Ok(user) => state.api.set_user_role(&token, &id, user.role.toggled()).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(user) => {
            info!("{} is now {}", user.email, user.role.as_str());
            session.push_toast(Toast::success(format!("{} is now {}", user.name, user.role.as_str())));
        }
        Err(e) => report_failure(&session, e)?,
    }
    Ok(Redirect::to(&user_path(&id)))
}

/// Activates or deactivates a user
pub async fn toggle_status(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    if !is_object_id(&id) {
        return Ok(invalid_user_id(&session));
    }
    if is_self(&session, &id) {
        session.push_toast(Toast::error("You cannot change your own status"));
        return Ok(Redirect::to(&user_path(&id)));
    }

    let token = token(&session);
    let result = match state.api.get_user(&token, &id).await {
        Ok(user) => state.api.set_user_status(&token, &id, user.status.toggled()).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(user) => {
            info!("{} is now {}", user.email, user.status.as_str());
            session.push_toast(Toast::success(format!("{} is now {}", user.name, user.status.as_str())));
        }
        Err(e) => report_failure(&session, e)?,
    }
    Ok(Redirect::to(&user_path(&id)))
}

pub async fn confirm_delete_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
    Form(form): Form<ReturnTo>,
) -> Result<Redirect, AppError> {
    if !is_object_id(&id) {
        return Ok(invalid_user_id(&session));
    }
    let target = local_redirect(form.return_to.as_deref(), &user_path(&id));
    if is_self(&session, &id) {
        session.push_toast(Toast::error("You cannot delete your own account"));
        return Ok(Redirect::to(&target));
    }

    match state.api.get_user(&token(&session), &id).await {
        Ok(user) => session.dispatch(UiAction::OpenModal {
            content: ModalContent::ConfirmDeleteUser { id: user.id, name: user.name },
            size: ModalSize::Small,
        }),
        Err(e) => report_failure(&session, e)?,
    }
    Ok(Redirect::to(&target))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    session.dispatch(UiAction::CloseModal);
    if !is_object_id(&id) {
        return Ok(invalid_user_id(&session));
    }
    if is_self(&session, &id) {
        session.push_toast(Toast::error("You cannot delete your own account"));
        return Ok(Redirect::to(&user_path(&id)));
    }

    match state.api.delete_user(&token(&session), &id).await {
        Ok(()) => {
            info!("user {} deleted", id);
            session.push_toast(Toast::success("User deleted"));
        }
        Err(e) => report_failure(&session, e)?,
    }
    Ok(Redirect::to(USERS_PATH))
}

pub async fn serve_files(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    let files = state.api.list_all_files(&token(&session)).await?;
    let total_size: u64 = files.iter().map(|f| f.size).sum();
    let body = json!({ "files": files, "file_count": files.len(), "total_size": total_size });
    state.views.page(&state, &session, &headers, "/admin/files", "admin_files", "Files", body)
}

pub async fn confirm_delete_file(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
    Form(form): Form<ReturnTo>,
) -> Result<Redirect, AppError> {
    let target = local_redirect(form.return_to.as_deref(), "/admin/files");
    let found = state
        .api
        .list_all_files(&token(&session))
        .await
        .and_then(|files| {
            files
                .into_iter()
                .find(|f| f.id == id)
                .ok_or_else(|| ApiError::NotFound("File".to_string()))
        });
    match found {
        Ok(file) => session.dispatch(UiAction::OpenModal {
            content: ModalContent::ConfirmDeleteFile {
                id: file.id,
                name: file.filename,
                admin: true,
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
    match state.api.admin_delete_file(&token(&session), &id).await {
        Ok(()) => {
            info!("file {} deleted by an administrator", id);
            session.push_toast(Toast::success("File deleted"));
        }
        Err(e) => report_failure(&session, e)?,
    }
    Ok(Redirect::to("/admin/files"))
}

pub async fn serve_activity(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    let entries = state.api.list_activity(&token(&session)).await?;
    let body = json!({ "entries": entries });
    state.views.page(&state, &session, &headers, "/admin/activity", "admin_activity", "Activity Log", body)
}
