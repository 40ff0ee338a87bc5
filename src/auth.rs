//! Sign-in, sign-out and the route guards.
//!
//! Credentials are checked by the backend; the session only keeps the token and
//! the user record it returned.

/// Follows `target` only when it is a path on this site
pub fn local_redirect(target: Option<&str>, fallback: &str) -> String {
    match target.map(str::trim) {
        Some(t) if t.starts_with('/') && !t.starts_with("//") && !t.starts_with("/\\") => t.to_string(),
        _ => fallback.to_string(),
    }
}

#[cfg(feature = "web")]
pub use self::handlers::*;

#[cfg(feature = "web")]
mod handlers {
    use std::sync::Arc;

    use axum::{
        Extension, Form,
        extract::{Query, Request, State},
        http::{HeaderMap, StatusCode},
        middleware::Next,
        response::{Html, IntoResponse, Redirect, Response},
    };
    use axum_extra::extract::cookie::CookieJar;
    use log::{info, warn};
    use serde::Deserialize;
    use serde_json::json;

    use super::local_redirect;
    use crate::api::{ApiError, LoginResponse};
    use crate::app::AppState;
    use crate::error::AppError;
    use crate::session::{SessionHandle, session_cookie};
    use crate::toast::Toast;

    pub const LOGIN_REQUIRED: &str = "Please sign in to continue";
    pub const ADMIN_REQUIRED: &str = "Administrator access required";
    pub const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";

    #[derive(Debug, Default, Deserialize)]
    pub struct LoginQuery {
        return_to: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct LoginForm {
        #[serde(default)]
        email: String,
        #[serde(default)]
        password: String,
        return_to: Option<String>,
    }

    fn render_login(
        state: &AppState,
        session: &SessionHandle,
        headers: &HeaderMap,
        email: &str,
        error: Option<String>,
        return_to: Option<String>,
    ) -> Result<Html<String>, AppError> {
        let body = json!({
            "email": email,
            "error": error,
            "return_to": return_to.unwrap_or_default(),
        });
        state.views.page(state, session, headers, "/login", "login", "Sign in", body)
    }

    /// Serve the sign-in form, or skip it when already signed in
    pub async fn serve_login(
        State(state): State<Arc<AppState>>,
        Extension(session): Extension<SessionHandle>,
        headers: HeaderMap,
        Query(query): Query<LoginQuery>,
    ) -> Result<Response, AppError> {
        if session.user().is_some() {
            let target = local_redirect(query.return_to.as_deref(), "/dashboard");
            return Ok(Redirect::to(&target).into_response());
        }
        Ok(render_login(&state, &session, &headers, "", None, query.return_to)?.into_response())
    }

    /// Handle user login requests
    ///
    /// Sends the credentials to the backend. On success the browser is moved to a new
    /// session id that holds the returned token, so an id handed out before sign-in is
    /// never authenticated. Admins land on the admin overview, everyone else on the
    /// dashboard, unless the form carries a local `return_to`.
    ///
    /// # Arguments
    /// * `state` - Shared application state with the backend client and session store
    /// * `session` - The anonymous session the form was posted from
    /// * `headers` - Request headers, used when the form is re-rendered
    /// * `jar` - Cookie jar receiving the new session cookie
    /// * `form` - Submitted email, password and optional `return_to`
    ///
    /// # Returns
    /// * `Result<Response, AppError>` - A redirect with a fresh session cookie, or the
    ///   sign-in page with an error message
    pub async fn handle_login(
        State(state): State<Arc<AppState>>,
        Extension(session): Extension<SessionHandle>,
        headers: HeaderMap,
        jar: CookieJar,
        Form(form): Form<LoginForm>,
    ) -> Result<Response, AppError> {
        let email = form.email.trim();
        if email.is_empty() || form.password.is_empty() {
            let error = Some("Email and password are required".to_string());
            return Ok(render_login(&state, &session, &headers, email, error, form.return_to)?.into_response());
        }

        match state.api.login(email, &form.password).await {
            Ok(LoginResponse { token, user }) => {
                info!("{} signed in", user.email);
                let fallback = if user.is_admin() { "/admin" } else { "/dashboard" };
                let target = local_redirect(form.return_to.as_deref(), fallback);
                let session = state.sessions.rotate(&session);
                session.push_toast(Toast::success(format!("Welcome back, {}", user.name)));
                session.sign_in(token, user);
                let jar = jar.add(session_cookie(session.id().to_string()));
                Ok((jar, Redirect::to(&target)).into_response())
            }
            Err(e) => {
                warn!("login failed for {}: {}", email, e);
                let message = match e {
                    ApiError::Unauthorized => "Invalid email or password".to_string(),
                    other => other.user_message(),
                };
                Ok(render_login(&state, &session, &headers, email, Some(message), form.return_to)?.into_response())
            }
        }
    }

    pub async fn handle_logout(Extension(session): Extension<SessionHandle>) -> Redirect {
        if let Some(user) = session.user() {
            info!("{} signed out", user.email);
        }
        session.sign_out();
        session.push_toast(Toast::info("You have been signed out"));
        Redirect::to("/")
    }

    fn to_login(session: &SessionHandle, message: &str, return_to: &str) -> Response {
        session.push_toast(Toast::error(message));
        let target = format!("/login?return_to={}", urlencoding::encode(return_to));
        Redirect::to(&target).into_response()
    }

    /// Runs the handler and signs the session out if the backend rejected its token
    async fn run_guarded(session: SessionHandle, request: Request, next: Next) -> Response {
        let path = request.uri().path().to_string();
        let response = next.run(request).await;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("backend rejected the session token on {}", path);
            session.sign_out();
            return to_login(&session, SESSION_EXPIRED, &path);
        }
        response
    }

    /// Middleware that requires a signed-in user
    ///
    /// # Arguments
    /// * `session` - Session attached by the session middleware
    /// * `request` - The incoming request
    /// * `next` - Next middleware in the chain
    ///
    /// # Returns
    /// * `Response` - The handler's response, or a redirect to `/login` carrying `return_to`
    pub async fn require_user(
        Extension(session): Extension<SessionHandle>,
        request: Request,
        next: Next,
    ) -> Response {
        if session.user().is_none() {
            let path = request.uri().path().to_string();
            return to_login(&session, LOGIN_REQUIRED, &path);
        }
        run_guarded(session, request, next).await
    }

    /// Middleware that requires a signed-in administrator
    ///
    /// Signed-in users without the admin role are sent to their dashboard with a toast.
    pub async fn require_admin(
        Extension(session): Extension<SessionHandle>,
        request: Request,
        next: Next,
    ) -> Response {
        match session.user() {
            None => {
                let path = request.uri().path().to_string();
                to_login(&session, LOGIN_REQUIRED, &path)
            }
            Some(user) if !user.is_admin() => {
                warn!("{} tried to open {}", user.email, request.uri().path());
                session.push_toast(Toast::error(ADMIN_REQUIRED));
                Redirect::to("/dashboard").into_response()
            }
            Some(_) => run_guarded(session, request, next).await,
        }
    }
}
