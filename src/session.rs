use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::api::User;
use crate::toast::Toast;
use crate::ui_state::{UiAction, UiState};

/// Cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// Signed-in identity, as handed out by the backend
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// Everything the server remembers about one browser
#[derive(Debug)]
pub struct Session {
    pub ui: UiState,
    pub auth: Option<AuthSession>,
    pub toasts: Vec<Toast>,
    pub expires_at: SystemTime,
}

impl Session {
    fn new() -> Self {
        Session {
            ui: UiState::default(),
            auth: None,
            toasts: Vec::new(),
            expires_at: SystemTime::now() + Duration::from_secs(SESSION_DURATION),
        }
    }

    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at <= now
    }
}

/// Shared reference to one session, handed to request handlers
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn ui(&self) -> UiState {
        self.lock().ui.clone()
    }

    pub fn dispatch(&self, action: UiAction) {
        self.lock().ui.reduce(action);
    }

    pub fn auth(&self) -> Option<AuthSession> {
        self.lock().auth.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.lock().auth.as_ref().map(|a| a.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.lock().auth.as_ref().map(|a| a.user.clone())
    }

    pub fn sign_in(&self, token: String, user: User) {
        self.lock().auth = Some(AuthSession { token, user });
    }

    pub fn update_user(&self, user: User) {
        if let Some(auth) = self.lock().auth.as_mut() {
            auth.user = user;
        }
    }

    /// Drops the identity and any open modal; keeps the sidebar preference
    pub fn sign_out(&self) {
        let mut session = self.lock();
        session.auth = None;
        session.ui.reduce(UiAction::CloseModal);
    }

    pub fn push_toast(&self, toast: Toast) {
        self.lock().toasts.push(toast);
    }

    /// Returns queued toasts and clears the queue
    pub fn take_toasts(&self) -> Vec<Toast> {
        std::mem::take(&mut self.lock().toasts)
    }
}

/// In-memory map of live sessions
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a live session by id
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        let inner = sessions.get(id)?;
        let expired = inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_expired(SystemTime::now());
        if expired {
            return None;
        }
        Some(SessionHandle {
            id: id.to_string(),
            inner: Arc::clone(inner),
        })
    }

    /// Creates a fresh session, dropping any that have expired
    pub fn create(&self) -> SessionHandle {
        let id = Uuid::new_v4().to_string();
        let inner = Arc::new(Mutex::new(Session::new()));
        let now = SystemTime::now();

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, s| !s.lock().unwrap_or_else(|e| e.into_inner()).is_expired(now));
        sessions.insert(id.clone(), Arc::clone(&inner));

        SessionHandle { id, inner }
    }

    /// Existing session for `id`, or a new one; the flag tells whether a cookie must be set
    pub fn get_or_create(&self, id: Option<&str>) -> (SessionHandle, bool) {
        match id.and_then(|id| self.get(id)) {
            Some(handle) => (handle, false),
            None => (self.create(), true),
        }
    }

    pub fn remove(&self, id: &str) {
        self.sessions.write().unwrap_or_else(|e| e.into_inner()).remove(id);
    }

    /// Moves a session to a freshly minted id
    ///
    /// The sidebar and modal state and any queued toasts travel with it; the old id stops
    /// resolving. Called whenever the signed-in identity changes.
    ///
    /// # Arguments
    /// * `old` - The session being replaced
    ///
    /// # Returns
    /// * `SessionHandle` - The replacement, not yet carrying any identity
    pub fn rotate(&self, old: &SessionHandle) -> SessionHandle {
        let fresh = self.create();
        {
            let mut previous = old.lock();
            let mut next = fresh.lock();
            next.ui = previous.ui.clone();
            next.toasts = std::mem::take(&mut previous.toasts);
            previous.auth = None;
        }
        self.remove(old.id());
        fresh
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn expire(&self, id: &str) {
        let sessions = self.sessions.read().unwrap();
        if let Some(s) = sessions.get(id) {
            s.lock().unwrap().expires_at = SystemTime::UNIX_EPOCH;
        }
    }
}

#[cfg(feature = "web")]
pub use self::middleware::{session_cookie, session_layer};

#[cfg(feature = "web")]
mod middleware {
    use super::*;
    use crate::app::AppState;
    use axum::{
        extract::{Request, State},
        http::header,
        middleware::Next,
        response::{IntoResponse, Response},
    };
    use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

    /// Cookie pointing the browser at session `id`
    pub fn session_cookie(id: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }

    fn sets_session_cookie(response: &Response) -> bool {
        let prefix = format!("{SESSION_COOKIE}=");
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.starts_with(&prefix))
    }

    /// Makes sure every request carries a [`SessionHandle`] in its extensions
    pub async fn session_layer(
        State(state): State<Arc<AppState>>,
        jar: CookieJar,
        mut request: Request,
        next: Next,
    ) -> Response {
        let cookie_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
        let (handle, is_new) = state.sessions.get_or_create(cookie_id.as_deref());
        let id = handle.id().to_string();
        request.extensions_mut().insert(handle);

        let response = next.run(request).await;
        // a handler that rotated the session has already pointed the browser elsewhere
        if !is_new || sets_session_cookie(&response) {
            return response;
        }

        (jar.add(session_cookie(id)), response).into_response()
    }
}
