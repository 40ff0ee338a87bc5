use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use excel_analytics::api::{
    ActivityEntry, AdminStats, AnalyticsApi, ApiError, FileDetail, FileRecord, LoginResponse,
    MemoryApi, ProfileUpdate, User, UserRole, UserStatus,
};
use excel_analytics::app::{AppState, router};
use excel_analytics::config::AppConfig;
use excel_analytics::upload::MALFORMED_RESPONSE;

const BOUNDARY: &str = "excel-analytics-test-boundary";

struct Page {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Page {
    fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }

    fn set_cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|c| c.starts_with(&format!("{name}=")))
            .map(str::to_string)
    }
}

/// Router plus a cookie jar, so consecutive requests share one browser session
struct Browser {
    app: Router,
    cookies: HashMap<String, String>,
    _static_dir: TempDir,
}

impl Browser {
    fn new(api: Arc<dyn AnalyticsApi>) -> Self {
        Self::with_config(api, |_| {})
    }

    fn with_config(api: Arc<dyn AnalyticsApi>, tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("app.css"), "body { margin: 0; }").unwrap();

        let mut config = AppConfig {
            static_dir: static_dir.path().to_string_lossy().into_owned(),
            ..AppConfig::default()
        };
        tweak(&mut config);

        let state = Arc::new(AppState::new(config, api).unwrap());
        Browser {
            app: router(state),
            cookies: HashMap::new(),
            _static_dir: static_dir,
        }
    }

    async fn send(&mut self, mut request: Request<Body>) -> Page {
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            request.headers_mut().insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        for value in headers.get_all(header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap();
            if let Some((name, value)) = pair.split_once('=') {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        Page {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    async fn get(&mut self, uri: &str) -> Page {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_form(&mut self, uri: &str, form: &str) -> Page {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn upload(&mut self, filename: &str, data: &[u8]) -> Page {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::post("/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn login(&mut self, email: &str, password: &str) -> Page {
        let form = format!("email={}&password={}", urlencoding::encode(email), password);
        self.post_form("/login", &form).await
    }
}

fn seeded() -> (Arc<MemoryApi>, Arc<dyn AnalyticsApi>) {
    let api = Arc::new(MemoryApi::seeded());
    let shared: Arc<dyn AnalyticsApi> = api.clone();
    (api, shared)
}

#[tokio::test]
async fn landing_page_sets_session_and_honours_carousel_index() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);

    let page = browser.get("/?t=2").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.set_cookie("session").is_some());
    assert!(page.body.contains("Elena Rossi"));
    assert!(page.body.contains(r#"href="/?t=3" data-carousel-step="1""#));
    assert!(page.body.contains(r#"href="/?t=1" data-carousel-step="-1""#));
    assert!(page.body.contains(r#"data-interval="5""#));

    // the session cookie is only issued once
    let again = browser.get("/").await;
    assert!(again.set_cookie("session").is_none());
}

#[tokio::test]
async fn protected_pages_redirect_to_login_with_toast() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);

    let page = browser.get("/dashboard").await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location(), Some("/login?return_to=%2Fdashboard"));

    let login = browser.get("/login?return_to=%2Fdashboard").await;
    assert!(login.body.contains("Please sign in to continue"));
    assert!(login.body.contains(r#"name="return_to" value="/dashboard""#));
}

#[tokio::test]
async fn login_then_dashboard_lists_own_files() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);

    let page = browser.login("jane@excelanalytics.dev", "user123").await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location(), Some("/dashboard"));

    let dashboard = browser.get("/dashboard").await;
    assert_eq!(dashboard.status, StatusCode::OK);
    assert!(dashboard.body.contains("Welcome back, Jane Cooper"));
    assert!(dashboard.body.contains("monthly-sales.csv"));
    assert!(dashboard.body.contains(r#"aria-current="page">Dashboard<"#));
}

#[tokio::test]
async fn login_issues_a_new_session_id() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);

    let landing = browser.get("/").await;
    let before = landing.set_cookie("session").unwrap();
    let before_id = before.split(';').next().unwrap().to_string();

    let page = browser.login("jane@excelanalytics.dev", "user123").await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    let after = page.set_cookie("session").unwrap();
    let after_id = after.split(';').next().unwrap().to_string();
    assert_ne!(before_id, after_id);

    // the pre-login id is gone, the new one is signed in
    let stale = Request::get("/dashboard")
        .header(header::COOKIE, before_id.as_str())
        .body(Body::empty())
        .unwrap();
    let stale = browser.app.clone().oneshot(stale).await.unwrap();
    assert_eq!(stale.status(), StatusCode::SEE_OTHER);

    let dashboard = browser.get("/dashboard").await;
    assert_eq!(dashboard.status, StatusCode::OK);
    assert!(dashboard.body.contains("Welcome back, Jane Cooper"));
}

#[tokio::test]
async fn first_request_being_a_login_sets_one_session_cookie() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);

    let page = browser.login("jane@excelanalytics.dev", "user123").await;
    let cookies: Vec<_> = page
        .headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| v.starts_with("session="))
        .collect();
    assert_eq!(cookies.len(), 1);
    assert_eq!(browser.get("/dashboard").await.status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_rerenders_login_with_error() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);

    let page = browser.login("jane@excelanalytics.dev", "nope").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Invalid email or password"));
    assert!(page.body.contains(r#"value="jane@excelanalytics.dev""#));
}

#[tokio::test]
async fn upload_with_identifier_navigates_to_file_detail() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);
    browser.login("jane@excelanalytics.dev", "user123").await;

    let csv = b"Region,Q1,Q2\nNorth,10,14\nSouth,8,9\nEast,12,15\n";
    let page = browser.upload("regions.csv", csv).await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    let location = page.location().unwrap().to_string();
    assert!(location.starts_with("/files/"));

    let detail = browser.get(&location).await;
    assert_eq!(detail.status, StatusCode::OK);
    assert!(detail.body.contains("regions.csv uploaded"));
    assert!(detail.body.contains("<svg"));
    assert!(detail.body.contains("North"));
    assert!(detail.body.contains(r#"aria-current="page">Details<"#));

    let bar = browser.get(&format!("{location}?kind=bar&x=Region&y=Q2")).await;
    assert!(bar.body.contains(r#"<option value="bar" selected>"#));
}

#[tokio::test]
async fn workbook_upload_gets_preview_and_chart() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);
    browser.login("jane@excelanalytics.dev", "user123").await;

    let page = browser.upload("quarterly.xlsx", include_bytes!("fixtures/quarterly.xlsx")).await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    let location = page.location().unwrap().to_string();

    let detail = browser.get(&location).await;
    assert_eq!(detail.status, StatusCode::OK);
    assert!(detail.body.contains("<svg"));
    assert!(detail.body.contains("Q4"));
    assert!(detail.body.contains("170.5"));
}

#[tokio::test]
async fn oversize_upload_is_rejected_regardless_of_extension() {
    let (_, api) = seeded();
    let mut browser = Browser::with_config(api, |config| config.max_upload_mb = 1);
    browser.login("jane@excelanalytics.dev", "user123").await;

    let data = vec![b'a'; 1024 * 1024 + 1];
    for name in ["huge.csv", "huge.pdf"] {
        let page = browser.upload(name, &data).await;
        assert_eq!(page.status, StatusCode::OK, "{name}");
        assert!(page.location().is_none());
        assert!(page.body.contains("File size exceeds 1MB limit"), "{name}");
    }
}

#[tokio::test]
async fn upload_several_times_the_limit_still_reports_size_inline() {
    let (api, shared) = seeded();
    let mut browser = Browser::with_config(shared, |config| config.max_upload_mb = 1);
    browser.login("jane@excelanalytics.dev", "user123").await;
    let before = api.file_ids().len();

    let data = vec![b'7'; 3 * 1024 * 1024];
    let page = browser.upload("big.csv", &data).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.location().is_none());
    assert!(page.body.contains("File size exceeds 1MB limit"));
    assert!(page.body.contains("big.csv"));
    assert!(!page.body.contains("Malformed upload"));
    assert_eq!(api.file_ids().len(), before);
}

#[tokio::test]
async fn wrong_extension_is_rejected() {
    let (api, shared) = seeded();
    let mut browser = Browser::new(shared);
    browser.login("jane@excelanalytics.dev", "user123").await;
    let before = api.file_ids().len();

    let page = browser.upload("notes.txt", b"hello").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Invalid file type. Accepted types: .xlsx, .xls, .csv"));
    assert_eq!(api.file_ids().len(), before);
}

/// Backend whose upload endpoint answers without a file identifier
struct NoIdUpload(MemoryApi);

#[async_trait]
impl AnalyticsApi for NoIdUpload {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.0.login(email, password).await
    }
    async fn current_user(&self, token: &str) -> Result<User, ApiError> {
        self.0.current_user(token).await
    }
    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> Result<User, ApiError> {
        self.0.update_profile(token, update).await
    }
    async fn upload_file(&self, _token: &str, _filename: &str, _data: Vec<u8>) -> Result<Value, ApiError> {
        Ok(json!({ "message": "File uploaded successfully" }))
    }
    async fn list_files(&self, token: &str) -> Result<Vec<FileRecord>, ApiError> {
        self.0.list_files(token).await
    }
    async fn get_file(&self, token: &str, id: &str) -> Result<FileDetail, ApiError> {
        self.0.get_file(token, id).await
    }
    async fn delete_file(&self, token: &str, id: &str) -> Result<(), ApiError> {
        self.0.delete_file(token, id).await
    }
    async fn admin_stats(&self, token: &str) -> Result<AdminStats, ApiError> {
        self.0.admin_stats(token).await
    }
    async fn list_users(&self, token: &str) -> Result<Vec<User>, ApiError> {
        self.0.list_users(token).await
    }
    async fn get_user(&self, token: &str, id: &str) -> Result<User, ApiError> {
        self.0.get_user(token, id).await
    }
    async fn set_user_role(&self, token: &str, id: &str, role: UserRole) -> Result<User, ApiError> {
        self.0.set_user_role(token, id, role).await
    }
    async fn set_user_status(&self, token: &str, id: &str, status: UserStatus) -> Result<User, ApiError> {
        self.0.set_user_status(token, id, status).await
    }
    async fn delete_user(&self, token: &str, id: &str) -> Result<(), ApiError> {
        self.0.delete_user(token, id).await
    }
    async fn list_all_files(&self, token: &str) -> Result<Vec<FileRecord>, ApiError> {
        self.0.list_all_files(token).await
    }
    async fn admin_delete_file(&self, token: &str, id: &str) -> Result<(), ApiError> {
        self.0.admin_delete_file(token, id).await
    }
    async fn list_activity(&self, token: &str) -> Result<Vec<ActivityEntry>, ApiError> {
        self.0.list_activity(token).await
    }
}

#[tokio::test]
async fn upload_response_without_identifier_reports_error_and_stays() {
    let mut browser = Browser::new(Arc::new(NoIdUpload(MemoryApi::seeded())));
    browser.login("jane@excelanalytics.dev", "user123").await;

    let page = browser.upload("sales.csv", b"a,b\n1,2\n").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.location().is_none());
    assert!(page.body.contains(MALFORMED_RESPONSE));
    assert!(page.body.contains("sales.csv"));
}

#[tokio::test]
async fn theme_toggle_twice_restores_cookie_value() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);

    let first = browser.post_form("/theme/toggle", "return_to=%2Fcharts").await;
    assert_eq!(first.status, StatusCode::SEE_OTHER);
    assert_eq!(first.location(), Some("/charts"));
    assert!(first.set_cookie("theme").unwrap().starts_with("theme=dark"));
    assert!(browser.get("/charts").await.body.contains(r#"data-theme="dark""#));

    let second = browser.post_form("/theme/toggle", "return_to=%2Fcharts").await;
    assert!(second.set_cookie("theme").unwrap().starts_with("theme=light"));
    let page = browser.get("/").await;
    assert!(page.body.contains(r#"data-theme="light""#));
    assert!(!page.body.contains(r#"<body class="dark"#));
}

#[tokio::test]
async fn os_dark_preference_applies_until_a_choice_is_saved() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);

    let request = Request::get("/")
        .header("sec-ch-prefers-color-scheme", "\"dark\"")
        .body(Body::empty())
        .unwrap();
    let page = browser.send(request).await;
    assert!(page.body.contains(r#"data-theme="dark""#));
    assert!(page.set_cookie("theme").is_none());
}

#[tokio::test]
async fn form_redirects_stay_on_site() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);

    let page = browser.post_form("/ui/sidebar", "return_to=https%3A%2F%2Fevil.test%2F").await;
    assert_eq!(page.location(), Some("/"));
    let page = browser.post_form("/theme/toggle", "return_to=%2F%2Fevil.test").await;
    assert_eq!(page.location(), Some("/"));
}

#[tokio::test]
async fn sidebar_toggle_is_remembered_per_session() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);
    browser.login("jane@excelanalytics.dev", "user123").await;

    assert!(browser.get("/dashboard").await.body.contains("sidebar-open"));
    browser.post_form("/ui/sidebar", "return_to=%2Fdashboard").await;
    let page = browser.get("/dashboard").await;
    assert!(!page.body.contains("sidebar-open"));
    assert!(!page.body.contains(r#"<aside class="sidebar">"#));
}

#[tokio::test]
async fn non_admin_is_sent_back_to_dashboard() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);
    browser.login("jane@excelanalytics.dev", "user123").await;

    let page = browser.get("/admin/users").await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location(), Some("/dashboard"));
    assert!(browser.get("/dashboard").await.body.contains("Administrator access required"));
}

#[tokio::test]
async fn malformed_user_id_redirects_with_toast() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);
    browser.login("admin@excelanalytics.dev", "admin123").await;

    let page = browser.get("/admin/users/123").await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location(), Some("/admin/users"));

    let users = browser.get("/admin/users").await;
    assert!(users.body.contains("Invalid user ID"));
    assert!(users.body.contains("Jane Cooper"));
}

#[tokio::test]
async fn user_detail_shows_details_crumb_and_role_toggle() {
    let (api, shared) = seeded();
    let mut browser = Browser::new(shared);
    browser.login("admin@excelanalytics.dev", "admin123").await;
    let jane = api.user_by_email("jane@excelanalytics.dev").unwrap();

    let detail = browser.get(&format!("/admin/users/{}", jane.id)).await;
    assert_eq!(detail.status, StatusCode::OK);
    assert!(detail.body.contains(r#"aria-current="page">Details<"#));
    assert!(detail.body.contains("Make admin"));

    let page = browser.post_form(&format!("/admin/users/{}/role", jane.id), "").await;
    assert_eq!(page.location(), Some(format!("/admin/users/{}", jane.id).as_str()));
    assert_eq!(api.user_by_email("jane@excelanalytics.dev").unwrap().role, UserRole::Admin);
    assert!(browser.get(&format!("/admin/users/{}", jane.id)).await.body.contains("Jane Cooper is now admin"));
}

#[tokio::test]
async fn admin_cannot_delete_or_demote_themselves() {
    let (api, shared) = seeded();
    let mut browser = Browser::new(shared);
    browser.login("admin@excelanalytics.dev", "admin123").await;
    let admin = api.user_by_email("admin@excelanalytics.dev").unwrap();

    browser.post_form(&format!("/admin/users/{}/delete", admin.id), "").await;
    let page = browser.get(&format!("/admin/users/{}", admin.id)).await;
    assert!(page.body.contains("You cannot delete your own account"));

    browser.post_form(&format!("/admin/users/{}/role", admin.id), "").await;
    assert_eq!(api.user_by_email("admin@excelanalytics.dev").unwrap().role, UserRole::Admin);
}

#[tokio::test]
async fn delete_user_goes_through_confirmation_modal() {
    let (api, shared) = seeded();
    let mut browser = Browser::new(shared);
    browser.login("admin@excelanalytics.dev", "admin123").await;
    let ravi = api.user_by_email("ravi@excelanalytics.dev").unwrap();

    let page = browser
        .post_form(&format!("/admin/users/{}/confirm-delete", ravi.id), "return_to=%2Fadmin%2Fusers")
        .await;
    assert_eq!(page.location(), Some("/admin/users"));
    let users = browser.get("/admin/users").await;
    assert!(users.body.contains(r#"role="dialog""#));
    assert!(users.body.contains(&format!(r#"action="/admin/users/{}/delete""#, ravi.id)));

    let page = browser.post_form(&format!("/admin/users/{}/delete", ravi.id), "").await;
    assert_eq!(page.location(), Some("/admin/users"));
    let users = browser.get("/admin/users").await;
    assert!(users.body.contains("User deleted"));
    assert!(!users.body.contains("Ravi Patel"));
    assert!(!users.body.contains(r#"role="dialog""#));
}

#[tokio::test]
async fn admin_overview_files_and_activity_render() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);
    browser.login("admin@excelanalytics.dev", "admin123").await;

    let overview = browser.get("/admin").await;
    assert_eq!(overview.status, StatusCode::OK);
    assert!(overview.body.contains("Recent activity"));

    let files = browser.get("/admin/files").await;
    assert!(files.body.contains("monthly-sales.csv"));
    assert!(files.body.contains("Jane Cooper"));

    let activity = browser.get("/admin/activity").await;
    assert!(activity.body.contains("Activity Log"));
    assert!(activity.body.contains("login"));
}

#[tokio::test]
async fn user_search_filters_the_list() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);
    browser.login("admin@excelanalytics.dev", "admin123").await;

    let page = browser.get("/admin/users?q=patel").await;
    assert!(page.body.contains("Ravi Patel"));
    assert!(!page.body.contains("Jane Cooper"));
}

#[tokio::test]
async fn deactivated_session_is_signed_out() {
    let (api, shared) = seeded();
    let mut jane = Browser::new(shared.clone());
    jane.login("jane@excelanalytics.dev", "user123").await;

    let jane_id = api.user_by_email("jane@excelanalytics.dev").unwrap().id;
    let admin_token = api.token_for("admin@excelanalytics.dev").unwrap();
    shared.set_user_status(&admin_token, &jane_id, UserStatus::Inactive).await.unwrap();

    let page = jane.get("/dashboard").await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert!(page.location().unwrap().starts_with("/login"));
}

#[tokio::test]
async fn profile_update_changes_navbar_name() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);
    browser.login("jane@excelanalytics.dev", "user123").await;

    let page = browser
        .post_form("/profile", "name=Jane+Doe&email=jane%40excelanalytics.dev")
        .await;
    assert_eq!(page.location(), Some("/profile"));
    let profile = browser.get("/profile").await;
    assert!(profile.body.contains("Profile updated"));
    assert!(profile.body.contains(r#"value="Jane Doe""#));
}

#[tokio::test]
async fn static_files_and_unknown_routes() {
    let (_, api) = seeded();
    let mut browser = Browser::new(api);

    let css = browser.get("/static/app.css").await;
    assert_eq!(css.status, StatusCode::OK);
    assert!(css.body.contains("margin"));
    assert!(css.set_cookie("session").is_none());

    let missing = browser.get("/no/such/page").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert!(missing.body.contains("Page not found"));
    assert!(missing.set_cookie("session").is_none());

    // pages still get one
    assert!(browser.get("/").await.set_cookie("session").is_some());
}
