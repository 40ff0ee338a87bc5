use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref NUMERIC_ID: Regex = Regex::new(r"^[0-9]+$").unwrap();
    static ref OBJECT_ID: Regex = Regex::new(r"^[0-9a-fA-F]{24}$").unwrap();
    static ref UUID_ID: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    )
    .unwrap();
    static ref TOKEN_ID: Regex = Regex::new(r"^[A-Za-z0-9_-]{16,}$").unwrap();
}

/// Label used for path segments that look like record identifiers
pub const DETAILS_LABEL: &str = "Details";

/// One step of the navigation trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crumb {
    pub label: String,
    pub url: String,
    pub current: bool,
}

fn known_label(segment: &str) -> Option<&'static str> {
    match segment {
        "admin" => Some("Admin"),
        "users" => Some("Users"),
        "files" => Some("Files"),
        "activity" => Some("Activity Log"),
        "dashboard" => Some("Dashboard"),
        "upload" => Some("Upload"),
        "charts" => Some("Charts"),
        "profile" => Some("Profile"),
        "settings" => Some("Settings"),
        _ => None,
    }
}

/// 24-digit hex record id as issued by the backend
pub fn is_object_id(segment: &str) -> bool {
    OBJECT_ID.is_match(segment)
}

/// Whether a path segment is an opaque record identifier rather than a page name
pub fn looks_like_id(segment: &str) -> bool {
    NUMERIC_ID.is_match(segment)
        || OBJECT_ID.is_match(segment)
        || UUID_ID.is_match(segment)
        || (TOKEN_ID.is_match(segment) && segment.chars().any(|c| c.is_ascii_digit()))
}

fn humanize(segment: &str) -> String {
    segment
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the breadcrumb trail for a request path.
///
/// The trail always starts at Home. Query strings and fragments are ignored.
///
/// # Arguments
/// * `path` - Request path, e.g. `/admin/users/64b7f0000000000000000001`
///
/// # Returns
/// * `Vec<Crumb>` - Home followed by one crumb per segment, the last flagged as current
pub fn build(path: &str) -> Vec<Crumb> {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let mut crumbs = Vec::with_capacity(segments.len() + 1);
    crumbs.push(Crumb {
        label: "Home".to_string(),
        url: "/".to_string(),
        current: segments.is_empty(),
    });

    let mut url = String::new();
    for (i, segment) in segments.iter().enumerate() {
        url.push('/');
        url.push_str(segment);

        let decoded = urldecode(segment);
        let label = match known_label(&decoded) {
            Some(label) => label.to_string(),
            None if looks_like_id(&decoded) => DETAILS_LABEL.to_string(),
            None => humanize(&decoded),
        };

        crumbs.push(Crumb {
            label,
            url: url.clone(),
            current: i == segments.len() - 1,
        });
    }

    crumbs
}

#[cfg(feature = "web")]
fn urldecode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

#[cfg(not(feature = "web"))]
fn urldecode(segment: &str) -> String {
    segment.to_string()
}
