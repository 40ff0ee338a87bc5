use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key under which the theme preference is persisted
pub const THEME_KEY: &str = "theme";

/// Light or dark display preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }

    /// Parses a persisted value. Anything other than `light`/`dark` is ignored.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(ThemeMode::Light),
            "dark" => Some(ThemeMode::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }

    pub fn is_dark(self) -> bool {
        self == ThemeMode::Dark
    }

    /// Style lookup table for this mode
    pub fn palette(self) -> Palette {
        match self {
            ThemeMode::Light => Palette {
                background: "#f8fafc",
                surface: "#ffffff",
                text: "#0f172a",
                muted_text: "#64748b",
                border: "#e2e8f0",
                primary: "#2563eb",
                primary_text: "#ffffff",
                accent: "#10b981",
                danger: "#dc2626",
                success: "#16a34a",
                chart: [
                    "#2563eb", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6", "#06b6d4",
                ],
            },
            ThemeMode::Dark => Palette {
                background: "#0f172a",
                surface: "#1e293b",
                text: "#f1f5f9",
                muted_text: "#94a3b8",
                border: "#334155",
                primary: "#3b82f6",
                primary_text: "#ffffff",
                accent: "#34d399",
                danger: "#f87171",
                success: "#4ade80",
                chart: [
                    "#60a5fa", "#34d399", "#fbbf24", "#f87171", "#a78bfa", "#22d3ee",
                ],
            },
        }
    }
}

/// Semantic colours for one theme mode.
///
/// Templates consume this through [`Palette::entries`], which flattens it into
/// CSS custom property names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub background: &'static str,
    pub surface: &'static str,
    pub text: &'static str,
    pub muted_text: &'static str,
    pub border: &'static str,
    pub primary: &'static str,
    pub primary_text: &'static str,
    pub accent: &'static str,
    pub danger: &'static str,
    pub success: &'static str,
    pub chart: [&'static str; 6],
}

impl Palette {
    /// Flat `(key, colour)` pairs, chart colours included as `chart-1`..`chart-6`
    pub fn entries(&self) -> Vec<(String, &'static str)> {
        let mut entries = vec![
            ("background".to_string(), self.background),
            ("surface".to_string(), self.surface),
            ("text".to_string(), self.text),
            ("muted-text".to_string(), self.muted_text),
            ("border".to_string(), self.border),
            ("primary".to_string(), self.primary),
            ("primary-text".to_string(), self.primary_text),
            ("accent".to_string(), self.accent),
            ("danger".to_string(), self.danger),
            ("success".to_string(), self.success),
        ];
        for (i, colour) in self.chart.iter().enumerate() {
            entries.push((format!("chart-{}", i + 1), *colour));
        }
        entries
    }

    /// Chart colour for series `i`, cycling through the palette
    pub fn chart_color(&self, i: usize) -> &'static str {
        self.chart[i % self.chart.len()]
    }
}

/// Picks the starting mode: a valid persisted preference wins, then the OS
/// preference, then light.
pub fn resolve_mode(persisted: Option<&str>, prefers_dark: bool) -> ThemeMode {
    match persisted.and_then(ThemeMode::parse) {
        Some(mode) => mode,
        None if prefers_dark => ThemeMode::Dark,
        None => ThemeMode::Light,
    }
}

/// Somewhere a preference can be read from and written back to
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// In-process preference map
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    values: HashMap<String, String>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

/// Active theme plus the persistence contract around it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeState {
    pub mode: ThemeMode,
}

impl ThemeState {
    pub fn init(store: &impl PreferenceStore, prefers_dark: bool) -> Self {
        let persisted = store.get(THEME_KEY);
        ThemeState {
            mode: resolve_mode(persisted.as_deref(), prefers_dark),
        }
    }

    /// Flips the mode and persists it
    pub fn toggle(&mut self, store: &mut impl PreferenceStore) -> ThemeMode {
        self.set(self.mode.toggled(), store)
    }

    pub fn set(&mut self, mode: ThemeMode, store: &mut impl PreferenceStore) -> ThemeMode {
        self.mode = mode;
        store.set(THEME_KEY, mode.as_str());
        mode
    }

    pub fn palette(&self) -> Palette {
        self.mode.palette()
    }

    /// Class applied to `<body>`; empty in light mode
    pub fn body_class(&self) -> &'static str {
        if self.mode.is_dark() { "dark" } else { "" }
    }
}

#[cfg(feature = "web")]
pub use self::cookie_store::{CookiePreferences, prefers_dark_scheme};

#[cfg(feature = "web")]
mod cookie_store {
    use super::PreferenceStore;
    use axum::http::HeaderMap;
    use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
    use time::Duration;

    const ONE_YEAR_DAYS: i64 = 365;

    /// Preference store backed by long-lived browser cookies
    pub struct CookiePreferences {
        jar: CookieJar,
    }

    impl CookiePreferences {
        pub fn new(jar: CookieJar) -> Self {
            Self { jar }
        }

        pub fn into_jar(self) -> CookieJar {
            self.jar
        }
    }

    impl PreferenceStore for CookiePreferences {
        fn get(&self, key: &str) -> Option<String> {
            self.jar.get(key).map(|c| c.value().to_string())
        }

        fn set(&mut self, key: &str, value: &str) {
            let cookie = Cookie::build((key.to_string(), value.to_string()))
                .path("/")
                .same_site(SameSite::Lax)
                .max_age(Duration::days(ONE_YEAR_DAYS))
                .build();
            self.jar = self.jar.clone().add(cookie);
        }
    }

    /// Reads the `Sec-CH-Prefers-Color-Scheme` client hint
    pub fn prefers_dark_scheme(headers: &HeaderMap) -> bool {
        headers
            .get("sec-ch-prefers-color-scheme")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').eq_ignore_ascii_case("dark"))
            .unwrap_or(false)
    }
}
