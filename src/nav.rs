use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub label: &'static str,
    pub href: &'static str,
    pub icon: &'static str,
    pub active: bool,
}

const fn item(label: &'static str, href: &'static str, icon: &'static str) -> NavItem {
    NavItem {
        label,
        href,
        icon,
        active: false,
    }
}

const USER_ITEMS: [NavItem; 4] = [
    item("Dashboard", "/dashboard", "📊"),
    item("Upload", "/upload", "⬆"),
    item("Charts", "/charts", "📈"),
    item("Profile", "/profile", "👤"),
];

const ADMIN_ITEMS: [NavItem; 5] = [
    item("Overview", "/admin", "🏠"),
    item("Users", "/admin/users", "👥"),
    item("Files", "/admin/files", "📁"),
    item("Activity", "/admin/activity", "🕒"),
    item("Back to app", "/dashboard", "↩"),
];

/// Which sidebar a page shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavSet {
    User,
    Admin,
}

impl NavSet {
    pub fn for_path(path: &str) -> Self {
        if path == "/admin" || path.starts_with("/admin/") {
            NavSet::Admin
        } else {
            NavSet::User
        }
    }
}

fn matches(href: &str, path: &str) -> bool {
    path == href || (path.starts_with(href) && path[href.len()..].starts_with('/'))
}

/// Navigation items with the longest matching entry marked active
pub fn items(set: NavSet, path: &str) -> Vec<NavItem> {
    let mut items = match set {
        NavSet::User => USER_ITEMS.to_vec(),
        NavSet::Admin => ADMIN_ITEMS.to_vec(),
    };
    let best = items
        .iter()
        .enumerate()
        .filter(|(_, item)| matches(item.href, path))
        .max_by_key(|(_, item)| item.href.len())
        .map(|(i, _)| i);
    if let Some(i) = best {
        items[i].active = true;
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(set: NavSet, path: &str) -> Vec<&'static str> {
        items(set, path).into_iter().filter(|i| i.active).map(|i| i.label).collect()
    }

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(active(NavSet::Admin, "/admin/users/123"), vec!["Users"]);
        assert_eq!(active(NavSet::Admin, "/admin"), vec!["Overview"]);
        assert_eq!(active(NavSet::User, "/dashboard"), vec!["Dashboard"]);
    }

    #[test]
    fn prefix_must_end_on_segment_boundary() {
        assert!(active(NavSet::User, "/uploads-archive").is_empty());
        assert!(active(NavSet::User, "/files/abc").is_empty());
    }

    #[test]
    fn admin_paths_pick_admin_set() {
        assert_eq!(NavSet::for_path("/admin/files"), NavSet::Admin);
        assert_eq!(NavSet::for_path("/administrator"), NavSet::User);
        assert_eq!(NavSet::for_path("/upload"), NavSet::User);
    }
}
