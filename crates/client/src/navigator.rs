use std::sync::Mutex;

/// Path and query string of the page the client is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: Option<String>,
}

impl Location {
    /// Parse a local href such as `/fetch?page=2`. A missing leading slash
    /// is added; an empty query string is dropped.
    pub fn parse(href: &str) -> Self {
        let (path, query) = match href.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (href, None),
        };
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Self {
            path,
            query: query.filter(|q| !q.is_empty()).map(String::from),
        }
    }

    /// Path plus `?query` when present.
    pub fn href(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::parse("/")
    }
}

/// Where a 401 sent the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    /// The page the user should come back to after signing in.
    pub return_url: String,
    /// The login URL that was navigated to.
    pub href: String,
}

impl LoginRedirect {
    pub fn for_location(location: &Location) -> Self {
        let return_url = location.href();
        let href = format!("/login?returnUrl={}", urlencoding::encode(&return_url));
        Self { return_url, href }
    }
}

/// Browser-location seam. The fetch wrapper reads the current location to
/// build the return URL and navigates away on a 401.
pub trait Navigator: Send + Sync {
    fn current_location(&self) -> Location;
    fn navigate(&self, href: &str);
}

/// In-memory navigator that records every navigation.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    current: Mutex<Location>,
    navigations: Mutex<Vec<String>>,
}

impl MemoryHistory {
    pub fn at(href: &str) -> Self {
        Self {
            current: Mutex::new(Location::parse(href)),
            navigations: Mutex::new(Vec::new()),
        }
    }

    /// Move to `href` without recording a navigation, like a user following
    /// an in-app link.
    pub fn visit(&self, href: &str) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Location::parse(href);
    }

    /// Every href passed to [`Navigator::navigate`], oldest first.
    pub fn navigations(&self) -> Vec<String> {
        self.navigations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Navigator for MemoryHistory {
    fn current_location(&self) -> Location {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn navigate(&self, href: &str) {
        self.navigations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(href.to_string());
        self.visit(href);
    }
}
