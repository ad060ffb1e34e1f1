//! Route table, bundle cache and authentication gate.
//!
//! The router resolves a route token, refuses tag-bound routes while no tag
//! is connected, loads the page bundle through a path-keyed cache and mounts
//! it into the [`Document`]. Starting the page module itself is left to the
//! shell, which does so only after the bundle is mounted.

pub mod bundle;
pub mod document;

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::net::RetryPolicy;

pub use bundle::{BuiltinBundleSource, BundleSource, DirBundleSource, HttpBundleSource, PageBundle};
pub use document::Document;

/// A navigable page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// `/`, the dashboard.
    Root,
    /// `/home`, the dashboard.
    Home,
    /// `/contact`.
    Contact,
    /// `/location`.
    Location,
    /// `/medical`.
    Medical,
}

/// Static facts about a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteConfig {
    /// Bundle path, e.g. `/pages/home/`.
    pub path: &'static str,
    /// Page title.
    pub title: &'static str,
    /// Navigation icon name.
    pub icon: &'static str,
    /// Needs a connected tag.
    pub requires_auth: bool,
}

impl Route {
    /// Every route, in navigation order.
    pub const ALL: [Self; 5] = [
        Self::Root,
        Self::Home,
        Self::Contact,
        Self::Location,
        Self::Medical,
    ];

    /// Parse a route token such as `/contact`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.token() == token)
    }

    /// Parse a route token, falling back to the root route.
    #[must_use]
    pub fn parse_or_root(token: &str) -> Self {
        Self::parse(token).unwrap_or_else(|| {
            error!(route = token, "Route not found");
            Self::Root
        })
    }

    /// The route token.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::Root => "/",
            Self::Home => "/home",
            Self::Contact => "/contact",
            Self::Location => "/location",
            Self::Medical => "/medical",
        }
    }

    /// The route's static configuration.
    #[must_use]
    pub fn config(self) -> RouteConfig {
        match self {
            Self::Root | Self::Home => RouteConfig {
                path: "/pages/home/",
                title: "Dashboard",
                icon: "home",
                requires_auth: false,
            },
            Self::Contact => RouteConfig {
                path: "/pages/contact/",
                title: "Contact Information",
                icon: "user",
                requires_auth: true,
            },
            Self::Location => RouteConfig {
                path: "/pages/location/",
                title: "Location Tracking",
                icon: "map-pin",
                requires_auth: true,
            },
            Self::Medical => RouteConfig {
                path: "/pages/medical/",
                title: "Medical Information",
                icon: "heart",
                requires_auth: true,
            },
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Every route with its configuration.
#[must_use]
pub fn routes() -> Vec<(Route, RouteConfig)> {
    Route::ALL.into_iter().map(|r| (r, r.config())).collect()
}

/// The route named by a location: the hash token first, then any route
/// name found in the path, else root.
#[must_use]
pub fn initial_route(path: &str, hash: &str) -> Route {
    let hash = hash.trim_start_matches('#');
    if !hash.is_empty() {
        if let Some(route) = Route::parse(&format!("/{hash}")) {
            return route;
        }
    }
    Route::ALL
        .into_iter()
        .filter(|r| *r != Route::Root)
        .find(|r| path.contains(r.token().trim_start_matches('/')))
        .unwrap_or(Route::Root)
}

/// Outcome of a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// The page bundle was mounted.
    Mounted(Route),
    /// The route needs a tag; the tag prompt was mounted instead.
    AuthRequired(Route),
}

/// Client-side router.
pub struct Router {
    source: Box<dyn BundleSource>,
    cache: HashMap<&'static str, PageBundle>,
    current: Option<Route>,
    pending: Option<Route>,
    document: Document,
}

impl Router {
    /// A router loading bundles from `source`.
    #[must_use]
    pub fn new(source: Box<dyn BundleSource>) -> Self {
        Self {
            source,
            cache: HashMap::new(),
            current: None,
            pending: None,
            document: Document::new(),
        }
    }

    /// A router using the bundle source named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL does not parse.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self> {
        let source: Box<dyn BundleSource> = if let Some(base) = &config.router.pages_base_url {
            Box::new(HttpBundleSource::new(
                client,
                base,
                RetryPolicy::from_config(config),
            )?)
        } else if let Some(dir) = &config.router.pages_dir {
            Box::new(DirBundleSource::new(dir))
        } else {
            Box::new(BuiltinBundleSource)
        };
        Ok(Self::new(source))
    }

    /// Navigate to `route`.
    ///
    /// Tag-bound routes with no tag mount the tag prompt and remember the
    /// route for [`Router::take_pending`].
    pub async fn navigate_to(
        &mut self,
        route: Route,
        tag_bound: bool,
        update_history: bool,
    ) -> Navigation {
        let config = route.config();
        if config.requires_auth && !tag_bound {
            info!(%route, "Authentication required");
            self.document.show_auth_required();
            self.pending = Some(route);
            return Navigation::AuthRequired(route);
        }

        let bundle = self.load_page(config.path).await;
        self.document.mount(bundle.html);
        self.document.set_title(config.title);
        self.document.set_active(route);
        self.document.set_style(bundle.css.as_deref());
        if update_history {
            self.document.push_history(route);
        }
        self.current = Some(route);
        self.pending = None;
        debug!(%route, "Navigated");
        Navigation::Mounted(route)
    }

    /// Navigate to a route token; unknown tokens go to root.
    pub async fn navigate_token(&mut self, token: &str, tag_bound: bool) -> Navigation {
        self.navigate_to(Route::parse_or_root(token), tag_bound, true)
            .await
    }

    /// The bundle at `path`, from cache when present. Load failures yield the
    /// not-found bundle, which is not cached.
    async fn load_page(&mut self, path: &'static str) -> PageBundle {
        if let Some(bundle) = self.cache.get(path) {
            debug!(path, "Page bundle served from cache");
            return bundle.clone();
        }
        match self.source.fetch(path).await {
            Ok(bundle) => {
                self.cache.insert(path, bundle.clone());
                bundle
            }
            Err(e) => {
                warn!(path, error = %e, "Failed to load page");
                PageBundle::not_found()
            }
        }
    }

    /// Drop the current route's cached bundle and load it again.
    pub async fn refresh(&mut self, tag_bound: bool) -> Option<Navigation> {
        let route = self.current?;
        self.cache.remove(route.config().path);
        Some(self.navigate_to(route, tag_bound, false).await)
    }

    /// Return to the previous history entry.
    pub async fn back(&mut self, tag_bound: bool) -> Option<Navigation> {
        let previous = self.document.pop_history()?;
        Some(self.navigate_to(previous, tag_bound, false).await)
    }

    /// The route refused for lack of a tag, clearing it.
    pub fn take_pending(&mut self) -> Option<Route> {
        self.pending.take()
    }

    /// Where to go once a tag is entered at the prompt: the refused route,
    /// else the current page, else root.
    pub fn resume_route(&mut self) -> Route {
        self.take_pending().or(self.current).unwrap_or(Route::Root)
    }

    /// The mounted route.
    #[must_use]
    pub fn current(&self) -> Option<Route> {
        self.current
    }

    /// The content region.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Whether the bundle at `path` is cached.
    #[must_use]
    pub fn is_cached(&self, path: &str) -> bool {
        self.cache.contains_key(path)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("current", &self.current)
            .field("pending", &self.pending)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http_router(server: &MockServer) -> Router {
        let policy = RetryPolicy {
            attempts: 1,
            base_delay: Duration::from_millis(1),
        };
        let source =
            HttpBundleSource::new(reqwest::Client::new(), &server.uri(), policy).unwrap();
        Router::new(Box::new(source))
    }

    async fn serve_page(server: &MockServer, page: &str, hits: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/pages/{page}/page.html")))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("<h1>{page}</h1>")))
            .expect(hits)
            .mount(server)
            .await;
    }

    #[test]
    fn test_route_tokens() {
        for route in Route::ALL {
            assert_eq!(Route::parse(route.token()), Some(route));
        }
        assert_eq!(Route::parse("/settings"), None);
        assert_eq!(Route::parse_or_root("/settings"), Route::Root);
        assert!(Route::Medical.config().requires_auth);
        assert!(!Route::Home.config().requires_auth);
        assert_eq!(routes().len(), 5);
    }

    #[test]
    fn test_initial_route() {
        assert_eq!(initial_route("/", "#location"), Route::Location);
        assert_eq!(initial_route("/app/medical", ""), Route::Medical);
        assert_eq!(initial_route("/", "#nowhere"), Route::Root);
        assert_eq!(initial_route("/index.html", ""), Route::Root);
    }

    #[tokio::test]
    async fn test_second_navigation_is_served_from_cache() {
        let server = MockServer::start().await;
        serve_page(&server, "contact", 1).await;
        let mut router = http_router(&server);

        let nav = router.navigate_to(Route::Contact, true, true).await;
        assert_eq!(nav, Navigation::Mounted(Route::Contact));
        router.navigate_to(Route::Contact, true, true).await;

        assert!(router.is_cached("/pages/contact/"));
        assert_eq!(router.document().content(), "<h1>contact</h1>");
        assert_eq!(router.document().title(), "Contact Information - Pet Tracker");
        assert_eq!(router.document().active(), Some(Route::Contact));
    }

    #[tokio::test]
    async fn test_root_and_home_share_a_bundle() {
        let server = MockServer::start().await;
        serve_page(&server, "home", 1).await;
        let mut router = http_router(&server);
        router.navigate_to(Route::Root, false, true).await;
        router.navigate_to(Route::Home, false, true).await;
    }

    #[tokio::test]
    async fn test_refresh_invalidates_cache() {
        let server = MockServer::start().await;
        serve_page(&server, "home", 2).await;
        let mut router = http_router(&server);

        assert!(router.refresh(false).await.is_none());
        router.navigate_to(Route::Home, false, true).await;
        let nav = router.refresh(false).await;
        assert_eq!(nav, Some(Navigation::Mounted(Route::Home)));
        assert_eq!(router.document().history(), &[Route::Home]);
    }

    #[tokio::test]
    async fn test_auth_gate_fetches_nothing() {
        let server = MockServer::start().await;
        serve_page(&server, "medical", 0).await;
        let mut router = http_router(&server);

        let nav = router.navigate_to(Route::Medical, false, true).await;
        assert_eq!(nav, Navigation::AuthRequired(Route::Medical));
        assert!(router.document().content().contains("Authentication Required"));
        assert_eq!(router.current(), None);
        assert_eq!(router.resume_route(), Route::Medical);
        assert_eq!(router.resume_route(), Route::Root);
    }

    #[tokio::test]
    async fn test_failed_load_mounts_not_found_without_caching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let mut router = http_router(&server);

        let nav = router.navigate_to(Route::Location, true, true).await;
        assert_eq!(nav, Navigation::Mounted(Route::Location));
        assert!(router.document().content().contains("Page Not Found"));
        assert!(router.document().style().is_some());
        assert!(!router.is_cached("/pages/location/"));
    }

    #[tokio::test]
    async fn test_unknown_token_goes_home() {
        let mut router = Router::new(Box::new(BuiltinBundleSource));
        let nav = router.navigate_token("/settings", false).await;
        assert_eq!(nav, Navigation::Mounted(Route::Root));
        assert_eq!(router.document().title(), "Dashboard - Pet Tracker");
    }

    #[tokio::test]
    async fn test_back() {
        let mut router = Router::new(Box::new(BuiltinBundleSource));
        router.navigate_to(Route::Home, true, true).await;
        router.navigate_to(Route::Contact, true, true).await;
        router.navigate_to(Route::Medical, true, true).await;

        assert_eq!(router.back(true).await, Some(Navigation::Mounted(Route::Contact)));
        assert_eq!(router.current(), Some(Route::Contact));
        assert_eq!(router.back(true).await, Some(Navigation::Mounted(Route::Home)));
        assert_eq!(router.back(true).await, None);
    }

    #[test]
    fn test_from_config_picks_source() {
        let mut config = Config::default();
        assert!(Router::from_config(&config, reqwest::Client::new()).is_ok());
        config.router.pages_base_url = Some("not a url".to_string());
        assert!(Router::from_config(&config, reqwest::Client::new()).is_err());
    }
}
