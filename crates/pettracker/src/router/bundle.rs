//! Page bundle sources.
//!
//! A bundle is the page's HTML fragment plus optional CSS, found at
//! `<path>page.html` and `<path>page.css`. Only the HTML is required.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::net::{fetch_with_retry, RetryPolicy};

const NOT_FOUND_HTML: &str = r#"<div class="error-page">
  <div class="error-content">
    <h1>Page Not Found</h1>
    <p>The requested page could not be loaded.</p>
    <a class="btn btn-primary" data-route="/">Go Home</a>
  </div>
</div>"#;

const NOT_FOUND_CSS: &str = ".error-page {
  display: flex;
  justify-content: center;
  align-items: center;
  min-height: 60vh;
  text-align: center;
}";

/// A loaded page bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBundle {
    /// HTML fragment.
    pub html: String,
    /// Page CSS, if the bundle has one.
    pub css: Option<String>,
}

impl PageBundle {
    /// The fixed fragment shown when a bundle cannot be loaded.
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            html: NOT_FOUND_HTML.to_string(),
            css: Some(NOT_FOUND_CSS.to_string()),
        }
    }

    /// Whether this is the not-found fragment.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.html == NOT_FOUND_HTML
    }
}

/// Where page bundles come from.
#[async_trait]
pub trait BundleSource: Send + Sync {
    /// Load the bundle under `path`, e.g. `/pages/home/`.
    async fn fetch(&self, path: &str) -> Result<PageBundle>;
}

/// Bundles read from a directory tree.
#[derive(Debug, Clone)]
pub struct DirBundleSource {
    root: PathBuf,
}

impl DirBundleSource {
    /// Serve bundles below `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file(&self, path: &str, name: &str) -> PathBuf {
        self.root.join(path.trim_matches('/')).join(name)
    }
}

#[async_trait]
impl BundleSource for DirBundleSource {
    async fn fetch(&self, path: &str) -> Result<PageBundle> {
        let html_path = self.file(path, "page.html");
        let html = tokio::fs::read_to_string(&html_path)
            .await
            .map_err(|e| Error::bundle_load(path, format!("{}: {e}", html_path.display())))?;

        let css = match tokio::fs::read_to_string(self.file(path, "page.css")).await {
            Ok(css) => Some(css),
            Err(e) => {
                debug!(path, error = %e, "No custom CSS for page");
                None
            }
        };
        Ok(PageBundle { html, css })
    }
}

/// Bundles fetched over HTTP. The HTML goes through the retrying fetch.
#[derive(Debug, Clone)]
pub struct HttpBundleSource {
    client: reqwest::Client,
    base_url: url::Url,
    policy: RetryPolicy,
}

impl HttpBundleSource {
    /// Serve bundles relative to `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `base_url` does not parse.
    pub fn new(client: reqwest::Client, base_url: &str, policy: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client,
            base_url: url::Url::parse(base_url)?,
            policy,
        })
    }

    fn url(&self, path: &str, name: &str) -> Result<url::Url> {
        let relative = format!("{}/{name}", path.trim_matches('/'));
        Ok(self.base_url.join(&relative)?)
    }
}

#[async_trait]
impl BundleSource for HttpBundleSource {
    async fn fetch(&self, path: &str) -> Result<PageBundle> {
        let html_url = self.url(path, "page.html")?;
        let html = fetch_with_retry(&self.client, html_url.as_str(), self.policy)
            .await?
            .text()
            .await?;

        let css_url = self.url(path, "page.css")?;
        let css = match self.client.get(css_url).send().await {
            Ok(response) if response.status().is_success() => response.text().await.ok(),
            _ => {
                debug!(path, "No custom CSS for page");
                None
            }
        };
        Ok(PageBundle { html, css })
    }
}

/// Minimal bundles compiled in, used when no bundle location is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinBundleSource;

#[async_trait]
impl BundleSource for BuiltinBundleSource {
    async fn fetch(&self, path: &str) -> Result<PageBundle> {
        let name = path
            .trim_matches('/')
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::bundle_load(path, "no such page"))?;
        Ok(PageBundle {
            html: format!(r#"<section class="page" data-page="{name}"></section>"#),
            css: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_dir_source_reads_html_and_optional_css() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("pages/home");
        std::fs::create_dir_all(&home).unwrap();
        std::fs::write(home.join("page.html"), "<h1>Home</h1>").unwrap();

        let source = DirBundleSource::new(dir.path());
        let bundle = source.fetch("/pages/home/").await.unwrap();
        assert_eq!(bundle.html, "<h1>Home</h1>");
        assert_eq!(bundle.css, None);

        std::fs::write(home.join("page.css"), "h1 { margin: 0; }").unwrap();
        let bundle = source.fetch("/pages/home/").await.unwrap();
        assert_eq!(bundle.css.as_deref(), Some("h1 { margin: 0; }"));
    }

    #[tokio::test]
    async fn test_dir_source_missing_html_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirBundleSource::new(dir.path());
        let err = source.fetch("/pages/medical/").await.unwrap_err();
        assert!(matches!(err, Error::BundleLoad { .. }));
    }

    #[tokio::test]
    async fn test_http_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app/pages/contact/page.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/app/pages/contact/page.css"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let base = format!("{}/app/", server.uri());
        let source =
            HttpBundleSource::new(reqwest::Client::new(), &base, RetryPolicy::default()).unwrap();
        let bundle = source.fetch("/pages/contact/").await.unwrap();
        assert_eq!(bundle.html, "<form></form>");
        assert_eq!(bundle.css, None);
    }

    #[tokio::test]
    async fn test_builtin_source() {
        let bundle = BuiltinBundleSource.fetch("/pages/location/").await.unwrap();
        assert!(bundle.html.contains(r#"data-page="location""#));
        assert!(BuiltinBundleSource.fetch("/").await.is_err());
    }

    #[test]
    fn test_not_found_bundle() {
        let bundle = PageBundle::not_found();
        assert!(bundle.is_not_found());
        assert!(bundle.html.contains("Page Not Found"));
        assert!(bundle.css.is_some());
    }
}
