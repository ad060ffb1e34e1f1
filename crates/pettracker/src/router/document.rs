//! The content region the router mounts pages into.

use super::Route;

/// Suffix of every document title.
pub const TITLE_SUFFIX: &str = "Pet Tracker";

/// Shown in place of a tag-bound page when no tag is connected.
pub const AUTH_REQUIRED_HTML: &str = r#"<div class="auth-required">
  <h2>Authentication Required</h2>
  <p>Please scan your pet's NFC tag or enter the tag ID to continue.</p>
  <form class="auth-form">
    <label class="form-label" for="tagId">NFC Tag ID:</label>
    <input type="text" id="tagId" name="tagId" class="form-input" required>
    <button type="submit" class="btn btn-primary">Connect to Pet Tracker</button>
  </form>
</div>"#;

/// Mounted page state: content, the single page style block, title, active
/// navigation entry and history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    content: String,
    style: Option<String>,
    title: String,
    active: Option<Route>,
    history: Vec<Route>,
}

impl Document {
    /// An empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the content region.
    pub fn mount(&mut self, html: impl Into<String>) {
        self.content = html.into();
    }

    /// Replace the page style block. Blank CSS removes it.
    pub fn set_style(&mut self, css: Option<&str>) {
        self.style = css
            .filter(|css| !css.trim().is_empty())
            .map(ToString::to_string);
    }

    /// Set the title to `"<page> - Pet Tracker"`.
    pub fn set_title(&mut self, page_title: &str) {
        self.title = format!("{page_title} - {TITLE_SUFFIX}");
    }

    /// Mark `route` as the active navigation entry.
    pub fn set_active(&mut self, route: Route) {
        self.active = Some(route);
    }

    /// Record a navigation.
    pub fn push_history(&mut self, route: Route) {
        self.history.push(route);
    }

    /// Drop the newest history entry and return the one before it.
    pub fn pop_history(&mut self) -> Option<Route> {
        if self.history.len() < 2 {
            return None;
        }
        self.history.pop();
        self.history.last().copied()
    }

    /// Show the tag prompt.
    pub fn show_auth_required(&mut self) {
        self.mount(AUTH_REQUIRED_HTML);
    }

    /// Mounted HTML.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The page style block, if any.
    #[must_use]
    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    /// Document title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Active navigation entry.
    #[must_use]
    pub fn active(&self) -> Option<Route> {
        self.active
    }

    /// Navigation history, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Route] {
        &self.history
    }
}
