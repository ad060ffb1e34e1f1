//! Page modules.
//!
//! Each page owns a record type, validates input, persists through
//! [`Persistence`] and reports saves to the [`Notifier`]. The router mounts a
//! page's bundle and then hands control to the matching [`PageModule`].
//!
//! Lifecycle per page: uninitialized, `init` (idempotent), then `destroy`,
//! which stops timers, flushes unsaved changes and returns to uninitialized.

pub mod contact;
pub mod home;
pub mod location;
pub mod medical;
pub mod validation;

use chrono::{DateTime, Utc};

use crate::config::TimerConfig;
use crate::error::{Error, Result};
use crate::geolocation::Geolocator;
use crate::net::Geocoder;
use crate::notify::Notifier;
use crate::profile::{ProfilePatch, UserProfile};
use crate::router::Route;
use crate::storage::Persistence;
use crate::tag::TagId;
use crate::timer::{TickSender, TimerKind};
use crate::view::{Toast, ToastLevel};

pub use contact::ContactPage;
pub use home::HomePage;
pub use location::LocationPage;
pub use medical::MedicalPage;

/// Shown when a tag-bound action runs with no tag.
pub const CONNECT_FIRST: &str = "Please connect your pet tracker first";

/// What a page may see and use.
///
/// The shell owns all of this; pages get shared borrows plus a place to
/// queue toasts. Changes to the user record go back as a [`ProfilePatch`].
pub struct PageContext<'a> {
    /// The bound tag.
    pub tag: Option<&'a TagId>,
    /// The current user record.
    pub user: Option<&'a UserProfile>,
    /// Persistent storage.
    pub store: &'a Persistence,
    /// Issue sink.
    pub notifier: &'a Notifier,
    /// Where page timers post ticks.
    pub ticks: &'a TickSender,
    /// Timer intervals.
    pub timers: &'a TimerConfig,
    /// Device position source.
    pub geolocator: &'a dyn Geolocator,
    /// Reverse geocoder.
    pub geocoder: &'a Geocoder,
    /// Toasts raised during this call.
    pub toasts: &'a mut Vec<Toast>,
    /// Wall-clock time for this call.
    pub now: DateTime<Utc>,
}

impl PageContext<'_> {
    /// Queue a toast.
    pub fn toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toasts.push(Toast::new(level, message));
    }

    /// The bound tag, or a warning toast and [`Error::TagRequired`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] when no tag is bound.
    pub fn require_tag(&mut self) -> Result<TagId> {
        if let Some(tag) = self.tag {
            Ok(tag.clone())
        } else {
            self.toast(ToastLevel::Warning, CONNECT_FIRST);
            Err(Error::TagRequired)
        }
    }

    /// The pet's display name.
    #[must_use]
    pub fn pet_name(&self) -> &str {
        self.user.map_or("Pet", UserProfile::display_name)
    }
}

impl std::fmt::Debug for PageContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageContext")
            .field("tag", &self.tag)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

/// The statically linked page implementations, one per route.
#[derive(Debug)]
pub enum PageModule {
    /// Dashboard.
    Home(HomePage),
    /// Contact form.
    Contact(ContactPage),
    /// Location tracking.
    Location(LocationPage),
    /// Medical form.
    Medical(MedicalPage),
}

impl PageModule {
    /// The page module for `route`. The root route shows the dashboard.
    #[must_use]
    pub fn for_route(route: Route) -> Self {
        match route {
            Route::Root | Route::Home => Self::Home(HomePage::new()),
            Route::Contact => Self::Contact(ContactPage::new()),
            Route::Location => Self::Location(LocationPage::new()),
            Route::Medical => Self::Medical(MedicalPage::new()),
        }
    }

    /// Whether `init` has run since the last `destroy`.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        match self {
            Self::Home(page) => page.is_initialized(),
            Self::Contact(page) => page.is_initialized(),
            Self::Location(page) => page.is_initialized(),
            Self::Medical(page) => page.is_initialized(),
        }
    }

    /// Load the page's records and start its timer. Does nothing if already initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn init(&mut self, ctx: &mut PageContext<'_>) -> Result<()> {
        match self {
            Self::Home(page) => page.init(ctx).await,
            Self::Contact(page) => page.init(ctx),
            Self::Location(page) => page.init(ctx),
            Self::Medical(page) => page.init(ctx),
        }
    }

    /// Stop timers and flush unsaved changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush cannot be written.
    pub fn destroy(&mut self, ctx: &mut PageContext<'_>) -> Result<Option<ProfilePatch>> {
        match self {
            Self::Home(page) => {
                page.destroy();
                Ok(None)
            }
            Self::Contact(page) => page.destroy(ctx),
            Self::Location(page) => {
                page.destroy();
                Ok(None)
            }
            Self::Medical(page) => page.destroy(ctx),
        }
    }

    /// Handle a timer tick. Ticks for other pages are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if an auto-save cannot be written.
    pub async fn on_tick(
        &mut self,
        kind: TimerKind,
        ctx: &mut PageContext<'_>,
    ) -> Result<Option<ProfilePatch>> {
        match (self, kind) {
            (Self::Home(page), TimerKind::HomeRefresh) => {
                page.refresh(ctx).await;
                Ok(None)
            }
            (Self::Contact(page), TimerKind::ContactAutosave) => page.auto_save(ctx),
            (Self::Location(page), TimerKind::LocationRefresh) => {
                page.refresh(ctx)?;
                Ok(None)
            }
            (Self::Medical(page), TimerKind::MedicalAutosave) => page.auto_save(ctx),
            _ => Ok(None),
        }
    }
}
