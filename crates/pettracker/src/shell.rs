//! The application shell.
//!
//! [`App`] is the single owner of global state: the bound tag, the user
//! profile, storage, the router and the active page. Hardware events, bridge
//! messages, timer ticks and user actions all arrive here and are applied one
//! at a time, so a page's auto-save and an explicit save never interleave.

use chrono::Utc;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{Config, TimerConfig};
use crate::error::{Error, Result};
use crate::geolocation::{FixedGeolocator, Geolocator};
use crate::identity::{AuthUser, CallbackFailure, CallbackParams, Identity, IdentityProvider, PatreonProvider};
use crate::net::Geocoder;
use crate::notify::Notifier;
use crate::pages::home::{self, Emergency};
use crate::pages::location::{self, LocationSource, LocationState, LocationUpdate};
use crate::pages::{PageContext, PageModule};
use crate::profile::{ProfilePatch, UserProfile};
use crate::router::{initial_route, Navigation, Route, Router};
use crate::storage::{MemoryStore, Persistence, SqliteStore, StorageKey};
use crate::tag::TagId;
use crate::timer::{self, Tick, TickReceiver, TickSender};
use crate::view::{self, Toast, ToastLevel};

/// Shown when a manually entered tag id is rejected.
pub const INVALID_TAG_MESSAGE: &str = "Please enter a valid NFC tag ID";

/// URL parameters that carry a tag id, in precedence order.
const TAG_PARAMS: [&str; 3] = ["nfc", "tag", "dogId"];

/// Something a device reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareEvent {
    /// An NFC tag was read.
    NfcScan {
        /// Hardware serial, e.g. `04:a2:5b:1c:9f:61:80`.
        serial: String,
    },
    /// A raw message from the automation bridge.
    Bridge(String),
}

#[derive(Debug, Deserialize)]
struct BridgeEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NfcScanData {
    tag_id: String,
}

/// The collaborators an [`App`] is built from.
pub struct Services {
    /// Persistent storage.
    pub store: Persistence,
    /// Issue sink.
    pub notifier: Notifier,
    /// Page router.
    pub router: Router,
    /// Identity state.
    pub identity: Identity,
    /// Device position source.
    pub geolocator: Box<dyn Geolocator>,
    /// Reverse geocoder.
    pub geocoder: Geocoder,
}

impl Services {
    /// Production services for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the router's
    /// bundle URL does not parse.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::new();
        let store = Persistence::new(Box::new(SqliteStore::open(config.database_path())?));
        let provider = PatreonProvider::from_config(&config.identity, client.clone())
            .map(|p| Box::new(p) as Box<dyn IdentityProvider>);
        Ok(Self {
            store,
            notifier: Notifier::from_endpoint(client.clone(), config.notify.endpoint.as_deref()),
            router: Router::from_config(config, client.clone())?,
            identity: Identity::new(provider),
            geolocator: Box::new(FixedGeolocator::unavailable()),
            geocoder: Geocoder::new(client, config.geo.geocoding_url.clone()),
        })
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("router", &self.router)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// State handed to pages, split from the page itself so both can be
/// borrowed at once.
struct Shared {
    timers: TimerConfig,
    tag: Option<TagId>,
    user: Option<UserProfile>,
    store: Persistence,
    notifier: Notifier,
    ticks: TickSender,
    geolocator: Box<dyn Geolocator>,
    geocoder: Geocoder,
    toasts: Vec<Toast>,
}

impl Shared {
    fn ctx(&mut self) -> PageContext<'_> {
        PageContext {
            tag: self.tag.as_ref(),
            user: self.user.as_ref(),
            store: &self.store,
            notifier: &self.notifier,
            ticks: &self.ticks,
            timers: &self.timers,
            geolocator: self.geolocator.as_ref(),
            geocoder: &self.geocoder,
            toasts: &mut self.toasts,
            now: Utc::now(),
        }
    }

    fn toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toasts.push(Toast::new(level, message));
    }

    fn apply(&mut self, patch: Option<ProfilePatch>) -> Result<()> {
        let (Some(user), Some(patch)) = (self.user.as_mut(), patch) else {
            return Ok(());
        };
        user.apply(patch);
        self.store
            .save(&StorageKey::Profile(user.tag_id.clone()), user)
    }
}

/// The application.
pub struct App {
    config: Config,
    shared: Shared,
    session: MemoryStore,
    router: Router,
    page: Option<PageModule>,
    identity: Identity,
    tick_rx: TickReceiver,
}

impl App {
    /// Assemble an application from its collaborators.
    #[must_use]
    pub fn new(config: Config, services: Services) -> Self {
        let (ticks, tick_rx) = timer::channel();
        Self {
            shared: Shared {
                timers: config.timers.clone(),
                tag: None,
                user: None,
                store: services.store,
                notifier: services.notifier,
                ticks,
                geolocator: services.geolocator,
                geocoder: services.geocoder,
                toasts: Vec::new(),
            },
            config,
            session: MemoryStore::new(),
            router: services.router,
            page: None,
            identity: services.identity,
            tick_rx,
        }
    }

    /// Build the production application for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if any service cannot be created.
    pub fn from_config(config: Config) -> Result<Self> {
        let services = Services::from_config(&config)?;
        Ok(Self::new(config, services))
    }

    /// Start up: restore the session, finish any OAuth redirect, bind a tag
    /// from the URL or storage and show the initial page.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or written.
    pub async fn start(&mut self, url: Option<&Url>) -> Result<Navigation> {
        self.identity.load_stored(&self.shared.store)?;
        if self.identity.is_authenticated() {
            self.identity
                .revalidate(&self.shared.store, &self.session, Utc::now())
                .await?;
        }

        if let Some(url) = url {
            let params = CallbackParams::from_url(url);
            if params.is_callback() {
                self.handle_auth_callback(&params).await?;
            }
        }

        let from_url = url.and_then(tag_from_url);
        if let Some(tag) = from_url {
            self.set_nfc_tag(tag).await?;
        } else if let Some(tag) = self.shared.store.load::<TagId>(&StorageKey::NfcTag)? {
            debug!(tag = %tag, "Restoring stored tag");
            self.bind_tag(tag).await?;
        }

        let route = url.map_or(Route::Root, |u| {
            initial_route(u.path(), u.fragment().unwrap_or_default())
        });
        self.navigate(route).await
    }

    /// Bind `tag` as the active tag.
    ///
    /// Binding the tag that is already active changes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or written.
    pub async fn set_nfc_tag(&mut self, tag: TagId) -> Result<()> {
        if self.shared.tag.as_ref() == Some(&tag) {
            debug!(tag = %tag, "Tag already bound");
            return Ok(());
        }
        self.bind_tag(tag.clone()).await?;
        info!(tag = %tag, "NFC tag set");
        self.shared
            .toast(ToastLevel::Success, format!("Connected to pet tracker: {tag}"));
        Ok(())
    }

    async fn bind_tag(&mut self, tag: TagId) -> Result<()> {
        // Flush the open page against the old tag before switching.
        let reopen = self.page.is_some();
        self.teardown_page()?;

        self.shared.store.save(&StorageKey::NfcTag, &tag)?;
        let key = StorageKey::Profile(tag.clone());
        let user = if let Some(user) = self.shared.store.load::<UserProfile>(&key)? {
            user
        } else {
            let now = Utc::now();
            let user = UserProfile::new(tag.clone(), now);
            self.shared.store.save(&key, &user)?;
            info!(tag = %tag, "Registered new tag");
            self.shared
                .notifier
                .create_issue(
                    "New Pet Tracker Registration",
                    format!(
                        "New NFC tag registered: {tag}\n\nCreated at: {}",
                        view::iso_timestamp(now)
                    ),
                    &["new-registration", &tag.label()],
                    Some(&tag),
                )
                .await;
            user
        };
        self.shared.tag = Some(tag);
        self.shared.user = Some(user);

        if reopen {
            if let Some(route) = self.router.current() {
                self.open_page(route).await?;
            }
        }
        Ok(())
    }

    /// Handle the tag id typed at the tag prompt, then continue to the page
    /// that asked for it.
    ///
    /// Returns `None` when the input is rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or written.
    pub async fn manual_tag_entry(&mut self, input: &str) -> Result<Option<Navigation>> {
        let Ok(tag) = TagId::parse(input) else {
            self.shared.toast(ToastLevel::Error, INVALID_TAG_MESSAGE);
            return Ok(None);
        };
        self.set_nfc_tag(tag).await?;
        let route = self.router.resume_route();
        self.navigate(route).await.map(Some)
    }

    /// Apply a device event.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or written.
    pub async fn handle_event(&mut self, event: HardwareEvent) -> Result<()> {
        match event {
            HardwareEvent::NfcScan { serial } => match TagId::from_serial(&serial) {
                Ok(tag) => {
                    info!(tag = %tag, "NFC tag detected");
                    self.set_nfc_tag(tag).await
                }
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable NFC tag");
                    Ok(())
                }
            },
            HardwareEvent::Bridge(message) => self.handle_bridge_message(&message).await,
        }
    }

    /// Apply a JSON message from the automation bridge.
    ///
    /// Malformed messages and unknown types are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or written.
    pub async fn handle_bridge_message(&mut self, message: &str) -> Result<()> {
        let envelope: BridgeEnvelope = match serde_json::from_str(message) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "Error handling Tasker message");
                return Ok(());
            }
        };
        debug!(kind = %envelope.kind, "Tasker message received");

        match envelope.kind.as_str() {
            "location_update" => match serde_json::from_value::<LocationUpdate>(envelope.data) {
                Ok(update) => {
                    if self.shared.tag.is_none() {
                        error!("No NFC tag set for location update");
                        return Ok(());
                    }
                    self.report_location(update, LocationSource::Tasker)
                        .await
                        .map(|_| ())
                }
                Err(e) => {
                    error!(error = %e, "Malformed location update");
                    Ok(())
                }
            },
            "nfc_scan" => match serde_json::from_value::<NfcScanData>(envelope.data) {
                Ok(data) => match TagId::parse(&data.tag_id) {
                    Ok(tag) => self.set_nfc_tag(tag).await,
                    Err(e) => {
                        warn!(error = %e, "Ignoring invalid tag from bridge");
                        Ok(())
                    }
                },
                Err(e) => {
                    error!(error = %e, "Malformed NFC scan message");
                    Ok(())
                }
            },
            "emergency" => match serde_json::from_value::<Emergency>(envelope.data) {
                Ok(emergency) => {
                    if self.shared.tag.is_none() {
                        error!("No NFC tag set for emergency");
                        return Ok(());
                    }
                    self.report_emergency(&emergency).await
                }
                Err(e) => {
                    error!(error = %e, "Malformed emergency message");
                    Ok(())
                }
            },
            other => {
                warn!(kind = other, "Unknown Tasker message type");
                Ok(())
            }
        }
    }

    /// Record a pushed position for the bound tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] with no tag, or a storage error.
    pub async fn report_location(
        &mut self,
        update: LocationUpdate,
        source: LocationSource,
    ) -> Result<Option<LocationState>> {
        let mut ctx = self.shared.ctx();
        let tag = ctx.require_tag()?;
        let state = location::report_location_update(&mut ctx, &tag, update, source).await?;
        if let Some(PageModule::Location(page)) = &mut self.page {
            page.refresh(&mut ctx)?;
        }
        drop(ctx);

        if let Some(state) = &state {
            self.shared
                .apply(Some(ProfilePatch::Location(state.clone())))?;
        }
        Ok(state)
    }

    /// Raise an emergency for the bound tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] with no tag.
    pub async fn report_emergency(&mut self, emergency: &Emergency) -> Result<()> {
        let mut ctx = self.shared.ctx();
        let tag = ctx.require_tag()?;
        home::send_emergency(&mut ctx, &tag, emergency).await;
        ctx.toast(ToastLevel::Warning, "Emergency alert sent!");
        Ok(())
    }

    /// Navigate to `route` and start its page.
    ///
    /// # Errors
    ///
    /// Returns an error if the old page cannot flush or the new one cannot load.
    pub async fn navigate(&mut self, route: Route) -> Result<Navigation> {
        let navigation = self
            .router
            .navigate_to(route, self.shared.tag.is_some(), true)
            .await;
        self.mount(navigation).await?;
        Ok(navigation)
    }

    /// Navigate to a route token; unknown tokens go to root.
    ///
    /// # Errors
    ///
    /// See [`App::navigate`].
    pub async fn navigate_token(&mut self, token: &str) -> Result<Navigation> {
        self.navigate(Route::parse_or_root(token)).await
    }

    /// Reload the current page's bundle and restart the page.
    ///
    /// # Errors
    ///
    /// See [`App::navigate`].
    pub async fn refresh(&mut self) -> Result<Option<Navigation>> {
        let Some(navigation) = self.router.refresh(self.shared.tag.is_some()).await else {
            return Ok(None);
        };
        self.mount(navigation).await?;
        Ok(Some(navigation))
    }

    /// Go back one history entry.
    ///
    /// # Errors
    ///
    /// See [`App::navigate`].
    pub async fn back(&mut self) -> Result<Option<Navigation>> {
        let Some(navigation) = self.router.back(self.shared.tag.is_some()).await else {
            return Ok(None);
        };
        self.mount(navigation).await?;
        Ok(Some(navigation))
    }

    async fn mount(&mut self, navigation: Navigation) -> Result<()> {
        self.teardown_page()?;
        if let Navigation::Mounted(route) = navigation {
            self.open_page(route).await?;
        }
        Ok(())
    }

    async fn open_page(&mut self, route: Route) -> Result<()> {
        let mut page = PageModule::for_route(route);
        page.init(&mut self.shared.ctx()).await?;
        self.page = Some(page);
        Ok(())
    }

    fn teardown_page(&mut self) -> Result<()> {
        if let Some(mut page) = self.page.take() {
            let patch = page.destroy(&mut self.shared.ctx())?;
            self.shared.apply(patch)?;
        }
        Ok(())
    }

    /// Deliver a timer tick to the active page.
    ///
    /// # Errors
    ///
    /// Returns an error if an auto-save cannot be written.
    pub async fn on_tick(&mut self, tick: Tick) -> Result<()> {
        let Some(page) = self.page.as_mut() else {
            return Ok(());
        };
        let patch = page.on_tick(tick.kind, &mut self.shared.ctx()).await?;
        self.shared.apply(patch)
    }

    /// The active page together with a context for calling it.
    ///
    /// Hand any returned [`ProfilePatch`] to [`App::apply_patch`] afterwards.
    pub fn active_page(&mut self) -> Option<(&mut PageModule, PageContext<'_>)> {
        let page = self.page.as_mut()?;
        Some((page, self.shared.ctx()))
    }

    /// A context for tag-level operations outside any page.
    pub fn context(&mut self) -> PageContext<'_> {
        self.shared.ctx()
    }

    /// Apply a page's change to the profile and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be written.
    pub fn apply_patch(&mut self, patch: Option<ProfilePatch>) -> Result<()> {
        self.shared.apply(patch)
    }

    /// Issue a provider login URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderNotConfigured`] without a provider.
    pub fn login_url(&mut self) -> Result<Url> {
        match self.identity.login_url(&self.session) {
            Ok(url) => Ok(url),
            Err(e) => {
                if matches!(e, Error::ProviderNotConfigured) {
                    self.shared
                        .toast(ToastLevel::Error, "Patreon OAuth not configured");
                } else {
                    error!(error = %e, "Failed to start login");
                }
                Err(e)
            }
        }
    }

    /// Finish an OAuth redirect, reporting the outcome as a toast.
    ///
    /// # Errors
    ///
    /// Only storage failures while recording the outcome are returned;
    /// authentication failures become toasts.
    pub async fn handle_auth_callback(&mut self, params: &CallbackParams) -> Result<Option<AuthUser>> {
        let outcome = self
            .identity
            .handle_callback(params, &self.shared.store, &self.session, Utc::now())
            .await;
        match outcome {
            Ok(Some(user)) => {
                let user = user.clone();
                self.shared
                    .toast(ToastLevel::Success, "Successfully authenticated with Patreon!");
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(CallbackFailure::Rejected(e)) => {
                self.shared
                    .toast(ToastLevel::Error, format!("Authentication failed: {e}"));
                Ok(None)
            }
            Err(CallbackFailure::Partial(e)) => {
                self.shared.toast(
                    ToastLevel::Warning,
                    format!("Authentication partially failed: {e}"),
                );
                Ok(None)
            }
        }
    }

    /// Sign out.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored session cannot be removed.
    pub fn logout(&mut self) -> Result<()> {
        self.identity.logout(&self.shared.store, &self.session)?;
        self.shared.toast(ToastLevel::Success, "Successfully logged out");
        Ok(())
    }

    /// Process bridge messages from `input`, one per line, and timer ticks
    /// until the input ends.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the input or storage fails.
    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        info!("Listening for bridge messages");
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let line = line.trim();
                    if !line.is_empty() {
                        self.handle_bridge_message(line).await?;
                    }
                }
                Some(tick) = self.tick_rx.recv() => {
                    self.on_tick(tick).await?;
                }
            }
            for toast in self.take_toasts() {
                info!(level = %toast.level, "{}", toast.message);
            }
        }
        self.teardown_page()?;
        info!("Bridge input closed");
        Ok(())
    }

    /// Drain the queued toasts.
    pub fn take_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.shared.toasts)
    }

    /// Stop the active page, flushing its changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush cannot be written.
    pub fn shutdown(&mut self) -> Result<()> {
        self.teardown_page()
    }

    /// The bound tag.
    #[must_use]
    pub fn tag(&self) -> Option<&TagId> {
        self.shared.tag.as_ref()
    }

    /// The bound tag's profile.
    #[must_use]
    pub fn user(&self) -> Option<&UserProfile> {
        self.shared.user.as_ref()
    }

    /// Persistent storage.
    #[must_use]
    pub fn store(&self) -> &Persistence {
        &self.shared.store
    }

    /// The router.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// The active page.
    #[must_use]
    pub fn page(&self) -> Option<&PageModule> {
        self.page.as_ref()
    }

    /// Identity state.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Loaded configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("tag", &self.shared.tag)
            .field("route", &self.router.current())
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// The tag id carried by a URL's `nfc`, `tag` or `dogId` parameter.
///
/// Invalid values are ignored.
#[must_use]
pub fn tag_from_url(url: &Url) -> Option<TagId> {
    TAG_PARAMS.iter().find_map(|name| {
        let (_, value) = url.query_pairs().find(|(key, _)| key == name)?;
        match TagId::parse(&value) {
            Ok(tag) => Some(tag),
            Err(e) => {
                warn!(param = name, error = %e, "Ignoring invalid tag parameter");
                None
            }
        }
    })
}
