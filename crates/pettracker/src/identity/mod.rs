//! OAuth identity: login, callback handling, session persistence and
//! supporter tier checks.
//!
//! State machine: anonymous, then pending once a login URL has been issued,
//! then authenticated once both the token exchange and the identity fetch
//! succeed. Any failure returns to anonymous. A stored session is trusted on
//! load and revalidated in the background; a failed revalidation clears it.

pub mod patreon;

use chrono::{DateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::storage::keys::OAUTH_STATE_KEY;
use crate::storage::{KeyValueStore, Persistence, StorageKey};

pub use patreon::{IdentityDocument, IdentityProvider, PatreonProvider};

/// Pledge needed for premium features without active patron status, in cents.
pub const PREMIUM_MINIMUM_CENTS: u64 = 500;

/// Length of the anti-forgery state value.
const STATE_LEN: usize = 26;

/// One membership of the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    /// Membership id.
    pub id: String,
    /// e.g. `active_patron`, `former_patron`.
    pub patron_status: Option<String>,
    /// When the pledge began.
    pub pledge_relationship_start: Option<String>,
    /// Total ever pledged.
    pub lifetime_support_cents: Option<u64>,
    /// Current tier amount.
    pub currently_entitled_amount_cents: Option<u64>,
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    /// Provider user id.
    pub id: String,
    /// Email address.
    pub email: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Full name.
    pub full_name: Option<String>,
    /// Avatar URL.
    pub image_url: Option<String>,
    /// Whether the email is verified.
    pub is_email_verified: Option<bool>,
    /// Provider user id, kept for stored sessions.
    pub patreon_id: String,
    /// Memberships, when fetched.
    #[serde(default)]
    pub memberships: Vec<Membership>,
    /// When the user signed in.
    pub authenticated_at: DateTime<Utc>,
}

impl AuthUser {
    /// Build the user from an identity response.
    #[must_use]
    pub fn from_document(doc: IdentityDocument, now: DateTime<Utc>) -> Self {
        let attrs = doc.data.attributes;
        let memberships = doc
            .included
            .into_iter()
            .filter(|item| item.kind == "member")
            .map(|item| Membership {
                id: item.id,
                patron_status: item.attributes.patron_status,
                pledge_relationship_start: item.attributes.pledge_relationship_start,
                lifetime_support_cents: item.attributes.lifetime_support_cents,
                currently_entitled_amount_cents: item.attributes.currently_entitled_amount_cents,
            })
            .collect();
        Self {
            patreon_id: doc.data.id.clone(),
            id: doc.data.id,
            email: attrs.email,
            first_name: attrs.first_name,
            last_name: attrs.last_name,
            full_name: attrs.full_name,
            image_url: attrs.image_url,
            is_email_verified: attrs.is_email_verified,
            memberships,
            authenticated_at: now,
        }
    }

    /// Any membership is an active patron.
    #[must_use]
    pub fn is_supporter(&self) -> bool {
        self.memberships
            .iter()
            .any(|m| m.patron_status.as_deref() == Some("active_patron"))
    }

    /// Any membership is entitled to at least `cents`.
    #[must_use]
    pub fn has_minimum_support(&self, cents: u64) -> bool {
        self.memberships
            .iter()
            .any(|m| m.currently_entitled_amount_cents.unwrap_or(0) >= cents)
    }

    /// Active patrons and anyone pledging at least [`PREMIUM_MINIMUM_CENTS`].
    #[must_use]
    pub fn can_access_premium(&self) -> bool {
        self.is_supporter() || self.has_minimum_support(PREMIUM_MINIMUM_CENTS)
    }
}

/// The persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    /// The user, once fetched.
    pub user: Option<AuthUser>,
    /// Provider access token.
    pub patreon_token: Option<String>,
    /// Both login steps succeeded.
    pub is_authenticated: bool,
    /// When this was written.
    pub saved_at: DateTime<Utc>,
}

/// Where the identity state machine stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Not signed in.
    Anonymous,
    /// A login URL was issued; waiting for the callback.
    Pending,
    /// Signed in.
    Authenticated,
}

/// Query parameters of an OAuth redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    /// Authorization code.
    pub code: Option<String>,
    /// Anti-forgery state.
    pub state: Option<String>,
    /// Provider error.
    pub error: Option<String>,
}

impl CallbackParams {
    /// Pull `code`, `state` and `error` from a URL's query.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// Whether this looks like an OAuth redirect at all.
    #[must_use]
    pub fn is_callback(&self) -> bool {
        self.error.is_some() || (self.code.is_some() && self.state.is_some())
    }
}

/// Why a completed callback did not sign the user in.
#[derive(Debug)]
pub enum CallbackFailure {
    /// Failed before a token was obtained; nothing changed.
    Rejected(Error),
    /// A token was obtained but the identity fetch failed.
    Partial(Error),
}

/// Identity state for the shell.
pub struct Identity {
    provider: Option<Box<dyn IdentityProvider>>,
    session: Option<AuthSession>,
    pending: bool,
}

impl Identity {
    /// Identity backed by `provider`; `None` leaves login unavailable.
    #[must_use]
    pub fn new(provider: Option<Box<dyn IdentityProvider>>) -> Self {
        Self {
            provider,
            session: None,
            pending: false,
        }
    }

    /// Whether a provider is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        if self.is_authenticated() {
            AuthState::Authenticated
        } else if self.pending {
            AuthState::Pending
        } else {
            AuthState::Anonymous
        }
    }

    /// Whether the user is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_authenticated)
    }

    /// The signed-in user.
    #[must_use]
    pub fn user(&self) -> Option<&AuthUser> {
        self.session.as_ref().and_then(|s| s.user.as_ref())
    }

    /// Active patron check; false when signed out.
    #[must_use]
    pub fn is_supporter(&self) -> bool {
        self.user().is_some_and(AuthUser::is_supporter)
    }

    /// Minimum pledge check; false when signed out.
    #[must_use]
    pub fn has_minimum_support(&self, cents: u64) -> bool {
        self.user().is_some_and(|u| u.has_minimum_support(cents))
    }

    /// Premium feature check; false when signed out.
    #[must_use]
    pub fn can_access_premium(&self) -> bool {
        self.user().is_some_and(AuthUser::can_access_premium)
    }

    /// Trust the stored session, if any, until revalidated.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn load_stored(&mut self, store: &Persistence) -> Result<()> {
        self.session = store.load(&StorageKey::Auth)?;
        if let Some(session) = &self.session {
            debug!(authenticated = session.is_authenticated, "Loaded stored session");
        }
        Ok(())
    }

    /// Check the stored token with the provider and refresh the user.
    ///
    /// Any failure clears the whole session. Returns whether the user is
    /// still signed in.
    ///
    /// # Errors
    ///
    /// Returns an error only if clearing the session cannot be written.
    pub async fn revalidate(
        &mut self,
        store: &Persistence,
        session_store: &dyn KeyValueStore,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(token) = self.session.as_ref().and_then(|s| s.patreon_token.clone()) else {
            return Ok(self.is_authenticated());
        };
        let Some(provider) = &self.provider else {
            return Ok(self.is_authenticated());
        };

        match provider.fetch_identity(&token, false).await {
            Ok(doc) => {
                let user = AuthUser::from_document(doc, now);
                if let Some(session) = &mut self.session {
                    // The plain identity call carries no memberships; keep the stored ones.
                    let memberships = session
                        .user
                        .take()
                        .map(|u| u.memberships)
                        .unwrap_or_default();
                    session.user = Some(AuthUser { memberships, ..user });
                }
                Ok(self.is_authenticated())
            }
            Err(e) => {
                error!(error = %e, "Authentication validation failed");
                self.clear(store, session_store)?;
                Ok(false)
            }
        }
    }

    /// Issue a login URL and remember its anti-forgery state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderNotConfigured`] without a provider, or an
    /// error if the state cannot be stored.
    pub fn login_url(&mut self, session_store: &dyn KeyValueStore) -> Result<Url> {
        let provider = self.provider.as_ref().ok_or(Error::ProviderNotConfigured)?;
        let state = Alphanumeric
            .sample_string(&mut rand::rng(), STATE_LEN)
            .to_ascii_lowercase();
        session_store.set(OAUTH_STATE_KEY, &state)?;
        let url = provider.authorize_url(&state)?;
        self.pending = true;
        info!("Issued login URL");
        Ok(url)
    }

    /// Complete an OAuth redirect.
    ///
    /// Returns `Ok(None)` when `params` is not a callback. A state that does
    /// not match the stored one fails closed without contacting the token
    /// endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackFailure::Rejected`] for provider errors, state
    /// mismatches and failed exchanges, and [`CallbackFailure::Partial`] when
    /// the identity fetch fails after a token was obtained.
    pub async fn handle_callback(
        &mut self,
        params: &CallbackParams,
        store: &Persistence,
        session_store: &dyn KeyValueStore,
        now: DateTime<Utc>,
    ) -> std::result::Result<Option<&AuthUser>, CallbackFailure> {
        if let Some(error) = &params.error {
            error!(error, "OAuth error");
            self.pending = false;
            return Err(CallbackFailure::Rejected(Error::provider(error.clone())));
        }
        let (Some(code), Some(state)) = (&params.code, &params.state) else {
            return Ok(None);
        };

        let stored = session_store
            .get(OAUTH_STATE_KEY)
            .map_err(CallbackFailure::Rejected)?;
        if stored.as_deref() != Some(state.as_str()) {
            error!("OAuth state mismatch");
            self.pending = false;
            return Err(CallbackFailure::Rejected(Error::OAuthStateMismatch));
        }
        session_store
            .remove(OAUTH_STATE_KEY)
            .map_err(CallbackFailure::Rejected)?;
        self.pending = false;

        let provider = self
            .provider
            .as_ref()
            .ok_or(CallbackFailure::Rejected(Error::ProviderNotConfigured))?;

        let token = match provider.exchange_code(code).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Token exchange failed");
                return Err(CallbackFailure::Rejected(e));
            }
        };

        let doc = match provider.fetch_identity(&token, true).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Failed to fetch user data");
                self.session = Some(AuthSession {
                    user: None,
                    patreon_token: Some(token),
                    is_authenticated: false,
                    saved_at: now,
                });
                return Err(CallbackFailure::Partial(e));
            }
        };

        let user = AuthUser::from_document(doc, now);
        info!(user = %user.id, memberships = user.memberships.len(), "Authenticated");
        let session = AuthSession {
            user: Some(user),
            patreon_token: Some(token),
            is_authenticated: true,
            saved_at: now,
        };
        store
            .save(&StorageKey::Auth, &session)
            .map_err(CallbackFailure::Rejected)?;
        self.session = Some(session);
        Ok(self.user())
    }

    /// Sign out.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored session cannot be removed.
    pub fn logout(&mut self, store: &Persistence, session_store: &dyn KeyValueStore) -> Result<()> {
        self.clear(store, session_store)?;
        info!("Logged out");
        Ok(())
    }

    fn clear(&mut self, store: &Persistence, session_store: &dyn KeyValueStore) -> Result<()> {
        self.session = None;
        self.pending = false;
        store.remove(&StorageKey::Auth)?;
        session_store.remove(OAUTH_STATE_KEY)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("configured", &self.is_configured())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
