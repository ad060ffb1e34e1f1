//! Patreon OAuth endpoints.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::IdentityConfig;
use crate::error::{Error, Result};

/// Requested OAuth scopes.
pub const SCOPE: &str = "identity identity.memberships";

const USER_FIELDS: &str = "email,first_name,last_name,full_name,image_url,is_email_verified";
const MEMBER_FIELDS: &str =
    "patron_status,pledge_relationship_start,lifetime_support_cents,currently_entitled_amount_cents";

/// The identity endpoint's response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdentityDocument {
    /// The user resource.
    pub data: UserResource,
    /// Side-loaded resources; memberships when requested.
    #[serde(default)]
    pub included: Vec<IncludedResource>,
}

/// The user resource.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserResource {
    /// Patreon user id.
    pub id: String,
    /// Requested attributes.
    #[serde(default)]
    pub attributes: UserAttributes,
}

/// User attributes. Any may be missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserAttributes {
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
}

/// A side-loaded resource.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IncludedResource {
    /// Resource type; memberships are `member`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Resource id.
    pub id: String,
    /// Member attributes; empty for other types.
    #[serde(default)]
    pub attributes: MemberAttributes,
}

/// Membership attributes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MemberAttributes {
    /// e.g. `active_patron`.
    pub patron_status: Option<String>,
    /// When the pledge began.
    pub pledge_relationship_start: Option<String>,
    /// Total ever pledged.
    pub lifetime_support_cents: Option<u64>,
    /// Current tier amount.
    pub currently_entitled_amount_cents: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// An OAuth authorization-code identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the user to authorize, carrying `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL does not parse.
    fn authorize_url(&self, state: &str) -> Result<Url>;

    /// Exchange an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<String>;

    /// Fetch the user, optionally with memberships.
    async fn fetch_identity(&self, token: &str, with_memberships: bool) -> Result<IdentityDocument>;
}

/// Patreon over HTTP.
#[derive(Debug, Clone)]
pub struct PatreonProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    authorize_url: String,
    token_url: String,
    identity_url: String,
}

impl PatreonProvider {
    /// Build a provider, or `None` when no client id is configured.
    #[must_use]
    pub fn from_config(config: &IdentityConfig, client: reqwest::Client) -> Option<Self> {
        let client_id = config.client_id.clone().filter(|id| !id.is_empty())?;
        Some(Self {
            client,
            client_id,
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            authorize_url: config.authorize_url.clone(),
            token_url: config.token_url.clone(),
            identity_url: config.identity_url.clone(),
        })
    }

    async fn check(response: reqwest::Response, url: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl IdentityProvider for PatreonProvider {
    fn authorize_url(&self, state: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            &self.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", SCOPE),
                ("state", state),
            ],
        )?)
    }

    async fn exchange_code(&self, code: &str) -> Result<String> {
        debug!("Exchanging authorization code");
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self.client.post(&self.token_url).form(&form).send().await?;
        let token: TokenResponse = Self::check(response, &self.token_url).await?.json().await?;
        Ok(token.access_token)
    }

    async fn fetch_identity(&self, token: &str, with_memberships: bool) -> Result<IdentityDocument> {
        let mut request = self.client.get(&self.identity_url).bearer_auth(token);
        request = if with_memberships {
            request.query(&[
                ("include", "memberships"),
                ("fields[user]", USER_FIELDS),
                ("fields[member]", MEMBER_FIELDS),
            ])
        } else {
            request.query(&[("fields[user]", USER_FIELDS)])
        };
        let response = request.send().await?;
        Ok(Self::check(response, &self.identity_url).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> PatreonProvider {
        let config = IdentityConfig {
            client_id: Some("client-123".to_string()),
            client_secret: Some("s3cret".to_string()),
            token_url: format!("{}/api/oauth2/token", server.uri()),
            identity_url: format!("{}/api/oauth2/v2/identity", server.uri()),
            ..IdentityConfig::default()
        };
        PatreonProvider::from_config(&config, reqwest::Client::new()).unwrap()
    }

    #[test]
    fn test_unconfigured() {
        assert!(PatreonProvider::from_config(&IdentityConfig::default(), reqwest::Client::new())
            .is_none());
    }

    #[tokio::test]
    async fn test_authorize_url() {
        let server = MockServer::start().await;
        let url = provider(&server).authorize_url("abc123").unwrap();
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(url.as_str().starts_with("https://www.patreon.com/oauth2/authorize?"));
        assert!(params.contains(&("response_type".to_string(), "code".to_string())));
        assert!(params.contains(&("client_id".to_string(), "client-123".to_string())));
        assert!(params.contains(&("scope".to_string(), SCOPE.to_string())));
        assert!(params.contains(&("state".to_string(), "abc123".to_string())));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/oauth2/token"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(provider(&server).exchange_code("the-code").await.unwrap(), "tok");
    }

    #[tokio::test]
    async fn test_fetch_identity_with_memberships() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/oauth2/v2/identity"))
            .and(query_param("include", "memberships"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"id": "42", "attributes": {"full_name": "Sam Carter"}},
                "included": [
                    {"type": "member", "id": "m1", "attributes": {"patron_status": "active_patron"}},
                    {"type": "campaign", "id": "c1"}
                ]
            })))
            .mount(&server)
            .await;

        let doc = provider(&server).fetch_identity("tok", true).await.unwrap();
        assert_eq!(doc.data.id, "42");
        assert_eq!(doc.included.len(), 2);
        assert_eq!(doc.included[0].attributes.patron_status.as_deref(), Some("active_patron"));
    }

    #[tokio::test]
    async fn test_fetch_identity_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let err = provider(&server).fetch_identity("bad", false).await.unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 401, .. }));
    }
}
