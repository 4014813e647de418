//! OAuth 2.0 authorization-code flow for Google APIs.
//!
//! The server-side variant: the operator's browser is redirected to Google,
//! and Google redirects back to the server's own `/callback` route with a
//! `code` and the `state` nonce. This module builds the consent URL, exchanges
//! the code, and refreshes access tokens. Nonce bookkeeping belongs to the
//! caller.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

use super::client::{build_http_client, map_send_error};
use super::config::{GoogleEndpoints, OAuthCredentials};
use super::tokens::TokenInfo;

/// Length of the state nonce in bytes, before encoding.
const STATE_LENGTH: usize = 32;

/// Generates a fresh CSRF nonce for the `state` parameter.
///
/// 32 random bytes, URL-safe base64 without padding (43 characters).
pub fn generate_state() -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..STATE_LENGTH).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// OAuth client for Google's token endpoint.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    endpoints: GoogleEndpoints,
    http_client: reqwest::Client,
}

/// The result of a successful refresh.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
    /// Present only when Google rotates the refresh token.
    pub refresh_token: Option<String>,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    pub fn new(
        credentials: OAuthCredentials,
        endpoints: GoogleEndpoints,
        timeout: Duration,
        user_agent: &str,
    ) -> ProviderResult<Self> {
        Ok(Self {
            credentials,
            endpoints,
            http_client: build_http_client(timeout, user_agent)?,
        })
    }

    /// Builds the consent URL the operator is redirected to.
    ///
    /// Requests offline access and forces the consent prompt so Google always
    /// returns a refresh token.
    pub fn authorization_url(&self, redirect_uri: &str, scopes: &[String], state: &str) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&\
            access_type=offline&prompt=consent",
            self.endpoints.auth_url,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(state),
        )
    }

    /// Exchanges an authorization code for a token set.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> ProviderResult<TokenInfo> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let token_response = self.post_token_form(&params, "token exchange").await?;
        info!("obtained tokens from authorization code");

        let scopes = match token_response.scope {
            Some(granted) => granted.split_whitespace().map(str::to_string).collect(),
            None => scopes.to_vec(),
        };
        Ok(TokenInfo::new(
            token_response.access_token,
            token_response.refresh_token,
            token_response.expires_in,
            scopes,
        ))
    }

    /// Obtains a new access token using a refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> ProviderResult<RefreshedToken> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token_response = self.post_token_form(&params, "token refresh").await?;
        info!("refreshed access token");

        Ok(RefreshedToken {
            access_token: token_response.access_token,
            expires_in: token_response.expires_in,
            refresh_token: token_response.refresh_token,
        })
    }

    async fn post_token_form(
        &self,
        params: &[(&str, &str)],
        what: &str,
    ) -> ProviderResult<TokenResponse> {
        debug!(url = %self.endpoints.token_url, "{} request", what);

        let response = self
            .http_client
            .post(&self.endpoints.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| map_send_error(e, what))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if status.is_server_error() {
            return Err(ProviderError::server(format!(
                "{} failed ({}): {}",
                what, status, body
            ))
            .with_provider("google"));
        }

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "{} rejected ({}): {}",
                what, status, body
            ))
            .with_provider("google"));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
                .with_provider("google")
        })
    }
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

    fn client(base: &str) -> OAuthClient {
        OAuthClient::new(
            OAuthCredentials::new("client-1.apps.googleusercontent.com", "s3cret"),
            GoogleEndpoints::with_base(base),
            Duration::from_secs(5),
            "calhook-test",
        )
        .unwrap()
    }

    #[test]
    fn state_is_random_and_url_safe() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn authorization_url_format() {
        let oauth = client("https://accounts.example");
        let url = oauth.authorization_url(
            "http://localhost:3000/callback",
            &[SCOPE.to_string()],
            "nonce-1",
        );

        assert!(url.starts_with("https://accounts.example/auth?"));
        assert!(url.contains("client_id=client-1.apps.googleusercontent.com"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fcalendar.events"));
        assert!(url.contains("state=nonce-1"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
    }

    #[tokio::test]
    async fn exchange_code_returns_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.access",
                "refresh_token": "1//refresh",
                "expires_in": 3599,
                "scope": SCOPE,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = client(&server.uri())
            .exchange_code("auth-code", "http://localhost:3000/callback", &[])
            .await
            .unwrap();

        assert_eq!(tokens.access_token, "ya29.access");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(tokens.scopes, vec![SCOPE.to_string()]);
        assert!(!tokens.is_expired());
    }

    #[tokio::test]
    async fn rejected_code_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .exchange_code("stale", "http://localhost:3000/callback", &[])
            .await
            .unwrap_err();

        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert!(err.message().contains("invalid_grant"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn token_endpoint_outage_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server.uri()).refresh_token("1//refresh").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn refresh_returns_new_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.new",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let refreshed = client(&server.uri()).refresh_token("1//refresh").await.unwrap();
        assert_eq!(refreshed.access_token, "ya29.new");
        assert_eq!(refreshed.expires_in, Some(3599));
        assert!(refreshed.refresh_token.is_none());
    }

    #[tokio::test]
    async fn slow_token_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let oauth = OAuthClient::new(
            OAuthCredentials::new("client-1.apps.googleusercontent.com", "s3cret"),
            GoogleEndpoints::with_base(&server.uri()),
            Duration::from_millis(200),
            "calhook-test",
        )
        .unwrap();

        let err = oauth.refresh_token("1//refresh").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Timeout);
    }
}
