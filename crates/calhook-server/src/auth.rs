//! OAuth authorization session.
//!
//! [`AuthSession`] owns the state nonce and the token set. It drives the
//! authorization-code flow once, then hands out [`AuthorizedClient`]s,
//! refreshing the access token first when it has expired. Tokens never leave
//! this module.
//!
//! ```text
//! Unauthenticated ──start──▶ AwaitingCallback ──complete──▶ Authorized ⇄ Refreshing
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use calhook_providers::google::{
    GoogleCalendarClient, GoogleConfig, OAuthClient, TokenInfo, TokenStorage,
};
use calhook_providers::{CalendarApi, ProviderError, ProviderErrorCode};
use tracing::{debug, info, warn};

use crate::error::{ServerError, ServerResult};
use crate::retry::{RetryPolicy, retry_with_backoff, with_timeout};
use crate::secret::Secret;

/// An authorized connection to the calendar provider.
pub type AuthorizedClient = Arc<dyn CalendarApi>;

/// Where the session is in the authorization flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// No flow started, no tokens.
    Unauthenticated,
    /// A consent URL was issued; waiting for the provider's redirect.
    AwaitingCallback,
    /// Tokens are available.
    Authorized,
    /// The access token is being refreshed.
    Refreshing,
}

impl AuthPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::AwaitingCallback => "awaiting_callback",
            Self::Authorized => "authorized",
            Self::Refreshing => "refreshing",
        }
    }
}

#[derive(Debug)]
struct FlowState {
    phase: AuthPhase,
    nonce: Option<Secret>,
}

/// The authorization-code flow and the resulting credential.
#[derive(Debug)]
pub struct AuthSession {
    config: GoogleConfig,
    oauth: OAuthClient,
    tokens: TokenStorage,
    flow: Mutex<FlowState>,
    /// Serializes refreshes so concurrent callers share one token request.
    refresh_lock: tokio::sync::Mutex<()>,
    retry: RetryPolicy,
}

impl AuthSession {
    /// Creates a session, loading persisted tokens when a token path is set.
    pub fn new(config: GoogleConfig, retry: RetryPolicy) -> ServerResult<Self> {
        let oauth = OAuthClient::new(
            config.credentials.clone(),
            config.endpoints.clone(),
            config.timeout,
            &config.user_agent,
        )?;

        let tokens = match config.token_path {
            Some(ref path) => TokenStorage::persistent(path),
            None => TokenStorage::in_memory(),
        };
        let phase = if tokens.load()? {
            info!("resuming with stored tokens");
            AuthPhase::Authorized
        } else {
            AuthPhase::Unauthenticated
        };

        Ok(Self {
            config,
            oauth,
            tokens,
            flow: Mutex::new(FlowState { phase, nonce: None }),
            refresh_lock: tokio::sync::Mutex::new(()),
            retry,
        })
    }

    fn flow(&self) -> std::sync::MutexGuard<'_, FlowState> {
        self.flow.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: AuthPhase) {
        let mut flow = self.flow();
        if flow.phase != phase {
            debug!(from = flow.phase.as_str(), to = phase.as_str(), "auth phase change");
            flow.phase = phase;
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> AuthPhase {
        self.flow().phase
    }

    /// Returns true once tokens are available.
    pub fn is_authorized(&self) -> bool {
        matches!(self.phase(), AuthPhase::Authorized | AuthPhase::Refreshing)
    }

    /// Calendar the session is authorized against.
    pub fn calendar_id(&self) -> &str {
        &self.config.calendar_id
    }

    /// Returns the consent URL.
    ///
    /// The nonce is created on the first call and reused by later calls.
    pub fn start_authorization(&self) -> String {
        let mut flow = self.flow();
        let nonce = flow.nonce.get_or_insert_with(Secret::generate).clone();
        if flow.phase == AuthPhase::Unauthenticated {
            flow.phase = AuthPhase::AwaitingCallback;
        }
        drop(flow);

        self.oauth
            .authorization_url(&self.config.redirect_uri, &self.config.scopes, nonce.expose())
    }

    /// Discards the current nonce and returns a consent URL with a fresh one.
    pub fn restart_authorization(&self) -> String {
        self.flow().nonce = None;
        info!("authorization flow restarted");
        self.start_authorization()
    }

    /// Checks the `state` returned by the provider against the issued nonce.
    pub fn validate_callback(&self, received_state: &str) -> bool {
        self.flow()
            .nonce
            .as_ref()
            .is_some_and(|nonce| nonce.matches(received_state))
    }

    /// Exchanges the authorization code for tokens.
    ///
    /// Never retried: codes are single-use.
    pub async fn complete_authorization(&self, code: &str) -> ServerResult<()> {
        if self.flow().nonce.is_none() {
            return Err(ServerError::AuthExchange(ProviderError::bad_request(
                "no authorization flow in progress",
            )));
        }

        let tokens = with_timeout(
            self.config.timeout,
            "token exchange",
            self.oauth
                .exchange_code(code, &self.config.redirect_uri, &self.config.scopes),
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "authorization code exchange failed");
            ServerError::AuthExchange(e)
        })?;

        if tokens.refresh_token.is_none() {
            warn!("provider returned no refresh token; re-authorization needed after expiry");
        }
        self.tokens.set(tokens)?;

        let mut flow = self.flow();
        flow.nonce = None;
        flow.phase = AuthPhase::Authorized;
        info!("authorization complete");
        Ok(())
    }

    /// Returns a client for the provider, refreshing the access token if needed.
    pub async fn authorized_client(&self) -> ServerResult<AuthorizedClient> {
        let tokens = self.tokens.get().ok_or(ServerError::NotAuthorized)?;
        let tokens = if tokens.is_expired() {
            self.refresh().await?
        } else {
            tokens
        };

        let client = GoogleCalendarClient::new(
            tokens.access_token,
            self.config.endpoints.api_base.clone(),
            self.config.timeout,
            &self.config.user_agent,
        )?;
        Ok(Arc::new(client))
    }

    async fn refresh(&self) -> ServerResult<TokenInfo> {
        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        let tokens = self.tokens.get().ok_or(ServerError::NotAuthorized)?;
        if !tokens.is_expired() {
            return Ok(tokens);
        }
        let Some(refresh_token) = tokens.refresh_token else {
            return Err(ServerError::AuthExpired(ProviderError::authentication(
                "access token expired and no refresh token is available",
            )));
        };

        self.set_phase(AuthPhase::Refreshing);
        let result = retry_with_backoff(
            &self.retry,
            self.config.timeout,
            "token refresh",
            || self.oauth.refresh_token(&refresh_token),
        )
        .await;

        match result {
            Ok(refreshed) => {
                let updated = self.tokens.apply_refresh(
                    refreshed.access_token,
                    refreshed.expires_in,
                    refreshed.refresh_token,
                );
                self.set_phase(AuthPhase::Authorized);
                Ok(updated?)
            }
            Err(e) if e.code() == ProviderErrorCode::AuthenticationFailed => {
                warn!(error = %e, "refresh token rejected, authorization required");
                self.tokens.clear()?;
                self.set_phase(AuthPhase::Unauthenticated);
                Err(ServerError::AuthExpired(e))
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                self.set_phase(AuthPhase::Authorized);
                Err(ServerError::AuthExpired(e))
            }
        }
    }
}
