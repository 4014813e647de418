//! OAuth token storage.
//!
//! Tokens live in memory for the lifetime of the process. When a path is
//! configured they are also written to disk (atomically, mode `0600` on Unix)
//! so a restart does not require a new consent round-trip.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Refresh this long before the provider-reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// An OAuth token set.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The access token for API requests.
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    pub refresh_token: Option<String>,

    /// When the access token expires (already reduced by the safety margin).
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    pub scopes: Vec<String>,

    /// When the tokens were last refreshed.
    pub last_refresh: DateTime<Utc>,
}

impl std::fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenInfo")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("last_refresh", &self.last_refresh)
            .finish()
    }
}

fn expiry_from(expires_in_secs: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in_secs
        .map(|secs| Utc::now() + Duration::seconds(secs) - Duration::seconds(EXPIRY_MARGIN_SECS))
}

impl TokenInfo {
    /// Creates a token set from token endpoint response data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expiry_from(expires_in_secs),
            scopes,
            last_refresh: Utc::now(),
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    /// Returns true if the token set can be refreshed without user interaction.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Replaces the access token after a refresh.
    ///
    /// Google may rotate the refresh token; a new one replaces the old.
    pub fn apply_refresh(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token.into();
        self.expires_at = expiry_from(expires_in_secs);
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.last_refresh = Utc::now();
    }
}

/// In-memory token store with optional file persistence.
#[derive(Debug, Default)]
pub struct TokenStorage {
    path: Option<PathBuf>,
    tokens: RwLock<Option<TokenInfo>>,
}

impl TokenStorage {
    /// Creates a store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a store persisted at `path`.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            tokens: RwLock::new(None),
        }
    }

    /// Loads tokens from disk into memory.
    ///
    /// Returns Ok(true) if tokens were loaded, Ok(false) if there is nothing
    /// to load.
    pub fn load(&self) -> ProviderResult<bool> {
        let Some(ref path) = self.path else {
            return Ok(false);
        };
        if !path.exists() {
            debug!(path = %path.display(), "no token file");
            return Ok(false);
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!("failed to read token file: {}", e))
                .with_source(e)
        })?;

        let tokens: TokenInfo = serde_json::from_str(&content).map_err(|e| {
            ProviderError::configuration(format!("failed to parse token file: {}", e))
        })?;

        info!(path = %path.display(), "loaded tokens");
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens);
        Ok(true)
    }

    fn save(&self, tokens: &TokenInfo) -> ProviderResult<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration(format!("failed to create token directory: {}", e))
            })?;
        }

        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(tokens)
            .map_err(|e| ProviderError::internal(format!("failed to serialize tokens: {}", e)))?;

        fs::write(&temp_path, &content).map_err(|e| {
            ProviderError::configuration(format!("failed to write token file: {}", e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&temp_path, path).map_err(|e| {
            ProviderError::configuration(format!("failed to rename token file: {}", e))
        })?;

        debug!(path = %path.display(), "saved tokens");
        Ok(())
    }

    /// Returns a clone of the current tokens, if any.
    pub fn get(&self) -> Option<TokenInfo> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the stored tokens.
    pub fn set(&self, tokens: TokenInfo) -> ProviderResult<()> {
        self.save(&tokens)?;
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens);
        Ok(())
    }

    /// Applies a refresh result to the stored tokens.
    pub fn apply_refresh(
        &self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
        refresh_token: Option<String>,
    ) -> ProviderResult<TokenInfo> {
        let mut guard = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        let tokens = guard
            .as_mut()
            .ok_or_else(|| ProviderError::internal("no tokens to update"))?;
        tokens.apply_refresh(access_token, expires_in_secs, refresh_token);
        let updated = tokens.clone();
        drop(guard);

        self.save(&updated)?;
        Ok(updated)
    }

    /// Clears the stored tokens, in memory and on disk.
    pub fn clear(&self) -> ProviderResult<()> {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = None;
        if let Some(ref path) = self.path
            && path.exists()
        {
            fs::remove_file(path).map_err(|e| {
                ProviderError::configuration(format!("failed to remove token file: {}", e))
            })?;
            info!(path = %path.display(), "cleared tokens");
        }
        Ok(())
    }

    /// Returns the token file path, if persistence is enabled.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns true if tokens are present.
    pub fn has_tokens(&self) -> bool {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes() -> Vec<String> {
        vec!["https://www.googleapis.com/auth/calendar.events".to_string()]
    }

    #[test]
    fn token_expiry_uses_margin() {
        let fresh = TokenInfo::new("access", None, Some(3600), scopes());
        assert!(!fresh.is_expired());

        // Shorter than the margin, so already considered expired.
        let short = TokenInfo::new("access", None, Some(30), scopes());
        assert!(short.is_expired());

        let forever = TokenInfo::new("access", None, None, scopes());
        assert!(!forever.is_expired());
    }

    #[test]
    fn refresh_keeps_refresh_token_unless_rotated() {
        let mut tokens = TokenInfo::new("a1", Some("r1".to_string()), Some(30), scopes());
        tokens.apply_refresh("a2", Some(3600), None);
        assert_eq!(tokens.access_token, "a2");
        assert_eq!(tokens.refresh_token.as_deref(), Some("r1"));
        assert!(!tokens.is_expired());

        tokens.apply_refresh("a3", Some(3600), Some("r2".to_string()));
        assert_eq!(tokens.refresh_token.as_deref(), Some("r2"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let tokens = TokenInfo::new("very-secret", Some("also-secret".to_string()), None, scopes());
        let debug = format!("{:?}", tokens);
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("also-secret"));
    }

    #[test]
    fn in_memory_store() {
        let store = TokenStorage::in_memory();
        assert!(!store.has_tokens());
        assert!(!store.load().unwrap());

        store
            .set(TokenInfo::new("a1", Some("r1".to_string()), Some(3600), scopes()))
            .unwrap();
        assert!(store.has_tokens());
        assert!(store.path().is_none());

        let updated = store.apply_refresh("a2", Some(3600), None).unwrap();
        assert_eq!(updated.access_token, "a2");
        assert_eq!(store.get().unwrap().access_token, "a2");

        store.clear().unwrap();
        assert!(store.get().is_none());
    }

    #[test]
    fn apply_refresh_without_tokens_fails() {
        let store = TokenStorage::in_memory();
        assert!(store.apply_refresh("a", None, None).is_err());
    }

    #[test]
    fn persistent_store_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens").join("google.json");

        let store = TokenStorage::persistent(&path);
        store
            .set(TokenInfo::new("a1", Some("r1".to_string()), Some(3600), scopes()))
            .unwrap();
        assert!(path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let reloaded = TokenStorage::persistent(&path);
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.get().unwrap().refresh_token.as_deref(), Some("r1"));

        reloaded.clear().unwrap();
        assert!(!path.exists());
    }
}
