//! Configuration commands.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::secret;

/// Returns a copy with literal credentials masked. References are kept.
fn redacted(config: &ClientConfig) -> ClientConfig {
    let mask = |value: &Option<String>| {
        value.as_ref().map(|v| {
            if secret::is_reference(v) {
                v.clone()
            } else {
                "***".to_string()
            }
        })
    };

    let mut copy = config.clone();
    copy.google.client_secret = mask(&config.google.client_secret);
    copy.server.webhook_token = mask(&config.server.webhook_token);
    copy
}

/// Dump the effective configuration to stdout.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&redacted(config))
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", ClientConfig::default_path().display());
    println!("{}", toml_str);
    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config
        .to_server_config()
        .map_err(|e| ClientError::Config(format!("invalid [server] settings: {}", e)))?;
    config
        .to_google_config()
        .map_err(|e| ClientError::Config(format!("invalid [google] settings: {}", e)))?;
    config
        .logging
        .to_tracing_config(false)
        .map_err(|e| ClientError::Config(format!("invalid [logging] settings: {}", e)))?;

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path() -> ClientResult<()> {
    println!("config: {}", ClientConfig::default_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_masks_literals_only() {
        let mut config = ClientConfig::default();
        config.google.client_id = Some("id.apps.googleusercontent.com".to_string());
        config.google.client_secret = Some("literal-secret".to_string());
        config.server.webhook_token = Some("pass::calhook/webhook".to_string());

        let copy = redacted(&config);
        assert_eq!(copy.google.client_id, config.google.client_id);
        assert_eq!(copy.google.client_secret.as_deref(), Some("***"));
        assert_eq!(copy.server.webhook_token.as_deref(), Some("pass::calhook/webhook"));
    }

    #[test]
    fn validate_rejects_missing_credentials() {
        assert!(matches!(
            validate(&ClientConfig::default()),
            Err(ClientError::Config(_))
        ));
    }
}
