//! Configuration validation utilities.

use wabridge_transport::webhook::effective_url;

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    BridgeConfig, LogOutput, LoggingConfig, RetryConfig, SessionConfig, WebhookConfig,
};

/// Validates the entire configuration.
pub fn validate_config(config: &BridgeConfig) -> ConfigResult<()> {
    validate_port(config.server.port)?;
    validate_webhook_config(&config.webhook)?;
    validate_retry_config(&config.retry)?;
    validate_session_config(&config.session)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_webhook_config(webhook: &WebhookConfig) -> ConfigResult<()> {
    // A blank or placeholder URL means "relay disabled", not an error.
    if let Some(url) = effective_url(webhook.url.as_deref()) {
        validate_url(url, "http")?;
    }

    if webhook.timeout_ms == 0 {
        return Err(ConfigError::validation(
            "Webhook timeout must be greater than 0",
        ));
    }

    if webhook.max_in_flight == 0 {
        return Err(ConfigError::validation(
            "Webhook max_in_flight must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_retry_config(retry: &RetryConfig) -> ConfigResult<()> {
    if retry.reconnect_delay_secs == 0 {
        return Err(ConfigError::validation(
            "Reconnect delay must be greater than 0",
        ));
    }

    if retry.reinit_delay_secs == 0 {
        return Err(ConfigError::validation(
            "Re-initialization delay must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_session_config(session: &SessionConfig) -> ConfigResult<()> {
    validate_url(&session.url, "ws")?;

    if session.request_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "Session request timeout must be greater than 0",
        ));
    }

    if session.address_suffix.is_empty() {
        return Err(ConfigError::validation("Address suffix cannot be empty"));
    }

    if session.address_suffix.contains('@') {
        return Err(ConfigError::validation(
            "Address suffix must not contain '@'",
        ));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "File log output requires logging.file_path",
        ));
    }
    if let Some(target) = logging.filters.keys().find(|t| !is_module_path(t)) {
        return Err(ConfigError::validation(format!(
            "Invalid log filter target {target:?}, expected a module path \
             such as wabridge_core::supervisor"
        )));
    }
    Ok(())
}

/// `segment(::segment)*`, each segment an identifier.
fn is_module_path(target: &str) -> bool {
    target.split("::").all(|segment| {
        let mut chars = segment.chars();
        chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

/// Validates a URL.
fn validate_url(url: &str, expected_scheme: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::validation("URL cannot be empty"));
    }

    let valid_schemes = match expected_scheme {
        "ws" => ["ws://", "wss://"],
        "http" => ["http://", "https://"],
        _ => return Err(ConfigError::validation("Unknown URL scheme type")),
    };

    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {:?}", valid_schemes),
        ));
    }

    Ok(())
}

/// Validates a port number.
fn validate_port(port: u16) -> ConfigResult<()> {
    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }
    Ok(())
}
