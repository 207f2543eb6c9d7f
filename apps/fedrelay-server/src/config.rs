//! Application configuration loaded from environment variables.
//!
//! Fail-fast: required variables must be present and valid, or the process
//! exits with a clear error before binding the listener.

use fedrelay_core::FederationEntry;
use std::env;
use thiserror::Error;

/// Application environment mode.
///
/// Controls security enforcement: insecure federation transport overrides
/// are allowed with a warning in development and refused in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    /// Parse from the `APP_ENV` environment variable value.
    /// Defaults to `Development` if unset or unrecognized.
    pub fn from_env_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => {
                tracing::warn!(
                    value = other,
                    "Unrecognized APP_ENV value, defaulting to Development"
                );
                Self::Development
            }
        }
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }
}

impl std::fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Failed to parse port: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Application environment (development or production).
    pub app_env: AppEnvironment,

    /// Configured federations (JSON array in `FEDERATIONS`).
    pub federations: Vec<FederationEntry>,

    /// Tracing filter directive (e.g., "info,fedrelay=debug").
    pub rust_log: String,

    /// Server bind address.
    pub host: String,

    /// Server listen port.
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Required Variables
    ///
    /// - `FEDERATIONS` - JSON array of federation entries
    ///
    /// # Optional Variables
    ///
    /// - `APP_ENV` - "development" (default) or "production"
    /// - `RUST_LOG` - Log filter (default: "info")
    /// - `HOST` - Bind address (default: "0.0.0.0")
    /// - `PORT` - Listen port (default: 8080)
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development only)
        let _ = dotenvy::dotenv();

        let app_env = AppEnvironment::from_env_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let federations_json = env::var("FEDERATIONS")
            .map_err(|_| ConfigError::MissingVar("FEDERATIONS".to_string()))?;
        let federations = Self::parse_federations(&federations_json)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;
        if port == 0 {
            return Err(ConfigError::InvalidValue {
                var: "PORT".to_string(),
                message: "Port must be between 1 and 65535".to_string(),
            });
        }

        Ok(Config {
            app_env,
            federations,
            rust_log,
            host,
            port,
        })
    }

    /// Parse and validate the `FEDERATIONS` JSON array.
    fn parse_federations(json_str: &str) -> Result<Vec<FederationEntry>, ConfigError> {
        let entries: Vec<FederationEntry> =
            serde_json::from_str(json_str).map_err(|e| ConfigError::InvalidValue {
                var: "FEDERATIONS".to_string(),
                message: format!("Invalid JSON: {e}"),
            })?;

        if entries.is_empty() {
            return Err(ConfigError::InvalidValue {
                var: "FEDERATIONS".to_string(),
                message: "Array must contain at least one federation".to_string(),
            });
        }

        for entry in &entries {
            entry.validate().map_err(|e| ConfigError::InvalidValue {
                var: "FEDERATIONS".to_string(),
                message: e.to_string(),
            })?;
        }

        Ok(entries)
    }

    /// Server bind address as a socket address string.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate security configuration for the current environment.
    ///
    /// In **production**: returns `Err(errors)` listing every federation
    /// with transport-security enforcement disabled.
    /// In **development**: returns `Ok(warnings)` for the same findings.
    pub fn validate_security_config(&self) -> Result<Vec<String>, Vec<String>> {
        let mut issues = Vec::new();

        for entry in &self.federations {
            if let Ok(server) = entry.oidc_server() {
                if server.allow_insecure {
                    issues.push(format!(
                        "federation '{}' has allow_insecure enabled (discovery transport checks disabled)",
                        entry.id
                    ));
                }
            }
        }

        if issues.is_empty() {
            return Ok(Vec::new());
        }

        if self.app_env.is_production() {
            Err(issues)
        } else {
            Ok(issues)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn federations_json(allow_insecure: bool) -> String {
        format!(
            r#"[{{
                "id": "fed-1",
                "protocol": "oidc",
                "client": {{
                    "client_id": "client-abc",
                    "client_secret": "s3cret",
                    "redirect_uri": "https://rp.example.com/callback/fed-1"
                }},
                "server": {{
                    "name": "Example IdP",
                    "issuer": "https://idp.example.com",
                    "allow_insecure": {allow_insecure}
                }}
            }}]"#
        )
    }

    fn test_config(allow_insecure: bool, app_env: AppEnvironment) -> Config {
        Config {
            app_env,
            federations: Config::parse_federations(&federations_json(allow_insecure)).unwrap(),
            rust_log: "info".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }

    #[test]
    fn test_parse_federations_rejects_invalid_json() {
        assert!(matches!(
            Config::parse_federations("not json"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_parse_federations_rejects_empty_array() {
        assert!(matches!(
            Config::parse_federations("[]"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_parse_federations_rejects_invalid_entry() {
        let json = r#"[{
            "id": "",
            "protocol": "oidc",
            "client": {"client_id": "c", "client_secret": "s", "redirect_uri": "https://rp/cb"},
            "server": {"name": "IdP", "issuer": "https://idp.example.com"}
        }]"#;
        assert!(Config::parse_federations(json).is_err());
    }

    #[test]
    fn test_bind_addr() {
        let config = test_config(false, AppEnvironment::Development);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_app_environment_parsing() {
        assert_eq!(
            AppEnvironment::from_env_str("production"),
            AppEnvironment::Production
        );
        assert_eq!(
            AppEnvironment::from_env_str("prod"),
            AppEnvironment::Production
        );
        assert_eq!(
            AppEnvironment::from_env_str("dev"),
            AppEnvironment::Development
        );
        assert_eq!(
            AppEnvironment::from_env_str("staging"),
            AppEnvironment::Development
        );
    }

    #[test]
    fn test_production_rejects_insecure_transport() {
        let config = test_config(true, AppEnvironment::Production);
        let errors = config.validate_security_config().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("fed-1"));
    }

    #[test]
    fn test_development_warns_on_insecure_transport() {
        let config = test_config(true, AppEnvironment::Development);
        let warnings = config.validate_security_config().unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_secure_config_passes_in_production() {
        let config = test_config(false, AppEnvironment::Production);
        assert!(config.validate_security_config().unwrap().is_empty());
    }
}
