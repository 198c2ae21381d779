//! Authentication configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;
use crate::adapters::auth::FirebaseConfig;

/// Firebase ID-token verification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Firebase project id; tokens must carry it as audience
    pub firebase_project_id: String,

    /// JWKS cache TTL in seconds
    #[serde(default = "default_jwks_cache_ttl")]
    pub jwks_cache_ttl_secs: u64,

    /// Override for the signing-key endpoint (emulators, tests)
    pub jwks_url: Option<String>,
}

impl AuthConfig {
    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_secs)
    }

    /// Settings for the Firebase session validator.
    pub fn firebase_config(&self) -> FirebaseConfig {
        let config = FirebaseConfig::new(self.firebase_project_id.clone())
            .with_cache_duration(self.jwks_cache_ttl());
        match &self.jwks_url {
            Some(url) => config.with_jwks_url(url.clone()),
            None => config,
        }
    }

    pub fn validate(&self, environment: Environment) -> Result<(), ValidationError> {
        if self.firebase_project_id.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__FIREBASE_PROJECT_ID"));
        }
        // Firebase project ids are lowercase letters, digits and hyphens.
        if !self
            .firebase_project_id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ValidationError::InvalidFirebaseProject);
        }
        if environment == Environment::Production {
            if let Some(url) = &self.jwks_url {
                if !url.starts_with("https://") {
                    return Err(ValidationError::JwksUrlMustBeHttps);
                }
            }
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            firebase_project_id: String::new(),
            jwks_cache_ttl_secs: default_jwks_cache_ttl(),
            jwks_url: None,
        }
    }
}

fn default_jwks_cache_ttl() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AuthConfig {
        AuthConfig {
            firebase_project_id: "saas-starter-dev".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_auth_config_defaults() {
        assert_eq!(AuthConfig::default().jwks_cache_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_firebase_config_uses_project_as_issuer() {
        let firebase = valid().firebase_config();
        assert_eq!(firebase.issuer(), "https://securetoken.google.com/saas-starter-dev");
    }

    #[test]
    fn test_validation_missing_project() {
        assert_eq!(
            AuthConfig::default().validate(Environment::Development),
            Err(ValidationError::MissingRequired("AUTH__FIREBASE_PROJECT_ID"))
        );
    }

    #[test]
    fn test_validation_rejects_malformed_project() {
        let config = AuthConfig {
            firebase_project_id: "My Project".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(Environment::Development),
            Err(ValidationError::InvalidFirebaseProject)
        );
    }

    #[test]
    fn test_validation_production_requires_https_jwks() {
        let config = AuthConfig {
            jwks_url: Some("http://localhost:9099/jwks".to_string()),
            ..valid()
        };
        assert!(config.validate(Environment::Development).is_ok());
        assert_eq!(
            config.validate(Environment::Production),
            Err(ValidationError::JwksUrlMustBeHttps)
        );
    }
}
