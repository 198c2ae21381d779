//! Firebase Authentication adapter for ID token validation.
//!
//! This adapter implements the `SessionValidator` port for Firebase ID
//! tokens. It validates them by:
//!
//! 1. Fetching Google's public keys for the `securetoken` service account
//! 2. Validating the RS256 signature against the key named by `kid`
//! 3. Validating issuer, audience, expiry and subject claims
//! 4. Mapping claims to the domain `AuthenticatedUser` type
//!
//! # Claims
//!
//! - **Issuer (iss)**: `https://securetoken.google.com/<project-id>`
//! - **Audience (aud)**: the Firebase project id
//! - **Subject (sub)**: the Firebase UID, non-empty
//!
//! # Example
//!
//! ```ignore
//! use saas_starter::adapters::auth::{FirebaseConfig, FirebaseSessionValidator};
//! use saas_starter::ports::SessionValidator;
//!
//! let validator = FirebaseSessionValidator::new(FirebaseConfig::new("my-project"));
//! let user = validator.validate("eyJ...").await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{
    decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, TokenData, Validation,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::SessionValidator;

/// Google's JWKS for Firebase ID token signing keys.
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Configuration for the Firebase adapter.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Firebase project id. Tokens must name it as audience.
    pub project_id: String,

    /// Where signing keys are fetched from.
    pub jwks_url: String,

    /// How long to cache keys before refetching.
    /// Defaults to 1 hour if not specified.
    pub jwks_cache_duration: Option<Duration>,
}

impl FirebaseConfig {
    /// Create a new configuration for a project.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            jwks_url: FIREBASE_JWKS_URL.to_string(),
            jwks_cache_duration: None,
        }
    }

    /// Set custom JWKS cache duration.
    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.jwks_cache_duration = Some(duration);
        self
    }

    /// Fetch keys from another URL (emulators, tests).
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = url.into();
        self
    }

    /// Expected `iss` claim.
    pub fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }
}

/// Claims carried by a Firebase ID token.
#[derive(Debug, Serialize, Deserialize)]
struct FirebaseClaims {
    /// Subject - the Firebase UID
    sub: String,

    iss: String,

    aud: String,

    exp: i64,

    #[serde(default)]
    iat: Option<i64>,

    #[serde(default)]
    email: Option<String>,

    #[serde(default)]
    email_verified: Option<bool>,

    #[serde(default)]
    name: Option<String>,

    /// Profile photo URL
    #[serde(default)]
    picture: Option<String>,
}

/// Cached JWKS with expiry tracking.
struct JwksCache {
    jwks: JwkSet,
    fetched_at: Instant,
    cache_duration: Duration,
}

impl JwksCache {
    fn new(jwks: JwkSet, cache_duration: Duration) -> Self {
        Self {
            jwks,
            fetched_at: Instant::now(),
            cache_duration,
        }
    }

    fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() > self.cache_duration
    }
}

/// Firebase ID token validator.
///
/// This is the production implementation of `SessionValidator`.
pub struct FirebaseSessionValidator {
    config: FirebaseConfig,
    http_client: reqwest::Client,
    jwks_cache: Arc<RwLock<Option<JwksCache>>>,
}

impl FirebaseSessionValidator {
    /// Create a new Firebase validator.
    ///
    /// Keys are fetched lazily on first validation to avoid blocking during
    /// startup.
    pub fn new(config: FirebaseConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            config,
            http_client,
            jwks_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Fetch JWKS from Google.
    async fn fetch_jwks(&self) -> Result<JwkSet, AuthError> {
        let url = &self.config.jwks_url;

        tracing::debug!("Fetching JWKS from {}", url);

        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!("Failed to fetch JWKS: {}", e);
            AuthError::ServiceUnavailable(format!("Failed to fetch JWKS: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!("JWKS endpoint returned {}", status);
            return Err(AuthError::ServiceUnavailable(format!(
                "JWKS endpoint returned {}",
                status
            )));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse JWKS: {}", e);
            AuthError::ServiceUnavailable(format!("Failed to parse JWKS: {}", e))
        })?;

        tracing::debug!("Fetched {} keys from JWKS", jwks.keys.len());

        Ok(jwks)
    }

    /// Get JWKS, using cache if available and not expired.
    ///
    /// A `kid` missing from a cached set forces one refetch, since Google
    /// rotates keys ahead of the cache expiry.
    async fn get_jwks(&self, kid: &str) -> Result<JwkSet, AuthError> {
        {
            let cache = self.jwks_cache.read().await;
            if let Some(ref cached) = *cache {
                if !cached.is_expired() && cached.jwks.find(kid).is_some() {
                    return Ok(cached.jwks.clone());
                }
            }
        }

        let jwks = self.fetch_jwks().await?;

        {
            let mut cache = self.jwks_cache.write().await;
            let duration = self
                .config
                .jwks_cache_duration
                .unwrap_or(Duration::from_secs(3600));
            *cache = Some(JwksCache::new(jwks.clone(), duration));
        }

        Ok(jwks)
    }

    /// Find the decoding key named by `kid`.
    fn find_decoding_key(&self, kid: &str, jwks: &JwkSet) -> Result<DecodingKey, AuthError> {
        let jwk = jwks.find(kid).ok_or_else(|| {
            tracing::warn!("No matching key found for kid: {}", kid);
            AuthError::InvalidToken
        })?;

        DecodingKey::from_jwk(jwk).map_err(|e| {
            tracing::warn!("Failed to create decoding key: {}", e);
            AuthError::InvalidToken
        })
    }

    fn validation(&self) -> Validation {
        // Firebase signs ID tokens with RS256 only.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.issuer()]);
        validation.set_audience(&[&self.config.project_id]);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation
    }

    fn validate_token(
        &self,
        token: &str,
        decoding_key: &DecodingKey,
    ) -> Result<TokenData<FirebaseClaims>, AuthError> {
        decode::<FirebaseClaims>(token, decoding_key, &self.validation()).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Token expired");
                    AuthError::TokenExpired
                }
                ErrorKind::InvalidIssuer => {
                    tracing::warn!("Invalid issuer in token");
                    AuthError::InvalidToken
                }
                ErrorKind::InvalidAudience => {
                    tracing::warn!("Invalid audience in token");
                    AuthError::InvalidToken
                }
                _ => {
                    tracing::warn!("Token validation failed: {}", e);
                    AuthError::InvalidToken
                }
            }
        })
    }
}

/// Maps validated claims to the domain user.
///
/// Phone and anonymous sign-ins carry no email; it is left empty.
fn user_from_claims(claims: FirebaseClaims) -> Result<AuthenticatedUser, AuthError> {
    let user_id = UserId::new(&claims.sub).map_err(|_| {
        tracing::warn!("Token has empty subject");
        AuthError::InvalidToken
    })?;

    let user = AuthenticatedUser::new(
        user_id,
        claims.email.unwrap_or_default(),
        claims.name,
        claims.email_verified.unwrap_or(false),
    );

    Ok(match claims.picture {
        Some(picture) => user.with_photo_url(picture),
        None => user,
    })
}

#[async_trait]
impl SessionValidator for FirebaseSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!("Failed to decode JWT header: {}", e);
            AuthError::InvalidToken
        })?;

        if header.alg != Algorithm::RS256 {
            tracing::warn!("Unexpected token algorithm: {:?}", header.alg);
            return Err(AuthError::InvalidToken);
        }

        let kid = header.kid.ok_or_else(|| {
            tracing::warn!("JWT missing 'kid' header");
            AuthError::InvalidToken
        })?;

        let jwks = self.get_jwks(&kid).await?;
        let decoding_key = self.find_decoding_key(&kid, &jwks)?;
        let token_data = self.validate_token(token, &decoding_key)?;

        user_from_claims(token_data.claims)
    }
}

impl std::fmt::Debug for FirebaseSessionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseSessionValidator")
            .field("project_id", &self.config.project_id)
            .finish_non_exhaustive()
    }
}
