//! Redis configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Redis pub/sub for announcing account changes to other instances.
/// Optional; a single instance needs only the in-process bus.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Channel prefix; changes go to `<prefix>:<user_id>`
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
}

impl RedisConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS__URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        if self.channel_prefix.trim().is_empty() {
            return Err(ValidationError::MissingRequired("REDIS__CHANNEL_PREFIX"));
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            channel_prefix: default_channel_prefix(),
        }
    }
}

fn default_channel_prefix() -> String {
    crate::adapters::events::DEFAULT_CHANNEL_PREFIX.to_string()
}
