//! Payment configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use crate::adapters::stripe::StripeConfig;
use crate::domain::billing::{PlanCatalogue, StripeWebhookVerifier};
use crate::domain::foundation::PriceRef;

/// Stripe settings and the app URLs hosted sessions redirect back to.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key
    pub stripe_api_key: SecretString,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: SecretString,

    /// Override for the Stripe API host (stripe-mock, tests)
    pub stripe_api_base_url: Option<String>,

    /// Stripe price id sold as the Basic plan
    pub basic_price_ref: Option<String>,

    /// Stripe price id sold as the Pro plan
    pub pro_price_ref: Option<String>,

    /// Public URL of the web app; checkout and portal return here
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,
}

impl PaymentConfig {
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_test_")
    }

    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_live_")
    }

    /// Settings for the Stripe REST adapter.
    pub fn stripe_config(&self) -> StripeConfig {
        let config = StripeConfig::new(self.stripe_api_key.clone());
        match &self.stripe_api_base_url {
            Some(url) => config.with_base_url(url.clone()),
            None => config,
        }
    }

    pub fn webhook_verifier(&self) -> StripeWebhookVerifier {
        StripeWebhookVerifier::new(self.stripe_webhook_secret.clone())
    }

    /// Pricing catalogue with the configured price ids attached.
    pub fn catalogue(&self) -> PlanCatalogue {
        let price = |id: &Option<String>| id.as_deref().and_then(|id| PriceRef::new(id).ok());
        PlanCatalogue::standard(price(&self.basic_price_ref), price(&self.pro_price_ref))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let api_key = self.stripe_api_key.expose_secret();
        let webhook_secret = self.stripe_webhook_secret.expose_secret();

        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        if webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_WEBHOOK_SECRET"));
        }
        // Restricted keys (rk_) are accepted alongside secret keys.
        if !api_key.starts_with("sk_") && !api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        for (plan, price) in [("basic", &self.basic_price_ref), ("pro", &self.pro_price_ref)] {
            if let Some(price) = price {
                if !price.starts_with("price_") {
                    return Err(ValidationError::InvalidPriceRef(plan));
                }
            }
        }
        if !self.app_base_url.starts_with("http://") && !self.app_base_url.starts_with("https://") {
            return Err(ValidationError::InvalidAppBaseUrl);
        }
        Ok(())
    }
}

fn default_app_base_url() -> String {
    "http://localhost:3000".to_string()
}
