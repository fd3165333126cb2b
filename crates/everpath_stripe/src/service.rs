use everpath_common::services::{BoxFuture, ChargeOutcome, PaymentService};
use everpath_common::EverpathError;
use everpath_config::{AppConfig, StripeConfig};
use reqwest::Client;
use tracing::debug;

use crate::logic::{charge_customer, ChargeRequest};

/// Stripe payment service implementation
#[derive(Clone)]
pub struct StripePaymentService {
    client: Client,
    config: StripeConfig,
    currency: String,
}

impl StripePaymentService {
    /// Create a new Stripe payment service charging in `currency`
    pub fn new(client: Client, config: StripeConfig, currency: impl Into<String>) -> Self {
        Self {
            client,
            config,
            currency: currency.into(),
        }
    }

    /// Builds the service when `use_stripe` is on and a `[stripe]` section exists.
    pub fn from_config(app_config: &AppConfig, client: Client) -> Option<Self> {
        let stripe = AppConfig::enabled(app_config.use_stripe, &app_config.stripe)?;
        debug!("Stripe payments enabled ({})", app_config.booking.currency);
        Some(Self::new(client, stripe.clone(), app_config.booking.currency.clone()))
    }
}

impl PaymentService for StripePaymentService {
    fn charge(
        &self,
        customer_ref: &str,
        amount_minor_units: i64,
        idempotency_key: &str,
    ) -> BoxFuture<'_, ChargeOutcome, EverpathError> {
        let customer_ref = customer_ref.to_string();
        let idempotency_key = idempotency_key.to_string();

        Box::pin(async move {
            let request = ChargeRequest {
                customer_ref: &customer_ref,
                amount_minor_units,
                currency: &self.currency,
                idempotency_key: &idempotency_key,
                description: Some("Everpath appointment fee"),
            };
            charge_customer(&self.client, &self.config, &request)
                .await
                .map_err(EverpathError::from)
        })
    }
}
