// --- File: crates/services/everpath_backend/src/service_factory.rs ---
//! Service factory implementation.
//!
//! Builds the outbound collaborators once at startup, each according to its runtime flag.
use everpath_booking::notifier_from_config;
use everpath_calendar::ProviderRegistry;
use everpath_common::services::{NotificationService, PaymentService};
use everpath_common::{client_from_config, EverpathError};
use everpath_config::AppConfig;
use everpath_stripe::StripePaymentService;
use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn};

pub struct EverpathServiceFactory {
    config: Arc<AppConfig>,
    client: Client,
    payment_service: Option<Arc<dyn PaymentService>>,
    notification_service: Arc<dyn NotificationService>,
}

impl EverpathServiceFactory {
    /// Create a new service factory sharing one HTTP client.
    pub fn new(config: Arc<AppConfig>) -> Result<Self, EverpathError> {
        let client = client_from_config(&config.http)?;

        let payment_service: Option<Arc<dyn PaymentService>> =
            match StripePaymentService::from_config(&config, client.clone()) {
                Some(stripe) => {
                    info!("Initializing Stripe payment service...");
                    Some(Arc::new(stripe))
                }
                None => {
                    warn!("Stripe is disabled or not configured; bookings will not be charged");
                    None
                }
            };
        let notification_service = notifier_from_config(&config, client.clone());

        Ok(Self {
            config,
            client,
            payment_service,
            notification_service,
        })
    }

    pub fn payment_service(&self) -> Option<Arc<dyn PaymentService>> {
        self.payment_service.clone()
    }

    pub fn notification_service(&self) -> Arc<dyn NotificationService> {
        self.notification_service.clone()
    }

    /// Google and Microsoft providers enabled by `use_google` / `use_microsoft`.
    pub fn calendar_providers(&self) -> ProviderRegistry {
        let registry = ProviderRegistry::from_config(&self.config, self.client.clone());
        info!("Calendar providers enabled: {:?}", registry.kinds());
        registry
    }
}
