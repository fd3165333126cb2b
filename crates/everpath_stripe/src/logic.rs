// --- File: crates/everpath_stripe/src/logic.rs ---
use everpath_common::services::ChargeOutcome;
use everpath_config::StripeConfig;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::StripeError;

/// Reason reported when the customer has nothing Stripe could charge off-session.
pub const NO_PAYMENT_METHOD: &str = "no_default_payment_method";
/// Reason reported when the stored customer reference is unknown to Stripe.
pub const UNKNOWN_CUSTOMER: &str = "customer_not_found";

// --- Data Structures ---

/// One off-session charge against a saved customer.
#[derive(Debug, Clone)]
pub struct ChargeRequest<'a> {
    pub customer_ref: &'a str,
    pub amount_minor_units: i64,
    pub currency: &'a str,
    /// Sent as the `Idempotency-Key` header and as metadata.
    pub idempotency_key: &'a str,
    pub description: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct StripeCustomer {
    #[serde(default)]
    deleted: bool,
    invoice_settings: Option<InvoiceSettings>,
}

#[derive(Deserialize, Debug)]
struct InvoiceSettings {
    default_payment_method: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StripePaymentIntent {
    id: String,
    status: String,
    latest_charge: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StripeErrorEnvelope {
    error: StripeApiError,
}

#[derive(Deserialize, Debug)]
struct StripeApiError {
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
    decline_code: Option<String>,
    message: Option<String>,
}

impl StripeApiError {
    fn reason(&self) -> String {
        self.decline_code
            .clone()
            .or_else(|| self.code.clone())
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "card_declined".to_string())
    }
}

fn api_url(stripe_config: &StripeConfig, path: &str) -> String {
    format!("{}/v1/{}", stripe_config.api_base_url.trim_end_matches('/'), path)
}

fn parse_api_error(status: StatusCode, body_text: &str) -> Option<StripeApiError> {
    match serde_json::from_str::<StripeErrorEnvelope>(body_text) {
        Ok(envelope) => Some(envelope.error),
        Err(_) => {
            debug!("[Stripe Logic] Unparsable error body for status {}: {}", status, body_text);
            None
        }
    }
}

fn api_error(status: StatusCode, body_text: String) -> StripeError {
    let message = parse_api_error(status, &body_text)
        .and_then(|e| e.message)
        .unwrap_or(body_text);
    StripeError::ApiError {
        status_code: status.as_u16(),
        message,
    }
}

// --- Core Logic Functions ---

/// What Stripe holds for a customer reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethodLookup {
    Found(String),
    /// Nothing chargeable; carries the decline reason.
    Missing(&'static str),
}

/// Looks up the payment method Stripe would use for off-session charges.
pub async fn default_payment_method(
    client: &Client,
    stripe_config: &StripeConfig,
    customer_ref: &str,
) -> Result<PaymentMethodLookup, StripeError> {
    let url = api_url(stripe_config, &format!("customers/{}", customer_ref));
    let response = client
        .get(&url)
        .basic_auth(&stripe_config.secret_key, None::<&str>)
        .send()
        .await?;

    let status = response.status();
    let body_text = response.text().await?;
    if status == StatusCode::NOT_FOUND {
        warn!("[Stripe Logic] Customer {} not found", customer_ref);
        return Ok(PaymentMethodLookup::Missing(UNKNOWN_CUSTOMER));
    }
    if !status.is_success() {
        return Err(api_error(status, body_text));
    }

    let customer: StripeCustomer = serde_json::from_str(&body_text)?;
    if customer.deleted {
        return Ok(PaymentMethodLookup::Missing(UNKNOWN_CUSTOMER));
    }
    Ok(customer
        .invoice_settings
        .and_then(|settings| settings.default_payment_method)
        .map(PaymentMethodLookup::Found)
        .unwrap_or(PaymentMethodLookup::Missing(NO_PAYMENT_METHOD)))
}

/// Creates and confirms a PaymentIntent off-session.
///
/// Card errors (HTTP 402) and intents left needing customer action become
/// [`ChargeOutcome::Declined`]; every other failure is an error.
pub async fn create_payment_intent(
    client: &Client,
    stripe_config: &StripeConfig,
    request: &ChargeRequest<'_>,
    payment_method: &str,
) -> Result<ChargeOutcome, StripeError> {
    if request.amount_minor_units <= 0 {
        return Err(StripeError::InvalidRequest(format!(
            "amount must be positive, got {}",
            request.amount_minor_units
        )));
    }

    let mut form_body: Vec<(String, String)> = vec![
        ("amount".to_string(), request.amount_minor_units.to_string()),
        ("currency".to_string(), request.currency.to_lowercase()),
        ("customer".to_string(), request.customer_ref.to_string()),
        ("payment_method".to_string(), payment_method.to_string()),
        ("confirm".to_string(), "true".to_string()),
        ("off_session".to_string(), "true".to_string()),
        (
            "metadata[appointment_id]".to_string(),
            request.idempotency_key.to_string(),
        ),
    ];
    if let Some(description) = request.description {
        form_body.push(("description".to_string(), description.to_string()));
    }

    let url = api_url(stripe_config, "payment_intents");
    info!(
        "[Stripe Logic] Charging {} {} to {}",
        request.amount_minor_units, request.currency, request.customer_ref
    );
    let response = client
        .post(&url)
        .basic_auth(&stripe_config.secret_key, None::<&str>)
        .header("Idempotency-Key", request.idempotency_key)
        .form(&form_body)
        .send()
        .await?;

    let status = response.status();
    let body_text = response.text().await?;
    debug!("[Stripe Logic] PaymentIntent response status: {}", status);

    if status.is_success() {
        let intent: StripePaymentIntent = serde_json::from_str(&body_text)?;
        return Ok(match intent.status.as_str() {
            "succeeded" | "processing" => ChargeOutcome::Success {
                charge_id: intent.latest_charge.unwrap_or(intent.id),
            },
            other => {
                info!("[Stripe Logic] PaymentIntent {} ended in status {}", intent.id, other);
                ChargeOutcome::Declined {
                    reason: other.to_string(),
                }
            }
        });
    }

    if status == StatusCode::PAYMENT_REQUIRED {
        if let Some(err) = parse_api_error(status, &body_text) {
            if err.error_type.as_deref() == Some("card_error") {
                let reason = err.reason();
                info!("[Stripe Logic] Charge declined for {}: {}", request.customer_ref, reason);
                return Ok(ChargeOutcome::Declined { reason });
            }
        }
    }

    warn!(
        "[Stripe Logic] PaymentIntent request failed with HTTP status: {}",
        status
    );
    Err(api_error(status, body_text))
}

/// Charges the customer's default payment method.
pub async fn charge_customer(
    client: &Client,
    stripe_config: &StripeConfig,
    request: &ChargeRequest<'_>,
) -> Result<ChargeOutcome, StripeError> {
    if stripe_config.secret_key.is_empty() {
        return Err(StripeError::ConfigError);
    }
    if request.customer_ref.is_empty() {
        return Ok(ChargeOutcome::Declined {
            reason: UNKNOWN_CUSTOMER.to_string(),
        });
    }
    match default_payment_method(client, stripe_config, request.customer_ref).await? {
        PaymentMethodLookup::Found(payment_method) => {
            create_payment_intent(client, stripe_config, request, &payment_method).await
        }
        PaymentMethodLookup::Missing(reason) => {
            info!("[Stripe Logic] Nothing to charge for {}: {}", request.customer_ref, reason);
            Ok(ChargeOutcome::Declined {
                reason: reason.to_string(),
            })
        }
    }
}
