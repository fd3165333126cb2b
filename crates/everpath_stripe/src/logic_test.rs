#[cfg(test)]
mod tests {
    use crate::error::StripeError;
    use crate::logic::{charge_customer, ChargeRequest, NO_PAYMENT_METHOD, UNKNOWN_CUSTOMER};
    use crate::service::StripePaymentService;
    use everpath_common::services::{ChargeOutcome, PaymentService};
    use everpath_common::EverpathError;
    use everpath_config::StripeConfig;
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> StripeConfig {
        StripeConfig {
            secret_key: "sk_test_123".to_string(),
            api_base_url: server.uri(),
        }
    }

    fn request<'a>(customer_ref: &'a str) -> ChargeRequest<'a> {
        ChargeRequest {
            customer_ref,
            amount_minor_units: 4900,
            currency: "CAD",
            idempotency_key: "appt-42",
            description: None,
        }
    }

    async fn mount_customer(server: &MockServer, payment_method: Option<&str>) {
        Mock::given(method("GET"))
            .and(path("/v1/customers/cus_123"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cus_123",
                "object": "customer",
                "invoice_settings": {"default_payment_method": payment_method}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn successful_charge_returns_charge_id() {
        let server = MockServer::start().await;
        mount_customer(&server, Some("pm_card_visa")).await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("Idempotency-Key", "appt-42"))
            .and(body_string_contains("amount=4900"))
            .and(body_string_contains("currency=cad"))
            .and(body_string_contains("payment_method=pm_card_visa"))
            .and(body_string_contains("off_session=true"))
            .and(body_string_contains("confirm=true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_1",
                "object": "payment_intent",
                "status": "succeeded",
                "latest_charge": "ch_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = charge_customer(&Client::new(), &config(&server), &request("cus_123"))
            .await
            .expect("charge completes");
        assert_eq!(
            outcome,
            ChargeOutcome::Success {
                charge_id: "ch_1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn card_error_is_a_decline() {
        let server = MockServer::start().await;
        mount_customer(&server, Some("pm_card_chargeDeclined")).await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": {
                    "type": "card_error",
                    "code": "card_declined",
                    "decline_code": "insufficient_funds",
                    "message": "Your card has insufficient funds."
                }
            })))
            .mount(&server)
            .await;

        let outcome = charge_customer(&Client::new(), &config(&server), &request("cus_123"))
            .await
            .expect("decline is not an error");
        assert_eq!(
            outcome,
            ChargeOutcome::Declined {
                reason: "insufficient_funds".to_string()
            }
        );
    }

    #[tokio::test]
    async fn intent_needing_authentication_is_a_decline() {
        let server = MockServer::start().await;
        mount_customer(&server, Some("pm_card_authenticationRequired")).await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_2",
                "status": "requires_action"
            })))
            .mount(&server)
            .await;

        let outcome = charge_customer(&Client::new(), &config(&server), &request("cus_123"))
            .await
            .unwrap();
        assert!(matches!(outcome, ChargeOutcome::Declined { ref reason } if reason == "requires_action"));
    }

    #[tokio::test]
    async fn customer_without_payment_method_is_declined_without_charging() {
        let server = MockServer::start().await;
        mount_customer(&server, None).await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = charge_customer(&Client::new(), &config(&server), &request("cus_123"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ChargeOutcome::Declined {
                reason: NO_PAYMENT_METHOD.to_string()
            }
        );
    }

    #[tokio::test]
    async fn unknown_customer_is_declined() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/customers/cus_gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"type": "invalid_request_error", "code": "resource_missing"}
            })))
            .mount(&server)
            .await;

        let outcome = charge_customer(&Client::new(), &config(&server), &request("cus_gone"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ChargeOutcome::Declined {
                reason: UNKNOWN_CUSTOMER.to_string()
            }
        );
    }

    #[tokio::test]
    async fn server_errors_surface_as_provider_errors() {
        let server = MockServer::start().await;
        mount_customer(&server, Some("pm_card_visa")).await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"type": "api_error", "message": "Something went wrong on Stripe's end."}
            })))
            .mount(&server)
            .await;

        let err = charge_customer(&Client::new(), &config(&server), &request("cus_123"))
            .await
            .unwrap_err();
        assert!(matches!(err, StripeError::ApiError { status_code: 500, .. }));

        let service = StripePaymentService::new(Client::new(), config(&server), "cad");
        let err = service.charge("cus_123", 4900, "appt-42").await.unwrap_err();
        assert!(matches!(err, EverpathError::ProviderApiError { .. }));
    }
}
