#[cfg(test)]
mod tests {
    use crate::notify::{notifier_from_config, HttpNotifier};
    use everpath_common::services::{NotificationEvent, NotificationService};
    use everpath_common::EverpathError;
    use everpath_config::{AppConfig, NotificationConfig};
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn relay_config(server: &MockServer, api_key: Option<&str>) -> NotificationConfig {
        NotificationConfig {
            endpoint_url: format!("{}/send", server.uri()),
            api_key: api_key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn relay_receives_event_and_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer relay-key"))
            .and(body_json(json!({
                "event": "booking_confirmed_family",
                "payload": {"to": "jamie@example.com"}
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        HttpNotifier::new(Client::new(), relay_config(&server, Some("relay-key")))
            .send(
                NotificationEvent::BookingConfirmedFamily,
                json!({"to": "jamie@example.com"}),
            )
            .await
            .expect("delivered");
    }

    #[tokio::test]
    async fn relay_rejection_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(500).set_body_string("mailer down"))
            .mount(&server)
            .await;

        let err = HttpNotifier::new(Client::new(), relay_config(&server, None))
            .send(NotificationEvent::BookingCancelled, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, EverpathError::ProviderApiError { ref provider, .. } if provider == "notifications"));
    }

    #[tokio::test]
    async fn disabled_notifications_are_only_logged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .expect(0)
            .mount(&server)
            .await;
        let config = AppConfig {
            use_notifications: false,
            notifications: Some(relay_config(&server, None)),
            ..Default::default()
        };

        notifier_from_config(&config, Client::new())
            .send(NotificationEvent::PaymentDeclined, json!({"reason": "card_declined"}))
            .await
            .expect("log sink never fails");
    }
}
