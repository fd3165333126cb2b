#[cfg(test)]
mod tests {
    use crate::error::CalendarError;
    use crate::provider::{CalendarProvider, ChannelRequest, WebhookChannel};
    use crate::test_support::{appointment_event, at, microsoft};
    use chrono_tz::Tz;
    use everpath_common::models::ExternalEventStatus;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROPERTY: &str = "String {5b0c8a8e-3f7d-4c51-9a2e-7e4d1f6b9c20} Name everpathAppointmentId";

    #[tokio::test]
    async fn create_event_sends_local_wall_time() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/events"))
            .and(header("authorization", "Bearer access-1"))
            .and(body_partial_json(json!({
                "start": {"dateTime": "2030-05-06T09:00:00", "timeZone": "America/Vancouver"},
                "end": {"dateTime": "2030-05-06T09:30:00", "timeZone": "America/Vancouver"},
                "singleValueExtendedProperties": [{"id": PROPERTY, "value": "appt-1"}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "AAMk-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = microsoft(&server)
            .create_event("access-1", "primary", &appointment_event())
            .await
            .expect("event created");
        assert_eq!(id, "AAMk-1");
    }

    #[tokio::test]
    async fn named_calendars_use_calendar_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/calendars/cal-42/events"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "AAMk-2"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = microsoft(&server)
            .create_event("access-1", "cal-42", &appointment_event())
            .await
            .expect("event created");
        assert_eq!(id, "AAMk-2");
    }

    #[tokio::test]
    async fn calendar_view_reads_utc_and_extended_property() {
        let server = MockServer::start().await;
        let next_link = format!("{}/me/calendarView?$skiptoken=page-2", server.uri());
        Mock::given(method("GET"))
            .and(path("/me/calendarView"))
            .and(query_param("$skiptoken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"id": "cancelled", "isCancelled": true, "showAs": "busy",
                     "start": {"dateTime": "2030-05-07T18:00:00.0000000", "timeZone": "UTC"},
                     "end": {"dateTime": "2030-05-07T19:00:00.0000000", "timeZone": "UTC"}}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/me/calendarView"))
            .and(header("prefer", r#"outlook.timezone="UTC""#))
            .and(query_param("startDateTime", "2030-05-06T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"id": "ours", "isCancelled": false, "showAs": "busy",
                     "start": {"dateTime": "2030-05-06T16:00:00.0000000", "timeZone": "UTC"},
                     "end": {"dateTime": "2030-05-06T16:30:00.0000000", "timeZone": "UTC"},
                     "singleValueExtendedProperties": [{"id": PROPERTY, "value": "appt-1"}]},
                    {"id": "lunch", "isCancelled": false, "showAs": "free",
                     "start": {"dateTime": "2030-05-06T19:00:00.0000000", "timeZone": "UTC"},
                     "end": {"dateTime": "2030-05-06T20:00:00.0000000", "timeZone": "UTC"}}
                ],
                "@odata.nextLink": next_link
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let events = microsoft(&server)
            .list_events(
                "access-1",
                "primary",
                at("2030-05-06T00:00:00Z"),
                at("2030-05-09T00:00:00Z"),
                Tz::America__Vancouver,
            )
            .await
            .expect("events listed");

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].appointment_id.as_deref(), Some("appt-1"));
        assert_eq!(events[0].starts_at, at("2030-05-06T16:00:00Z"));
        assert_eq!(events[0].status, ExternalEventStatus::Confirmed);
        assert_eq!(events[1].status, ExternalEventStatus::Tentative);
        assert_eq!(events[1].appointment_id, None);
        assert_eq!(events[2].status, ExternalEventStatus::Cancelled);
    }

    #[tokio::test]
    async fn subscribe_carries_client_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/subscriptions"))
            .and(body_partial_json(json!({
                "changeType": "created,updated,deleted",
                "notificationUrl": "https://book.example.com/api/webhooks/microsoft",
                "resource": "me/events",
                "clientState": "channel-1.signature"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "sub-1",
                "expirationDateTime": "2030-05-09T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = ChannelRequest {
            channel_id: "channel-1".into(),
            callback_url: "https://book.example.com/api/webhooks/microsoft".into(),
            token: "channel-1.signature".into(),
            expires_at: at("2030-05-09T00:00:00Z"),
        };
        let channel = microsoft(&server)
            .subscribe("access-1", "primary", &request)
            .await
            .expect("subscribed");

        assert_eq!(channel.channel_id, "channel-1");
        assert_eq!(channel.resource_id, "sub-1");
        assert_eq!(channel.expires_at, at("2030-05-09T00:00:00Z"));
    }

    #[tokio::test]
    async fn renew_patches_subscription_in_place() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/subscriptions/sub-1"))
            .and(body_partial_json(json!({"expirationDateTime": "2030-05-12T00:00:00Z"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sub-1",
                "expirationDateTime": "2030-05-12T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let current = WebhookChannel {
            channel_id: "channel-1".into(),
            resource_id: "sub-1".into(),
            expires_at: at("2030-05-09T00:00:00Z"),
        };
        let request = ChannelRequest {
            channel_id: "channel-2".into(),
            callback_url: "https://book.example.com/api/webhooks/microsoft".into(),
            token: "channel-2.signature".into(),
            expires_at: at("2030-05-12T00:00:00Z"),
        };
        let channel = microsoft(&server)
            .renew("access-1", "primary", &current, &request)
            .await
            .expect("renewed");

        assert_eq!(channel.channel_id, "channel-1");
        assert_eq!(channel.expires_at, at("2030-05-12T00:00:00Z"));
    }

    #[tokio::test]
    async fn refresh_sends_scope_and_maps_invalid_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .and(body_string_contains("scope=offline_access"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "AADSTS70008: The refresh token has expired."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = microsoft(&server).refresh_access_token("refresh-1").await.unwrap_err();
        assert!(matches!(err, CalendarError::InvalidGrant(_)));
    }
}
