#[cfg(test)]
mod tests {
    use crate::error::CalendarError;
    use crate::oauth::OAuthTokenManager;
    use crate::test_support::{registry, repos, stored_connection};
    use chrono::{Duration, Utc};
    use everpath_common::models::Provider;
    use everpath_common::services::{BoxFuture, NotificationEvent, NotificationService};
    use everpath_common::EverpathError;
    use everpath_db::CalendarConnectionRepository;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(NotificationEvent, Value)>>,
    }

    impl NotificationService for RecordingNotifier {
        fn send(&self, event: NotificationEvent, payload: Value) -> BoxFuture<'_, (), EverpathError> {
            self.sent.lock().unwrap().push((event, payload));
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let repos = repos().await;
        let connection =
            stored_connection(&repos, Provider::Google, Utc::now() + Duration::hours(1)).await;

        let manager = OAuthTokenManager::new(repos.connections.clone(), registry(&server));
        let token = manager
            .ensure_valid_access_token(&connection)
            .await
            .expect("token");
        assert_eq!(token, "access-old");
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-new",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
        let repos = repos().await;
        let connection =
            stored_connection(&repos, Provider::Google, Utc::now() + Duration::seconds(30)).await;

        let manager = OAuthTokenManager::new(repos.connections.clone(), registry(&server));
        let token = manager
            .ensure_valid_access_token(&connection)
            .await
            .expect("token");
        assert_eq!(token, "access-new");

        let stored = repos
            .connections
            .find_by_id(&connection.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_token, "access-new");
        assert_eq!(stored.refresh_token, "refresh-1");
        assert!(stored.token_expires_at > Utc::now() + Duration::minutes(50));
    }

    #[tokio::test]
    async fn rotated_refresh_token_replaces_the_old_one() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-new",
                "refresh_token": "refresh-2",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
        let repos = repos().await;
        let connection =
            stored_connection(&repos, Provider::Microsoft, Utc::now() - Duration::minutes(5)).await;

        let manager = OAuthTokenManager::new(repos.connections.clone(), registry(&server));
        manager
            .ensure_valid_access_token(&connection)
            .await
            .expect("token");

        let stored = repos
            .connections
            .find_by_id(&connection.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.refresh_token, "refresh-2");
    }

    #[tokio::test]
    async fn revoked_grant_disables_sync_and_notifies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
            .expect(1)
            .mount(&server)
            .await;
        let repos = repos().await;
        let connection =
            stored_connection(&repos, Provider::Google, Utc::now() - Duration::hours(2)).await;
        let notifier = Arc::new(RecordingNotifier::default());

        let manager = OAuthTokenManager::new(repos.connections.clone(), registry(&server))
            .with_notifier(notifier.clone());
        let err = manager
            .ensure_valid_access_token(&connection)
            .await
            .unwrap_err();
        assert!(matches!(err, CalendarError::ReconnectRequired(ref id) if id == "conn-google"));

        let stored = repos
            .connections
            .find_by_id(&connection.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.sync_enabled);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, NotificationEvent::CalendarReconnectRequired);
        assert_eq!(sent[0].1["agentId"], "agent-vancouver");

        // Terminal until reconnect: no further refresh attempts.
        drop(sent);
        let again = manager.ensure_valid_access_token(&stored).await.unwrap_err();
        assert!(matches!(again, CalendarError::ReconnectRequired(_)));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "access-new", "expires_in": 3600}))
                    .set_delay(std::time::Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;
        let repos = repos().await;
        let connection =
            stored_connection(&repos, Provider::Google, Utc::now() - Duration::minutes(1)).await;

        let manager = OAuthTokenManager::new(repos.connections.clone(), registry(&server));
        let (a, b, c) = tokio::join!(
            manager.ensure_valid_access_token(&connection),
            manager.ensure_valid_access_token(&connection),
            manager.ensure_valid_access_token(&connection),
        );
        assert_eq!(a.unwrap(), "access-new");
        assert_eq!(b.unwrap(), "access-new");
        assert_eq!(c.unwrap(), "access-new");
        assert_eq!(manager.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn transient_provider_errors_leave_sync_enabled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
            .mount(&server)
            .await;
        let repos = repos().await;
        let connection =
            stored_connection(&repos, Provider::Google, Utc::now() - Duration::minutes(1)).await;

        let manager = OAuthTokenManager::new(repos.connections.clone(), registry(&server));
        let err = manager
            .ensure_valid_access_token(&connection)
            .await
            .unwrap_err();
        assert!(matches!(err, CalendarError::Api { status: 503, .. }));
        assert_eq!(manager.tracked_locks(), 0);

        let stored = repos
            .connections
            .find_by_id(&connection.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.sync_enabled);
    }
}
