#[cfg(test)]
mod tests {
    use crate::error::CalendarError;
    use crate::oauth::OAuthTokenManager;
    use crate::sync::CalendarSyncAdapter;
    use crate::test_support::{appointment_event, registry, repos, stored_connection, AGENT_ID};
    use chrono::{Duration, Utc};
    use everpath_common::models::{ExternalEventStatus, Provider};
    use everpath_db::{ExternalEventRepository, Repositories};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(repos: &Repositories, server: &MockServer) -> CalendarSyncAdapter {
        let tokens = OAuthTokenManager::new(repos.connections.clone(), registry(server));
        CalendarSyncAdapter::new(tokens, repos.connections.clone(), repos.external_events.clone())
    }

    async fn mount_google_insert(server: &MockServer, id: &str) {
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": id})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn create_event_mirrors_a_platform_row() {
        let server = MockServer::start().await;
        mount_google_insert(&server, "g-evt-1").await;
        let repos = repos().await;
        let connection =
            stored_connection(&repos, Provider::Google, Utc::now() + Duration::hours(1)).await;

        let mirror = adapter(&repos, &server)
            .create_event(&connection, &appointment_event())
            .await
            .expect("event created");
        assert!(mirror.is_platform_created);
        assert_eq!(mirror.status, ExternalEventStatus::Confirmed);

        let rows = repos.external_events.find_for_appointment("appt-1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].provider_event_id, "g-evt-1");
        assert_eq!(rows[0].specialist_id, AGENT_ID);
    }

    #[tokio::test]
    async fn sync_appointment_isolates_provider_failures() {
        let server = MockServer::start().await;
        mount_google_insert(&server, "g-evt-1").await;
        Mock::given(method("POST"))
            .and(path("/me/events"))
            .respond_with(ResponseTemplate::new(500).set_body_string("mailbox unavailable"))
            .mount(&server)
            .await;
        let repos = repos().await;
        let expires = Utc::now() + Duration::hours(1);
        stored_connection(&repos, Provider::Google, expires).await;
        stored_connection(&repos, Provider::Microsoft, expires).await;

        let results = adapter(&repos, &server)
            .sync_appointment(AGENT_ID, &appointment_event())
            .await
            .expect("connections loaded");
        assert_eq!(results.len(), 2);
        let google = results.iter().find(|r| r.provider == Provider::Google).unwrap();
        let microsoft = results.iter().find(|r| r.provider == Provider::Microsoft).unwrap();
        assert!(google.result.is_ok());
        assert!(matches!(microsoft.result, Err(CalendarError::Api { status: 500, .. })));

        let rows = repos.external_events.find_for_appointment("appt-1").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn delete_of_missing_event_removes_and_tombstones() {
        let server = MockServer::start().await;
        mount_google_insert(&server, "g-evt-1").await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/primary/events/g-evt-1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        let repos = repos().await;
        let connection =
            stored_connection(&repos, Provider::Google, Utc::now() + Duration::hours(1)).await;
        let sync = adapter(&repos, &server);
        let mirror = sync.create_event(&connection, &appointment_event()).await.unwrap();

        sync.delete_event(&mirror).await.expect("404 counts as deleted");

        assert!(repos.external_events.find_for_appointment("appt-1").await.unwrap().is_empty());
        let tombstones = repos
            .external_events
            .tombstoned_ids(AGENT_ID, Provider::Google)
            .await
            .unwrap();
        assert!(tombstones.contains("g-evt-1"));
        assert!(!repos.external_events.upsert(&mirror).await.unwrap());
    }

    #[tokio::test]
    async fn provider_failure_still_removes_the_local_row() {
        let server = MockServer::start().await;
        mount_google_insert(&server, "g-evt-1").await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;
        let repos = repos().await;
        let connection =
            stored_connection(&repos, Provider::Google, Utc::now() + Duration::hours(1)).await;
        let sync = adapter(&repos, &server);
        sync.create_event(&connection, &appointment_event()).await.unwrap();

        let results = sync.remove_appointment("appt-1").await.expect("rows loaded");
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].result, Err(CalendarError::Api { status: 500, .. })));

        assert!(repos.external_events.find_for_appointment("appt-1").await.unwrap().is_empty());
        let tombstones = repos
            .external_events
            .tombstoned_ids(AGENT_ID, Provider::Google)
            .await
            .unwrap();
        assert!(tombstones.contains("g-evt-1"));
    }
}
