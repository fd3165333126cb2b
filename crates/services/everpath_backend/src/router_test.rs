#[cfg(test)]
mod tests {
    use crate::app_state::AppState;
    use crate::build_router;
    use crate::service_factory::EverpathServiceFactory;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use everpath_config::AppConfig;
    use everpath_db::DbClient;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        let config = Arc::new(AppConfig::default());
        let services = EverpathServiceFactory::new(config.clone()).expect("services");
        assert!(services.payment_service().is_none());
        let db = DbClient::in_memory().await.expect("in-memory db");
        build_router(&AppState::new(config, db, &services))
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_the_database() {
        let response = app()
            .await
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"status": "ok", "database": "up"}));
    }

    #[tokio::test]
    async fn feature_routes_are_nested_under_api() {
        let app = app().await;

        let booking = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/book")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({
                            "agentId": "ghost",
                            "startsAt": "2030-05-06T16:00:00Z",
                            "firstName": "Jamie",
                            "lastName": "Rivera",
                            "email": "jamie@example.com"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(booking.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(booking).await["code"], "NOT_FOUND");

        let availability = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/availability?agentId=ghost&location=x&startDate=2030-05-06&endDate=2030-05-07")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(availability.status(), StatusCode::NOT_FOUND);

        let unprefixed = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(unprefixed.status(), StatusCode::NOT_FOUND);
    }
}
