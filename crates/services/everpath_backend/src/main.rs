// File: services/everpath_backend/src/main.rs
use everpath_backend::app_state::AppState;
use everpath_backend::build_router;
use everpath_backend::service_factory::EverpathServiceFactory;
use everpath_backend::sweep::spawn_renewal_sweep;
use everpath_common::logging;
use everpath_config::load_config;
use everpath_db::DbClient;
use std::error::Error;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init();
    let config = Arc::new(load_config()?);

    let db = DbClient::new(&config).await?;
    db.init_schema().await?;
    let services = EverpathServiceFactory::new(config.clone())?;
    let state = AppState::new(config.clone(), db, &services);

    match state.calendar.webhooks.clone() {
        Some(manager) => {
            spawn_renewal_sweep(manager);
        }
        None => warn!("No [webhooks] section; calendar push channels are neither created nor renewed"),
    }

    #[allow(unused_mut)] // only mutated with the openapi feature
    let mut app = build_router(&state);

    // Conditionally add Swagger UI and JSON endpoint if openapi feature enabled
    #[cfg(feature = "openapi")]
    {
        use everpath_booking::doc::BookingApiDoc;
        use everpath_calendar::doc::CalendarApiDoc;
        use everpath_scheduling::doc::SchedulingApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            info(
                title = "Everpath API",
                version = "0.1.0",
                description = "Everpath booking marketplace API"
            ),
            servers( (url = "/api", description = "Main API Prefix")),
        )]
        struct ApiDoc;

        let mut openapi_doc = ApiDoc::openapi();
        openapi_doc.merge(SchedulingApiDoc::openapi());
        openapi_doc.merge(CalendarApiDoc::openapi());
        openapi_doc.merge(BookingApiDoc::openapi());
        info!("Adding Swagger UI at /api/docs");

        let swagger_ui = SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", openapi_doc);
        app = app.merge(swagger_ui);
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
