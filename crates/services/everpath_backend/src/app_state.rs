// --- File: crates/services/everpath_backend/src/app_state.rs ---
use crate::service_factory::EverpathServiceFactory;
use everpath_booking::handlers::BookingState;
use everpath_booking::BookingTransactionCoordinator;
use everpath_calendar::handlers::CalendarState;
use everpath_config::AppConfig;
use everpath_db::{DbClient, Repositories};
use everpath_scheduling::handlers::SchedulingState;
use std::sync::Arc;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbClient,
    pub scheduling: Arc<SchedulingState>,
    pub calendar: Arc<CalendarState>,
    pub booking: Arc<BookingState>,
}

impl AppState {
    /// Wires every route state over one database pool.
    pub fn new(config: Arc<AppConfig>, db: DbClient, services: &EverpathServiceFactory) -> Self {
        let repos = Repositories::new(db.clone());

        let calendar = CalendarState::new(
            config.clone(),
            &repos,
            services.calendar_providers(),
            Some(services.notification_service()),
        );

        let mut coordinator = BookingTransactionCoordinator::new(
            config.booking.clone(),
            &repos,
            services.notification_service(),
        )
        .with_calendar(calendar.sync.clone());
        if let Some(payments) = services.payment_service() {
            coordinator = coordinator.with_payments(payments);
        }

        Self {
            scheduling: Arc::new(SchedulingState::new(config.clone(), &repos)),
            booking: Arc::new(BookingState {
                config: config.clone(),
                coordinator,
            }),
            calendar: Arc::new(calendar),
            db,
            config,
        }
    }
}
