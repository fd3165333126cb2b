//! Repository modules for database access
//!
//! Each entity has a trait (`<entity>.rs`) and an `sqlx` implementation (`<entity>_sql.rs`).

pub mod agent;
pub mod agent_sql;
pub mod appointment;
pub mod appointment_sql;
pub mod availability_rule;
pub mod availability_rule_sql;
pub mod calendar_connection;
pub mod calendar_connection_sql;
pub mod declined_payment;
pub mod declined_payment_sql;
pub mod external_event;
pub mod external_event_sql;
pub mod lead;
pub mod lead_sql;


pub use agent::AgentRepository;
pub use agent_sql::SqlAgentRepository;
pub use appointment::{slot_bucket, AppointmentRepository, SlotGuard, SLOT_BUCKET_MS};
pub use appointment_sql::SqlAppointmentRepository;
pub use availability_rule::AvailabilityRuleRepository;
pub use availability_rule_sql::SqlAvailabilityRuleRepository;
pub use calendar_connection::{CalendarConnectionRepository, ChannelRecord};
pub use calendar_connection_sql::SqlCalendarConnectionRepository;
pub use declined_payment::DeclinedPaymentRepository;
pub use declined_payment_sql::SqlDeclinedPaymentRepository;
pub use external_event::ExternalEventRepository;
pub use external_event_sql::SqlExternalEventRepository;
pub use lead::LeadRepository;
pub use lead_sql::SqlLeadRepository;

use crate::DbClient;

/// Every SQL repository over one shared pool.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub agents: SqlAgentRepository,
    pub rules: SqlAvailabilityRuleRepository,
    pub appointments: SqlAppointmentRepository,
    pub leads: SqlLeadRepository,
    pub declined_payments: SqlDeclinedPaymentRepository,
    pub connections: SqlCalendarConnectionRepository,
    pub external_events: SqlExternalEventRepository,
}

impl Repositories {
    pub fn new(db_client: DbClient) -> Self {
        Self {
            agents: SqlAgentRepository::new(db_client.clone()),
            rules: SqlAvailabilityRuleRepository::new(db_client.clone()),
            appointments: SqlAppointmentRepository::new(db_client.clone()),
            leads: SqlLeadRepository::new(db_client.clone()),
            declined_payments: SqlDeclinedPaymentRepository::new(db_client.clone()),
            connections: SqlCalendarConnectionRepository::new(db_client.clone()),
            external_events: SqlExternalEventRepository::new(db_client),
        }
    }
}
