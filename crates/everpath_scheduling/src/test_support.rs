//! Fixtures shared by the database-backed tests.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use everpath_common::models::{
    Agent, AgentRole, Appointment, AppointmentStatus, ApprovalStatus, AvailabilityRule,
    RequestedWindow, RuleKind,
};
use everpath_db::{
    AgentRepository, AppointmentRepository, AvailabilityRuleRepository, DbClient, Repositories,
    SlotGuard,
};

pub const AGENT_ID: &str = "agent-vancouver";
pub const LOCATION: &str = "kitsilano";

struct Unchecked;

impl SlotGuard for Unchecked {
    fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MIN_UTC)
    }

    fn admits(&self, _existing_starts: &[DateTime<Utc>]) -> bool {
        true
    }
}

pub fn bc_agent() -> Agent {
    Agent {
        id: AGENT_ID.into(),
        role: AgentRole::Agent,
        approval_status: ApprovalStatus::Approved,
        display_name: "Morgan Chen".into(),
        email: "morgan@example.com".into(),
        timezone: None,
        province: Some("BC".into()),
        appointment_length_minutes: 30,
        paused: false,
        payment_customer_ref: Some("cus_test".into()),
    }
}

/// Approved BC agent working Mondays 09:00-17:00 at [`LOCATION`].
pub async fn seeded_repos() -> Repositories {
    let repos = Repositories::new(DbClient::in_memory().await.expect("in-memory db"));
    repos.agents.upsert(&bc_agent()).await.expect("agent stored");
    repos
        .rules
        .save_rules(&[AvailabilityRule {
            agent_id: AGENT_ID.into(),
            location: LOCATION.into(),
            kind: RuleKind::Recurring {
                weekday: Weekday::Mon,
                enabled: true,
                start_local: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_local: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            },
        }])
        .await
        .expect("rules stored");
    repos
}

pub async fn book(repos: &Repositories, id: &str, start: DateTime<Utc>) {
    let appointment = Appointment {
        id: id.into(),
        agent_id: AGENT_ID.into(),
        lead_id: "lead-1".into(),
        location: Some(LOCATION.into()),
        requested_date: start.date_naive(),
        requested_window: RequestedWindow::Morning,
        status: AppointmentStatus::Confirmed,
        confirmed_at: Some(start),
        price_minor_units: 4900,
        payment_charge_ref: None,
        rescheduled_from: None,
        created_at: start,
    };
    repos
        .appointments
        .insert_guarded(&appointment, &Unchecked, None)
        .await
        .expect("appointment stored");
}
