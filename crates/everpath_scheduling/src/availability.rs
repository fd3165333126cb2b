use crate::busy::BusyIntervalCollector;
use crate::context::AgentContext;
use crate::error::SchedulingError;
use crate::slots::{generate_slots, resolve_local, Slot};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use everpath_config::BookingConfig;
use everpath_db::{
    AgentRepository, AvailabilityRuleRepository, Repositories, SqlAgentRepository,
    SqlAvailabilityRuleRepository,
};
use serde::Serialize;
use tracing::{debug, info};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date", example = "2030-05-06"))]
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub agent_id: String,
    pub location: String,
    /// IANA zone the agent's working hours were evaluated in
    #[cfg_attr(feature = "openapi", schema(example = "America/Vancouver"))]
    pub timezone: String,
    pub days: Vec<DayAvailability>,
}

/// Open slots per date: generated from rules, minus busy time. Reads only.
#[derive(Debug, Clone)]
pub struct AvailabilityResolver {
    agents: SqlAgentRepository,
    rules: SqlAvailabilityRuleRepository,
    busy: BusyIntervalCollector,
    booking: BookingConfig,
}

impl AvailabilityResolver {
    pub fn new(repos: &Repositories, booking: BookingConfig) -> Self {
        Self {
            agents: repos.agents.clone(),
            rules: repos.rules.clone(),
            busy: BusyIntervalCollector::new(
                repos.appointments.clone(),
                repos.external_events.clone(),
            ),
            booking,
        }
    }

    /// Loads the agent and resolves its zone and slot length.
    ///
    /// Only approved agents with the `agent` role are visible.
    pub async fn agent_context(&self, agent_id: &str) -> Result<AgentContext, SchedulingError> {
        let agent = self
            .agents
            .find_by_id(agent_id)
            .await?
            .filter(|a| a.is_bookable())
            .ok_or_else(|| SchedulingError::AgentNotFound(agent_id.to_string()))?;
        AgentContext::from_agent(&agent, self.booking.default_appointment_length_minutes)
    }

    pub async fn resolve(
        &self,
        agent_id: &str,
        location: &str,
        from: NaiveDate,
        to: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<AvailabilityResponse, SchedulingError> {
        if to < from {
            return Err(SchedulingError::Validation(
                "endDate must not be before startDate".to_string(),
            ));
        }
        let span = (to - from).num_days();
        if span > self.booking.max_range_days {
            return Err(SchedulingError::Validation(format!(
                "date range of {span} days exceeds the limit of {} days",
                self.booking.max_range_days
            )));
        }

        let agent = self.agent_context(agent_id).await?;
        self.resolve_for(&agent, location, from, to, now).await
    }

    /// Same as [`Self::resolve`] for an agent that is already loaded.
    pub async fn resolve_for(
        &self,
        agent: &AgentContext,
        location: &str,
        from: NaiveDate,
        to: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<AvailabilityResponse, SchedulingError> {
        let rules = self
            .rules
            .find_rules_for_range(&agent.agent_id, location, from, to)
            .await?;
        let days = generate_slots(&rules, agent.timezone, from, to, agent.appointment_length, now)?;

        let busy = match range_bounds(agent, from, to) {
            Some((start, end)) if days.iter().any(|d| !d.slots.is_empty()) => {
                self.busy.collect(agent, start, end).await?
            }
            _ => Vec::new(),
        };

        let days: Vec<DayAvailability> = days
            .into_iter()
            .map(|day| DayAvailability {
                date: day.date,
                slots: day
                    .slots
                    .into_iter()
                    .filter(|slot| !busy.iter().any(|b| b.overlaps(slot.starts_at, slot.ends_at)))
                    .collect(),
            })
            .collect();

        info!(
            agent_id = %agent.agent_id,
            location,
            "Resolved {} open slots between {} and {}",
            days.iter().map(|d| d.slots.len()).sum::<usize>(),
            from,
            to
        );
        Ok(AvailabilityResponse {
            agent_id: agent.agent_id.clone(),
            location: location.to_string(),
            timezone: agent.timezone_name().to_string(),
            days,
        })
    }
}

/// Absolute span covering every local date in `[from, to)`, padded a day on both sides for
/// windows that run past midnight.
fn range_bounds(
    agent: &AgentContext,
    from: NaiveDate,
    to: NaiveDate,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let midnight = NaiveTime::from_hms_opt(0, 0, 0)?;
    let start = resolve_local(agent.timezone, from, midnight)? - Duration::days(1);
    let end = resolve_local(agent.timezone, to, midnight)? + Duration::days(1);
    debug!("Busy lookup window {} - {}", start, end);
    Some((start, end))
}
