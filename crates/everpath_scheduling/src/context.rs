use crate::error::SchedulingError;
use crate::timezone::resolve_timezone;
use chrono::Duration;
use chrono_tz::Tz;
use everpath_common::models::Agent;

/// Per-agent facts every scheduling, booking and sync step needs, resolved once.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentContext {
    pub agent_id: String,
    pub timezone: Tz,
    pub appointment_length: Duration,
}

impl AgentContext {
    /// Builds the context from a stored profile. A non-positive length on the profile falls
    /// back to `default_length_minutes`.
    pub fn from_agent(agent: &Agent, default_length_minutes: i64) -> Result<Self, SchedulingError> {
        let minutes = if agent.appointment_length_minutes > 0 {
            agent.appointment_length_minutes
        } else {
            default_length_minutes
        };
        if minutes <= 0 {
            return Err(SchedulingError::Validation(format!(
                "appointment length must be positive, got {minutes} minutes"
            )));
        }

        Ok(Self {
            agent_id: agent.id.clone(),
            timezone: resolve_timezone(agent.timezone.as_deref(), agent.province.as_deref()),
            appointment_length: Duration::minutes(minutes),
        })
    }

    pub fn timezone_name(&self) -> &'static str {
        self.timezone.name()
    }
}
