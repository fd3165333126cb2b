// File: crates/everpath_scheduling/src/handlers.rs
use crate::availability::{AvailabilityResolver, AvailabilityResponse};
use crate::error::SchedulingError;
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{NaiveDate, Utc};
use everpath_common::models::{AvailabilityRule, RuleKind};
use everpath_common::EverpathError;
use everpath_config::AppConfig;
use everpath_db::{
    AgentRepository, AvailabilityRuleRepository, Repositories, SqlAgentRepository,
    SqlAvailabilityRuleRepository,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "openapi")]
use utoipa::{IntoParams, ToSchema};

// Shared state for the availability and rule routes
#[derive(Clone)]
pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub resolver: AvailabilityResolver,
    pub agents: SqlAgentRepository,
    pub rules: SqlAvailabilityRuleRepository,
}

impl SchedulingState {
    pub fn new(config: Arc<AppConfig>, repos: &Repositories) -> Self {
        Self {
            resolver: AvailabilityResolver::new(repos, config.booking.clone()),
            agents: repos.agents.clone(),
            rules: repos.rules.clone(),
            config,
        }
    }
}

#[derive(Deserialize, Debug)]
#[cfg_attr(feature = "openapi", derive(IntoParams, ToSchema))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub agent_id: String,
    pub location: String,
    /// First date, YYYY-MM-DD
    #[cfg_attr(feature = "openapi", schema(format = "date", example = "2030-05-06"))]
    pub start_date: String,
    /// Exclusive end date, YYYY-MM-DD
    #[cfg_attr(feature = "openapi", schema(format = "date", example = "2030-05-13"))]
    pub end_date: String,
}

#[derive(Deserialize, Debug)]
#[cfg_attr(feature = "openapi", derive(IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct RulesQuery {
    pub location: String,
}

#[derive(Deserialize, Debug)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SaveRulesRequest {
    pub location: String,
    pub rules: Vec<RuleKind>,
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RulesResponse {
    pub agent_id: String,
    pub location: String,
    pub rules: Vec<RuleKind>,
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, EverpathError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| EverpathError::ValidationError(format!("Invalid {field} format (YYYY-MM-DD)")))
}

/// Handler for open slots of one agent and location.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/availability",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Open slots per date", body = AvailabilityResponse),
        (status = 400, description = "Invalid dates or range too long"),
        (status = 404, description = "Unknown or unapproved agent")
    ),
    tag = "Scheduling"
))]
pub async fn get_availability_handler(
    State(state): State<Arc<SchedulingState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, EverpathError> {
    let from = parse_date("startDate", &query.start_date)?;
    let to = parse_date("endDate", &query.end_date)?;

    let response = state
        .resolver
        .resolve(&query.agent_id, &query.location, from, to, Utc::now())
        .await?;
    Ok(Json(response))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/agents/{agent_id}/availability-rules",
    params(("agent_id" = String, Path, description = "Agent id"), RulesQuery),
    responses(
        (status = 200, description = "Weekly rules and overrides", body = RulesResponse),
        (status = 404, description = "Unknown agent")
    ),
    tag = "Scheduling"
))]
pub async fn get_rules_handler(
    State(state): State<Arc<SchedulingState>>,
    Path(agent_id): Path<String>,
    Query(query): Query<RulesQuery>,
) -> Result<Json<RulesResponse>, EverpathError> {
    ensure_agent(&state, &agent_id).await?;
    let rules = state
        .rules
        .find_rules(&agent_id, &query.location)
        .await
        .map_err(SchedulingError::from)?;

    Ok(Json(RulesResponse {
        agent_id,
        location: query.location,
        rules: rules.into_iter().map(|r| r.kind).collect(),
    }))
}

/// Replaces weekly rules (per weekday) and upserts overrides (per date).
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/agents/{agent_id}/availability-rules",
    params(("agent_id" = String, Path, description = "Agent id")),
    request_body = SaveRulesRequest,
    responses(
        (status = 200, description = "Stored rules", body = RulesResponse),
        (status = 400, description = "A rule ends before it starts"),
        (status = 404, description = "Unknown agent")
    ),
    tag = "Scheduling"
))]
pub async fn put_rules_handler(
    State(state): State<Arc<SchedulingState>>,
    Path(agent_id): Path<String>,
    Json(payload): Json<SaveRulesRequest>,
) -> Result<Json<RulesResponse>, EverpathError> {
    if payload.location.trim().is_empty() {
        return Err(EverpathError::ValidationError("location is required".to_string()));
    }
    for kind in &payload.rules {
        if kind.start_local() >= kind.end_local() {
            return Err(EverpathError::ValidationError(format!(
                "rule {} - {} must start before it ends",
                kind.start_local().format("%H:%M"),
                kind.end_local().format("%H:%M")
            )));
        }
    }
    ensure_agent(&state, &agent_id).await?;

    let rules: Vec<AvailabilityRule> = payload
        .rules
        .into_iter()
        .map(|kind| AvailabilityRule {
            agent_id: agent_id.clone(),
            location: payload.location.clone(),
            kind,
        })
        .collect();
    state
        .rules
        .save_rules(&rules)
        .await
        .map_err(SchedulingError::from)?;
    info!(agent_id, location = %payload.location, "Saved {} availability rules", rules.len());

    let stored = state
        .rules
        .find_rules(&agent_id, &payload.location)
        .await
        .map_err(SchedulingError::from)?;
    Ok(Json(RulesResponse {
        agent_id,
        location: payload.location,
        rules: stored.into_iter().map(|r| r.kind).collect(),
    }))
}

async fn ensure_agent(state: &SchedulingState, agent_id: &str) -> Result<(), EverpathError> {
    state
        .agents
        .find_by_id(agent_id)
        .await
        .map_err(SchedulingError::from)?
        .map(|_| ())
        .ok_or_else(|| SchedulingError::AgentNotFound(agent_id.to_string()).into())
}
