// File: crates/everpath_scheduling/src/doc.rs

#![cfg(feature = "openapi")]
use crate::availability::{AvailabilityResponse, DayAvailability};
use crate::handlers::{AvailabilityQuery, RulesResponse, SaveRulesRequest};
use crate::slots::Slot;
use everpath_common::models::RuleKind;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::get_availability_handler,
        crate::handlers::get_rules_handler,
        crate::handlers::put_rules_handler
    ),
    components(
        schemas(
            AvailabilityQuery,
            AvailabilityResponse,
            DayAvailability,
            Slot,
            RuleKind,
            SaveRulesRequest,
            RulesResponse
        )
    ),
    tags(
        (name = "Scheduling", description = "Agent availability and working hours")
    ),
    servers(
        (url = "/api", description = "Everpath API server")
    )
)]
pub struct SchedulingApiDoc;
