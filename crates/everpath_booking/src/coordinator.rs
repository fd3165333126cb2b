//! The booking transaction.
//!
//! Validation, the conflict check, the lead lookup and the guarded insert run on the
//! request path and decide the response. Payment, calendar sync and confirmation mail run
//! afterwards as separate tasks; a failure in one is logged and reported, never
//! propagated to the caller or to the other tasks.

use crate::error::BookingError;
use chrono::{DateTime, Timelike, Utc};
use everpath_calendar::{CalendarSyncAdapter, NewProviderEvent, ProviderSyncResult};
use everpath_common::models::{
    Agent, Appointment, AppointmentStatus, DeclinedPayment, ExternalEvent, Lead, LeadDetails,
    RequestedWindow,
};
use everpath_common::services::{
    ChargeOutcome, NotificationEvent, NotificationService, PaymentService,
};
use everpath_config::BookingConfig;
use everpath_db::{
    AgentRepository, AppointmentRepository, DeclinedPaymentRepository, LeadRepository,
    Repositories, SqlAgentRepository, SqlAppointmentRepository, SqlDeclinedPaymentRepository,
    SqlLeadRepository,
};
use everpath_scheduling::{AgentContext, ConflictCheck, SlotConflictChecker};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Decline reason used when the agent has no stored payment customer.
pub const NO_PAYMENT_CUSTOMER: &str = "no_payment_customer";

#[derive(Deserialize, Debug, Clone, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub agent_id: String,
    /// RFC 3339 instant
    #[cfg_attr(feature = "openapi", schema(example = "2030-05-06T16:00:00Z"))]
    pub starts_at: String,
    /// Defaults to `startsAt` plus the agent's appointment length
    pub ends_at: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub service_type: Option<String>,
    /// Appointment this booking replaces; it is cancelled in the same transaction
    pub reschedule_appointment_id: Option<String>,
    pub location: Option<String>,
}

impl BookingRequest {
    fn lead_details(&self) -> LeadDetails {
        LeadDetails {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.clone(),
            city: self.city.clone(),
            province: self.province.clone(),
            service_type: self.service_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentReport {
    Charged { charge_id: String },
    Declined { reason: String },
    /// Provider or transport failure; logged, nothing recorded.
    Failed(String),
    /// No payment service configured, or nothing to charge.
    Skipped,
}

#[derive(Debug, Default)]
pub struct CalendarReport {
    pub created: Vec<ProviderSyncResult<ExternalEvent>>,
    pub removed: Vec<ProviderSyncResult<()>>,
    /// Failures before any provider was reached, e.g. the connection lookup.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationReport {
    pub event: NotificationEvent,
    pub result: Result<(), String>,
}

/// What the detached side effects of one booking or cancellation did.
#[derive(Debug)]
pub struct SideEffectReport {
    pub payment: PaymentReport,
    pub calendar: CalendarReport,
    pub notifications: Vec<NotificationReport>,
}

/// The committed appointment plus the handle of its side effects.
///
/// Dropping `side_effects` detaches the tasks; they still run to completion.
#[derive(Debug)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    pub lead: Lead,
    pub side_effects: JoinHandle<SideEffectReport>,
}

#[derive(Debug)]
pub struct CancelOutcome {
    pub appointment: Appointment,
    pub side_effects: JoinHandle<SideEffectReport>,
}

#[derive(Clone)]
pub struct BookingTransactionCoordinator {
    config: BookingConfig,
    agents: SqlAgentRepository,
    appointments: SqlAppointmentRepository,
    leads: SqlLeadRepository,
    declined_payments: SqlDeclinedPaymentRepository,
    conflicts: SlotConflictChecker,
    payments: Option<Arc<dyn PaymentService>>,
    notifier: Arc<dyn NotificationService>,
    calendar: Option<CalendarSyncAdapter>,
}

impl BookingTransactionCoordinator {
    pub fn new(
        config: BookingConfig,
        repos: &Repositories,
        notifier: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            conflicts: SlotConflictChecker::new(
                repos.appointments.clone(),
                config.conflict_tolerance_seconds,
            ),
            agents: repos.agents.clone(),
            appointments: repos.appointments.clone(),
            leads: repos.leads.clone(),
            declined_payments: repos.declined_payments.clone(),
            payments: None,
            notifier,
            calendar: None,
            config,
        }
    }

    pub fn with_payments(mut self, payments: Arc<dyn PaymentService>) -> Self {
        self.payments = Some(payments);
        self
    }

    pub fn with_calendar(mut self, calendar: CalendarSyncAdapter) -> Self {
        self.calendar = Some(calendar);
        self
    }

    /// Books a slot and starts its side effects.
    ///
    /// Returns once the appointment is committed as `confirmed`.
    pub async fn book(&self, request: &BookingRequest) -> Result<BookingOutcome, BookingError> {
        let agent = self
            .agents
            .find_by_id(&request.agent_id)
            .await?
            .ok_or_else(|| BookingError::AgentNotFound(request.agent_id.clone()))?;
        if !agent.is_bookable() {
            info!(agent_id = %agent.id, "Booking refused: agent is {} / {}", agent.role, agent.approval_status);
            return Err(BookingError::AgentNotApproved(agent.id));
        }
        let context = AgentContext::from_agent(&agent, self.config.default_appointment_length_minutes)?;

        let start = parse_instant("startsAt", &request.starts_at)?;
        let end = match request.ends_at.as_deref().filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => parse_instant("endsAt", raw)?,
            None => start + context.appointment_length,
        };
        if end <= start {
            return Err(BookingError::InvalidTimestamp(
                "endsAt must be after startsAt".to_string(),
            ));
        }
        let details = request.lead_details();
        if details.email.is_empty() || !details.email.contains('@') {
            return Err(BookingError::Validation("a valid email is required".to_string()));
        }
        if details.first_name.is_empty() {
            return Err(BookingError::Validation("firstName is required".to_string()));
        }

        let replaces = request
            .reschedule_appointment_id
            .as_deref()
            .filter(|id| !id.is_empty());
        if let ConflictCheck::Conflict { appointment_id } =
            self.conflicts.check(&agent.id, start, end, replaces).await?
        {
            return Err(BookingError::SlotConflict(format!(
                "agent {} already has appointment {} at {}",
                agent.id,
                appointment_id,
                start.to_rfc3339()
            )));
        }

        if let Some(prior_id) = replaces {
            let prior = self
                .appointments
                .find_by_id(prior_id)
                .await?
                .filter(|prior| prior.agent_id == agent.id)
                .ok_or_else(|| BookingError::AppointmentNotFound(prior_id.to_string()))?;
            if !prior.status.blocks_time() {
                return Err(BookingError::Validation(format!(
                    "appointment {} is {} and cannot be rescheduled",
                    prior.id, prior.status
                )));
            }
        }

        let lead = self.leads.resolve_or_create(&details).await?;

        let local_start = start.with_timezone(&context.timezone);
        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            agent_id: agent.id.clone(),
            lead_id: lead.id.clone(),
            location: request.location.clone().filter(|l| !l.is_empty()),
            requested_date: local_start.date_naive(),
            requested_window: RequestedWindow::from_local_hour(local_start.hour()),
            status: AppointmentStatus::Confirmed,
            confirmed_at: Some(start),
            price_minor_units: self.config.price_minor_units,
            payment_charge_ref: None,
            rescheduled_from: replaces.map(str::to_string),
            created_at: Utc::now(),
        };
        self.appointments
            .insert_guarded(&appointment, &self.conflicts.claim(start, end), replaces)
            .await?;
        info!(
            appointment_id = %appointment.id,
            agent_id = %agent.id,
            lead_id = %lead.id,
            "Appointment confirmed for {} ({} local, {})",
            start.to_rfc3339(),
            local_start.format("%Y-%m-%d %H:%M"),
            context.timezone_name()
        );

        let side_effects = self.spawn_booking_effects(BookingJob {
            agent,
            context,
            lead: lead.clone(),
            appointment: appointment.clone(),
            starts_at: start,
            ends_at: end,
        });

        Ok(BookingOutcome {
            appointment,
            lead,
            side_effects,
        })
    }

    /// Cancels an active appointment, freeing its slot, and starts the clean-up tasks.
    pub async fn cancel(&self, appointment_id: &str) -> Result<CancelOutcome, BookingError> {
        let existing = self
            .appointments
            .find_by_id(appointment_id)
            .await?
            .ok_or_else(|| BookingError::AppointmentNotFound(appointment_id.to_string()))?;
        if !existing.status.blocks_time() {
            return Err(BookingError::Validation(format!(
                "appointment {} is already {}",
                existing.id, existing.status
            )));
        }

        let appointment = self
            .appointments
            .cancel(appointment_id)
            .await?
            .ok_or_else(|| BookingError::AppointmentNotFound(appointment_id.to_string()))?;

        let this = self.clone();
        let cancelled = appointment.clone();
        let side_effects = tokio::spawn(async move {
            let calendar = {
                let this = this.clone();
                let appointment_id = cancelled.id.clone();
                tokio::spawn(async move { this.remove_from_calendars(&appointment_id).await })
            };
            let notifications = {
                let this = this.clone();
                let cancelled = cancelled.clone();
                tokio::spawn(async move { this.notify_cancelled(&cancelled).await })
            };
            SideEffectReport {
                payment: PaymentReport::Skipped,
                calendar: join_calendar(&cancelled.id, calendar).await,
                notifications: join_notifications(&cancelled.id, notifications).await,
            }
        });

        Ok(CancelOutcome {
            appointment,
            side_effects,
        })
    }

    fn spawn_booking_effects(&self, job: BookingJob) -> JoinHandle<SideEffectReport> {
        let this = self.clone();
        let job = Arc::new(job);
        tokio::spawn(async move {
            let payment = {
                let (this, job) = (this.clone(), job.clone());
                tokio::spawn(async move { this.charge(&job.agent, &job.appointment).await })
            };
            let calendar = {
                let (this, job) = (this.clone(), job.clone());
                tokio::spawn(async move { this.sync_calendars(&job).await })
            };
            let notifications = {
                let (this, job) = (this.clone(), job.clone());
                tokio::spawn(async move { this.notify_confirmed(&job).await })
            };

            let appointment_id = job.appointment.id.as_str();
            let payment = payment.await.unwrap_or_else(|e| {
                error!(appointment_id, "Payment task aborted: {}", e);
                PaymentReport::Failed(e.to_string())
            });
            SideEffectReport {
                payment,
                calendar: join_calendar(appointment_id, calendar).await,
                notifications: join_notifications(appointment_id, notifications).await,
            }
        })
    }

    async fn charge(&self, agent: &Agent, appointment: &Appointment) -> PaymentReport {
        let Some(payments) = &self.payments else {
            warn!(appointment_id = %appointment.id, "No payment service configured; appointment not charged");
            return PaymentReport::Skipped;
        };
        let Some(customer_ref) = agent.payment_customer_ref.as_deref().filter(|c| !c.is_empty()) else {
            return self.record_decline(agent, appointment, NO_PAYMENT_CUSTOMER).await;
        };

        match payments
            .charge(customer_ref, appointment.price_minor_units, &appointment.id)
            .await
        {
            Ok(ChargeOutcome::Success { charge_id }) => {
                info!(appointment_id = %appointment.id, agent_id = %agent.id, "Charged as {}", charge_id);
                if let Err(e) = self
                    .appointments
                    .set_payment_charge_ref(&appointment.id, &charge_id)
                    .await
                {
                    error!(appointment_id = %appointment.id, "Charge {} not stored: {}", charge_id, e);
                }
                PaymentReport::Charged { charge_id }
            }
            Ok(ChargeOutcome::Declined { reason }) => {
                self.record_decline(agent, appointment, &reason).await
            }
            Err(e) => {
                error!(
                    appointment_id = %appointment.id,
                    agent_id = %agent.id,
                    provider = "payment",
                    "Charge failed: {}",
                    e
                );
                PaymentReport::Failed(e.to_string())
            }
        }
    }

    /// Keeps the booking, records the decline, pauses the agent and tells them.
    async fn record_decline(&self, agent: &Agent, appointment: &Appointment, reason: &str) -> PaymentReport {
        warn!(appointment_id = %appointment.id, agent_id = %agent.id, "Payment declined: {}", reason);
        let declined = DeclinedPayment {
            id: Uuid::new_v4().to_string(),
            appointment_id: appointment.id.clone(),
            agent_id: agent.id.clone(),
            amount_minor_units: appointment.price_minor_units,
            reason: reason.to_string(),
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.declined_payments.record(&declined).await {
            error!(appointment_id = %appointment.id, "Declined payment not recorded: {}", e);
        }
        match self.agents.set_paused(&agent.id, true).await {
            Ok(true) => info!(agent_id = %agent.id, "Agent paused after declined payment"),
            Ok(false) => warn!(agent_id = %agent.id, "Agent vanished before it could be paused"),
            Err(e) => error!(agent_id = %agent.id, "Agent not paused: {}", e),
        }

        let payload = json!({
            "to": agent.email,
            "agentName": agent.display_name,
            "appointmentId": appointment.id,
            "amountMinorUnits": appointment.price_minor_units,
            "currency": self.config.currency,
            "reason": reason,
        });
        if let Err(e) = self.notifier.send(NotificationEvent::PaymentDeclined, payload).await {
            error!(agent_id = %agent.id, "Payment declined notice not sent: {}", e);
        }
        PaymentReport::Declined {
            reason: reason.to_string(),
        }
    }

    async fn sync_calendars(&self, job: &BookingJob) -> CalendarReport {
        let Some(calendar) = &self.calendar else {
            debug!(appointment_id = %job.appointment.id, "Calendar sync disabled");
            return CalendarReport::default();
        };
        let mut report = CalendarReport::default();

        if let Some(prior_id) = job.appointment.rescheduled_from.as_deref() {
            let removed = self.remove_from_calendars(prior_id).await;
            report.removed = removed.removed;
            report.errors.extend(removed.errors);
        }

        let event = NewProviderEvent {
            appointment_id: job.appointment.id.clone(),
            summary: format!(
                "Everpath consultation: {} {}",
                job.lead.details.first_name, job.lead.details.last_name
            )
            .trim_end()
            .to_string(),
            description: describe_lead(&job.lead),
            starts_at: job.starts_at,
            ends_at: job.ends_at,
            timezone: job.context.timezone,
        };
        match calendar.sync_appointment(&job.agent.id, &event).await {
            Ok(results) => {
                for failed in results.iter().filter(|r| r.result.is_err()) {
                    if let Err(e) = &failed.result {
                        warn!(
                            appointment_id = %job.appointment.id,
                            agent_id = %job.agent.id,
                            provider = %failed.provider,
                            "Calendar event not created: {}",
                            e
                        );
                    }
                }
                report.created = results;
            }
            Err(e) => {
                error!(appointment_id = %job.appointment.id, agent_id = %job.agent.id, "Calendar sync failed: {}", e);
                report.errors.push(e.to_string());
            }
        }
        report
    }

    async fn remove_from_calendars(&self, appointment_id: &str) -> CalendarReport {
        let Some(calendar) = &self.calendar else {
            return CalendarReport::default();
        };
        let mut report = CalendarReport::default();
        match calendar.remove_appointment(appointment_id).await {
            Ok(results) => {
                for result in &results {
                    if let Err(e) = &result.result {
                        warn!(appointment_id, provider = %result.provider, "Calendar event not deleted: {}", e);
                    }
                }
                report.removed = results;
            }
            Err(e) => {
                error!(appointment_id, "Calendar clean-up failed: {}", e);
                report.errors.push(e.to_string());
            }
        }
        report
    }

    async fn notify_confirmed(&self, job: &BookingJob) -> Vec<NotificationReport> {
        let local_start = job
            .starts_at
            .with_timezone(&job.context.timezone)
            .format("%A, %B %-d %Y at %H:%M")
            .to_string();
        let base = json!({
            "appointmentId": job.appointment.id,
            "startsAt": job.starts_at,
            "endsAt": job.ends_at,
            "localStart": local_start,
            "timezone": job.context.timezone_name(),
            "location": job.appointment.location,
            "rescheduledFrom": job.appointment.rescheduled_from,
        });

        let family = merged(&base, json!({
            "to": job.lead.details.email,
            "firstName": job.lead.details.first_name,
            "agentName": job.agent.display_name,
        }));
        let agent = merged(&base, json!({
            "to": job.agent.email,
            "agentName": job.agent.display_name,
            "lead": job.lead,
        }));

        let mut reports = Vec::with_capacity(2);
        for (event, payload) in [
            (NotificationEvent::BookingConfirmedFamily, family),
            (NotificationEvent::BookingConfirmedAgent, agent),
        ] {
            reports.push(self.deliver(&job.appointment.id, event, payload).await);
        }
        reports
    }

    async fn notify_cancelled(&self, appointment: &Appointment) -> Vec<NotificationReport> {
        let agent = self.agents.find_by_id(&appointment.agent_id).await.ok().flatten();
        let lead = self.leads.find_by_id(&appointment.lead_id).await.ok().flatten();
        let payload = json!({
            "appointmentId": appointment.id,
            "startsAt": appointment.confirmed_at,
            "agentEmail": agent.as_ref().map(|a| a.email.clone()),
            "agentName": agent.as_ref().map(|a| a.display_name.clone()),
            "familyEmail": lead.as_ref().map(|l| l.details.email.clone()),
            "firstName": lead.as_ref().map(|l| l.details.first_name.clone()),
        });
        vec![
            self.deliver(&appointment.id, NotificationEvent::BookingCancelled, payload)
                .await,
        ]
    }

    async fn deliver(&self, appointment_id: &str, event: NotificationEvent, payload: Value) -> NotificationReport {
        let result = self.notifier.send(event, payload).await.map_err(|e| {
            warn!(appointment_id, %event, "Notification not sent: {}", e);
            e.to_string()
        });
        NotificationReport { event, result }
    }
}

/// Inputs of the side-effect tasks of one booking.
struct BookingJob {
    agent: Agent,
    context: AgentContext,
    lead: Lead,
    appointment: Appointment,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

fn parse_instant(field: &str, raw: &str) -> Result<DateTime<Utc>, BookingError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| BookingError::InvalidTimestamp(format!("{field} must be an RFC 3339 timestamp")))
}

fn describe_lead(lead: &Lead) -> String {
    let details = &lead.details;
    let mut lines = vec![format!("Family contact: {} {} <{}>", details.first_name, details.last_name, details.email)];
    if let Some(phone) = details.phone.as_deref().filter(|p| !p.is_empty()) {
        lines.push(format!("Phone: {phone}"));
    }
    if let Some(city) = details.city.as_deref().filter(|c| !c.is_empty()) {
        lines.push(format!("City: {city}"));
    }
    if let Some(service) = details.service_type.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("Service: {service}"));
    }
    lines.join("\n")
}

fn merged(base: &Value, extra: Value) -> Value {
    let mut out = base.clone();
    if let (Some(out), Value::Object(extra)) = (out.as_object_mut(), extra) {
        out.extend(extra);
    }
    out
}

async fn join_calendar(appointment_id: &str, handle: JoinHandle<CalendarReport>) -> CalendarReport {
    handle.await.unwrap_or_else(|e| {
        error!(appointment_id, "Calendar task aborted: {}", e);
        CalendarReport {
            errors: vec![e.to_string()],
            ..Default::default()
        }
    })
}

async fn join_notifications(
    appointment_id: &str,
    handle: JoinHandle<Vec<NotificationReport>>,
) -> Vec<NotificationReport> {
    handle.await.unwrap_or_else(|e| {
        error!(appointment_id, "Notification task aborted: {}", e);
        Vec::new()
    })
}
