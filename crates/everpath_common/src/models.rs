//! Domain records shared between storage, scheduling, calendar sync and booking.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Serde helpers for wall-clock times written as `HH:MM` (seconds accepted on input).
pub mod local_time {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid local time '{raw}', expected HH:MM")))
    }

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
    }
}

/// Implements `as_str`, `Display` and `FromStr` for plain string-backed enums.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

// --- Agents ---

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Agent,
    Admin,
    Family,
}
string_enum!(AgentRole { Agent => "agent", Admin => "admin", Family => "family" });

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}
string_enum!(ApprovalStatus { Pending => "pending", Approved => "approved", Rejected => "rejected" });

/// A professional offering appointments on the marketplace.
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub role: AgentRole,
    pub approval_status: ApprovalStatus,
    pub display_name: String,
    pub email: String,
    /// Explicit IANA zone chosen by the agent; wins over `province`.
    pub timezone: Option<String>,
    pub province: Option<String>,
    pub appointment_length_minutes: i64,
    /// Paused agents are hidden from search after a declined charge.
    pub paused: bool,
    pub payment_customer_ref: Option<String>,
}

impl Agent {
    pub fn is_bookable(&self) -> bool {
        self.role == AgentRole::Agent && self.approval_status == ApprovalStatus::Approved
    }
}

// --- Availability rules ---

/// One working-hours rule for an (agent, location).
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleKind {
    #[serde(rename_all = "camelCase")]
    Recurring {
        #[cfg_attr(feature = "openapi", schema(value_type = String, example = "Mon"))]
        weekday: Weekday,
        enabled: bool,
        #[serde(with = "local_time")]
        #[cfg_attr(feature = "openapi", schema(value_type = String, example = "09:00"))]
        start_local: NaiveTime,
        #[serde(with = "local_time")]
        #[cfg_attr(feature = "openapi", schema(value_type = String, example = "17:00"))]
        end_local: NaiveTime,
    },
    #[serde(rename_all = "camelCase")]
    DailyOverride {
        date: NaiveDate,
        #[serde(with = "local_time")]
        #[cfg_attr(feature = "openapi", schema(value_type = String, example = "10:00"))]
        start_local: NaiveTime,
        #[serde(with = "local_time")]
        #[cfg_attr(feature = "openapi", schema(value_type = String, example = "14:00"))]
        end_local: NaiveTime,
    },
}

impl RuleKind {
    pub fn start_local(&self) -> NaiveTime {
        match self {
            RuleKind::Recurring { start_local, .. } | RuleKind::DailyOverride { start_local, .. } => {
                *start_local
            }
        }
    }

    pub fn end_local(&self) -> NaiveTime {
        match self {
            RuleKind::Recurring { end_local, .. } | RuleKind::DailyOverride { end_local, .. } => {
                *end_local
            }
        }
    }
}

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRule {
    pub agent_id: String,
    pub location: String,
    #[serde(flatten)]
    pub kind: RuleKind,
}

// --- Appointments ---

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}
string_enum!(AppointmentStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Completed => "completed",
});

impl AppointmentStatus {
    /// Statuses that occupy the agent's time.
    pub fn blocks_time(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedWindow {
    Morning,
    Afternoon,
    Evening,
}
string_enum!(RequestedWindow { Morning => "morning", Afternoon => "afternoon", Evening => "evening" });

impl RequestedWindow {
    /// Buckets a local hour: before noon, noon until 17:00, then evening.
    pub fn from_local_hour(hour: u32) -> Self {
        match hour {
            0..=11 => RequestedWindow::Morning,
            12..=16 => RequestedWindow::Afternoon,
            _ => RequestedWindow::Evening,
        }
    }
}

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub agent_id: String,
    pub lead_id: String,
    pub location: Option<String>,
    pub requested_date: NaiveDate,
    pub requested_window: RequestedWindow,
    pub status: AppointmentStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub price_minor_units: i64,
    pub payment_charge_ref: Option<String>,
    pub rescheduled_from: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- Leads ---

/// Family contact details captured at booking time.
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub service_type: Option<String>,
}

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    #[serde(flatten)]
    pub details: LeadDetails,
}

// --- Calendar integration ---

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Microsoft,
}
string_enum!(Provider { Google => "google", Microsoft => "microsoft" });

/// OAuth-linked calendar of one agent at one provider.
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarConnection {
    pub id: String,
    pub agent_id: String,
    pub provider: Provider,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub calendar_id: String,
    pub sync_enabled: bool,
    pub channel_id: Option<String>,
    /// Google resource id or Microsoft subscription id, needed to stop or renew the channel.
    pub channel_resource_id: Option<String>,
    pub channel_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalEventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}
string_enum!(ExternalEventStatus {
    Confirmed => "confirmed",
    Tentative => "tentative",
    Cancelled => "cancelled",
});

/// Local mirror of a provider calendar item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEvent {
    pub specialist_id: String,
    pub provider: Provider,
    pub provider_event_id: String,
    pub is_platform_created: bool,
    pub appointment_id: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: ExternalEventStatus,
}

// --- Payments ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclinedPayment {
    pub id: String,
    pub appointment_id: String,
    pub agent_id: String,
    pub amount_minor_units: i64,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}
