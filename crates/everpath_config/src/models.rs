use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8086,
        }
    }
}

// --- Database Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g. sqlite:data/everpath.db, overridable via EVERPATH__DATABASE__URL
}

// --- Outbound HTTP ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    /// Upper bound for every provider call (calendar, payment, mailer).
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

// --- Booking Policy ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BookingConfig {
    /// Fixed per-appointment price charged to the agent, in minor units.
    #[serde(default = "default_price_minor_units")]
    pub price_minor_units: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Used when an agent has no appointment length of their own.
    #[serde(default = "default_appointment_length_minutes")]
    pub default_appointment_length_minutes: i64,
    /// Two bookings whose start instants are closer than this collide.
    #[serde(default = "default_conflict_tolerance_seconds")]
    pub conflict_tolerance_seconds: i64,
    /// Largest date range accepted by the availability endpoint.
    #[serde(default = "default_max_range_days")]
    pub max_range_days: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            price_minor_units: default_price_minor_units(),
            currency: default_currency(),
            default_appointment_length_minutes: default_appointment_length_minutes(),
            conflict_tolerance_seconds: default_conflict_tolerance_seconds(),
            max_range_days: default_max_range_days(),
        }
    }
}

// --- Google Calendar OAuth client ---
// client_secret is usually "secret_from_env" -> GOOGLE_CLIENT_SECRET
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_google_api_base")]
    pub api_base_url: String,
    #[serde(default = "default_google_token_url")]
    pub token_url: String,
}

// --- Microsoft Graph OAuth client ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MicrosoftConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_graph_api_base")]
    pub api_base_url: String,
    #[serde(default = "default_microsoft_token_url")]
    pub token_url: String,
    #[serde(default = "default_microsoft_scope")]
    pub scope: String,
}

// --- Stripe Config ---
// secret_key is usually "secret_from_env" -> STRIPE_SECRET_KEY
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    #[serde(default = "default_stripe_api_base")]
    pub api_base_url: String,
}

// --- Transactional mail relay ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotificationConfig {
    pub endpoint_url: String,
    pub api_key: Option<String>,
}

// --- Calendar push notifications ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebhookConfig {
    /// Externally reachable base URL, e.g. https://book.example.com/api
    pub public_base_url: String,
    /// Key for deriving per-channel verification tokens.
    pub signing_secret: String,
    #[serde(default = "default_renewal_lead_hours")]
    pub renewal_lead_hours: i64,
    #[serde(default = "default_sweep_interval_minutes")]
    pub sweep_interval_minutes: u64,
    #[serde(default = "default_resync_window_days")]
    pub resync_window_days: i64,
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    // --- Runtime Flags (optional in config file, default to false) ---
    #[serde(default)]
    pub use_google: bool,
    #[serde(default)]
    pub use_microsoft: bool,
    #[serde(default)]
    pub use_stripe: bool,
    #[serde(default)]
    pub use_notifications: bool,

    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub http: HttpConfig,

    // --- Optional Feature Configurations ---
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub google: Option<GoogleConfig>,
    #[serde(default)]
    pub microsoft: Option<MicrosoftConfig>,
    #[serde(default)]
    pub stripe: Option<StripeConfig>,
    #[serde(default)]
    pub notifications: Option<NotificationConfig>,
    #[serde(default)]
    pub webhooks: Option<WebhookConfig>,
}

impl AppConfig {
    /// Returns a section only when its runtime flag is on.
    pub fn enabled<'a, T>(flag: bool, section: &'a Option<T>) -> Option<&'a T> {
        if flag {
            section.as_ref()
        } else {
            None
        }
    }
}

fn default_http_timeout_secs() -> u64 {
    15
}
fn default_price_minor_units() -> i64 {
    4900
}
fn default_currency() -> String {
    "cad".to_string()
}
fn default_appointment_length_minutes() -> i64 {
    60
}
fn default_conflict_tolerance_seconds() -> i64 {
    60
}
fn default_max_range_days() -> i64 {
    62
}
fn default_google_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}
fn default_google_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}
fn default_graph_api_base() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}
fn default_microsoft_token_url() -> String {
    "https://login.microsoftonline.com/common/oauth2/v2.0/token".to_string()
}
fn default_microsoft_scope() -> String {
    "offline_access Calendars.ReadWrite".to_string()
}
fn default_stripe_api_base() -> String {
    "https://api.stripe.com/v1".to_string()
}
fn default_renewal_lead_hours() -> i64 {
    24
}
fn default_sweep_interval_minutes() -> u64 {
    60
}
fn default_resync_window_days() -> i64 {
    60
}
