//! Maps an agent's profile to the IANA zone its working hours are written in.

use chrono_tz::Tz;
use std::str::FromStr;
use tracing::warn;

/// Zone used when neither an explicit zone nor a known province is on file.
pub const FALLBACK_TIMEZONE: Tz = Tz::America__Toronto;

/// Explicit zone first, then the province, then [`FALLBACK_TIMEZONE`]. Never fails.
pub fn resolve_timezone(explicit: Option<&str>, province: Option<&str>) -> Tz {
    if let Some(name) = explicit.map(str::trim).filter(|n| !n.is_empty()) {
        match Tz::from_str(name) {
            Ok(tz) => return tz,
            Err(_) => warn!("Ignoring unknown timezone '{}'", name),
        }
    }

    province
        .and_then(province_timezone)
        .unwrap_or(FALLBACK_TIMEZONE)
}

/// Canadian province or territory, by postal code or English name.
pub fn province_timezone(province: &str) -> Option<Tz> {
    let key = province.trim().to_ascii_lowercase().replace(&['.', '-'][..], " ");
    let tz = match key.split_whitespace().collect::<Vec<_>>().join(" ").as_str() {
        "bc" | "british columbia" => Tz::America__Vancouver,
        "ab" | "alberta" => Tz::America__Edmonton,
        "sk" | "saskatchewan" => Tz::America__Regina,
        "mb" | "manitoba" => Tz::America__Winnipeg,
        "on" | "ontario" => Tz::America__Toronto,
        "qc" | "quebec" | "québec" => Tz::America__Toronto,
        "nb" | "new brunswick" => Tz::America__Halifax,
        "ns" | "nova scotia" => Tz::America__Halifax,
        "pe" | "pei" | "prince edward island" => Tz::America__Halifax,
        "nl" | "newfoundland" | "newfoundland and labrador" => Tz::America__St_Johns,
        "yt" | "yukon" => Tz::America__Whitehorse,
        "nt" | "northwest territories" => Tz::America__Yellowknife,
        "nu" | "nunavut" => Tz::America__Iqaluit,
        _ => return None,
    };
    Some(tz)
}
