//! Background renewal of calendar push channels.

use chrono::Utc;
use everpath_calendar::WebhookSubscriptionManager;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Renews, every `sweep_interval_minutes`, each channel expiring within `renewal_lead_hours`.
pub fn spawn_renewal_sweep(manager: WebhookSubscriptionManager) -> JoinHandle<()> {
    let config = manager.config();
    let every = Duration::from_secs(config.sweep_interval_minutes.max(1) * 60);
    let lead = chrono::Duration::hours(config.renewal_lead_hours.max(1));
    info!(
        "Webhook renewal sweep every {:?}, renewing channels expiring within {}h",
        every,
        lead.num_hours()
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match manager.renew_due(Utc::now(), lead).await {
                Ok(summary) if summary.renewed + summary.failed > 0 => info!(
                    renewed = summary.renewed,
                    failed = summary.failed,
                    "Webhook renewal sweep finished"
                ),
                Ok(_) => {}
                Err(e) => error!("Webhook renewal sweep failed: {}", e),
            }
        }
    })
}
