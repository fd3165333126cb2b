use crate::error::DbError;
use crate::repositories::availability_rule::{
    AvailabilityRule, AvailabilityRuleRepository, RuleKind,
};
use crate::timestamps::{date_from_text, date_to_text, flag, to_millis};
use crate::DbClient;
use chrono::{NaiveDate, NaiveTime, Utc, Weekday};
use everpath_common::models::local_time;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct SqlAvailabilityRuleRepository {
    db_client: DbClient,
}

impl SqlAvailabilityRuleRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    async fn load_weekly(&self, agent_id: &str, location: &str) -> Result<Vec<AvailabilityRule>, DbError> {
        let query = r#"
            SELECT agent_id, location, weekday, enabled, start_local, end_local
            FROM availability_rules
            WHERE agent_id = $1 AND location = $2
            ORDER BY weekday
        "#;

        let rows = sqlx::query(query)
            .bind(agent_id)
            .bind(location)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to load weekly rules for {}: {}", agent_id, e);
                DbError::QueryError(e.to_string())
            })?;

        rows.iter().map(row_to_weekly).collect()
    }

    async fn load_overrides(
        &self,
        agent_id: &str,
        location: &str,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<AvailabilityRule>, DbError> {
        // ISO dates order lexicographically
        let (from, to) = match range {
            Some((from, to)) => (date_to_text(from), date_to_text(to)),
            None => ("0000-01-01".to_string(), "9999-12-31".to_string()),
        };

        let query = r#"
            SELECT agent_id, location, override_date, start_local, end_local
            FROM availability_overrides
            WHERE agent_id = $1 AND location = $2 AND override_date >= $3 AND override_date < $4
            ORDER BY override_date
        "#;

        let rows = sqlx::query(query)
            .bind(agent_id)
            .bind(location)
            .bind(from)
            .bind(to)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to load overrides for {}: {}", agent_id, e);
                DbError::QueryError(e.to_string())
            })?;

        rows.iter().map(row_to_override).collect()
    }
}

fn weekday_from_index(index: i64) -> Result<Weekday, DbError> {
    let weekday = match index {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        6 => Weekday::Sun,
        other => return Err(DbError::DecodeError(format!("weekday index {other}"))),
    };
    Ok(weekday)
}

fn time_column(row: &AnyRow, column: &str) -> Result<NaiveTime, DbError> {
    let raw: String = row.try_get(column)?;
    local_time::parse(&raw).ok_or_else(|| DbError::DecodeError(format!("{column}: '{raw}'")))
}

fn row_to_weekly(row: &AnyRow) -> Result<AvailabilityRule, DbError> {
    let enabled: i64 = row.try_get("enabled")?;
    Ok(AvailabilityRule {
        agent_id: row.try_get("agent_id")?,
        location: row.try_get("location")?,
        kind: RuleKind::Recurring {
            weekday: weekday_from_index(row.try_get("weekday")?)?,
            enabled: enabled != 0,
            start_local: time_column(row, "start_local")?,
            end_local: time_column(row, "end_local")?,
        },
    })
}

fn row_to_override(row: &AnyRow) -> Result<AvailabilityRule, DbError> {
    let date: String = row.try_get("override_date")?;
    Ok(AvailabilityRule {
        agent_id: row.try_get("agent_id")?,
        location: row.try_get("location")?,
        kind: RuleKind::DailyOverride {
            date: date_from_text(&date)?,
            start_local: time_column(row, "start_local")?,
            end_local: time_column(row, "end_local")?,
        },
    })
}

fn hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

impl AvailabilityRuleRepository for SqlAvailabilityRuleRepository {
    async fn save_rules(&self, rules: &[AvailabilityRule]) -> Result<(), DbError> {
        debug!("Saving {} availability rules", rules.len());
        let now = to_millis(Utc::now());
        let mut tx = self.db_client.begin().await?;

        for rule in rules {
            let result = match &rule.kind {
                RuleKind::Recurring {
                    weekday,
                    enabled,
                    start_local,
                    end_local,
                } => {
                    sqlx::query(
                        r#"
                        INSERT INTO availability_rules (agent_id, location, weekday, enabled, start_local, end_local, updated_at_ms)
                        VALUES ($1, $2, $3, $4, $5, $6, $7)
                        ON CONFLICT (agent_id, location, weekday) DO UPDATE SET
                            enabled = excluded.enabled,
                            start_local = excluded.start_local,
                            end_local = excluded.end_local,
                            updated_at_ms = excluded.updated_at_ms
                        "#,
                    )
                    .bind(&rule.agent_id)
                    .bind(&rule.location)
                    .bind(i64::from(weekday.num_days_from_monday()))
                    .bind(flag(*enabled))
                    .bind(hhmm(*start_local))
                    .bind(hhmm(*end_local))
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                }
                RuleKind::DailyOverride {
                    date,
                    start_local,
                    end_local,
                } => {
                    sqlx::query(
                        r#"
                        INSERT INTO availability_overrides (agent_id, location, override_date, start_local, end_local, updated_at_ms)
                        VALUES ($1, $2, $3, $4, $5, $6)
                        ON CONFLICT (agent_id, location, override_date) DO UPDATE SET
                            start_local = excluded.start_local,
                            end_local = excluded.end_local,
                            updated_at_ms = excluded.updated_at_ms
                        "#,
                    )
                    .bind(&rule.agent_id)
                    .bind(&rule.location)
                    .bind(date_to_text(*date))
                    .bind(hhmm(*start_local))
                    .bind(hhmm(*end_local))
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                }
            };

            if let Err(e) = result {
                error!("Failed to save availability rule for {}: {}", rule.agent_id, e);
                return Err(DbError::QueryError(e.to_string()));
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;
        info!("Saved {} availability rules", rules.len());
        Ok(())
    }

    async fn find_rules(&self, agent_id: &str, location: &str) -> Result<Vec<AvailabilityRule>, DbError> {
        let mut rules = self.load_weekly(agent_id, location).await?;
        rules.extend(self.load_overrides(agent_id, location, None).await?);
        Ok(rules)
    }

    async fn find_rules_for_range(
        &self,
        agent_id: &str,
        location: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AvailabilityRule>, DbError> {
        let mut rules = self.load_weekly(agent_id, location).await?;
        rules.extend(self.load_overrides(agent_id, location, Some((from, to))).await?);
        Ok(rules)
    }
}
