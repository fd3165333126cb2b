use crate::error::DbError;
use crate::repositories::external_event::{
    ExternalEvent, ExternalEventRepository, ExternalEventStatus, Provider,
};
use crate::timestamps::{flag, from_millis, parse_column, to_millis};
use crate::DbClient;
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;
use std::collections::HashSet;
use tracing::{debug, error, info};

const SELECT_COLUMNS: &str = r#"
    SELECT specialist_id, provider, provider_event_id, is_platform_created, appointment_id,
           starts_at_ms, ends_at_ms, status
    FROM external_events
"#;

#[derive(Debug, Clone)]
pub struct SqlExternalEventRepository {
    db_client: DbClient,
}

impl SqlExternalEventRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

fn row_to_event(row: &AnyRow) -> Result<ExternalEvent, DbError> {
    let provider: String = row.try_get("provider")?;
    let status: String = row.try_get("status")?;
    let platform: i64 = row.try_get("is_platform_created")?;
    Ok(ExternalEvent {
        specialist_id: row.try_get("specialist_id")?,
        provider: parse_column("provider", &provider)?,
        provider_event_id: row.try_get("provider_event_id")?,
        is_platform_created: platform != 0,
        appointment_id: row.try_get("appointment_id")?,
        starts_at: from_millis(row.try_get("starts_at_ms")?)?,
        ends_at: from_millis(row.try_get("ends_at_ms")?)?,
        status: parse_column("status", &status)?,
    })
}

impl ExternalEventRepository for SqlExternalEventRepository {
    async fn upsert(&self, event: &ExternalEvent) -> Result<bool, DbError> {
        debug!(
            "Upserting {} event {} for {}",
            event.provider, event.provider_event_id, event.specialist_id
        );

        // The WHERE clause also disambiguates ON CONFLICT for SQLite's INSERT ... SELECT.
        let result = sqlx::query(
            r#"
            INSERT INTO external_events (specialist_id, provider, provider_event_id, is_platform_created,
                                         appointment_id, starts_at_ms, ends_at_ms, status, updated_at_ms)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9
            WHERE NOT EXISTS (
                SELECT 1 FROM external_event_tombstones
                WHERE specialist_id = $1 AND provider = $2 AND provider_event_id = $3
            )
            ON CONFLICT (specialist_id, provider, provider_event_id) DO UPDATE SET
                is_platform_created = excluded.is_platform_created,
                appointment_id = COALESCE(excluded.appointment_id, external_events.appointment_id),
                starts_at_ms = excluded.starts_at_ms,
                ends_at_ms = excluded.ends_at_ms,
                status = excluded.status,
                updated_at_ms = excluded.updated_at_ms
            "#,
        )
        .bind(&event.specialist_id)
        .bind(event.provider.as_str())
        .bind(&event.provider_event_id)
        .bind(flag(event.is_platform_created))
        .bind(event.appointment_id.clone())
        .bind(to_millis(event.starts_at))
        .bind(to_millis(event.ends_at))
        .bind(event.status.as_str())
        .bind(to_millis(Utc::now()))
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to upsert external event {}: {}", event.provider_event_id, e);
            DbError::QueryError(e.to_string())
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_for_appointment(&self, appointment_id: &str) -> Result<Vec<ExternalEvent>, DbError> {
        let query = format!("{SELECT_COLUMNS} WHERE appointment_id = $1 ORDER BY provider");
        let rows = sqlx::query(&query)
            .bind(appointment_id)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

        rows.iter().map(row_to_event).collect()
    }

    async fn find_busy_between(
        &self,
        specialist_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExternalEvent>, DbError> {
        let query = format!(
            "{SELECT_COLUMNS} WHERE specialist_id = $1 AND status = $2 \
             AND starts_at_ms < $3 AND ends_at_ms > $4 ORDER BY starts_at_ms"
        );
        let rows = sqlx::query(&query)
            .bind(specialist_id)
            .bind(ExternalEventStatus::Confirmed.as_str())
            .bind(to_millis(to))
            .bind(to_millis(from))
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to load busy events for {}: {}", specialist_id, e);
                DbError::QueryError(e.to_string())
            })?;

        rows.iter().map(row_to_event).collect()
    }

    async fn find_in_window(
        &self,
        specialist_id: &str,
        provider: Provider,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExternalEvent>, DbError> {
        let query = format!(
            "{SELECT_COLUMNS} WHERE specialist_id = $1 AND provider = $2 \
             AND starts_at_ms < $3 AND ends_at_ms > $4 ORDER BY starts_at_ms"
        );
        let rows = sqlx::query(&query)
            .bind(specialist_id)
            .bind(provider.as_str())
            .bind(to_millis(to))
            .bind(to_millis(from))
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

        rows.iter().map(row_to_event).collect()
    }

    async fn delete_with_tombstone(
        &self,
        specialist_id: &str,
        provider: Provider,
        provider_event_id: &str,
    ) -> Result<(), DbError> {
        let mut tx = self.db_client.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO external_event_tombstones (specialist_id, provider, provider_event_id, deleted_at_ms)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (specialist_id, provider, provider_event_id) DO UPDATE SET
                deleted_at_ms = excluded.deleted_at_ms
            "#,
        )
        .bind(specialist_id)
        .bind(provider.as_str())
        .bind(provider_event_id)
        .bind(to_millis(Utc::now()))
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        sqlx::query(
            "DELETE FROM external_events WHERE specialist_id = $1 AND provider = $2 AND provider_event_id = $3",
        )
        .bind(specialist_id)
        .bind(provider.as_str())
        .bind(provider_event_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        info!(
            specialist_id,
            provider = %provider,
            provider_event_id,
            "External event removed and tombstoned"
        );
        Ok(())
    }

    async fn delete_row(
        &self,
        specialist_id: &str,
        provider: Provider,
        provider_event_id: &str,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            "DELETE FROM external_events WHERE specialist_id = $1 AND provider = $2 AND provider_event_id = $3",
        )
        .bind(specialist_id)
        .bind(provider.as_str())
        .bind(provider_event_id)
        .execute(self.db_client.pool())
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn tombstoned_ids(
        &self,
        specialist_id: &str,
        provider: Provider,
    ) -> Result<HashSet<String>, DbError> {
        let rows = sqlx::query(
            "SELECT provider_event_id FROM external_event_tombstones WHERE specialist_id = $1 AND provider = $2",
        )
        .bind(specialist_id)
        .bind(provider.as_str())
        .fetch_all(self.db_client.pool())
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("provider_event_id").map_err(DbError::from))
            .collect()
    }
}
