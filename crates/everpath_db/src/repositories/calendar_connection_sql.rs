use crate::error::DbError;
use crate::repositories::calendar_connection::{
    CalendarConnection, CalendarConnectionRepository, ChannelRecord,
};
use crate::timestamps::{flag, from_millis, opt_from_millis, parse_column, to_millis};
use crate::DbClient;
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info, warn};

const SELECT_COLUMNS: &str = r#"
    SELECT id, agent_id, provider, access_token, refresh_token, token_expires_at_ms, calendar_id,
           sync_enabled, channel_id, channel_resource_id, channel_expires_at_ms
    FROM calendar_connections
"#;

#[derive(Debug, Clone)]
pub struct SqlCalendarConnectionRepository {
    db_client: DbClient,
}

impl SqlCalendarConnectionRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    async fn fetch_one(&self, filter: &str, value: &str) -> Result<Option<CalendarConnection>, DbError> {
        let query = format!("{SELECT_COLUMNS} WHERE {filter} = $1");
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to load calendar connection by {}: {}", filter, e);
                DbError::QueryError(e.to_string())
            })?;

        row.as_ref().map(row_to_connection).transpose()
    }
}

fn row_to_connection(row: &AnyRow) -> Result<CalendarConnection, DbError> {
    let provider: String = row.try_get("provider")?;
    let sync_enabled: i64 = row.try_get("sync_enabled")?;
    Ok(CalendarConnection {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        provider: parse_column("provider", &provider)?,
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        token_expires_at: from_millis(row.try_get("token_expires_at_ms")?)?,
        calendar_id: row.try_get("calendar_id")?,
        sync_enabled: sync_enabled != 0,
        channel_id: row.try_get("channel_id")?,
        channel_resource_id: row.try_get("channel_resource_id")?,
        channel_expires_at: opt_from_millis(row.try_get("channel_expires_at_ms")?)?,
    })
}

impl CalendarConnectionRepository for SqlCalendarConnectionRepository {
    async fn upsert(&self, connection: &CalendarConnection) -> Result<CalendarConnection, DbError> {
        debug!(
            "Upserting {} connection for agent {}",
            connection.provider, connection.agent_id
        );

        sqlx::query(
            r#"
            INSERT INTO calendar_connections (id, agent_id, provider, access_token, refresh_token,
                                              token_expires_at_ms, calendar_id, sync_enabled, channel_id,
                                              channel_resource_id, channel_expires_at_ms, updated_at_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (agent_id, provider) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                token_expires_at_ms = excluded.token_expires_at_ms,
                calendar_id = excluded.calendar_id,
                sync_enabled = excluded.sync_enabled,
                channel_id = excluded.channel_id,
                channel_resource_id = excluded.channel_resource_id,
                channel_expires_at_ms = excluded.channel_expires_at_ms,
                updated_at_ms = excluded.updated_at_ms
            "#,
        )
        .bind(&connection.id)
        .bind(&connection.agent_id)
        .bind(connection.provider.as_str())
        .bind(&connection.access_token)
        .bind(&connection.refresh_token)
        .bind(to_millis(connection.token_expires_at))
        .bind(&connection.calendar_id)
        .bind(flag(connection.sync_enabled))
        .bind(connection.channel_id.clone())
        .bind(connection.channel_resource_id.clone())
        .bind(connection.channel_expires_at.map(to_millis))
        .bind(to_millis(Utc::now()))
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to upsert calendar connection: {}", e);
            DbError::QueryError(e.to_string())
        })?;

        // The row keeps its original id when (agent, provider) already existed.
        let query = format!("{SELECT_COLUMNS} WHERE agent_id = $1 AND provider = $2");
        let row = sqlx::query(&query)
            .bind(&connection.agent_id)
            .bind(connection.provider.as_str())
            .fetch_one(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        row_to_connection(&row)
    }

    async fn find_by_id(&self, connection_id: &str) -> Result<Option<CalendarConnection>, DbError> {
        self.fetch_one("id", connection_id).await
    }

    async fn find_by_agent(&self, agent_id: &str) -> Result<Vec<CalendarConnection>, DbError> {
        let query = format!("{SELECT_COLUMNS} WHERE agent_id = $1 ORDER BY provider");
        let rows = sqlx::query(&query)
            .bind(agent_id)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

        rows.iter().map(row_to_connection).collect()
    }

    async fn find_by_channel_id(&self, channel_id: &str) -> Result<Option<CalendarConnection>, DbError> {
        self.fetch_one("channel_id", channel_id).await
    }

    async fn update_tokens(
        &self,
        connection_id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE calendar_connections
            SET access_token = $1, refresh_token = $2, token_expires_at_ms = $3, updated_at_ms = $4
            WHERE id = $5
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(to_millis(expires_at))
        .bind(to_millis(Utc::now()))
        .bind(connection_id)
        .execute(self.db_client.pool())
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn disable_sync(&self, connection_id: &str) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE calendar_connections SET sync_enabled = 0, updated_at_ms = $1 WHERE id = $2",
        )
        .bind(to_millis(Utc::now()))
        .bind(connection_id)
        .execute(self.db_client.pool())
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        if result.rows_affected() == 0 {
            warn!("Cannot disable sync: connection {} not found", connection_id);
            return Ok(false);
        }
        info!(connection_id, "Calendar sync disabled");
        Ok(true)
    }

    async fn set_channel(
        &self,
        connection_id: &str,
        channel: Option<&ChannelRecord>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE calendar_connections
            SET channel_id = $1, channel_resource_id = $2, channel_expires_at_ms = $3, updated_at_ms = $4
            WHERE id = $5
            "#,
        )
        .bind(channel.map(|c| c.channel_id.clone()))
        .bind(channel.map(|c| c.resource_id.clone()))
        .bind(channel.map(|c| to_millis(c.expires_at)))
        .bind(to_millis(Utc::now()))
        .bind(connection_id)
        .execute(self.db_client.pool())
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_channels_expiring_before(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Vec<CalendarConnection>, DbError> {
        let query = format!(
            "{SELECT_COLUMNS} WHERE sync_enabled = 1 \
             AND (channel_expires_at_ms IS NULL OR channel_expires_at_ms < $1) \
             ORDER BY channel_expires_at_ms"
        );
        let rows = sqlx::query(&query)
            .bind(to_millis(before))
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

        rows.iter().map(row_to_connection).collect()
    }
}
