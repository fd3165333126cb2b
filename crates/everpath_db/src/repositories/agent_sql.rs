use crate::error::DbError;
use crate::repositories::agent::{Agent, AgentRepository};
use crate::timestamps::{flag, parse_column, to_millis};
use crate::DbClient;
use chrono::Utc;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info};

/// SQL implementation of the agent repository
#[derive(Debug, Clone)]
pub struct SqlAgentRepository {
    db_client: DbClient,
}

impl SqlAgentRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

fn row_to_agent(row: &AnyRow) -> Result<Agent, DbError> {
    let role: String = row.try_get("role")?;
    let approval: String = row.try_get("approval_status")?;
    let paused: i64 = row.try_get("paused")?;
    Ok(Agent {
        id: row.try_get("id")?,
        role: parse_column("role", &role)?,
        approval_status: parse_column("approval_status", &approval)?,
        display_name: row.try_get("display_name")?,
        email: row.try_get("email")?,
        timezone: row.try_get("timezone")?,
        province: row.try_get("province")?,
        appointment_length_minutes: row.try_get("appointment_length_minutes")?,
        paused: paused != 0,
        payment_customer_ref: row.try_get("payment_customer_ref")?,
    })
}

impl AgentRepository for SqlAgentRepository {
    async fn upsert(&self, agent: &Agent) -> Result<(), DbError> {
        debug!("Upserting agent {}", agent.id);

        let query = r#"
            INSERT INTO agents (id, role, approval_status, display_name, email, timezone, province,
                                appointment_length_minutes, paused, payment_customer_ref, updated_at_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                role = excluded.role,
                approval_status = excluded.approval_status,
                display_name = excluded.display_name,
                email = excluded.email,
                timezone = excluded.timezone,
                province = excluded.province,
                appointment_length_minutes = excluded.appointment_length_minutes,
                paused = excluded.paused,
                payment_customer_ref = excluded.payment_customer_ref,
                updated_at_ms = excluded.updated_at_ms
        "#;

        sqlx::query(query)
            .bind(&agent.id)
            .bind(agent.role.as_str())
            .bind(agent.approval_status.as_str())
            .bind(&agent.display_name)
            .bind(&agent.email)
            .bind(agent.timezone.clone())
            .bind(agent.province.clone())
            .bind(agent.appointment_length_minutes)
            .bind(flag(agent.paused))
            .bind(agent.payment_customer_ref.clone())
            .bind(to_millis(Utc::now()))
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to upsert agent {}: {}", agent.id, e);
                DbError::QueryError(e.to_string())
            })?;
        Ok(())
    }

    async fn find_by_id(&self, agent_id: &str) -> Result<Option<Agent>, DbError> {
        debug!("Finding agent {}", agent_id);

        let query = r#"
            SELECT id, role, approval_status, display_name, email, timezone, province,
                   appointment_length_minutes, paused, payment_customer_ref
            FROM agents
            WHERE id = $1
        "#;

        let row = sqlx::query(query)
            .bind(agent_id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to find agent {}: {}", agent_id, e);
                DbError::QueryError(e.to_string())
            })?;

        row.as_ref().map(row_to_agent).transpose()
    }

    async fn set_paused(&self, agent_id: &str, paused: bool) -> Result<bool, DbError> {
        let query = "UPDATE agents SET paused = $1, updated_at_ms = $2 WHERE id = $3";

        let result = sqlx::query(query)
            .bind(flag(paused))
            .bind(to_millis(Utc::now()))
            .bind(agent_id)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to update paused flag for agent {}: {}", agent_id, e);
                DbError::QueryError(e.to_string())
            })?;

        let updated = result.rows_affected() > 0;
        if updated {
            info!(agent_id, paused, "Agent pause flag updated");
        }
        Ok(updated)
    }
}
