use crate::error::DbError;
use crate::repositories::declined_payment::{DeclinedPayment, DeclinedPaymentRepository};
use crate::timestamps::{from_millis, to_millis};
use crate::DbClient;
use sqlx::Row;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct SqlDeclinedPaymentRepository {
    db_client: DbClient,
}

impl SqlDeclinedPaymentRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

impl DeclinedPaymentRepository for SqlDeclinedPaymentRepository {
    async fn record(&self, declined: &DeclinedPayment) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO declined_payments (id, appointment_id, agent_id, amount_minor_units, reason, recorded_at_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&declined.id)
        .bind(&declined.appointment_id)
        .bind(&declined.agent_id)
        .bind(declined.amount_minor_units)
        .bind(&declined.reason)
        .bind(to_millis(declined.recorded_at))
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to record declined payment for {}: {}", declined.appointment_id, e);
            DbError::QueryError(e.to_string())
        })?;

        info!(
            agent_id = %declined.agent_id,
            appointment_id = %declined.appointment_id,
            "Declined payment recorded"
        );
        Ok(())
    }

    async fn find_by_appointment(&self, appointment_id: &str) -> Result<Vec<DeclinedPayment>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, appointment_id, agent_id, amount_minor_units, reason, recorded_at_ms
            FROM declined_payments WHERE appointment_id = $1
            ORDER BY recorded_at_ms
            "#,
        )
        .bind(appointment_id)
        .fetch_all(self.db_client.pool())
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        rows.iter()
            .map(|row| -> Result<DeclinedPayment, DbError> {
                Ok(DeclinedPayment {
                    id: row.try_get("id")?,
                    appointment_id: row.try_get("appointment_id")?,
                    agent_id: row.try_get("agent_id")?,
                    amount_minor_units: row.try_get("amount_minor_units")?,
                    reason: row.try_get("reason")?,
                    recorded_at: from_millis(row.try_get("recorded_at_ms")?)?,
                })
            })
            .collect()
    }
}
