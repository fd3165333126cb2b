use crate::error::DbError;
use crate::repositories::appointment::{
    slot_bucket, Appointment, AppointmentRepository, AppointmentStatus, SlotGuard,
};
use crate::timestamps::{date_from_text, date_to_text, from_millis, opt_from_millis, parse_column, to_millis};
use crate::DbClient;
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info, warn};

const SELECT_COLUMNS: &str = r#"
    SELECT id, agent_id, lead_id, location, requested_date, requested_window, status,
           confirmed_at_ms, price_minor_units, payment_charge_ref, rescheduled_from, created_at_ms
    FROM appointments
"#;

/// SQL implementation of the appointment repository
#[derive(Debug, Clone)]
pub struct SqlAppointmentRepository {
    db_client: DbClient,
}

impl SqlAppointmentRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

fn row_to_appointment(row: &AnyRow) -> Result<Appointment, DbError> {
    let requested_date: String = row.try_get("requested_date")?;
    let window: String = row.try_get("requested_window")?;
    let status: String = row.try_get("status")?;
    Ok(Appointment {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        lead_id: row.try_get("lead_id")?,
        location: row.try_get("location")?,
        requested_date: date_from_text(&requested_date)?,
        requested_window: parse_column("requested_window", &window)?,
        status: parse_column("status", &status)?,
        confirmed_at: opt_from_millis(row.try_get("confirmed_at_ms")?)?,
        price_minor_units: row.try_get("price_minor_units")?,
        payment_charge_ref: row.try_get("payment_charge_ref")?,
        rescheduled_from: row.try_get("rescheduled_from")?,
        created_at: from_millis(row.try_get("created_at_ms")?)?,
    })
}

impl AppointmentRepository for SqlAppointmentRepository {
    async fn insert_guarded(
        &self,
        appointment: &Appointment,
        guard: &dyn SlotGuard,
        replaces: Option<&str>,
    ) -> Result<(), DbError> {
        debug!(
            "Inserting appointment {} for agent {}",
            appointment.id, appointment.agent_id
        );
        let now = to_millis(Utc::now());
        let mut tx = self.db_client.begin().await?;

        // Touching the agent row takes its write lock, serializing bookings per agent on
        // PostgreSQL and per database on SQLite before anything is read.
        sqlx::query("UPDATE agents SET updated_at_ms = updated_at_ms WHERE id = $1")
            .bind(&appointment.agent_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::from_write(e, "lock agent row"))?;

        if let Some(prior_id) = replaces {
            let result = sqlx::query(
                r#"
                UPDATE appointments
                SET status = $1, confirmed_slot = NULL, updated_at_ms = $2
                WHERE id = $3 AND agent_id = $4 AND status IN ('pending', 'confirmed')
                "#,
            )
            .bind(AppointmentStatus::Cancelled.as_str())
            .bind(now)
            .bind(prior_id)
            .bind(&appointment.agent_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::from_write(e, "cancel replaced appointment"))?;
            if result.rows_affected() == 0 {
                warn!("Replaced appointment {} was not active", prior_id);
            }
        }

        let (window_start, window_end) = guard.window();
        let rows = sqlx::query(
            r#"
            SELECT confirmed_at_ms FROM appointments
            WHERE agent_id = $1
              AND status IN ('pending', 'confirmed')
              AND confirmed_at_ms IS NOT NULL
              AND confirmed_at_ms >= $2 AND confirmed_at_ms <= $3
            "#,
        )
        .bind(&appointment.agent_id)
        .bind(to_millis(window_start))
        .bind(to_millis(window_end))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        let existing = rows
            .iter()
            .map(|row| from_millis(row.try_get("confirmed_at_ms")?))
            .collect::<Result<Vec<DateTime<Utc>>, DbError>>()?;

        if !guard.admits(&existing) {
            tx.rollback()
                .await
                .map_err(|e| DbError::TransactionError(e.to_string()))?;
            info!(
                agent_id = %appointment.agent_id,
                "Slot re-check rejected appointment {}", appointment.id
            );
            return Err(DbError::SlotTaken(format!(
                "agent {} already has a booking near the requested time",
                appointment.agent_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO appointments (id, agent_id, lead_id, location, requested_date, requested_window,
                                      status, confirmed_at_ms, confirmed_slot, price_minor_units,
                                      payment_charge_ref, rescheduled_from, created_at_ms, updated_at_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&appointment.id)
        .bind(&appointment.agent_id)
        .bind(&appointment.lead_id)
        .bind(appointment.location.clone())
        .bind(date_to_text(appointment.requested_date))
        .bind(appointment.requested_window.as_str())
        .bind(appointment.status.as_str())
        .bind(appointment.confirmed_at.map(to_millis))
        .bind(
            appointment
                .confirmed_at
                .filter(|_| appointment.status.blocks_time())
                .map(slot_bucket),
        )
        .bind(appointment.price_minor_units)
        .bind(appointment.payment_charge_ref.clone())
        .bind(appointment.rescheduled_from.clone())
        .bind(to_millis(appointment.created_at))
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to insert appointment {}: {}", appointment.id, e);
            DbError::from_write(e, "appointment slot already taken")
        })?;

        tx.commit()
            .await
            .map_err(|e| DbError::from_write(e, "concurrent booking committed first"))?;

        info!(
            agent_id = %appointment.agent_id,
            appointment_id = %appointment.id,
            "Appointment persisted"
        );
        Ok(())
    }

    async fn find_by_id(&self, appointment_id: &str) -> Result<Option<Appointment>, DbError> {
        let query = format!("{SELECT_COLUMNS} WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(appointment_id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to find appointment {}: {}", appointment_id, e);
                DbError::QueryError(e.to_string())
            })?;

        row.as_ref().map(row_to_appointment).transpose()
    }

    async fn find_active_between(
        &self,
        agent_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, DbError> {
        let query = format!(
            "{SELECT_COLUMNS} WHERE agent_id = $1 AND status IN ('pending', 'confirmed') \
             AND confirmed_at_ms IS NOT NULL AND confirmed_at_ms >= $2 AND confirmed_at_ms < $3 \
             ORDER BY confirmed_at_ms"
        );
        let rows = sqlx::query(&query)
            .bind(agent_id)
            .bind(to_millis(from))
            .bind(to_millis(to))
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to load appointments for {}: {}", agent_id, e);
                DbError::QueryError(e.to_string())
            })?;

        rows.iter().map(row_to_appointment).collect()
    }

    async fn cancel(&self, appointment_id: &str) -> Result<Option<Appointment>, DbError> {
        let result = sqlx::query(
            "UPDATE appointments SET status = $1, confirmed_slot = NULL, updated_at_ms = $2 WHERE id = $3",
        )
        .bind(AppointmentStatus::Cancelled.as_str())
        .bind(to_millis(Utc::now()))
        .bind(appointment_id)
        .execute(self.db_client.pool())
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        info!(appointment_id, "Appointment cancelled");
        self.find_by_id(appointment_id).await
    }

    async fn set_payment_charge_ref(&self, appointment_id: &str, charge_ref: &str) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE appointments SET payment_charge_ref = $1, updated_at_ms = $2 WHERE id = $3",
        )
        .bind(charge_ref)
        .bind(to_millis(Utc::now()))
        .bind(appointment_id)
        .execute(self.db_client.pool())
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("appointment {appointment_id}")));
        }
        Ok(())
    }
}
