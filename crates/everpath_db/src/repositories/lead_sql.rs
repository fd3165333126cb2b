use crate::error::DbError;
use crate::repositories::lead::{Lead, LeadDetails, LeadRepository};
use crate::timestamps::to_millis;
use crate::DbClient;
use chrono::Utc;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SqlLeadRepository {
    db_client: DbClient,
}

impl SqlLeadRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Lead>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, first_name, last_name, phone, city, province, service_type
            FROM leads WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(self.db_client.pool())
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        row.as_ref().map(row_to_lead).transpose()
    }
}

fn row_to_lead(row: &AnyRow) -> Result<Lead, DbError> {
    Ok(Lead {
        id: row.try_get("id")?,
        details: LeadDetails {
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            city: row.try_get("city")?,
            province: row.try_get("province")?,
            service_type: row.try_get("service_type")?,
        },
    })
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl LeadRepository for SqlLeadRepository {
    async fn resolve_or_create(&self, details: &LeadDetails) -> Result<Lead, DbError> {
        let email = normalize_email(&details.email);
        if email.is_empty() {
            return Err(DbError::QueryError("lead email is empty".to_string()));
        }
        debug!("Resolving lead for {}", email);

        sqlx::query(
            r#"
            INSERT INTO leads (id, email, first_name, last_name, phone, city, province, service_type, created_at_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (email) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                phone = COALESCE(excluded.phone, leads.phone),
                city = COALESCE(excluded.city, leads.city),
                province = COALESCE(excluded.province, leads.province),
                service_type = COALESCE(excluded.service_type, leads.service_type)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&email)
        .bind(&details.first_name)
        .bind(&details.last_name)
        .bind(details.phone.clone())
        .bind(details.city.clone())
        .bind(details.province.clone())
        .bind(details.service_type.clone())
        .bind(to_millis(Utc::now()))
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to upsert lead {}: {}", email, e);
            DbError::QueryError(e.to_string())
        })?;

        self.find_by_email(&email)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("lead {email}")))
    }

    async fn find_by_id(&self, lead_id: &str) -> Result<Option<Lead>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, first_name, last_name, phone, city, province, service_type
            FROM leads WHERE id = $1
            "#,
        )
        .bind(lead_id)
        .fetch_optional(self.db_client.pool())
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        row.as_ref().map(row_to_lead).transpose()
    }
}
