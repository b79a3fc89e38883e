//! Maintenances repository

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{types::Json, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::maintenance::{
        Maintenance, MaintenanceDetails, MaintenanceRow, MaintenanceStatus, NewMaintenance,
    },
};

/// Filters of the maintenance listing
#[derive(Debug, Default, Clone)]
pub struct MaintenanceFilter {
    pub status: Option<MaintenanceStatus>,
    pub store_id: Option<i32>,
    pub submitted_by: Option<String>,
}

#[derive(Clone)]
pub struct MaintenancesRepository {
    pool: Pool<Postgres>,
}

impl MaintenancesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List maintenances, most recent visit first
    pub async fn list(&self, filter: &MaintenanceFilter) -> AppResult<Vec<Maintenance>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if filter.status.is_some() {
            conditions.push(format!("status = ${}", idx));
            idx += 1;
        }
        if filter.store_id.is_some() {
            conditions.push(format!("store_id = ${}", idx));
            idx += 1;
        }
        if filter.submitted_by.is_some() {
            conditions.push(format!("LOWER(submitted_by) = LOWER(${})", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT * FROM maintenances {} ORDER BY date DESC, id DESC",
            where_clause
        );
        let mut builder = sqlx::query_as::<_, MaintenanceRow>(&query);
        if let Some(status) = filter.status {
            builder = builder.bind(status);
        }
        if let Some(store_id) = filter.store_id {
            builder = builder.bind(store_id);
        }
        if let Some(ref submitted_by) = filter.submitted_by {
            builder = builder.bind(submitted_by);
        }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Maintenance::from).collect())
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Maintenance> {
        sqlx::query_as::<_, MaintenanceRow>("SELECT * FROM maintenances WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Maintenance::from)
            .ok_or_else(|| AppError::NotFound(format!("Maintenance {} not found", id)))
    }

    pub async fn create(&self, data: &NewMaintenance) -> AppResult<Maintenance> {
        let row = sqlx::query_as::<_, MaintenanceRow>(
            r#"
            INSERT INTO maintenances (
                title, details, date, store_name, technician, store_id,
                status, submitted_by, schedule_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(Json(&data.details))
        .bind(data.date)
        .bind(&data.store_name)
        .bind(&data.technician)
        .bind(data.store_id)
        .bind(MaintenanceStatus::Submitted)
        .bind(&data.submitted_by)
        .bind(data.schedule_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    /// Persist the editable content fields of `m`
    pub async fn save_content(&self, m: &Maintenance) -> AppResult<Maintenance> {
        sqlx::query_as::<_, MaintenanceRow>(
            r#"
            UPDATE maintenances SET
                title = $2,
                details = $3,
                date = $4,
                store_name = $5,
                technician = $6,
                store_id = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(m.id)
        .bind(&m.title)
        .bind(Json(&m.details))
        .bind(m.date)
        .bind(&m.store_name)
        .bind(&m.technician)
        .bind(m.store_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Maintenance::from)
        .ok_or_else(|| AppError::NotFound(format!("Maintenance {} not found", m.id)))
    }

    /// Set status, approver and details in one statement
    pub async fn save_status(
        &self,
        id: i32,
        status: MaintenanceStatus,
        approved_by: Option<&str>,
        details: &MaintenanceDetails,
    ) -> AppResult<Maintenance> {
        sqlx::query_as::<_, MaintenanceRow>(
            r#"
            UPDATE maintenances SET
                status = $2,
                approved_by = COALESCE($3, approved_by),
                details = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(approved_by)
        .bind(Json(details))
        .fetch_optional(&self.pool)
        .await?
        .map(Maintenance::from)
        .ok_or_else(|| AppError::NotFound(format!("Maintenance {} not found", id)))
    }

    /// Submitted maintenances created before `cutoff`, oldest first
    pub async fn submitted_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Maintenance>> {
        let rows = sqlx::query_as::<_, MaintenanceRow>(
            r#"
            SELECT * FROM maintenances
            WHERE status = $1 AND created_at < $2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(MaintenanceStatus::Submitted)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Maintenance::from).collect())
    }

    /// 1-based rank of maintenance `id` among the store's maintenances dated in `[from, to)`
    pub async fn rank_in_store_period(
        &self,
        id: i32,
        store_id: i32,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AppResult<Option<i64>> {
        let rank = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT seq FROM (
                SELECT id, ROW_NUMBER() OVER (ORDER BY date ASC, id ASC) AS seq
                FROM maintenances
                WHERE store_id = $1 AND date >= $2 AND date < $3
            ) ranked
            WHERE id = $4
            "#,
        )
        .bind(store_id)
        .bind(from)
        .bind(to)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rank)
    }
}
