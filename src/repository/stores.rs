//! Stores repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::store::{CreateStore, Store, UpdateStore},
};

const UNIQUE_MESSAGES: &[(&str, &str)] = &[("stores_code_idx", "Store code already exists")];

#[derive(Clone)]
pub struct StoresRepository {
    pool: Pool<Postgres>,
}

impl StoresRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List all stores, by name
    pub async fn list(&self) -> AppResult<Vec<Store>> {
        let rows = sqlx::query_as::<_, Store>("SELECT * FROM stores ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Stores whose assigned technician is `username`
    pub async fn list_assigned_to(&self, username: &str) -> AppResult<Vec<Store>> {
        let rows = sqlx::query_as::<_, Store>(
            "SELECT * FROM stores WHERE LOWER(ts_assigned) = LOWER($1) ORDER BY name, id",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Ids of the stores assigned to `username`
    pub async fn ids_assigned_to(&self, username: &str) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM stores WHERE LOWER(ts_assigned) = LOWER($1)",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Store>> {
        let row = sqlx::query_as::<_, Store>("SELECT * FROM stores WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Store> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Store {} not found", id)))
    }

    /// Case-insensitive lookup by name or code
    pub async fn find_by_name_or_code(&self, value: &str) -> AppResult<Option<Store>> {
        let row = sqlx::query_as::<_, Store>(
            r#"
            SELECT * FROM stores
            WHERE LOWER(name) = LOWER($1) OR LOWER(code) = LOWER($1)
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(value.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn create(&self, data: &CreateStore) -> AppResult<Store> {
        sqlx::query_as::<_, Store>(
            r#"
            INSERT INTO stores (code, name, location, ts_assigned)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(data.code.trim())
        .bind(data.name.trim())
        .bind(&data.location)
        .bind(&data.ts_assigned)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, UNIQUE_MESSAGES))
    }

    pub async fn update(&self, id: i32, data: &UpdateStore) -> AppResult<Store> {
        sqlx::query_as::<_, Store>(
            r#"
            UPDATE stores SET
                code = COALESCE($2, code),
                name = COALESCE($3, name),
                location = COALESCE($4, location),
                ts_assigned = COALESCE($5, ts_assigned)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.code.as_deref().map(str::trim))
        .bind(data.name.as_deref().map(str::trim))
        .bind(&data.location)
        .bind(&data.ts_assigned)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, UNIQUE_MESSAGES))?
        .ok_or_else(|| AppError::NotFound(format!("Store {} not found", id)))
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM stores WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Store {} not found", id)));
        }
        Ok(())
    }
}
