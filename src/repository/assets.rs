//! Assets and asset history repository

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::asset::{Asset, AssetHistory, AssetStatus, LatestHistory, StoreAssetCount},
};

const UNIQUE_MESSAGES: &[(&str, &str)] = &[("assets_asset_code_idx", "Asset code already exists")];

/// SQL-side filters of the asset listing
#[derive(Debug, Default, Clone)]
pub struct AssetFilter {
    pub q: Option<String>,
    pub store_id: Option<i32>,
    pub category: Option<String>,
    pub status: Option<AssetStatus>,
    /// Restrict to these stores (role scoping)
    pub store_ids: Option<Vec<i32>>,
    pub limit: i64,
    pub offset: i64,
}

/// Complete column set of an asset row
#[derive(Debug, Clone)]
pub struct AssetFields {
    pub asset_code: String,
    pub name: String,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub store_id: Option<i32>,
    pub store_name: Option<String>,
    pub status: AssetStatus,
    pub purchase_date: Option<NaiveDate>,
    pub age_snapshot_months: Option<i32>,
    pub last_maintenance_date: Option<NaiveDateTime>,
    pub last_maintenance_order: Option<i32>,
}

impl From<Asset> for AssetFields {
    fn from(a: Asset) -> Self {
        Self {
            asset_code: a.asset_code,
            name: a.name,
            category: a.category,
            serial_number: a.serial_number,
            store_id: a.store_id,
            store_name: a.store_name,
            status: a.status,
            purchase_date: a.purchase_date,
            age_snapshot_months: a.age_snapshot_months,
            last_maintenance_date: a.last_maintenance_date,
            last_maintenance_order: a.last_maintenance_order,
        }
    }
}

#[derive(Clone)]
pub struct AssetsRepository {
    pool: Pool<Postgres>,
}

impl AssetsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Filtered, paginated listing ordered by form position then freshness
    pub async fn list(&self, filter: &AssetFilter) -> AppResult<Vec<Asset>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if filter.q.is_some() {
            conditions.push(format!(
                "(LOWER(name) LIKE ${i} OR LOWER(COALESCE(category, '')) LIKE ${i} \
                 OR LOWER(COALESCE(serial_number, '')) LIKE ${i} \
                 OR LOWER(COALESCE(store_name, '')) LIKE ${i} OR LOWER(asset_code) LIKE ${i})",
                i = idx
            ));
            idx += 1;
        }
        if filter.store_id.is_some() {
            conditions.push(format!("store_id = ${}", idx));
            idx += 1;
        }
        if filter.category.is_some() {
            conditions.push(format!("LOWER(COALESCE(category, '')) = LOWER(${})", idx));
            idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("status = ${}", idx));
            idx += 1;
        }
        if filter.store_ids.is_some() {
            conditions.push(format!("store_id = ANY(${})", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT * FROM assets {} \
             ORDER BY last_maintenance_order ASC NULLS LAST, updated_at DESC, id DESC \
             LIMIT {} OFFSET {}",
            where_clause, filter.limit, filter.offset
        );

        let mut builder = sqlx::query_as::<_, Asset>(&query);
        if let Some(ref q) = filter.q {
            builder = builder.bind(format!("%{}%", q.to_lowercase()));
        }
        if let Some(store_id) = filter.store_id {
            builder = builder.bind(store_id);
        }
        if let Some(ref category) = filter.category {
            builder = builder.bind(category);
        }
        if let Some(status) = filter.status {
            builder = builder.bind(status);
        }
        if let Some(ref ids) = filter.store_ids {
            builder = builder.bind(ids);
        }

        Ok(builder.fetch_all(&self.pool).await?)
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Asset>> {
        let row = sqlx::query_as::<_, Asset>("SELECT * FROM assets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Asset> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", id)))
    }

    /// Match by serial number (case-insensitive), within a store when it is known
    pub async fn find_by_serial(
        &self,
        serial: &str,
        store_id: Option<i32>,
    ) -> AppResult<Option<Asset>> {
        let row = sqlx::query_as::<_, Asset>(
            r#"
            SELECT * FROM assets
            WHERE LOWER(COALESCE(serial_number, '')) = LOWER($1)
              AND ($2::int IS NULL OR store_id = $2)
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(serial)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Match by name, category and store (NULL-safe on the store)
    pub async fn find_by_identity(
        &self,
        name: &str,
        category: Option<&str>,
        store_id: Option<i32>,
    ) -> AppResult<Option<Asset>> {
        let row = sqlx::query_as::<_, Asset>(
            r#"
            SELECT * FROM assets
            WHERE LOWER(name) = LOWER($1)
              AND LOWER(COALESCE(category, '')) = LOWER($2)
              AND store_id IS NOT DISTINCT FROM $3
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(name)
        .bind(category.unwrap_or_default())
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn insert(&self, f: &AssetFields) -> AppResult<Asset> {
        sqlx::query_as::<_, Asset>(
            r#"
            INSERT INTO assets (
                asset_code, name, category, serial_number, store_id, store_name,
                status, purchase_date, age_snapshot_months,
                last_maintenance_date, last_maintenance_order
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&f.asset_code)
        .bind(&f.name)
        .bind(&f.category)
        .bind(&f.serial_number)
        .bind(f.store_id)
        .bind(&f.store_name)
        .bind(f.status)
        .bind(f.purchase_date)
        .bind(f.age_snapshot_months)
        .bind(f.last_maintenance_date)
        .bind(f.last_maintenance_order)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, UNIQUE_MESSAGES))
    }

    pub async fn save(&self, id: i32, f: &AssetFields) -> AppResult<Asset> {
        sqlx::query_as::<_, Asset>(
            r#"
            UPDATE assets SET
                asset_code = $2,
                name = $3,
                category = $4,
                serial_number = $5,
                store_id = $6,
                store_name = $7,
                status = $8,
                purchase_date = $9,
                age_snapshot_months = $10,
                last_maintenance_date = $11,
                last_maintenance_order = $12,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&f.asset_code)
        .bind(&f.name)
        .bind(&f.category)
        .bind(&f.serial_number)
        .bind(f.store_id)
        .bind(&f.store_name)
        .bind(f.status)
        .bind(f.purchase_date)
        .bind(f.age_snapshot_months)
        .bind(f.last_maintenance_date)
        .bind(f.last_maintenance_order)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, UNIQUE_MESSAGES))?
        .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", id)))
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Asset {} not found", id)));
        }
        Ok(())
    }

    /// Number of assets per store, for the given stores
    pub async fn count_by_store(&self, store_ids: &[i32]) -> AppResult<Vec<StoreAssetCount>> {
        let rows = sqlx::query_as::<_, StoreAssetCount>(
            r#"
            SELECT store_id, COUNT(*) AS count
            FROM assets
            WHERE store_id = ANY($1)
            GROUP BY store_id
            ORDER BY store_id
            "#,
        )
        .bind(store_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    pub async fn add_history(
        &self,
        asset_id: i32,
        date: NaiveDate,
        note: &str,
        created_by: Option<&str>,
    ) -> AppResult<AssetHistory> {
        let row = sqlx::query_as::<_, AssetHistory>(
            r#"
            INSERT INTO asset_history (asset_id, date, note, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(asset_id)
        .bind(date)
        .bind(note)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// History of an asset, most recent first
    pub async fn list_history(&self, asset_id: i32) -> AppResult<Vec<AssetHistory>> {
        let rows = sqlx::query_as::<_, AssetHistory>(
            "SELECT * FROM asset_history WHERE asset_id = $1 ORDER BY date DESC, id DESC",
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Latest history entry of each of the given assets, in one query
    pub async fn latest_history(&self, asset_ids: &[i32]) -> AppResult<Vec<LatestHistory>> {
        if asset_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, LatestHistory>(
            r#"
            SELECT DISTINCT ON (asset_id) asset_id, date, note
            FROM asset_history
            WHERE asset_id = ANY($1)
            ORDER BY asset_id, date DESC, id DESC
            "#,
        )
        .bind(asset_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Update a history entry; `None` when it does not belong to the asset
    pub async fn update_history(
        &self,
        asset_id: i32,
        id: i32,
        date: Option<NaiveDate>,
        note: Option<&str>,
    ) -> AppResult<Option<AssetHistory>> {
        let row = sqlx::query_as::<_, AssetHistory>(
            r#"
            UPDATE asset_history SET
                date = COALESCE($3, date),
                note = COALESCE($4, note),
                updated_at = NOW()
            WHERE id = $1 AND asset_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(asset_id)
        .bind(date)
        .bind(note)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Delete a history entry; `false` when it does not belong to the asset
    pub async fn delete_history(&self, asset_id: i32, id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM asset_history WHERE id = $1 AND asset_id = $2")
            .bind(id)
            .bind(asset_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
