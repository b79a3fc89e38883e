//! Schedules repository

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::schedule::{Schedule, ScheduleDraft, ScheduleStatus},
};

pub const TS_CONFLICT: &str = "TS tersebut sudah terjadwal pada tanggal ini";
pub const STORE_CONFLICT: &str = "Store ini sudah memiliki jadwal pada tanggal ini";

const UNIQUE_MESSAGES: &[(&str, &str)] = &[
    ("schedules_ts_day_key", TS_CONFLICT),
    ("schedules_store_day_key", STORE_CONFLICT),
];

/// Criterion used to look up a same-day schedule
#[derive(Debug, Clone, Copy)]
pub enum DayMatch<'a> {
    Store(i32),
    Technician(&'a str),
    /// Case-insensitive substring of the title
    TitleContains(&'a str),
}

/// Filters of the schedule listing
#[derive(Debug, Default, Clone)]
pub struct ScheduleFilter {
    pub status: Option<ScheduleStatus>,
    pub assigned_ts: Option<String>,
    pub store_id: Option<i32>,
}

#[derive(Clone)]
pub struct SchedulesRepository {
    pool: Pool<Postgres>,
}

impl SchedulesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List schedules by start date
    pub async fn list(&self, filter: &ScheduleFilter) -> AppResult<Vec<Schedule>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if filter.status.is_some() {
            conditions.push(format!("status = ${}", idx));
            idx += 1;
        }
        if filter.assigned_ts.is_some() {
            conditions.push(format!("LOWER(assigned_ts) = LOWER(${})", idx));
            idx += 1;
        }
        if filter.store_id.is_some() {
            conditions.push(format!("store_id = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!("SELECT * FROM schedules {} ORDER BY start ASC, id ASC", where_clause);
        let mut builder = sqlx::query_as::<_, Schedule>(&query);
        if let Some(status) = filter.status {
            builder = builder.bind(status);
        }
        if let Some(ref ts) = filter.assigned_ts {
            builder = builder.bind(ts);
        }
        if let Some(store_id) = filter.store_id {
            builder = builder.bind(store_id);
        }

        Ok(builder.fetch_all(&self.pool).await?)
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Schedule>> {
        let row = sqlx::query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Schedule> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Schedule {} not found", id)))
    }

    /// Reject a technician or store already booked on `day`
    async fn check_conflicts(
        tx: &mut Transaction<'_, Postgres>,
        draft: &ScheduleDraft,
        day: NaiveDate,
        exclude_id: Option<i32>,
    ) -> AppResult<()> {
        if let Some(ref ts) = draft.assigned_ts {
            let taken: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM schedules
                    WHERE assigned_ts = $1 AND start::date = $2
                      AND ($3::int IS NULL OR id <> $3)
                )
                "#,
            )
            .bind(ts)
            .bind(day)
            .bind(exclude_id)
            .fetch_one(&mut **tx)
            .await?;
            if taken {
                return Err(AppError::Conflict(TS_CONFLICT.to_string()));
            }
        }

        if let Some(store_id) = draft.store_id {
            let taken: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM schedules
                    WHERE store_id = $1 AND start::date = $2
                      AND ($3::int IS NULL OR id <> $3)
                )
                "#,
            )
            .bind(store_id)
            .bind(day)
            .bind(exclude_id)
            .fetch_one(&mut **tx)
            .await?;
            if taken {
                return Err(AppError::Conflict(STORE_CONFLICT.to_string()));
            }
        }

        Ok(())
    }

    /// Insert a schedule after checking both per-day exclusivity rules
    pub async fn create_checked(&self, draft: &ScheduleDraft) -> AppResult<Schedule> {
        let mut tx = self.pool.begin().await?;
        Self::check_conflicts(&mut tx, draft, draft.start.date(), None).await?;

        let row = sqlx::query_as::<_, Schedule>(
            r#"
            INSERT INTO schedules (title, start, "end", status, assigned_ts, store_id, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&draft.title)
        .bind(draft.start)
        .bind(draft.end)
        .bind(draft.status)
        .bind(&draft.assigned_ts)
        .bind(draft.store_id)
        .bind(draft.completed_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique_violation(e, UNIQUE_MESSAGES))?;

        tx.commit().await?;
        Ok(row)
    }

    /// Overwrite a schedule with `draft`, checking conflicts against every other row
    pub async fn update_checked(&self, id: i32, draft: &ScheduleDraft) -> AppResult<Schedule> {
        let mut tx = self.pool.begin().await?;
        Self::check_conflicts(&mut tx, draft, draft.start.date(), Some(id)).await?;

        let row = sqlx::query_as::<_, Schedule>(
            r#"
            UPDATE schedules SET
                title = $2,
                start = $3,
                "end" = $4,
                status = $5,
                assigned_ts = $6,
                store_id = $7,
                completed_at = $8
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&draft.title)
        .bind(draft.start)
        .bind(draft.end)
        .bind(draft.status)
        .bind(&draft.assigned_ts)
        .bind(draft.store_id)
        .bind(draft.completed_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique_violation(e, UNIQUE_MESSAGES))?
        .ok_or_else(|| AppError::NotFound(format!("Schedule {} not found", id)))?;

        tx.commit().await?;
        Ok(row)
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Schedule {} not found", id)));
        }
        Ok(())
    }

    /// Active schedules starting in `[from, to)`
    pub async fn active_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AppResult<Vec<Schedule>> {
        let rows = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT * FROM schedules
            WHERE start >= $1 AND start < $2 AND status <> ALL($3)
            ORDER BY start ASC, id ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(ScheduleStatus::inactive_values())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Active schedules starting strictly before `before`
    pub async fn active_before(&self, before: NaiveDateTime) -> AppResult<Vec<Schedule>> {
        let rows = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT * FROM schedules
            WHERE start < $1 AND status <> ALL($2)
            ORDER BY start ASC, id ASC
            "#,
        )
        .bind(before)
        .bind(ScheduleStatus::inactive_values())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// First active schedule of the day `[from, to)` matching `criterion`
    pub async fn first_active_on_day(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
        criterion: DayMatch<'_>,
    ) -> AppResult<Option<Schedule>> {
        let condition = match criterion {
            DayMatch::Store(_) => "store_id = $4",
            DayMatch::Technician(_) => "assigned_ts = $4",
            DayMatch::TitleContains(_) => "POSITION(LOWER($4) IN LOWER(title)) > 0",
        };
        let query = format!(
            r#"
            SELECT * FROM schedules
            WHERE start >= $1 AND start < $2 AND status <> ALL($3) AND {}
            ORDER BY start ASC, id ASC
            LIMIT 1
            "#,
            condition
        );

        let builder = sqlx::query_as::<_, Schedule>(&query)
            .bind(from)
            .bind(to)
            .bind(ScheduleStatus::inactive_values());
        let builder = match criterion {
            DayMatch::Store(store_id) => builder.bind(store_id),
            DayMatch::Technician(ts) => builder.bind(ts),
            DayMatch::TitleContains(text) => builder.bind(text),
        };

        Ok(builder.fetch_optional(&self.pool).await?)
    }

    /// Mark a schedule complete, keeping an earlier completion time
    pub async fn mark_complete(&self, id: i32, now: DateTime<Utc>) -> AppResult<Option<Schedule>> {
        let row = sqlx::query_as::<_, Schedule>(
            r#"
            UPDATE schedules
            SET status = $2, completed_at = COALESCE(completed_at, $3)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(ScheduleStatus::Completed)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
