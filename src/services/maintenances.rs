//! Maintenance workflow: submission checks, asset ledger sync and approval side effects

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};

use crate::{
    calendar,
    error::{AppError, AppResult},
    models::{
        asset::AssetUpsert,
        maintenance::{
            CreateMaintenance, Maintenance, MaintenanceDetails, MaintenanceItem, MaintenanceQuery,
            MaintenanceStatus, NewMaintenance, UpdateMaintenance, DEFAULT_REPAIR_NOTE,
        },
        schedule::Schedule,
    },
    repository::{maintenances::MaintenanceFilter, schedules::DayMatch, Repository},
    services::assets::AssetsService,
};

/// Finds the schedule an unlinked maintenance most likely belongs to
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduleMatcher: Send + Sync {
    async fn find_match(&self, maintenance: &Maintenance) -> AppResult<Option<Schedule>>;
}

/// Same-day lookup by store, then technician, then store name in the title
#[derive(Clone)]
pub struct TieredScheduleMatcher {
    repository: Repository,
}

impl TieredScheduleMatcher {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

/// Criteria in priority order; first hit wins
fn match_tiers(m: &Maintenance) -> Vec<DayMatch<'_>> {
    let mut tiers = Vec::with_capacity(3);
    if let Some(store_id) = m.store_id {
        tiers.push(DayMatch::Store(store_id));
    }
    if let Some(ts) = m.technician.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        tiers.push(DayMatch::Technician(ts));
    }
    if let Some(name) = m.store_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        tiers.push(DayMatch::TitleContains(name));
    }
    tiers
}

#[async_trait]
impl ScheduleMatcher for TieredScheduleMatcher {
    async fn find_match(&self, maintenance: &Maintenance) -> AppResult<Option<Schedule>> {
        let from = calendar::day_start(maintenance.date.date());
        let to = from + chrono::Duration::days(1);

        for tier in match_tiers(maintenance) {
            let found = self
                .repository
                .schedules
                .first_active_on_day(from, to, tier)
                .await?;
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }
}

/// Matcher used when the fallback is switched off
pub struct DisabledScheduleMatcher;

#[async_trait]
impl ScheduleMatcher for DisabledScheduleMatcher {
    async fn find_match(&self, _maintenance: &Maintenance) -> AppResult<Option<Schedule>> {
        Ok(None)
    }
}

#[derive(Clone)]
pub struct MaintenancesService {
    repository: Repository,
    assets: AssetsService,
    matcher: Arc<dyn ScheduleMatcher>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Rules for submitting against a schedule; returns the store the report must carry
fn check_schedule_submission(
    schedule: &Schedule,
    submitted_by: &str,
    store_id: Option<i32>,
    today: NaiveDate,
) -> AppResult<Option<i32>> {
    if schedule.status.is_inactive() {
        return Err(AppError::Authorization(
            "Jadwal sudah selesai/dibatalkan".to_string(),
        ));
    }
    if let Some(ref ts) = schedule.assigned_ts {
        if ts != submitted_by {
            return Err(AppError::Authorization(
                "Tidak boleh membuat maintenance untuk jadwal milik TS lain".to_string(),
            ));
        }
    }

    let store_id = match (schedule.store_id, store_id) {
        (Some(expected), Some(given)) if expected != given => {
            return Err(AppError::BadRequest("Store pada jadwal tidak cocok".to_string()));
        }
        (Some(expected), _) => Some(expected),
        (None, given) => given,
    };

    if schedule.start.date() != today {
        return Err(AppError::Authorization(
            "Maintenance hanya bisa dimulai pada tanggal jadwal".to_string(),
        ));
    }

    Ok(store_id)
}

/// Ledger input for one form line, `None` for lines without hardware or serial
fn asset_upsert_for(item: &MaintenanceItem, m: &Maintenance) -> Option<AssetUpsert> {
    if !item.is_trackable() {
        return None;
    }
    let hardware = item.hardware.clone()?;
    Some(AssetUpsert {
        category: Some(hardware.clone()),
        name: hardware,
        serial_number: item.serial_number.clone(),
        store_id: m.store_id,
        store_name: m.store_name.clone(),
        maintenance_date: Some(m.date),
        age_months_input: item.usia,
        status: item.asset_status(),
        maintenance_order: item.no,
    })
}

/// History entry (date, note, author) for a line that reports a repair
fn repair_entry(
    item: &MaintenanceItem,
    m: &Maintenance,
) -> Option<(NaiveDate, String, Option<String>)> {
    if !item.has_repair() {
        return None;
    }
    let date = item
        .repair_date
        .as_deref()
        .and_then(|d| calendar::parse_date(d).ok())
        .unwrap_or_else(|| m.date.date());
    let note = non_empty(item.repair_note.as_deref()).unwrap_or_else(|| DEFAULT_REPAIR_NOTE.to_string());
    let author = non_empty(m.technician.as_deref()).or_else(|| non_empty(m.submitted_by.as_deref()));
    Some((date, note, author))
}

impl MaintenancesService {
    pub fn new(
        repository: Repository,
        assets: AssetsService,
        matcher: Arc<dyn ScheduleMatcher>,
    ) -> Self {
        Self {
            repository,
            assets,
            matcher,
        }
    }

    pub async fn list(&self, query: &MaintenanceQuery) -> AppResult<Vec<Maintenance>> {
        let filter = MaintenanceFilter {
            status: query.status.as_deref().map(str::parse).transpose()?,
            store_id: query.store_id,
            submitted_by: non_empty(query.submitted_by.as_deref()),
        };
        self.repository.maintenances.list(&filter).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Maintenance> {
        self.repository.maintenances.get_by_id(id).await
    }

    /// Submit a maintenance report as `submitted_by`
    pub async fn create(&self, data: &CreateMaintenance, submitted_by: &str) -> AppResult<Maintenance> {
        let mut store_id = data.store_id;

        let date = match data.schedule_id {
            Some(schedule_id) => {
                let schedule = self.repository.schedules.get_by_id(schedule_id).await?;
                store_id =
                    check_schedule_submission(&schedule, submitted_by, store_id, calendar::today())?;
                schedule.start
            }
            None => {
                let raw = non_empty(data.date.as_deref())
                    .ok_or_else(|| AppError::Validation("date is required".to_string()))?;
                calendar::parse_datetime(&raw)?
            }
        };

        let mut store_name = non_empty(data.store_name.as_deref());
        if store_name.is_none() {
            if let Some(id) = store_id {
                store_name = self.repository.stores.find_by_id(id).await?.map(|s| s.name);
            }
        }

        let details = match data.details {
            Some(ref payload) => MaintenanceDetails::from_payload(payload).unwrap_or_else(|e| {
                tracing::warn!("Unreadable maintenance details, storing without items: {}", e);
                MaintenanceDetails::default()
            }),
            None => MaintenanceDetails::default(),
        };
        details.check_duplicate_serials()?;

        let new = NewMaintenance {
            title: data.title.trim().to_string(),
            details,
            date,
            store_name,
            technician: non_empty(data.technician.as_deref())
                .or_else(|| Some(submitted_by.to_string())),
            store_id,
            submitted_by: Some(submitted_by.to_string()),
            schedule_id: data.schedule_id,
        };

        let saved = self.repository.maintenances.create(&new).await?;
        tracing::info!(
            "Maintenance {} submitted by {} ({} items)",
            saved.id,
            submitted_by,
            saved.details.items.len()
        );

        self.sync_assets(&saved).await;
        Ok(saved)
    }

    /// Revise the content of a report and re-derive its assets
    pub async fn update_content(&self, id: i32, data: &UpdateMaintenance) -> AppResult<Maintenance> {
        let mut m = self.repository.maintenances.get_by_id(id).await?;

        if let Some(ref title) = data.title {
            m.title = title.trim().to_string();
        }
        if let Some(ref payload) = data.details {
            let mut details = MaintenanceDetails::from_payload(payload)?;
            details.check_duplicate_serials()?;
            details.fixed_at = Some(Utc::now());
            m.details = details;
        }
        if let Some(ref date) = data.date {
            m.date = calendar::parse_datetime(date)?;
        }
        if data.store_name.is_some() {
            m.store_name = non_empty(data.store_name.as_deref());
        }
        if data.technician.is_some() {
            m.technician = non_empty(data.technician.as_deref());
        }
        if data.store_id.is_some() {
            m.store_id = data.store_id;
        }

        let saved = self.repository.maintenances.save_content(&m).await?;
        self.sync_assets(&saved).await;
        Ok(saved)
    }

    /// Feed every trackable line into the asset ledger, in form order.
    ///
    /// A failing line is logged and skipped.
    async fn sync_assets(&self, m: &Maintenance) {
        for item in &m.details.items {
            let Some(input) = asset_upsert_for(item, m) else {
                continue;
            };

            let asset = match self.assets.upsert_from_maintenance_item(&input).await {
                Ok(asset) => asset,
                Err(e) => {
                    tracing::warn!(
                        "Maintenance {}: asset upsert failed for {:?}: {}",
                        m.id,
                        input.serial_number,
                        e
                    );
                    continue;
                }
            };

            if let Some((date, note, author)) = repair_entry(item, m) {
                if let Err(e) = self
                    .assets
                    .record_history(asset.id, date, &note, author.as_deref())
                    .await
                {
                    tracing::warn!(
                        "Maintenance {}: history append failed for asset {}: {}",
                        m.id,
                        asset.id,
                        e
                    );
                }
            }
        }
    }

    /// Approve or reject a report.
    ///
    /// Approving a fix request opens its repair window; approving anything
    /// else completes the linked (or best matching same-day) schedule. The
    /// status change stands even when the schedule cannot be completed.
    pub async fn update_status(
        &self,
        id: i32,
        status: MaintenanceStatus,
        approved_by: Option<&str>,
    ) -> AppResult<Maintenance> {
        let current = self.repository.maintenances.get_by_id(id).await?;
        let now = Utc::now();

        let mut details = current.details.clone();
        let is_fix_request = details.is_fix_request();
        if status == MaintenanceStatus::Approved && is_fix_request {
            details.open_fix_window(now);
        }

        let approved_by = approved_by.map(str::trim).filter(|s| !s.is_empty());
        let saved = self
            .repository
            .maintenances
            .save_status(id, status, approved_by, &details)
            .await?;

        if status == MaintenanceStatus::Approved && !is_fix_request {
            if let Err(e) = self.complete_schedule_for(&saved).await {
                tracing::warn!(
                    "Maintenance {} approved but its schedule was not completed: {}",
                    saved.id,
                    e
                );
            }
        }

        tracing::info!(
            "Maintenance {} {} by {}",
            saved.id,
            saved.status,
            approved_by.unwrap_or("-")
        );
        Ok(saved)
    }

    async fn complete_schedule_for(&self, m: &Maintenance) -> AppResult<()> {
        let schedule_id = match m.schedule_id {
            Some(id) => Some(id),
            None => self.matcher.find_match(m).await?.map(|s| s.id),
        };

        match schedule_id {
            Some(id) => match self.repository.schedules.mark_complete(id, Utc::now()).await? {
                Some(schedule) => {
                    tracing::debug!("Schedule {} completed by maintenance {}", schedule.id, m.id)
                }
                None => tracing::warn!("Maintenance {} links missing schedule {}", m.id, id),
            },
            None => tracing::debug!("No schedule matched maintenance {}", m.id),
        }
        Ok(())
    }

    /// 1-based position of the report among its store's reports of the same year
    pub async fn yearly_sequence(&self, m: &Maintenance) -> AppResult<Option<i64>> {
        let Some(store_id) = m.store_id else {
            return Ok(None);
        };
        let Some((from, to)) = calendar::year_bounds(m.date.year()) else {
            return Ok(None);
        };
        self.repository
            .maintenances
            .rank_in_store_period(m.id, store_id, from, to)
            .await
    }

    /// Store name: own field, then the store record, then the linked schedule's store
    pub async fn store_name_for(&self, m: &Maintenance) -> AppResult<Option<String>> {
        if let Some(name) = non_empty(m.store_name.as_deref()) {
            return Ok(Some(name));
        }

        let mut store_id = m.store_id;
        if store_id.is_none() {
            if let Some(schedule_id) = m.schedule_id {
                store_id = self
                    .repository
                    .schedules
                    .find_by_id(schedule_id)
                    .await?
                    .and_then(|s| s.store_id);
            }
        }

        match store_id {
            Some(id) => Ok(self
                .repository
                .stores
                .find_by_id(id)
                .await?
                .and_then(|s| non_empty(Some(s.name.as_str())))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{asset::AssetStatus, schedule::ScheduleStatus};
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn schedule(status: ScheduleStatus) -> Schedule {
        Schedule {
            id: 1,
            title: "Maintenance Store One".into(),
            start: calendar::noon(day(2026, 5, 4)),
            end: None,
            status,
            assigned_ts: Some("tech1".into()),
            store_id: Some(10),
            completed_at: None,
        }
    }

    fn maintenance(details: serde_json::Value) -> Maintenance {
        Maintenance {
            id: 5,
            title: "Visit".into(),
            details: MaintenanceDetails::from_payload(&details).unwrap(),
            date: calendar::noon(day(2026, 5, 4)),
            store_name: Some("Store One".into()),
            technician: Some("tech1".into()),
            store_id: Some(10),
            status: MaintenanceStatus::Submitted,
            submitted_by: Some("tech1".into()),
            approved_by: None,
            schedule_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_submission_on_schedule_day() {
        let s = schedule(ScheduleStatus::Scheduled);
        assert_eq!(
            check_schedule_submission(&s, "tech1", None, day(2026, 5, 4)).unwrap(),
            Some(10)
        );
        assert_eq!(
            check_schedule_submission(&s, "tech1", Some(10), day(2026, 5, 4)).unwrap(),
            Some(10)
        );
    }

    #[test]
    fn test_submission_rejections() {
        let today = day(2026, 5, 4);
        let closed = schedule(ScheduleStatus::Completed);
        assert!(matches!(
            check_schedule_submission(&closed, "tech1", None, today),
            Err(AppError::Authorization(msg)) if msg == "Jadwal sudah selesai/dibatalkan"
        ));

        let s = schedule(ScheduleStatus::Scheduled);
        assert!(matches!(
            check_schedule_submission(&s, "tech2", None, today),
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            check_schedule_submission(&s, "tech1", Some(11), today),
            Err(AppError::BadRequest(msg)) if msg == "Store pada jadwal tidak cocok"
        ));
        assert!(matches!(
            check_schedule_submission(&s, "tech1", None, day(2026, 5, 5)),
            Err(AppError::Authorization(msg)) if msg == "Maintenance hanya bisa dimulai pada tanggal jadwal"
        ));
    }

    #[test]
    fn test_unassigned_schedule_accepts_any_submitter() {
        let mut s = schedule(ScheduleStatus::Pending);
        s.assigned_ts = None;
        s.store_id = None;
        assert_eq!(
            check_schedule_submission(&s, "someone", Some(3), day(2026, 5, 4)).unwrap(),
            Some(3)
        );
    }

    #[test]
    fn test_asset_upsert_from_item() {
        let m = maintenance(json!({"items": [
            {"no": 2, "hardware": "PC", "sn": "SN-1", "kondisi": "tidak", "usia": 30},
            {"hardware": "Scanner"}
        ]}));
        let input = asset_upsert_for(&m.details.items[0], &m).unwrap();
        assert_eq!(input.name, "PC");
        assert_eq!(input.category.as_deref(), Some("PC"));
        assert_eq!(input.status, Some(AssetStatus::InRepair));
        assert_eq!(input.maintenance_order, Some(2));
        assert_eq!(input.age_months_input, Some(30));
        assert_eq!(input.store_id, Some(10));
        assert!(asset_upsert_for(&m.details.items[1], &m).is_none());
    }

    #[test]
    fn test_repair_entry_defaults() {
        let m = maintenance(json!({"items": [
            {"hardware": "PC", "sn": "1", "repairNote": "Ganti PSU", "repairDate": "2026-05-02T08:00:00Z"},
            {"hardware": "PC", "sn": "2", "repairDate": "garbage"},
            {"hardware": "PC", "sn": "3"}
        ]}));
        let (date, note, author) = repair_entry(&m.details.items[0], &m).unwrap();
        assert_eq!(date, day(2026, 5, 2));
        assert_eq!(note, "Ganti PSU");
        assert_eq!(author.as_deref(), Some("tech1"));

        let (date, note, _) = repair_entry(&m.details.items[1], &m).unwrap();
        assert_eq!(date, day(2026, 5, 4));
        assert_eq!(note, DEFAULT_REPAIR_NOTE);

        assert!(repair_entry(&m.details.items[2], &m).is_none());
    }

    #[test]
    fn test_match_tiers_order() {
        let m = maintenance(json!({"items": []}));
        let tiers = match_tiers(&m);
        assert_eq!(tiers.len(), 3);
        assert!(matches!(tiers[0], DayMatch::Store(10)));
        assert!(matches!(tiers[1], DayMatch::Technician("tech1")));
        assert!(matches!(tiers[2], DayMatch::TitleContains("Store One")));

        let mut bare = maintenance(json!({"items": []}));
        bare.store_id = None;
        bare.technician = Some(" ".into());
        let tiers = match_tiers(&bare);
        assert_eq!(tiers.len(), 1);
        assert!(matches!(tiers[0], DayMatch::TitleContains(_)));
    }

    #[tokio::test]
    async fn test_disabled_matcher_never_matches() {
        let m = maintenance(json!({"items": []}));
        assert!(DisabledScheduleMatcher.find_match(&m).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_matcher_contract() {
        let mut matcher = MockScheduleMatcher::new();
        matcher
            .expect_find_match()
            .returning(|_| Ok(Some(schedule(ScheduleStatus::Scheduled))));
        let m = maintenance(json!({"items": []}));
        let found = matcher.find_match(&m).await.unwrap();
        assert_eq!(found.map(|s| s.id), Some(1));
    }
}
