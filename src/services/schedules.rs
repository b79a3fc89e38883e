//! Schedule manager: per-day exclusivity, completion bookkeeping, upcoming/overdue views

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::{
    calendar,
    error::{AppError, AppResult},
    models::schedule::{
        CreateSchedule, Schedule, ScheduleDraft, ScheduleQuery, ScheduleStatus, UpdateSchedule,
    },
    repository::{schedules::ScheduleFilter, Repository},
};

/// Length of the upcoming view, in days
const UPCOMING_DAYS: i64 = 30;

#[derive(Clone)]
pub struct SchedulesService {
    repository: Repository,
}

/// Visit start: local noon of the supplied day
fn parse_start(input: &str) -> AppResult<NaiveDateTime> {
    Ok(calendar::noon(calendar::parse_datetime(input)?.date()))
}

fn parse_end(input: Option<&str>) -> AppResult<Option<NaiveDateTime>> {
    match input.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => calendar::parse_datetime(s).map(Some),
        None => Ok(None),
    }
}

/// Empty strings clear the technician
fn technician(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Completion time matching `status`: set when closing, cleared when reopening
fn settle_completion(
    status: ScheduleStatus,
    completed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if status.is_inactive() {
        completed_at.or(Some(now))
    } else {
        None
    }
}

/// Effective row after applying a partial update
fn apply_update(
    current: Schedule,
    data: &UpdateSchedule,
    now: DateTime<Utc>,
) -> AppResult<ScheduleDraft> {
    let mut draft = ScheduleDraft::from(current);

    if let Some(ref title) = data.title {
        draft.title = title.trim().to_string();
    }
    if let Some(ref start) = data.start {
        draft.start = parse_start(start)?;
    }
    if data.end.is_some() {
        draft.end = parse_end(data.end.as_deref())?;
    }
    if data.assigned_ts.is_some() {
        draft.assigned_ts = technician(data.assigned_ts.as_deref());
    }
    if let Some(store_id) = data.store_id {
        draft.store_id = Some(store_id);
    }
    if let Some(ref status) = data.status {
        draft.status = status.parse()?;
    }
    draft.completed_at = settle_completion(draft.status, draft.completed_at, now);

    Ok(draft)
}

/// Reopen a schedule on a new day
fn apply_reschedule(current: Schedule, start: NaiveDateTime) -> ScheduleDraft {
    let mut draft = ScheduleDraft::from(current);
    draft.start = start;
    draft.completed_at = None;
    if draft.status.is_inactive() {
        draft.status = ScheduleStatus::Scheduled;
    }
    draft
}

impl SchedulesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &ScheduleQuery) -> AppResult<Vec<Schedule>> {
        let filter = ScheduleFilter {
            status: query.status.as_deref().map(str::parse).transpose()?,
            assigned_ts: technician(query.assigned_ts.as_deref()),
            store_id: query.store_id,
        };
        self.repository.schedules.list(&filter).await
    }

    pub async fn list_by_status(&self, status: ScheduleStatus) -> AppResult<Vec<Schedule>> {
        let filter = ScheduleFilter {
            status: Some(status),
            ..Default::default()
        };
        self.repository.schedules.list(&filter).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Schedule> {
        self.repository.schedules.get_by_id(id).await
    }

    pub async fn create(&self, data: &CreateSchedule) -> AppResult<Schedule> {
        let store_id = data.store_id.ok_or_else(|| {
            AppError::Validation("storeId wajib diisi untuk membuat jadwal".to_string())
        })?;

        let status = match data.status.as_deref() {
            Some(s) if !s.trim().is_empty() => s.parse()?,
            _ => ScheduleStatus::default(),
        };
        let draft = ScheduleDraft {
            title: data.title.trim().to_string(),
            start: parse_start(&data.start)?,
            end: parse_end(data.end.as_deref())?,
            status,
            assigned_ts: technician(data.assigned_ts.as_deref()),
            store_id: Some(store_id),
            completed_at: settle_completion(status, None, Utc::now()),
        };

        let schedule = self.repository.schedules.create_checked(&draft).await?;
        tracing::info!(
            "Schedule {} created for store {} on {}",
            schedule.id,
            store_id,
            calendar::ymd(schedule.start.date())
        );
        Ok(schedule)
    }

    /// Move a schedule to another day and reopen it
    pub async fn reschedule(&self, id: i32, start: &str) -> AppResult<Schedule> {
        let current = self.repository.schedules.get_by_id(id).await?;
        let draft = apply_reschedule(current, parse_start(start)?);
        self.repository.schedules.update_checked(id, &draft).await
    }

    pub async fn update(&self, id: i32, data: &UpdateSchedule) -> AppResult<Schedule> {
        let current = self.repository.schedules.get_by_id(id).await?;
        let draft = apply_update(current, data, Utc::now())?;
        self.repository.schedules.update_checked(id, &draft).await
    }

    /// Admin approval / rejection of a planned visit
    pub async fn set_status(&self, id: i32, status: ScheduleStatus) -> AppResult<Schedule> {
        let update = UpdateSchedule {
            status: Some(status.as_str().to_string()),
            ..Default::default()
        };
        self.update(id, &update).await
    }

    /// Mark complete, keeping an earlier completion time
    pub async fn complete(&self, id: i32) -> AppResult<Option<Schedule>> {
        self.repository.schedules.mark_complete(id, Utc::now()).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.schedules.delete(id).await
    }

    /// Active schedules in the next thirty days, starting today
    pub async fn upcoming(&self) -> AppResult<Vec<Schedule>> {
        let from = calendar::day_start(calendar::today());
        let to = from + Duration::days(UPCOMING_DAYS);
        self.repository.schedules.active_between(from, to).await
    }

    /// Active schedules whose day has passed
    pub async fn overdue(&self) -> AppResult<Vec<Schedule>> {
        let today = calendar::day_start(calendar::today());
        self.repository.schedules.active_before(today).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn schedule(status: ScheduleStatus, completed_at: Option<DateTime<Utc>>) -> Schedule {
        Schedule {
            id: 7,
            title: "Visit ST1".into(),
            start: calendar::noon(NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()),
            end: None,
            status,
            assigned_ts: Some("tech1".into()),
            store_id: Some(1),
            completed_at,
        }
    }

    #[test]
    fn test_start_normalized_to_noon() {
        let start = parse_start("2026-05-04T23:30").unwrap();
        assert_eq!(start, calendar::noon(NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()));
        assert!(parse_start("tomorrow").is_err());
    }

    #[test]
    fn test_update_closing_sets_completed_at() {
        let now = Utc::now();
        let update = UpdateSchedule {
            status: Some("Selesai".into()),
            ..Default::default()
        };
        let draft = apply_update(schedule(ScheduleStatus::Scheduled, None), &update, now).unwrap();
        assert_eq!(draft.status, ScheduleStatus::Completed);
        assert_eq!(draft.completed_at, Some(now));
    }

    #[test]
    fn test_update_keeps_existing_completion_time() {
        let earlier = Utc::now() - Duration::days(2);
        let update = UpdateSchedule {
            title: Some("Renamed".into()),
            ..Default::default()
        };
        let draft =
            apply_update(schedule(ScheduleStatus::Completed, Some(earlier)), &update, Utc::now())
                .unwrap();
        assert_eq!(draft.completed_at, Some(earlier));
        assert_eq!(draft.title, "Renamed");
    }

    #[test]
    fn test_update_reopening_clears_completion() {
        let update = UpdateSchedule {
            status: Some("pending".into()),
            ..Default::default()
        };
        let draft = apply_update(
            schedule(ScheduleStatus::Completed, Some(Utc::now())),
            &update,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(draft.status, ScheduleStatus::Pending);
        assert_eq!(draft.completed_at, None);
    }

    #[test]
    fn test_update_falls_back_to_existing_fields() {
        let update = UpdateSchedule {
            assigned_ts: Some("".into()),
            ..Default::default()
        };
        let draft =
            apply_update(schedule(ScheduleStatus::Scheduled, None), &update, Utc::now()).unwrap();
        assert_eq!(draft.assigned_ts, None);
        assert_eq!(draft.store_id, Some(1));
        assert!(apply_update(
            schedule(ScheduleStatus::Scheduled, None),
            &UpdateSchedule { status: Some("bogus".into()), ..Default::default() },
            Utc::now()
        )
        .is_err());
    }

    #[test]
    fn test_reschedule_always_clears_completion() {
        let day = calendar::noon(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap());
        for status in [
            ScheduleStatus::Completed,
            ScheduleStatus::Cancelled,
            ScheduleStatus::Pending,
        ] {
            let draft = apply_reschedule(schedule(status, Some(Utc::now())), day);
            assert_eq!(draft.completed_at, None);
            assert_eq!(draft.start, day);
            assert!(!draft.status.is_inactive());
        }
        let pending = apply_reschedule(schedule(ScheduleStatus::Pending, None), day);
        assert_eq!(pending.status, ScheduleStatus::Pending);
    }
}
