//! Database-backed workflow tests
//!
//! Need a Postgres server reachable through DATABASE_URL.
//! Run with: cargo test --test workflow_tests -- --ignored

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde_json::json;
use sqlx::PgPool;

use maintrack_server::{
    calendar,
    config::{AssetsConfig, ReminderConfig, TelegramConfig},
    error::{AppError, AppResult},
    models::{
        asset::{AssetQuery, AssetStatus, CreateAsset, CreateAssetHistory},
        maintenance::{CreateMaintenance, DetailsKind, Maintenance, MaintenanceStatus},
        schedule::{CreateSchedule, Schedule, ScheduleStatus},
        store::{CreateStore, Store},
        user::{Role, UserClaims},
    },
    repository::Repository,
    services::{
        assets::AssetsService,
        maintenances::{
            DisabledScheduleMatcher, MaintenancesService, ScheduleMatcher, TieredScheduleMatcher,
        },
        reminder::ReminderService,
        schedules::SchedulesService,
    },
};

struct Fixture {
    repository: Repository,
    assets: AssetsService,
    schedules: SchedulesService,
    maintenances: MaintenancesService,
}

fn fixture(pool: PgPool) -> Fixture {
    let repository = Repository::new(pool);
    let matcher = Arc::new(TieredScheduleMatcher::new(repository.clone()));
    fixture_with(repository, matcher)
}

fn fixture_with(repository: Repository, matcher: Arc<dyn ScheduleMatcher>) -> Fixture {
    let assets = AssetsService::new(repository.clone(), AssetsConfig::default());
    let maintenances = MaintenancesService::new(repository.clone(), assets.clone(), matcher);
    Fixture {
        schedules: SchedulesService::new(repository.clone()),
        assets,
        maintenances,
        repository,
    }
}

/// Matcher whose lookup always errors
struct BrokenMatcher;

#[async_trait]
impl ScheduleMatcher for BrokenMatcher {
    async fn find_match(&self, _maintenance: &Maintenance) -> AppResult<Option<Schedule>> {
        Err(AppError::Internal("matcher unavailable".to_string()))
    }
}

fn claims(username: &str, role: Role) -> UserClaims {
    UserClaims {
        sub: username.to_string(),
        user_id: 1,
        username: username.to_string(),
        role,
        exp: 0,
        iat: 0,
    }
}

async fn store(f: &Fixture, code: &str) -> Store {
    f.repository
        .stores
        .create(&CreateStore {
            code: code.to_string(),
            name: format!("Store {}", code),
            location: None,
            ts_assigned: None,
        })
        .await
        .expect("store")
}

async fn store_for(f: &Fixture, code: &str, ts: &str) -> Store {
    f.repository
        .stores
        .create(&CreateStore {
            code: code.to_string(),
            name: format!("Store {}", code),
            location: None,
            ts_assigned: Some(ts.to_string()),
        })
        .await
        .expect("store")
}

async fn asset(f: &Fixture, code: &str, store_id: i32, age: Option<i32>) -> i32 {
    f.assets
        .create(&CreateAsset {
            asset_code: Some(code.to_string()),
            name: "PC".to_string(),
            store_id: Some(store_id),
            age_snapshot_months: age,
            ..Default::default()
        })
        .await
        .expect("asset")
        .id
}

async fn listed_codes(f: &Fixture, query: &AssetQuery, who: &UserClaims) -> Vec<String> {
    let mut codes: Vec<String> = f
        .assets
        .list(query, who)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.asset.asset_code)
        .collect();
    codes.sort();
    codes
}

fn visit(store_id: i32, ts: &str, day: &str) -> CreateSchedule {
    titled_visit("Maintenance rutin", store_id, ts, day)
}

fn titled_visit(title: &str, store_id: i32, ts: &str, day: &str) -> CreateSchedule {
    CreateSchedule {
        title: title.to_string(),
        start: day.to_string(),
        end: None,
        store_id: Some(store_id),
        assigned_ts: Some(ts.to_string()),
        status: None,
    }
}

fn report(schedule_id: Option<i32>, store_id: Option<i32>, items: serde_json::Value) -> CreateMaintenance {
    CreateMaintenance {
        title: "Maintenance rutin".to_string(),
        date: Some(calendar::ymd(calendar::today())),
        store_name: None,
        store_id,
        technician: None,
        schedule_id,
        details: Some(json!({ "items": items })),
    }
}

fn today() -> String {
    calendar::ymd(calendar::today())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_submit_approve_and_repair_flow(pool: PgPool) {
    let f = fixture(pool);
    let st1 = store(&f, "ST1").await;

    // Scenario A
    let schedule = f
        .schedules
        .create(&visit(st1.id, "tech1", &today()))
        .await
        .expect("schedule");

    let m = f
        .maintenances
        .create(
            &report(
                Some(schedule.id),
                None,
                json!([{ "hardware": "PC", "sn": "SN-1", "kondisi": "baik" }]),
            ),
            "tech1",
        )
        .await
        .expect("maintenance");
    assert_eq!(m.status, MaintenanceStatus::Submitted);
    assert_eq!(m.date, schedule.start);
    assert_eq!(m.store_id, Some(st1.id));

    let asset = f
        .repository
        .assets
        .find_by_serial("SN-1", Some(st1.id))
        .await
        .unwrap()
        .expect("asset created from the report");
    assert_eq!(asset.status, AssetStatus::Active);

    // Scenario B
    let err = f
        .schedules
        .create(&visit(st1.id, "tech2", &today()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Scenario C
    let approved = f
        .maintenances
        .update_status(m.id, MaintenanceStatus::Approved, Some("admin"))
        .await
        .unwrap();
    assert_eq!(approved.approved_by.as_deref(), Some("admin"));
    let schedule = f.schedules.get_by_id(schedule.id).await.unwrap();
    assert!(schedule.status.is_inactive());
    assert!(schedule.completed_at.is_some());

    // Scenario D
    let second = f
        .maintenances
        .create(
            &report(
                None,
                Some(st1.id),
                json!([{
                    "hardware": "PC",
                    "sn": "sn-1",
                    "kondisi": "tidak",
                    "repairNote": "Ganti PSU"
                }]),
            ),
            "tech1",
        )
        .await
        .unwrap();
    assert_eq!(second.schedule_id, None);

    let same = f.repository.assets.get_by_id(asset.id).await.unwrap();
    assert_eq!(same.status, AssetStatus::InRepair);
    let history = f.repository.assets.list_history(asset.id).await.unwrap();
    assert!(history.iter().any(|h| h.note == "Ganti PSU"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_technician_cannot_be_double_booked(pool: PgPool) {
    let f = fixture(pool);
    let a = store(&f, "STA").await;
    let b = store(&f, "STB").await;

    f.schedules
        .create(&visit(a.id, "tech1", "2031-01-10"))
        .await
        .unwrap();
    let err = f
        .schedules
        .create(&visit(b.id, "tech1", "2031-01-10T08:00:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // closed schedules still hold their day
    let other = f
        .schedules
        .create(&visit(b.id, "tech2", "2031-01-11"))
        .await
        .unwrap();
    f.schedules.complete(other.id).await.unwrap();
    let err = f
        .schedules
        .create(&visit(b.id, "tech1", "2031-01-11"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // moving onto a free day succeeds, excluding the row itself
    let moved = f
        .schedules
        .reschedule(other.id, "2031-01-12")
        .await
        .unwrap();
    assert_eq!(calendar::ymd(moved.start.date()), "2031-01-12");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_reschedule_clears_completion(pool: PgPool) {
    let f = fixture(pool);
    let st = store(&f, "STR").await;

    let s = f
        .schedules
        .create(&visit(st.id, "tech1", "2031-02-01"))
        .await
        .unwrap();
    f.schedules.complete(s.id).await.unwrap();

    let moved = f.schedules.reschedule(s.id, "2031-02-03").await.unwrap();
    assert_eq!(moved.completed_at, None);
    assert_eq!(moved.status, ScheduleStatus::Scheduled);
    assert_eq!(calendar::ymd(moved.start.date()), "2031-02-03");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_upsert_reuses_asset_row(pool: PgPool) {
    let f = fixture(pool);
    let st = store(&f, "STU").await;

    for kondisi in ["baik", "baik"] {
        f.maintenances
            .create(
                &report(None, Some(st.id), json!([{ "hardware": "Printer", "sn": "PR-9", "kondisi": kondisi }])),
                "tech1",
            )
            .await
            .unwrap();
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assets WHERE serial_number = 'PR-9'")
        .fetch_one(&f.repository.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_duplicate_serials_rejected(pool: PgPool) {
    let f = fixture(pool);
    let st = store(&f, "STD").await;

    let err = f
        .maintenances
        .create(
            &report(
                None,
                Some(st.id),
                json!([
                    { "no": 1, "hardware": "PC", "sn": "ABC-1" },
                    { "no": 2, "hardware": "PC", "sn": "abc-1" }
                ]),
            ),
            "tech1",
        )
        .await
        .unwrap_err();
    match err {
        AppError::BadRequest(msg) => assert!(msg.to_lowercase().contains("abc-1")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_sweep_auto_approves_stale_reports(pool: PgPool) {
    let f = fixture(pool);
    let st = store(&f, "STE").await;

    let m = f
        .maintenances
        .create(&report(None, Some(st.id), json!([])), "tech1")
        .await
        .unwrap();
    let fresh = f
        .maintenances
        .create(&report(None, Some(st.id), json!([])), "tech1")
        .await
        .unwrap();
    sqlx::query("UPDATE maintenances SET created_at = NOW() - INTERVAL '40 minutes' WHERE id = $1")
        .bind(m.id)
        .execute(&f.repository.pool)
        .await
        .unwrap();

    // Scenario E
    let sweep = ReminderService::new(
        f.repository.clone(),
        f.maintenances.clone(),
        None,
        ReminderConfig {
            auto_approve_minutes: 30,
            ..Default::default()
        },
        &TelegramConfig::default(),
    );
    let report = sweep.tick(false).await;
    assert_eq!(report.auto_approve.count, 1);
    assert!(report.attempts.is_empty());

    let approved = f.maintenances.get_by_id(m.id).await.unwrap();
    assert_eq!(approved.status, MaintenanceStatus::Approved);
    assert_eq!(approved.approved_by.as_deref(), Some("auto"));

    let untouched = f.maintenances.get_by_id(fresh.id).await.unwrap();
    assert_eq!(untouched.status, MaintenanceStatus::Submitted);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_sweep_counts_only_successful_approvals(pool: PgPool) {
    let f = fixture(pool);
    let st = store(&f, "STF").await;

    let ok = f
        .maintenances
        .create(&report(None, Some(st.id), json!([])), "tech1")
        .await
        .unwrap();
    let locked = f
        .maintenances
        .create(&report(None, Some(st.id), json!([])), "tech1")
        .await
        .unwrap();
    sqlx::query("UPDATE maintenances SET created_at = NOW() - INTERVAL '2 hours'")
        .execute(&f.repository.pool)
        .await
        .unwrap();

    sqlx::query(
        "CREATE FUNCTION reject_update() RETURNS trigger AS $$ BEGIN RAISE EXCEPTION 'locked'; END $$ LANGUAGE plpgsql",
    )
    .execute(&f.repository.pool)
    .await
    .unwrap();
    sqlx::query(&format!(
        "CREATE TRIGGER lock_row BEFORE UPDATE ON maintenances FOR EACH ROW WHEN (OLD.id = {}) EXECUTE FUNCTION reject_update()",
        locked.id
    ))
    .execute(&f.repository.pool)
    .await
    .unwrap();

    let sweep = ReminderService::new(
        f.repository.clone(),
        f.maintenances.clone(),
        None,
        ReminderConfig {
            auto_approve_minutes: 30,
            ..Default::default()
        },
        &TelegramConfig::default(),
    );
    let report = sweep.tick(false).await;
    assert_eq!(report.auto_approve.count, 1);

    let approved = f.maintenances.get_by_id(ok.id).await.unwrap();
    assert_eq!(approved.status, MaintenanceStatus::Approved);
    let still = f.maintenances.get_by_id(locked.id).await.unwrap();
    assert_eq!(still.status, MaintenanceStatus::Submitted);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_approval_stands_when_schedule_lookup_fails(pool: PgPool) {
    let f = fixture_with(Repository::new(pool), Arc::new(BrokenMatcher));
    let st = store(&f, "STG").await;
    let schedule = f
        .schedules
        .create(&visit(st.id, "tech1", &today()))
        .await
        .unwrap();

    let m = f
        .maintenances
        .create(&report(None, Some(st.id), json!([])), "tech1")
        .await
        .unwrap();
    let approved = f
        .maintenances
        .update_status(m.id, MaintenanceStatus::Approved, Some("admin"))
        .await
        .expect("approval is kept");
    assert_eq!(approved.status, MaintenanceStatus::Approved);

    let stored = f.maintenances.get_by_id(m.id).await.unwrap();
    assert_eq!(stored.status, MaintenanceStatus::Approved);
    let open = f.schedules.get_by_id(schedule.id).await.unwrap();
    assert_eq!(open.status, ScheduleStatus::Scheduled);
    assert_eq!(open.completed_at, None);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_unlinked_approval_completes_store_schedule(pool: PgPool) {
    let f = fixture(pool);
    let st = store(&f, "STH").await;
    let schedule = f
        .schedules
        .create(&visit(st.id, "tech1", &today()))
        .await
        .unwrap();

    let m = f
        .maintenances
        .create(&report(None, Some(st.id), json!([])), "someone-else")
        .await
        .unwrap();
    f.maintenances
        .update_status(m.id, MaintenanceStatus::Approved, Some("admin"))
        .await
        .unwrap();

    let done = f.schedules.get_by_id(schedule.id).await.unwrap();
    assert_eq!(done.status, ScheduleStatus::Completed);
    assert!(done.completed_at.is_some());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_unlinked_approval_completes_technician_schedule(pool: PgPool) {
    let f = fixture(pool);
    let st = store(&f, "STI").await;
    let schedule = f
        .schedules
        .create(&visit(st.id, "tech9", &today()))
        .await
        .unwrap();

    // no store on the report; technician defaults to the submitter
    let m = f
        .maintenances
        .create(&report(None, None, json!([])), "tech9")
        .await
        .unwrap();
    assert_eq!(m.store_id, None);
    f.maintenances
        .update_status(m.id, MaintenanceStatus::Approved, Some("admin"))
        .await
        .unwrap();

    let done = f.schedules.get_by_id(schedule.id).await.unwrap();
    assert_eq!(done.status, ScheduleStatus::Completed);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_unlinked_approval_completes_schedule_by_title(pool: PgPool) {
    let f = fixture(pool);
    let st = store(&f, "STJ").await;
    let schedule = f
        .schedules
        .create(&titled_visit("Maintenance Toko Melati", st.id, "tech7", &today()))
        .await
        .unwrap();

    let mut data = report(None, None, json!([]));
    data.store_name = Some("toko melati".to_string());
    let m = f.maintenances.create(&data, "tech8").await.unwrap();
    f.maintenances
        .update_status(m.id, MaintenanceStatus::Approved, Some("admin"))
        .await
        .unwrap();

    let done = f.schedules.get_by_id(schedule.id).await.unwrap();
    assert_eq!(done.status, ScheduleStatus::Completed);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_disabled_fallback_leaves_schedule_open(pool: PgPool) {
    let f = fixture_with(Repository::new(pool), Arc::new(DisabledScheduleMatcher));
    let st = store(&f, "STK").await;
    let schedule = f
        .schedules
        .create(&visit(st.id, "tech1", &today()))
        .await
        .unwrap();

    let m = f
        .maintenances
        .create(&report(None, Some(st.id), json!([])), "tech1")
        .await
        .unwrap();
    f.maintenances
        .update_status(m.id, MaintenanceStatus::Approved, Some("admin"))
        .await
        .unwrap();

    let open = f.schedules.get_by_id(schedule.id).await.unwrap();
    assert_eq!(open.status, ScheduleStatus::Scheduled);
    assert_eq!(open.completed_at, None);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_fix_request_approval_opens_window_only(pool: PgPool) {
    let f = fixture(pool);
    let st = store(&f, "STL").await;
    let schedule = f
        .schedules
        .create(&visit(st.id, "tech1", &today()))
        .await
        .unwrap();

    let mut data = report(None, Some(st.id), json!([]));
    data.details = Some(json!({ "type": "fix_request", "items": [] }));
    let m = f.maintenances.create(&data, "tech1").await.unwrap();

    let approved = f
        .maintenances
        .update_status(m.id, MaintenanceStatus::Approved, Some("admin"))
        .await
        .unwrap();
    match approved.details.kind {
        DetailsKind::FixRequest {
            approved_at: Some(approved_at),
            expires_at: Some(expires_at),
        } => assert_eq!(expires_at - approved_at, Duration::hours(1)),
        other => panic!("window not opened: {other:?}"),
    }

    let open = f.schedules.get_by_id(schedule.id).await.unwrap();
    assert_eq!(open.status, ScheduleStatus::Scheduled);
    assert_eq!(open.completed_at, None);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_asset_list_scoped_to_assigned_stores(pool: PgPool) {
    let f = fixture(pool);
    let mine = store_for(&f, "STM", "tech1").await;
    let other = store_for(&f, "STN", "tech2").await;
    asset(&f, "AST-MINE01", mine.id, Some(12)).await;
    asset(&f, "AST-OTHR01", other.id, Some(12)).await;

    let query = AssetQuery::default();
    assert_eq!(
        listed_codes(&f, &query, &claims("tech1", Role::Ts)).await,
        vec!["AST-MINE01"]
    );
    assert_eq!(
        listed_codes(&f, &query, &claims("TECH2", Role::User)).await,
        vec!["AST-OTHR01"]
    );
    assert_eq!(
        listed_codes(&f, &query, &claims("admin", Role::Admin)).await,
        vec!["AST-MINE01", "AST-OTHR01"]
    );

    // a technician without stores sees nothing, even when naming a store
    let named = AssetQuery {
        store_id: Some(mine.id),
        ..Default::default()
    };
    assert!(listed_codes(&f, &named, &claims("tech3", Role::Ts)).await.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_asset_list_age_filters(pool: PgPool) {
    let f = fixture(pool);
    let st = store(&f, "STO").await;
    asset(&f, "AST-YOUNG1", st.id, Some(6)).await;
    asset(&f, "AST-MIDDL1", st.id, Some(36)).await;
    asset(&f, "AST-OLD001", st.id, Some(60)).await;
    asset(&f, "AST-NOAGE1", st.id, None).await;
    let admin = claims("admin", Role::Admin);

    let old = AssetQuery {
        old_only: Some(true),
        ..Default::default()
    };
    assert_eq!(listed_codes(&f, &old, &admin).await, vec!["AST-OLD001"]);

    let range = AssetQuery {
        age_min: Some(12),
        age_max: Some(48),
        ..Default::default()
    };
    assert_eq!(listed_codes(&f, &range, &admin).await, vec!["AST-MIDDL1"]);

    let at_least = AssetQuery {
        age_min: Some(36),
        ..Default::default()
    };
    assert_eq!(
        listed_codes(&f, &at_least, &admin).await,
        vec!["AST-MIDDL1", "AST-OLD001"]
    );

    let entries = f.assets.list(&AssetQuery::default(), &admin).await.unwrap();
    let old_entry = entries
        .iter()
        .find(|e| e.asset.asset_code == "AST-OLD001")
        .unwrap();
    assert!(old_entry.is_old);
    assert_eq!(old_entry.age_months, Some(60));
    let unknown = entries
        .iter()
        .find(|e| e.asset.asset_code == "AST-NOAGE1")
        .unwrap();
    assert_eq!(unknown.age_months, None);
    assert!(!unknown.is_old);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_asset_list_attaches_latest_history(pool: PgPool) {
    let f = fixture(pool);
    let st = store(&f, "STP").await;
    let id = asset(&f, "AST-HIST01", st.id, None).await;
    asset(&f, "AST-BARE01", st.id, None).await;

    for (date, note) in [("2026-01-05", "Ganti kabel"), ("2026-03-10", "Ganti PSU")] {
        f.assets
            .add_history(
                id,
                &CreateAssetHistory {
                    date: Some(date.to_string()),
                    note: note.to_string(),
                    created_by: None,
                },
                "admin",
            )
            .await
            .unwrap();
    }

    let entries = f
        .assets
        .list(&AssetQuery::default(), &claims("admin", Role::Admin))
        .await
        .unwrap();
    let with_history = entries
        .iter()
        .find(|e| e.asset.asset_code == "AST-HIST01")
        .unwrap();
    assert_eq!(with_history.last_history_note.as_deref(), Some("Ganti PSU"));
    assert_eq!(
        with_history.last_history_date.map(calendar::ymd).as_deref(),
        Some("2026-03-10")
    );
    let bare = entries
        .iter()
        .find(|e| e.asset.asset_code == "AST-BARE01")
        .unwrap();
    assert_eq!(bare.last_history_note, None);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_asset_list_limit_is_clamped(pool: PgPool) {
    let f = fixture(pool);
    let st = store(&f, "STQ").await;
    for code in ["AST-LIM001", "AST-LIM002", "AST-LIM003"] {
        asset(&f, code, st.id, None).await;
    }
    let admin = claims("admin", Role::Admin);

    let zero = AssetQuery {
        limit: Some(0),
        ..Default::default()
    };
    assert_eq!(f.assets.list(&zero, &admin).await.unwrap().len(), 1);

    let huge = AssetQuery {
        limit: Some(1_000_000),
        ..Default::default()
    };
    assert_eq!(f.assets.list(&huge, &admin).await.unwrap().len(), 3);

    let two = AssetQuery {
        limit: Some(2),
        ..Default::default()
    };
    assert_eq!(f.assets.list(&two, &admin).await.unwrap().len(), 2);
}
