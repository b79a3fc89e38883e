//! Reconciliation sweep: schedule reminders and auto-approval of stale reports

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use crate::{
    calendar,
    config::{ReminderConfig, TelegramConfig},
    error::AppResult,
    models::{maintenance::MaintenanceStatus, schedule::Schedule, user::User},
    repository::Repository,
    services::maintenances::MaintenancesService,
};

/// Inline link button attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub text: String,
    pub url: String,
}

impl Button {
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// Outbound message channel; `true` when the message was accepted
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str, buttons: &[Button]) -> bool;
}

/// Set-once keys guarding against duplicate sends.
///
/// Implementations fail open: when the store is unreachable `claim` returns `true`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn claim(&self, key: &str, ttl_secs: u64) -> bool;
    async fn release(&self, key: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    /// Day before the visit
    T1,
    /// Morning of the visit
    H0,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::T1 => "T1",
            ReminderKind::H0 => "H0",
        }
    }
}

/// Schedule data needed to phrase a reminder
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleNotice {
    pub id: i32,
    pub title: String,
    pub day: NaiveDate,
    pub store_id: Option<i32>,
    pub store_name: Option<String>,
    pub technician: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReminderAttempt {
    pub id: i32,
    pub ymd: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub can_send: bool,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct AutoApproveReport {
    pub count: usize,
}

/// Outcome of one sweep, returned by the debug hook
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub enabled: bool,
    pub has_group: bool,
    pub count: usize,
    pub attempts: Vec<ReminderAttempt>,
    pub auto_approve: AutoApproveReport,
}

/// Whether `now` lies within `tolerance_minutes` of `hour:00` on the same day
pub fn within_window(now: NaiveDateTime, hour: u32, tolerance_minutes: i64) -> bool {
    let Some(target) = now.date().and_hms_opt(hour, 0, 0) else {
        return false;
    };
    (now - target).num_seconds().abs() <= tolerance_minutes * 60
}

pub fn dedup_key(kind: ReminderKind, schedule_id: i32, day: NaiveDate) -> String {
    format!("tg:sent:{}:{}:{}", kind.as_str(), schedule_id, calendar::ymd(day))
}

/// Minimal escaping for Telegram HTML parse mode
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn reminder_text(kind: ReminderKind, notice: &ScheduleNotice) -> String {
    let ymd = calendar::ymd(notice.day);
    let title = escape_html(&notice.title);
    let mut text = match kind {
        ReminderKind::T1 => format!("⏰ <b>Pengingat</b>\nBesok ({}) ada jadwal: <b>{}</b>", ymd, title),
        ReminderKind::H0 => format!("✅ <b>Jadwal Hari Ini</b>\n{}\n<b>{}</b>", ymd, title),
    };
    if let Some(ref store) = notice.store_name {
        text.push_str(&format!("\nStore: <b>{}</b>", escape_html(store)));
    }
    if let Some(ref ts) = notice.technician {
        text.push_str(&format!("\nTS: <b>{}</b>", escape_html(ts)));
    }
    text
}

pub fn reminder_buttons(kind: ReminderKind, notice: &ScheduleNotice, app_base: &str) -> Vec<Button> {
    let schedule_page = Button::new("Lihat Jadwal", format!("{}/user/jadwal", app_base));
    match kind {
        ReminderKind::T1 => vec![schedule_page],
        ReminderKind::H0 => {
            let form = format!(
                "{}/maintenance-form.html?mode=user&scheduleId={}&storeId={}&date={}",
                app_base,
                notice.id,
                notice.store_id.map(|id| id.to_string()).unwrap_or_default(),
                calendar::ymd(notice.day)
            );
            vec![Button::new("Mulai Maintenance", form), schedule_page]
        }
    }
}

/// Sends reminders through a notifier, at most once per schedule, day and kind
pub struct ReminderDispatcher {
    notifier: Arc<dyn Notifier>,
    dedup: Arc<dyn DedupStore>,
    chat_id: String,
    app_base: String,
    config: ReminderConfig,
}

impl ReminderDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        dedup: Arc<dyn DedupStore>,
        telegram: &TelegramConfig,
        config: ReminderConfig,
    ) -> Self {
        Self {
            notifier,
            dedup,
            chat_id: telegram.group_chat_id.clone(),
            app_base: telegram.app_public_base.trim_end_matches('/').to_string(),
            config,
        }
    }

    /// Reminder kinds due for a schedule on `day` at `now`
    fn due(&self, day: NaiveDate, now: NaiveDateTime, force: bool) -> Vec<ReminderKind> {
        let today = now.date();
        let tolerance = self.config.tolerance_minutes;
        let mut due = Vec::new();
        if day == today + Duration::days(1)
            && (force || within_window(now, self.config.t1_hour, tolerance))
        {
            due.push(ReminderKind::T1);
        }
        if day == today && (force || within_window(now, self.config.h0_hour, tolerance)) {
            due.push(ReminderKind::H0);
        }
        due
    }

    pub async fn dispatch(
        &self,
        notice: &ScheduleNotice,
        now: NaiveDateTime,
        force: bool,
    ) -> Vec<ReminderAttempt> {
        let mut attempts = Vec::new();
        for kind in self.due(notice.day, now, force) {
            let key = dedup_key(kind, notice.id, notice.day);
            let can_send = self.dedup.claim(&key, self.config.dedup_ttl_secs).await;

            let sent = if can_send {
                let text = reminder_text(kind, notice);
                let buttons = reminder_buttons(kind, notice, &self.app_base);
                let ok = self.notifier.send(&self.chat_id, &text, &buttons).await;
                if !ok {
                    tracing::warn!("{} reminder for schedule {} not delivered", kind.as_str(), notice.id);
                    self.dedup.release(&key).await;
                }
                Some(ok)
            } else {
                None
            };

            attempts.push(ReminderAttempt {
                id: notice.id,
                ymd: calendar::ymd(notice.day),
                kind: kind.as_str().to_string(),
                can_send,
                key,
                sent,
            });
        }
        attempts
    }

    /// Free-form message to the group, with an optional link to the app
    pub async fn send_test(&self, message: &str, with_button: bool) -> bool {
        let buttons = if with_button {
            vec![Button::new("Open App", format!("{}/user/jadwal", self.app_base))]
        } else {
            Vec::new()
        };
        self.notifier.send(&self.chat_id, message, &buttons).await
    }
}

#[derive(Clone)]
pub struct ReminderService {
    repository: Repository,
    maintenances: MaintenancesService,
    dispatcher: Option<Arc<ReminderDispatcher>>,
    config: ReminderConfig,
    telegram_enabled: bool,
    has_group: bool,
}

impl ReminderService {
    /// `dispatcher` is `None` when no notification channel is configured
    pub fn new(
        repository: Repository,
        maintenances: MaintenancesService,
        dispatcher: Option<ReminderDispatcher>,
        config: ReminderConfig,
        telegram: &TelegramConfig,
    ) -> Self {
        Self {
            repository,
            maintenances,
            dispatcher: dispatcher.map(Arc::new),
            config,
            telegram_enabled: !telegram.bot_token.is_empty(),
            has_group: !telegram.group_chat_id.is_empty(),
        }
    }

    /// Run both passes once; failures are logged, never returned
    pub async fn tick(&self, force: bool) -> TickReport {
        let mut report = TickReport {
            enabled: self.telegram_enabled,
            has_group: self.has_group,
            ..Default::default()
        };

        if let Some(ref dispatcher) = self.dispatcher {
            if let Err(e) = self.notification_pass(dispatcher, force, &mut report).await {
                tracing::warn!("Reminder notification pass failed: {}", e);
            }
        }

        if let Err(e) = self.auto_approve_pass(&mut report).await {
            tracing::warn!("Auto-approve pass failed: {}", e);
        }

        report
    }

    async fn notification_pass(
        &self,
        dispatcher: &ReminderDispatcher,
        force: bool,
        report: &mut TickReport,
    ) -> AppResult<()> {
        let now = calendar::now_local();
        let today = now.date();
        let from = calendar::day_start(today - Duration::days(1));
        let to = calendar::day_start(today + Duration::days(2));

        let schedules = self.repository.schedules.active_between(from, to).await?;
        report.count = schedules.len();
        if schedules.is_empty() {
            return Ok(());
        }

        let notices = self.notices_for(schedules).await?;
        for notice in &notices {
            let attempts = dispatcher.dispatch(notice, now, force).await;
            report.attempts.extend(attempts);
        }
        Ok(())
    }

    /// Attach store names and technician labels, one lookup per distinct value
    async fn notices_for(&self, schedules: Vec<Schedule>) -> AppResult<Vec<ScheduleNotice>> {
        let mut usernames: Vec<String> = schedules
            .iter()
            .filter_map(|s| s.assigned_ts.clone())
            .collect();
        usernames.sort();
        usernames.dedup();
        let users: HashMap<String, User> = self
            .repository
            .users
            .find_by_usernames(&usernames)
            .await?
            .into_iter()
            .map(|u| (u.username.clone(), u))
            .collect();

        let mut store_names: HashMap<i32, Option<String>> = HashMap::new();
        let mut notices = Vec::with_capacity(schedules.len());
        for s in schedules {
            let store_name = match s.store_id {
                Some(id) => {
                    if !store_names.contains_key(&id) {
                        let name = self.repository.stores.find_by_id(id).await?.map(|st| st.name);
                        store_names.insert(id, name);
                    }
                    store_names.get(&id).cloned().flatten()
                }
                None => None,
            };
            let technician = s.assigned_ts.as_ref().map(|ts| match users.get(ts) {
                Some(user) => user.display_label(),
                None => ts.clone(),
            });
            let title = if s.title.trim().is_empty() {
                "Maintenance".to_string()
            } else {
                s.title
            };

            notices.push(ScheduleNotice {
                id: s.id,
                title,
                day: s.start.date(),
                store_id: s.store_id,
                store_name,
                technician,
            });
        }
        Ok(notices)
    }

    /// Approve every report left in `submitted` longer than the configured delay
    async fn auto_approve_pass(&self, report: &mut TickReport) -> AppResult<()> {
        let cutoff = Utc::now() - Duration::minutes(self.config.auto_approve_minutes);
        let pending = self.repository.maintenances.submitted_before(cutoff).await?;

        for m in pending {
            match self
                .maintenances
                .update_status(m.id, MaintenanceStatus::Approved, Some("auto"))
                .await
            {
                Ok(_) => report.auto_approve.count += 1,
                Err(e) => tracing::warn!("Auto-approve failed for maintenance {}: {}", m.id, e),
            }
        }
        Ok(())
    }

    /// Test message; `None` when notifications are not configured
    pub async fn send_test(&self, message: &str, with_button: bool) -> Option<bool> {
        match self.dispatcher {
            Some(ref dispatcher) => Some(dispatcher.send_test(message, with_button).await),
            None => None,
        }
    }

    /// Start the periodic sweep
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            tracing::info!("Reminder sweep disabled");
            return None;
        }
        if self.dispatcher.is_none() {
            tracing::info!("Telegram not configured, sweep runs auto-approval only");
        }

        let startup_delay = StdDuration::from_secs(self.config.startup_delay_secs);
        let period = StdDuration::from_secs(self.config.interval_secs.max(1));
        Some(tokio::spawn(async move {
            tokio::time::sleep(startup_delay).await;
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let report = self.tick(false).await;
                tracing::debug!(
                    "Reminder sweep: {} schedules, {} attempts, {} auto-approved",
                    report.count,
                    report.attempts.len(),
                    report.auto_approve.count
                );
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn notice(day: NaiveDate) -> ScheduleNotice {
        ScheduleNotice {
            id: 42,
            title: "Maintenance ST1".into(),
            day,
            store_id: Some(3),
            store_name: Some("Store One".into()),
            technician: Some("Budi (@tech1)".into()),
        }
    }

    fn telegram() -> TelegramConfig {
        TelegramConfig {
            bot_token: "token".into(),
            group_chat_id: "-100".into(),
            api_base: "https://api.telegram.org".into(),
            app_public_base: "http://app.local/".into(),
        }
    }

    fn dispatcher(notifier: MockNotifier, dedup: MockDedupStore) -> ReminderDispatcher {
        ReminderDispatcher::new(
            Arc::new(notifier),
            Arc::new(dedup),
            &telegram(),
            ReminderConfig::default(),
        )
    }

    #[test]
    fn test_within_window() {
        assert!(within_window(at(2026, 5, 4, 17, 0), 17, 15));
        assert!(within_window(at(2026, 5, 4, 16, 45), 17, 15));
        assert!(within_window(at(2026, 5, 4, 17, 15), 17, 15));
        assert!(!within_window(at(2026, 5, 4, 17, 16), 17, 15));
        assert!(!within_window(at(2026, 5, 4, 9, 0), 17, 15));
    }

    #[test]
    fn test_texts_and_buttons() {
        let n = notice(NaiveDate::from_ymd_opt(2026, 5, 5).unwrap());
        let t1 = reminder_text(ReminderKind::T1, &n);
        assert_eq!(
            t1,
            "⏰ <b>Pengingat</b>\nBesok (2026-05-05) ada jadwal: <b>Maintenance ST1</b>\nStore: <b>Store One</b>\nTS: <b>Budi (@tech1)</b>"
        );

        let h0 = reminder_buttons(ReminderKind::H0, &n, "http://app.local");
        assert_eq!(h0.len(), 2);
        assert_eq!(
            h0[0].url,
            "http://app.local/maintenance-form.html?mode=user&scheduleId=42&storeId=3&date=2026-05-05"
        );
        assert_eq!(h0[1].url, "http://app.local/user/jadwal");
        assert_eq!(reminder_buttons(ReminderKind::T1, &n, "http://app.local").len(), 1);
    }

    #[test]
    fn test_text_is_escaped() {
        let mut n = notice(NaiveDate::from_ymd_opt(2026, 5, 5).unwrap());
        n.title = "PC <kasir> & printer".into();
        n.store_name = None;
        n.technician = None;
        assert_eq!(
            reminder_text(ReminderKind::H0, &n),
            "✅ <b>Jadwal Hari Ini</b>\n2026-05-05\n<b>PC &lt;kasir&gt; &amp; printer</b>"
        );
    }

    #[tokio::test]
    async fn test_t1_sent_once_in_window() {
        let mut dedup = MockDedupStore::new();
        dedup
            .expect_claim()
            .with(eq("tg:sent:T1:42:2026-05-05"), eq(7 * 24 * 3600u64))
            .times(1)
            .returning(|_, _| true);
        dedup.expect_release().never();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|chat, text, buttons| {
                chat.to_string() == "-100" && text.contains("Besok (2026-05-05)") && buttons.len() == 1
            })
            .times(1)
            .returning(|_, _, _| true);

        let d = dispatcher(notifier, dedup);
        let attempts = d
            .dispatch(&notice(NaiveDate::from_ymd_opt(2026, 5, 5).unwrap()), at(2026, 5, 4, 17, 5), false)
            .await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].kind, "T1");
        assert_eq!(attempts[0].sent, Some(true));
    }

    #[tokio::test]
    async fn test_outside_window_nothing_due() {
        let mut dedup = MockDedupStore::new();
        dedup.expect_claim().never();
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();

        let d = dispatcher(notifier, dedup);
        let attempts = d
            .dispatch(&notice(NaiveDate::from_ymd_opt(2026, 5, 5).unwrap()), at(2026, 5, 4, 12, 0), false)
            .await;
        assert!(attempts.is_empty());
    }

    #[tokio::test]
    async fn test_claimed_key_skips_send() {
        let mut dedup = MockDedupStore::new();
        dedup.expect_claim().returning(|_, _| false);
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();

        let d = dispatcher(notifier, dedup);
        let attempts = d
            .dispatch(&notice(NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()), at(2026, 5, 4, 9, 0), false)
            .await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].kind, "H0");
        assert!(!attempts[0].can_send);
        assert_eq!(attempts[0].sent, None);
    }

    #[tokio::test]
    async fn test_failed_send_releases_key() {
        let mut dedup = MockDedupStore::new();
        dedup.expect_claim().returning(|_, _| true);
        dedup
            .expect_release()
            .with(eq("tg:sent:H0:42:2026-05-04"))
            .times(1)
            .returning(|_| ());
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|_, _, buttons| buttons.len() == 2 && buttons[0].text == "Mulai Maintenance")
            .returning(|_, _, _| false);

        let d = dispatcher(notifier, dedup);
        let attempts = d
            .dispatch(&notice(NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()), at(2026, 5, 4, 20, 0), true)
            .await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].sent, Some(false));
    }

    #[tokio::test]
    async fn test_force_ignores_hours_but_not_dedup() {
        let mut dedup = MockDedupStore::new();
        dedup.expect_claim().times(1).returning(|_, _| false);
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();

        let d = dispatcher(notifier, dedup);
        let attempts = d
            .dispatch(&notice(NaiveDate::from_ymd_opt(2026, 5, 5).unwrap()), at(2026, 5, 4, 3, 0), true)
            .await;
        assert_eq!(attempts.len(), 1);
        assert!(!attempts[0].can_send);
    }

    #[tokio::test]
    async fn test_past_days_never_due() {
        let mut dedup = MockDedupStore::new();
        dedup.expect_claim().never();
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();

        let d = dispatcher(notifier, dedup);
        let attempts = d
            .dispatch(&notice(NaiveDate::from_ymd_opt(2026, 5, 3).unwrap()), at(2026, 5, 4, 9, 0), true)
            .await;
        assert!(attempts.is_empty());
    }

    #[tokio::test]
    async fn test_send_test_button() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|_, text, buttons| {
                text.to_string() == "Hello" && buttons.len() == 1 && buttons[0].url == "http://app.local/user/jadwal"
            })
            .returning(|_, _, _| true);
        let d = dispatcher(notifier, MockDedupStore::new());
        assert!(d.send_test("Hello", true).await);
    }
}
