use super::*;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{FixedOffset, NaiveTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::{net::TcpListener, sync::Notify};

use crate::HttpAdminApi;

struct FakeMatching {
    calls: AtomicUsize,
    fail: bool,
    fired: Notify,
}

impl FakeMatching {
    fn new(fail: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail,
            fired: Notify::new(),
        }
    }
}

#[async_trait]
impl MatchingApi for FakeMatching {
    async fn run_matching(&self) -> Result<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.fired.notify_one();
        if self.fail {
            return Err(anyhow!("backend unavailable"));
        }
        Ok(serde_json::json!({ "run": call }))
    }
}

/// Accepts the call and never answers.
struct HungMatching {
    entered: Notify,
}

#[async_trait]
impl MatchingApi for HungMatching {
    async fn run_matching(&self) -> Result<Value> {
        self.entered.notify_one();
        std::future::pending::<Result<Value>>().await
    }
}

fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("offset")
}

#[test]
fn parses_hour_minute_and_seconds() {
    assert_eq!(
        DailySchedule::parse("09:30").expect("parse").at(),
        NaiveTime::from_hms_opt(9, 30, 0).expect("time")
    );
    assert_eq!(
        "23:59:59".parse::<DailySchedule>().expect("parse").at(),
        NaiveTime::from_hms_opt(23, 59, 59).expect("time")
    );
    assert!(DailySchedule::parse("25:00").is_err());
    assert_eq!(DailySchedule::default().to_string(), "00:00:00");
}

#[test]
fn next_run_is_later_today_when_time_is_ahead() {
    let schedule = DailySchedule::parse("09:00").expect("parse");
    let now = kst()
        .with_ymd_and_hms(2026, 3, 14, 8, 15, 0)
        .single()
        .expect("now");
    let next = schedule.next_after(&now);
    assert_eq!(
        next,
        kst().with_ymd_and_hms(2026, 3, 14, 9, 0, 0).single().expect("next")
    );
}

#[test]
fn next_run_rolls_to_tomorrow_once_time_has_passed() {
    let schedule = DailySchedule::parse("09:00").expect("parse");
    let exactly = kst()
        .with_ymd_and_hms(2026, 12, 31, 9, 0, 0)
        .single()
        .expect("now");
    assert_eq!(
        schedule.next_after(&exactly),
        kst().with_ymd_and_hms(2027, 1, 1, 9, 0, 0).single().expect("next")
    );
}

#[test]
fn next_run_uses_the_callers_time_zone() {
    let schedule = DailySchedule::default();
    let now = Utc
        .with_ymd_and_hms(2026, 5, 1, 23, 30, 0)
        .single()
        .expect("now");
    let next = schedule.next_after(&now);
    assert_eq!(
        next,
        Utc.with_ymd_and_hms(2026, 5, 2, 0, 0, 0).single().expect("next")
    );
}

#[tokio::test]
async fn fire_once_reports_completed_body() {
    let trigger = MatchingTrigger::new(FakeMatching::new(false), DailySchedule::default());
    assert_eq!(
        trigger.fire_once().await,
        TriggerOutcome::Completed(serde_json::json!({ "run": 1 }))
    );
}

#[tokio::test]
async fn failed_run_is_reported_without_retry() {
    let trigger = MatchingTrigger::new(FakeMatching::new(true), DailySchedule::default());
    let outcome = trigger.fire_once().await;
    assert_eq!(
        outcome,
        TriggerOutcome::Failed("backend unavailable".to_string())
    );
    assert_eq!(trigger.api.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn run_stops_immediately_when_shutdown_is_ready() {
    let trigger = MatchingTrigger::new(FakeMatching::new(false), DailySchedule::default());
    trigger.run(async {}).await;
    assert_eq!(trigger.api.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn run_fires_when_the_scheduled_time_arrives() {
    let trigger = MatchingTrigger::new(FakeMatching::new(false), DailySchedule::default());
    trigger.run(trigger.api.fired.notified()).await;
    assert_eq!(trigger.api.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_a_run_that_never_returns() {
    let trigger = MatchingTrigger::new(
        HungMatching {
            entered: Notify::new(),
        },
        DailySchedule::default(),
    );
    trigger.run(trigger.api.entered.notified()).await;
}

#[tokio::test]
async fn silent_backend_fails_the_run_instead_of_stalling_the_trigger() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let timeout = Duration::from_millis(200);
    let api = HttpAdminApi::new(format!("http://{addr}"), timeout).expect("api");
    let trigger = MatchingTrigger::new(api, DailySchedule::default());
    let outcome = tokio::time::timeout(Duration::from_secs(5), trigger.fire_once())
        .await
        .expect("run should end once the request times out");
    match outcome {
        TriggerOutcome::Failed(message) => assert!(!message.is_empty()),
        other => panic!("expected a failed run, got {other:?}"),
    }
}
