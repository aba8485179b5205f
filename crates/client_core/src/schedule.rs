use std::{fmt, future::Future, str::FromStr, time::Duration};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, NaiveTime, TimeZone};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::backend::MatchingApi;

/// A fixed wall-clock time of day.
/// Defaults to midnight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    pub fn new(at: NaiveTime) -> Self {
        Self { at }
    }

    /// Accepts `HH:MM` or `HH:MM:SS`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map(Self::new)
            .map_err(|err| anyhow!("invalid time of day '{raw}': {err}"))
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    /// First occurrence strictly after `now`, in `now`'s time zone. A day on
    /// which the local time does not exist (DST gap) is skipped.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        let mut date = now.date_naive();
        for _ in 0..4 {
            if let Some(candidate) = tz.from_local_datetime(&date.and_time(self.at)).earliest() {
                if candidate > *now {
                    return candidate;
                }
            }
            let Some(next) = date.succ_opt() else {
                break;
            };
            date = next;
        }
        now.clone() + chrono::Duration::days(1)
    }
}

impl FromStr for DailySchedule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.at.format("%H:%M:%S"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    Completed(Value),
    Failed(String),
}

/// Calls the matching endpoint once a day. A failed run is logged and
/// dropped; the next attempt is the next scheduled tick.
pub struct MatchingTrigger<A> {
    api: A,
    schedule: DailySchedule,
}

impl<A: MatchingApi> MatchingTrigger<A> {
    pub fn new(api: A, schedule: DailySchedule) -> Self {
        Self { api, schedule }
    }

    pub fn schedule(&self) -> DailySchedule {
        self.schedule
    }

    pub async fn fire_once(&self) -> TriggerOutcome {
        info!("triggering matching run");
        match self.api.run_matching().await {
            Ok(body) => {
                info!(result = %body, "matching run completed");
                TriggerOutcome::Completed(body)
            }
            Err(err) => {
                let message = format!("{err:#}");
                error!(error = %message, "matching run failed; waiting for next tick");
                TriggerOutcome::Failed(message)
            }
        }
    }

    /// Fires at every scheduled tick until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let now = Local::now();
            let next = self.schedule.next_after(&now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next, wait_secs = wait.as_secs(), "next matching run scheduled");

            let due = tokio::select! {
                _ = &mut shutdown => false,
                _ = tokio::time::sleep(wait) => true,
            };
            if !due {
                info!("matching trigger shutting down");
                return;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    warn!("matching trigger shutting down with a run still in flight");
                    return;
                }
                _ = self.fire_once() => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/schedule_tests.rs"]
mod tests;
