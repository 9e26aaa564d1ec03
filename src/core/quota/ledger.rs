use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::cache::write_atomic;
use super::policy::{LimitPolicy, Thresholds, UsageStatus};

/// Machine-local wall clock. Ledger boundaries follow local days and hours.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Zero the minutes, seconds and sub-seconds.
pub fn truncate_to_hour(at: NaiveDateTime) -> NaiveDateTime {
    at.date().and_time(NaiveTime::MIN) + chrono::Duration::hours(i64::from(at.hour()))
}

/// Durable consumption counters for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub daily_units_used: u64,
    pub daily_reset_date: NaiveDate,
    pub hourly_calls: u64,
    pub hourly_reset_boundary: NaiveDateTime,
    pub total_calls_lifetime: u64,
}

impl LedgerState {
    pub fn fresh(now: NaiveDateTime) -> Self {
        Self {
            daily_units_used: 0,
            daily_reset_date: now.date(),
            hourly_calls: 0,
            hourly_reset_boundary: truncate_to_hour(now),
            total_calls_lifetime: 0,
        }
    }
}

/// Read-only view of current consumption, shaped by the limiting regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum UsageSnapshot {
    Quota {
        units_used: u64,
        daily_quota_limit: u64,
        usage_percent: f64,
        status: UsageStatus,
        reset_date: NaiveDate,
    },
    Rate {
        calls_this_hour: u64,
        hourly_call_limit: u64,
        usage_percent: f64,
        status: UsageStatus,
        hour_started: NaiveDateTime,
    },
}

impl UsageSnapshot {
    pub fn usage_percent(&self) -> f64 {
        match self {
            Self::Quota { usage_percent, .. } | Self::Rate { usage_percent, .. } => *usage_percent,
        }
    }

    pub fn status(&self) -> UsageStatus {
        match self {
            Self::Quota { status, .. } | Self::Rate { status, .. } => *status,
        }
    }

    /// Short "used/limit" description, e.g. "9500/10000 units".
    pub fn describe(&self) -> String {
        match self {
            Self::Quota {
                units_used,
                daily_quota_limit,
                ..
            } => format!("{}/{} units today", units_used, daily_quota_limit),
            Self::Rate {
                calls_this_hour,
                hourly_call_limit,
                ..
            } => format!("{}/{} calls this hour", calls_this_hour, hourly_call_limit),
        }
    }
}

fn percent_of(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 100.0;
    }
    used as f64 / limit as f64 * 100.0
}

/// Consumption ledger for one provider, persisted after every mutation.
#[derive(Debug, Clone)]
pub struct QuotaLedger {
    path: PathBuf,
    provider: String,
    policy: LimitPolicy,
    thresholds: Thresholds,
    state: LedgerState,
}

impl QuotaLedger {
    /// Load from disk (default state if missing or corrupt), then reconcile resets against `now`.
    pub fn load(
        path: impl Into<PathBuf>,
        provider: &str,
        policy: LimitPolicy,
        thresholds: Thresholds,
        now: NaiveDateTime,
    ) -> Self {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<LedgerState>(&content) {
                Ok(state) => state,
                Err(e) => {
                    warn!(
                        "{}: corrupt quota ledger {}, starting fresh: {}",
                        provider,
                        path.display(),
                        e
                    );
                    LedgerState::fresh(now)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{}: no quota ledger at {}", provider, path.display());
                LedgerState::fresh(now)
            }
            Err(e) => {
                warn!(
                    "{}: could not read quota ledger {}, starting fresh: {}",
                    provider,
                    path.display(),
                    e
                );
                LedgerState::fresh(now)
            }
        };

        let mut ledger = Self {
            path,
            provider: provider.to_string(),
            policy,
            thresholds,
            state,
        };
        ledger.reconcile(now);
        ledger
    }

    /// Zero the daily and hourly counters if their period has elapsed.
    /// Returns true if anything was reset.
    pub fn reconcile(&mut self, now: NaiveDateTime) -> bool {
        let mut reset = false;

        let today = now.date();
        if today > self.state.daily_reset_date {
            info!(
                "{}: new day, resetting daily usage ({} units on {})",
                self.provider, self.state.daily_units_used, self.state.daily_reset_date
            );
            self.state.daily_units_used = 0;
            self.state.daily_reset_date = today;
            reset = true;
        }

        let this_hour = truncate_to_hour(now);
        if this_hour > truncate_to_hour(self.state.hourly_reset_boundary) {
            debug!(
                "{}: new hour, resetting hourly calls ({} since {})",
                self.provider, self.state.hourly_calls, self.state.hourly_reset_boundary
            );
            self.state.hourly_calls = 0;
            self.state.hourly_reset_boundary = this_hour;
            reset = true;
        }

        if reset {
            self.persist();
        }
        reset
    }

    /// Account for one completed call costing `cost` units.
    pub fn record(&mut self, cost: u64, now: NaiveDateTime) {
        self.reconcile(now);
        self.state.daily_units_used += cost;
        self.state.hourly_calls += 1;
        self.state.total_calls_lifetime += 1;
        self.persist();
    }

    /// Whether a call costing `upcoming_cost` would cross the stop threshold.
    /// Periods that have elapsed by `now` count as already reset.
    pub fn would_exceed(&self, upcoming_cost: u64, now: NaiveDateTime) -> bool {
        match self.policy {
            LimitPolicy::QuotaLimited { daily_quota_limit } => {
                let used = self.daily_units_at(now);
                (used + upcoming_cost) as f64 > daily_quota_limit as f64 * self.thresholds.stop
            }
            LimitPolicy::RateLimited { hourly_call_limit } => {
                let calls = self.hourly_calls_at(now);
                calls as f64 >= hourly_call_limit as f64 * self.thresholds.stop
            }
        }
    }

    /// Whether current consumption has passed the warning threshold.
    pub fn past_warning(&self, now: NaiveDateTime) -> bool {
        match self.policy {
            LimitPolicy::QuotaLimited { daily_quota_limit } => {
                self.daily_units_at(now) as f64 >= daily_quota_limit as f64 * self.thresholds.warning
            }
            LimitPolicy::RateLimited { hourly_call_limit } => {
                self.hourly_calls_at(now) as f64 >= hourly_call_limit as f64 * self.thresholds.warning
            }
        }
    }

    /// Consumption as of `now`. Periods that have elapsed read as already reset.
    pub fn usage_snapshot(&self, now: NaiveDateTime) -> UsageSnapshot {
        match self.policy {
            LimitPolicy::QuotaLimited { daily_quota_limit } => {
                let units_used = self.daily_units_at(now);
                let usage_percent = percent_of(units_used, daily_quota_limit);
                UsageSnapshot::Quota {
                    units_used,
                    daily_quota_limit,
                    usage_percent,
                    status: UsageStatus::for_quota(usage_percent),
                    reset_date: self.state.daily_reset_date.max(now.date()),
                }
            }
            LimitPolicy::RateLimited { hourly_call_limit } => {
                let calls_this_hour = self.hourly_calls_at(now);
                let usage_percent = percent_of(calls_this_hour, hourly_call_limit);
                UsageSnapshot::Rate {
                    calls_this_hour,
                    hourly_call_limit,
                    usage_percent,
                    status: UsageStatus::for_rate(usage_percent),
                    hour_started: truncate_to_hour(self.state.hourly_reset_boundary)
                        .max(truncate_to_hour(now)),
                }
            }
        }
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn policy(&self) -> LimitPolicy {
        self.policy
    }

    fn daily_units_at(&self, now: NaiveDateTime) -> u64 {
        if now.date() > self.state.daily_reset_date {
            0
        } else {
            self.state.daily_units_used
        }
    }

    fn hourly_calls_at(&self, now: NaiveDateTime) -> u64 {
        if truncate_to_hour(now) > truncate_to_hour(self.state.hourly_reset_boundary) {
            0
        } else {
            self.state.hourly_calls
        }
    }

    /// Counters in memory stay authoritative when the write fails.
    fn persist(&self) {
        let result = serde_json::to_string_pretty(&self.state)
            .map_err(anyhow::Error::from)
            .and_then(|json| write_atomic(&self.path, json.as_bytes()));
        if let Err(e) = result {
            warn!(
                "{}: could not persist quota ledger {}: {:#}",
                self.provider,
                self.path.display(),
                e
            );
        }
    }
}
