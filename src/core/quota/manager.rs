use chrono::NaiveDateTime;
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::cache::CacheStore;
use super::ledger::{local_now, QuotaLedger, UsageSnapshot};
use super::policy::{CostTable, LimitPolicy, Thresholds, CRITICAL_PERCENT, WARNING_PERCENT};

/// Static settings binding one provider to its durable files.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    pub provider_name: String,
    pub policy: LimitPolicy,
    pub thresholds: Thresholds,
    pub cache_path: PathBuf,
    pub ledger_path: PathBuf,
}

impl ManagerConfig {
    /// Standard file layout: `{dir}/{id}_cache.json` and `{dir}/{id}_quota.json`.
    pub fn in_dir(
        dir: &Path,
        provider_id: &str,
        provider_name: &str,
        policy: LimitPolicy,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            policy,
            thresholds,
            cache_path: dir.join(format!("{}_cache.json", provider_id)),
            ledger_path: dir.join(format!("{}_quota.json", provider_id)),
        }
    }
}

/// Per-provider report for the end-of-run breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub provider: String,
    pub total_calls_lifetime: u64,
    pub cached_entries: usize,
    pub usage: UsageSnapshot,
}

/// Cache and quota accountant for one provider.
///
/// Purely advisory: nothing here refuses a call. Clients consult
/// [`would_exceed_limit`](Self::would_exceed_limit) and decide for themselves.
pub struct QuotaManager<V> {
    name: String,
    cache: CacheStore<V>,
    ledger: QuotaLedger,
    costs: CostTable,
    clock: fn() -> NaiveDateTime,
}

impl<V> QuotaManager<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    pub fn open(config: ManagerConfig, costs: CostTable) -> Self {
        Self::open_with_clock(config, costs, local_now)
    }

    pub fn open_with_clock(
        config: ManagerConfig,
        costs: CostTable,
        clock: fn() -> NaiveDateTime,
    ) -> Self {
        let name = config.provider_name;
        let cache = CacheStore::load(config.cache_path, &name);
        let ledger = QuotaLedger::load(
            config.ledger_path,
            &name,
            config.policy,
            config.thresholds,
            clock(),
        );
        info!(
            "{}: {} cached entries loaded from {}",
            name,
            cache.len(),
            cache.path().display()
        );
        info!("{}: limit set to {}", name, config.policy.describe());
        Self {
            name,
            cache,
            ledger,
            costs,
            clock,
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.name
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.cache.contains(key)
    }

    pub fn cache_get(&self, key: &str) -> Option<&V> {
        self.cache.get(key)
    }

    pub fn cache_put(&mut self, key: impl Into<String>, value: V) {
        self.cache.put(key, value);
    }

    pub fn flush_cache(&self) -> bool {
        self.cache.flush(&self.name)
    }

    pub fn cost_of(&self, call_type: &str) -> u64 {
        self.costs.cost_of(call_type)
    }

    pub fn would_exceed_limit(&self, call_type: &str) -> bool {
        let cost = self.costs.cost_of(call_type);
        let now = (self.clock)();
        let exceeded = self.ledger.would_exceed(cost, now);
        if exceeded {
            error!(
                "{}: stop threshold reached before '{}' call ({})",
                self.name,
                call_type,
                self.ledger.usage_snapshot(now).describe()
            );
        } else if self.ledger.past_warning(now) {
            warn!(
                "{}: high usage ({})",
                self.name,
                self.ledger.usage_snapshot(now).describe()
            );
        }
        exceeded
    }

    /// Account for a completed call. Must follow the network call, never precede it.
    pub fn record_call(&mut self, description: &str, call_type: &str) {
        let cost = self.costs.cost_of(call_type);
        let now = (self.clock)();
        self.ledger.record(cost, now);

        let state = self.ledger.state();
        match self.ledger.policy() {
            LimitPolicy::QuotaLimited { daily_quota_limit } => {
                let snapshot = self.ledger.usage_snapshot(now);
                let percent = snapshot.usage_percent();
                let line = format!(
                    "{} [{}] {}: {}/{} units ({:.1}%)",
                    self.name, call_type, description, state.daily_units_used, daily_quota_limit, percent
                );
                if percent >= CRITICAL_PERCENT {
                    error!("{}", line);
                } else if percent >= WARNING_PERCENT {
                    warn!("{}", line);
                } else {
                    info!("{}", line);
                }
            }
            LimitPolicy::RateLimited { hourly_call_limit } => {
                let line = format!(
                    "{} call #{} this hour (limit {}): {}",
                    self.name, state.hourly_calls, hourly_call_limit, description
                );
                if self.ledger.past_warning(now) {
                    warn!("{}", line);
                } else {
                    info!("{}", line);
                }
            }
        }
    }

    /// Usage as of the manager's clock, so a period that ended mid-run reads as reset.
    pub fn usage_summary(&self) -> UsageSummary {
        UsageSummary {
            provider: self.name.clone(),
            total_calls_lifetime: self.ledger.state().total_calls_lifetime,
            cached_entries: self.cache.len(),
            usage: self.ledger.usage_snapshot((self.clock)()),
        }
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}
