//! The capability contract every provider client implements.
//!
//! A client declares what its calls cost and which subjects it can score.
//! Everything stateful (cache, quota accounting) lives in the
//! [`QuotaManager`] it is bound to; the client only forwards.

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::error::QuotaError;
use crate::core::providers::Provider;
use crate::core::quota::{CostTable, ManagerConfig, QuotaManager, UsageSummary};
use crate::core::subject::SubjectType;

/// A client's handle on its manager. Unbound handles act as a cache that
/// always misses and a quota that is never exceeded.
pub struct ManagerBinding<R> {
    name: &'static str,
    manager: Option<QuotaManager<R>>,
}

impl<R> ManagerBinding<R>
where
    R: Clone + Serialize + DeserializeOwned,
{
    /// Open the manager for client `C`, failing fast on an invalid cost table.
    pub fn open<C>(provider: Provider, config: ManagerConfig) -> Result<Self, QuotaError>
    where
        C: ProviderClient<Record = R>,
    {
        let costs = C::declare_cost_table()?;
        Ok(Self {
            name: provider.display_name(),
            manager: Some(QuotaManager::open(config, costs)),
        })
    }

    pub fn unbound(provider: Provider) -> Self {
        warn!(
            "{}: no quota manager bound - caching and quota tracking disabled",
            provider.display_name()
        );
        Self {
            name: provider.display_name(),
            manager: None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.manager.is_some()
    }
}

pub trait ProviderClient {
    /// The closed result record stored per cache key.
    type Record: Clone + Serialize + DeserializeOwned;

    fn provider(&self) -> Provider;

    /// Cost per call type. Must declare at least one entry.
    fn declare_cost_table() -> Result<CostTable, QuotaError>
    where
        Self: Sized;

    /// Informational: whether the provider is usable this run.
    fn is_enabled(&self) -> bool;

    fn supported_subject_types(&self) -> &'static [SubjectType];

    fn binding(&self) -> &ManagerBinding<Self::Record>;

    fn binding_mut(&mut self) -> &mut ManagerBinding<Self::Record>;

    fn supports(&self, subject_type: SubjectType) -> bool {
        self.supported_subject_types().contains(&subject_type)
    }

    fn log_call(&mut self, description: &str, call_type: &str) {
        let binding = self.binding_mut();
        match binding.manager.as_mut() {
            Some(manager) => manager.record_call(description, call_type),
            None => info!("{}: {}", binding.name, description),
        }
    }

    /// True if the next `call_type` call would cross the stop threshold.
    fn check_quota(&self, call_type: &str) -> bool {
        self.binding()
            .manager
            .as_ref()
            .is_some_and(|manager| manager.would_exceed_limit(call_type))
    }

    /// [`check_quota`](Self::check_quota) as a `LimitReached` error.
    fn ensure_quota(&self, call_type: &str) -> Result<(), QuotaError> {
        if !self.check_quota(call_type) {
            return Ok(());
        }
        let usage = self
            .usage_summary()
            .map(|summary| summary.usage.describe())
            .unwrap_or_default();
        Err(QuotaError::LimitReached {
            provider: self.binding().name.to_string(),
            usage,
        })
    }

    fn is_cached(&self, key: &str) -> bool {
        self.binding()
            .manager
            .as_ref()
            .is_some_and(|manager| manager.is_cached(key))
    }

    fn cache_get(&self, key: &str) -> Option<Self::Record> {
        self.binding()
            .manager
            .as_ref()
            .and_then(|manager| manager.cache_get(key).cloned())
    }

    fn cache_set(&mut self, key: &str, value: Self::Record) {
        if let Some(manager) = self.binding_mut().manager.as_mut() {
            manager.cache_put(key, value);
        }
    }

    fn flush_cache(&self) -> bool {
        self.binding()
            .manager
            .as_ref()
            .is_some_and(|manager| manager.flush_cache())
    }

    fn usage_summary(&self) -> Option<UsageSummary> {
        self.binding().manager.as_ref().map(|manager| manager.usage_summary())
    }
}
