//! Per-provider cache and quota accounting.
//!
//! ```text
//! QuotaManager<V>
//!   ├── CacheStore<V>   key → result, flushed on demand
//!   └── QuotaLedger     daily units / hourly calls, persisted on every call
//! ```
//!
//! A provider runs under exactly one [`LimitPolicy`], fixed when its
//! manager is opened.

pub mod cache;
pub mod ledger;
pub mod manager;
pub mod policy;

pub use cache::CacheStore;
pub use ledger::{local_now, LedgerState, QuotaLedger, UsageSnapshot};
pub use manager::{ManagerConfig, QuotaManager, UsageSummary};
pub use policy::{CostTable, LimitPolicy, Thresholds, UsageStatus};
