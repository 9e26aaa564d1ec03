use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::error::QuotaError;

/// Percentage of a limit at which usage is flagged.
pub const WARNING_PERCENT: f64 = 80.0;
/// Percentage of a daily quota at which usage is critical.
pub const CRITICAL_PERCENT: f64 = 95.0;

/// The limiting regime a provider runs under, chosen once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LimitPolicy {
    /// Calls per calendar hour.
    RateLimited { hourly_call_limit: u64 },
    /// Quota units per calendar day.
    QuotaLimited { daily_quota_limit: u64 },
}

impl LimitPolicy {
    /// A configured daily quota always wins over the hourly call limit.
    pub fn from_limits(daily_quota_limit: Option<u64>, hourly_call_limit: u64) -> Self {
        match daily_quota_limit {
            Some(daily_quota_limit) => Self::QuotaLimited { daily_quota_limit },
            None => Self::RateLimited { hourly_call_limit },
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::RateLimited { hourly_call_limit } => {
                format!("{} calls/hour", hourly_call_limit)
            }
            Self::QuotaLimited { daily_quota_limit } => {
                format!("{} units/day", daily_quota_limit)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Fraction of the limit at which usage is flagged.
    pub warning: f64,
    /// Fraction of the limit at which further calls are refused.
    pub stop: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 0.8,
            stop: 0.9,
        }
    }
}

impl Thresholds {
    pub fn is_valid(&self) -> bool {
        self.warning > 0.0 && self.warning < self.stop && self.stop < 1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    Good,
    Warning,
    Critical,
}

impl UsageStatus {
    /// Three tiers for a daily quota budget.
    pub fn for_quota(usage_percent: f64) -> Self {
        if usage_percent >= CRITICAL_PERCENT {
            Self::Critical
        } else if usage_percent >= WARNING_PERCENT {
            Self::Warning
        } else {
            Self::Good
        }
    }

    /// Rate windows only distinguish good from warning.
    pub fn for_rate(usage_percent: f64) -> Self {
        if usage_percent >= WARNING_PERCENT {
            Self::Warning
        } else {
            Self::Good
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for UsageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota-unit cost per call type. Unknown call types cost 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostTable {
    costs: HashMap<String, u64>,
}

impl CostTable {
    /// Build a table, rejecting an empty table or a zero cost.
    pub fn new<I, S>(provider: &str, entries: I) -> Result<Self, QuotaError>
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let costs: HashMap<String, u64> = entries
            .into_iter()
            .map(|(call_type, cost)| (call_type.into(), cost))
            .collect();
        if costs.is_empty() {
            return Err(QuotaError::InvalidCostTable {
                provider: provider.to_string(),
                reason: "no call types declared".to_string(),
            });
        }
        if let Some((call_type, _)) = costs.iter().find(|(_, cost)| **cost == 0) {
            return Err(QuotaError::InvalidCostTable {
                provider: provider.to_string(),
                reason: format!("call type '{}' has zero cost", call_type),
            });
        }
        Ok(Self { costs })
    }

    pub fn cost_of(&self, call_type: &str) -> u64 {
        self.costs.get(call_type).copied().unwrap_or(1)
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }
}
