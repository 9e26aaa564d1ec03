pub mod prominence;
pub mod wikipedia;
pub mod youtube;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::config::ProviderConfig;
use crate::core::error::QuotaError;
use crate::core::quota::CostTable;

/// External data providers that sit behind a quota manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Wikipedia,
    YouTube,
}

impl Provider {
    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "wikipedia" | "wiki" => Some(Self::Wikipedia),
            "youtube" | "yt" => Some(Self::YouTube),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Wikipedia => "wikipedia",
            Self::YouTube => "youtube",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Wikipedia => "Wikipedia",
            Self::YouTube => "YouTube",
        }
    }

    pub fn all() -> &'static [Provider] {
        &[Provider::Wikipedia, Provider::YouTube]
    }

    pub fn cost_table(&self) -> Result<CostTable, QuotaError> {
        match self {
            Self::Wikipedia => wikipedia::cost_table(),
            Self::YouTube => youtube::cost_table(),
        }
    }

    /// Built-in limits: Wikimedia REST is rate limited per hour,
    /// the YouTube Data API has a daily unit budget.
    pub fn default_config(&self) -> ProviderConfig {
        match self {
            Self::Wikipedia => ProviderConfig {
                id: self.id().to_string(),
                daily_quota_limit: None,
                hourly_call_limit: 500,
                api_key_env: None,
            },
            Self::YouTube => ProviderConfig {
                id: self.id().to_string(),
                daily_quota_limit: Some(10_000),
                hourly_call_limit: 100,
                api_key_env: Some("YOUTUBE_API_KEY".to_string()),
            },
        }
    }
}

/// Outcome of one source call, separating "definitely nothing" from "could not tell".
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fetched<T> {
    Found(T),
    Missing,
    Failed,
}

impl<T> Fetched<T> {
    pub(crate) fn settle(result: anyhow::Result<Option<T>>, provider: &str, what: &str) -> Self {
        match result {
            Ok(Some(value)) => Self::Found(value),
            Ok(None) => Self::Missing,
            Err(e) => {
                debug!("{}: {} failed: {:#}", provider, what, e);
                Self::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_id_round_trips() {
        for provider in Provider::all() {
            assert_eq!(Provider::from_id(provider.id()), Some(*provider));
        }
        assert_eq!(Provider::from_id("YouTube"), Some(Provider::YouTube));
        assert_eq!(Provider::from_id("listen_notes"), None);
    }

    #[test]
    fn cost_tables_are_valid() {
        let youtube = Provider::YouTube.cost_table().unwrap();
        assert_eq!(youtube.cost_of("search"), 100);
        assert_eq!(youtube.cost_of("videos"), 1);
        assert_eq!(Provider::Wikipedia.cost_table().unwrap().len(), 2);
    }

    #[test]
    fn settle_separates_missing_from_failed() {
        assert_eq!(
            Fetched::settle(Ok(Some(3)), "Test", "lookup"),
            Fetched::Found(3)
        );
        assert_eq!(Fetched::<u32>::settle(Ok(None), "Test", "lookup"), Fetched::Missing);
        assert_eq!(
            Fetched::<u32>::settle(Err(anyhow::anyhow!("timeout")), "Test", "lookup"),
            Fetched::Failed
        );
    }
}
