use async_trait::async_trait;
use log::debug;
use serde::Serialize;

use crate::core::batch::{ScoreOutput, Scorer};
use crate::core::config::ProminenceConfig;
use crate::core::error::QuotaError;
use crate::core::subject::{Subject, SubjectType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProminenceTier {
    Tier1,
    Tier2,
    Tier3,
    Unknown,
}

/// Static keyword-tier heuristic. Needs no network and no quota manager.
pub struct ProminenceScorer {
    config: ProminenceConfig,
}

impl ProminenceScorer {
    pub fn new(config: ProminenceConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, name: &str) -> (ProminenceTier, u32) {
        let lower = name.trim().to_lowercase();
        let matches = |keywords: &[String]| keywords.iter().any(|k| lower.contains(k.as_str()));

        let (tier, score) = if matches(&self.config.tier1) {
            (ProminenceTier::Tier1, self.config.tier1_score)
        } else if matches(&self.config.tier2) {
            (ProminenceTier::Tier2, self.config.tier2_score)
        } else if matches(&self.config.tier3) {
            (ProminenceTier::Tier3, self.config.tier3_score)
        } else {
            (ProminenceTier::Unknown, self.config.unknown_score)
        };
        debug!("Prominence {:?}: {} -> {}", tier, name.trim(), score);
        (tier, score.min(100))
    }
}

#[async_trait]
impl Scorer for ProminenceScorer {
    fn id(&self) -> &'static str {
        "heuristics"
    }

    fn supports(&self, _subject_type: SubjectType) -> bool {
        true
    }

    async fn score(&mut self, subject: &Subject) -> Result<ScoreOutput, QuotaError> {
        let (tier, score) = self.classify(&subject.name);
        Ok(ScoreOutput {
            score: f64::from(score),
            detail: serde_json::json!({ "tier": tier, "source_prominence_score": score }),
        })
    }
}
