//! Sequential batch driver: scores subjects one at a time, flushes every
//! bound manager at checkpoints, and stops early on a limit breach or an
//! interrupt.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{AppConfig, Settings};
use crate::core::error::{ConfigError, QuotaError};
use crate::core::providers::prominence::ProminenceScorer;
use crate::core::quota::UsageSummary;
use crate::core::subject::{Subject, SubjectType};

/// One scorer's contribution for a subject, 0–100 plus its raw record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreOutput {
    pub score: f64,
    pub detail: serde_json::Value,
}

/// Object-safe view of a scorer, used by the driver to iterate
/// heterogeneous providers.
#[async_trait]
pub trait Scorer: Send {
    /// Matches the scorer's weight key in the config.
    fn id(&self) -> &'static str;

    fn supports(&self, subject_type: SubjectType) -> bool;

    /// Whether this scorer issues rate-limited network calls.
    fn is_networked(&self) -> bool {
        false
    }

    async fn score(&mut self, subject: &Subject) -> Result<ScoreOutput, QuotaError>;

    fn flush(&self) -> bool {
        true
    }

    fn usage_summary(&self) -> Option<UsageSummary> {
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectResult {
    pub subject: Subject,
    pub influence_score: f64,
    pub scores: BTreeMap<String, f64>,
    pub details: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    Completed,
    LimitReached { provider: String, usage: String },
    Interrupted,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub processed: usize,
    pub outcome: BatchOutcome,
    pub results: Vec<SubjectResult>,
    pub usage: Vec<UsageSummary>,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub save_frequency: usize,
    pub request_delay: Duration,
}

impl BatchOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            save_frequency: settings.save_frequency.max(1),
            request_delay: Duration::from_millis(settings.request_delay_ms),
        }
    }
}

pub struct BatchDriver {
    scorers: Vec<(Box<dyn Scorer>, u32)>,
    options: BatchOptions,
    interrupted: Arc<AtomicBool>,
}

impl BatchDriver {
    pub fn new(options: BatchOptions) -> Self {
        Self {
            scorers: Vec::new(),
            options,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Validate the config and start a driver with the heuristic scorer, if enabled.
    /// Networked scorers are added by the caller, who owns their data sources.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        config.check()?;
        info!("Enabled scorers and weights: {:?}", config.scorers.enabled());
        let mut driver = Self::new(BatchOptions::from_settings(&config.settings));
        if config.scorers.heuristics > 0 {
            driver.add_scorer(
                Box::new(ProminenceScorer::new(config.prominence.clone())),
                config.scorers.heuristics,
            );
        }
        Ok(driver)
    }

    pub fn add_scorer(&mut self, scorer: Box<dyn Scorer>, weight: u32) {
        self.scorers.push((scorer, weight));
    }

    /// Set from a signal handler; checked between subjects.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    pub fn flush_all(&self) {
        for (scorer, _) in &self.scorers {
            if scorer.flush() {
                debug!("Saved {} cache", scorer.id());
            }
        }
    }

    pub fn usage(&self) -> Vec<UsageSummary> {
        self.scorers
            .iter()
            .filter_map(|(scorer, _)| scorer.usage_summary())
            .collect()
    }

    pub async fn run(&mut self, subjects: &[Subject]) -> Result<BatchReport, QuotaError> {
        let total = subjects.len();
        let networked = self.scorers.iter().any(|(scorer, _)| scorer.is_networked());
        let mut results = Vec::with_capacity(total);
        let mut outcome = BatchOutcome::Completed;

        for (idx, subject) in subjects.iter().enumerate() {
            if self.interrupted.load(Ordering::SeqCst) {
                warn!("Interrupted after {}/{} subjects", results.len(), total);
                outcome = BatchOutcome::Interrupted;
                break;
            }

            info!("Processing {}/{}: {}", idx + 1, total, subject.clean_name());
            match self.score_subject(subject).await {
                Ok(result) => results.push(result),
                Err(QuotaError::LimitReached { provider, usage }) => {
                    warn!(
                        "{}: limit reached after {} subjects ({}). Run again to continue.",
                        provider, idx, usage
                    );
                    outcome = BatchOutcome::LimitReached { provider, usage };
                    break;
                }
                Err(e) => {
                    self.flush_all();
                    return Err(e);
                }
            }

            if networked {
                tokio::time::sleep(self.options.request_delay).await;
                if results.len() % self.options.save_frequency == 0 {
                    self.flush_all();
                    info!("Cache files saved to disk ({}/{})", results.len(), total);
                }
            }
        }

        self.flush_all();
        let usage = self.usage();
        for summary in &usage {
            info!(
                "{}: {} ({:.1}% used, {}), {} calls lifetime",
                summary.provider,
                summary.usage.describe(),
                summary.usage.usage_percent(),
                summary.usage.status(),
                summary.total_calls_lifetime
            );
        }
        Ok(BatchReport {
            total,
            processed: results.len(),
            outcome,
            results,
            usage,
        })
    }

    async fn score_subject(&mut self, subject: &Subject) -> Result<SubjectResult, QuotaError> {
        let mut scores = BTreeMap::new();
        let mut details = BTreeMap::new();
        let mut influence = 0.0;

        for (scorer, weight) in self.scorers.iter_mut() {
            if !scorer.supports(subject.subject_type) {
                continue;
            }
            let output = scorer.score(subject).await?;
            influence += output.score * f64::from(*weight) / 100.0;
            scores.insert(scorer.id().to_string(), output.score);
            details.insert(scorer.id().to_string(), output.detail);
        }

        Ok(SubjectResult {
            subject: subject.clone(),
            influence_score: (influence.min(100.0) * 100.0).round() / 100.0,
            scores,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::quota::{CostTable, LimitPolicy, ManagerConfig, QuotaManager, Thresholds};
    use std::sync::Mutex;

    /// Scores a fixed value, fails with `LimitReached` after `budget` subjects.
    struct FixedScorer {
        id: &'static str,
        score: f64,
        budget: usize,
        flushes: Arc<Mutex<usize>>,
        types: &'static [SubjectType],
    }

    impl FixedScorer {
        fn new(id: &'static str, score: f64, budget: usize) -> (Self, Arc<Mutex<usize>>) {
            let flushes = Arc::new(Mutex::new(0));
            (
                Self {
                    id,
                    score,
                    budget,
                    flushes: Arc::clone(&flushes),
                    types: &[SubjectType::Video, SubjectType::Audio, SubjectType::Article],
                },
                flushes,
            )
        }
    }

    #[async_trait]
    impl Scorer for FixedScorer {
        fn id(&self) -> &'static str {
            self.id
        }

        fn supports(&self, subject_type: SubjectType) -> bool {
            self.types.contains(&subject_type)
        }

        fn is_networked(&self) -> bool {
            true
        }

        async fn score(&mut self, _subject: &Subject) -> Result<ScoreOutput, QuotaError> {
            if self.budget == 0 {
                return Err(QuotaError::LimitReached {
                    provider: self.id.to_string(),
                    usage: "90/100 units today".to_string(),
                });
            }
            self.budget -= 1;
            Ok(ScoreOutput {
                score: self.score,
                detail: serde_json::json!({ "score": self.score }),
            })
        }

        fn flush(&self) -> bool {
            *self.flushes.lock().unwrap() += 1;
            true
        }
    }

    /// Spends one call per subject against a real manager.
    struct MeteredScorer {
        manager: QuotaManager<serde_json::Value>,
    }

    #[async_trait]
    impl Scorer for MeteredScorer {
        fn id(&self) -> &'static str {
            "wikipedia"
        }

        fn supports(&self, _subject_type: SubjectType) -> bool {
            true
        }

        fn is_networked(&self) -> bool {
            true
        }

        async fn score(&mut self, subject: &Subject) -> Result<ScoreOutput, QuotaError> {
            if self.manager.would_exceed_limit("summary") {
                return Err(QuotaError::LimitReached {
                    provider: self.manager.provider_name().to_string(),
                    usage: self.manager.usage_summary().usage.describe(),
                });
            }
            self.manager.record_call(subject.clean_name(), "summary");
            Ok(ScoreOutput {
                score: 40.0,
                detail: serde_json::Value::Null,
            })
        }

        fn flush(&self) -> bool {
            self.manager.flush_cache()
        }

        fn usage_summary(&self) -> Option<UsageSummary> {
            Some(self.manager.usage_summary())
        }
    }

    fn options(save_frequency: usize) -> BatchOptions {
        BatchOptions {
            save_frequency,
            request_delay: Duration::ZERO,
        }
    }

    fn subjects(n: usize) -> Vec<Subject> {
        (0..n)
            .map(|i| Subject::new(format!("Source {}", i), SubjectType::Video))
            .collect()
    }

    #[tokio::test]
    async fn weights_combine_scores() {
        let mut driver = BatchDriver::new(options(10));
        let (a, _) = FixedScorer::new("wikipedia", 50.0, 100);
        let (b, _) = FixedScorer::new("heuristics", 90.0, 100);
        driver.add_scorer(Box::new(a), 70);
        driver.add_scorer(Box::new(b), 30);

        let report = driver.run(&subjects(2)).await.unwrap();
        assert_eq!(report.outcome, BatchOutcome::Completed);
        assert_eq!(report.processed, 2);
        // 50 * 0.7 + 90 * 0.3
        assert!((report.results[0].influence_score - 62.0).abs() < 1e-9);
        assert_eq!(report.results[0].scores["wikipedia"], 50.0);
    }

    #[tokio::test]
    async fn unsupported_subject_types_are_skipped() {
        let mut driver = BatchDriver::new(options(10));
        let (mut a, _) = FixedScorer::new("youtube", 80.0, 0);
        a.types = &[SubjectType::Video];
        driver.add_scorer(Box::new(a), 100);

        let report = driver
            .run(&[Subject::new("Blog", SubjectType::Article)])
            .await
            .unwrap();
        assert_eq!(report.outcome, BatchOutcome::Completed);
        assert!(report.results[0].scores.is_empty());
        assert_eq!(report.results[0].influence_score, 0.0);
    }

    #[tokio::test]
    async fn checkpoints_flush_periodically_and_at_end() {
        let mut driver = BatchDriver::new(options(2));
        let (a, flushes) = FixedScorer::new("wikipedia", 10.0, 100);
        driver.add_scorer(Box::new(a), 100);

        driver.run(&subjects(5)).await.unwrap();
        // After subjects 2 and 4, then the final flush.
        assert_eq!(*flushes.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn limit_breach_stops_and_flushes() {
        let mut driver = BatchDriver::new(options(100));
        let (a, flushes) = FixedScorer::new("youtube", 10.0, 3);
        driver.add_scorer(Box::new(a), 100);

        let report = driver.run(&subjects(10)).await.unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.total, 10);
        assert!(matches!(
            report.outcome,
            BatchOutcome::LimitReached { ref provider, .. } if provider == "youtube"
        ));
        assert_eq!(*flushes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn limit_stopped_report_carries_provider_usage() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ManagerConfig::in_dir(
            dir.path(),
            "wikipedia",
            "Wikipedia",
            LimitPolicy::RateLimited {
                hourly_call_limit: 10,
            },
            Thresholds::default(),
        );
        let costs = CostTable::new("Wikipedia", [("summary", 1)]).unwrap();
        let mut driver = BatchDriver::new(options(100));
        driver.add_scorer(
            Box::new(MeteredScorer {
                manager: QuotaManager::open(config, costs),
            }),
            100,
        );

        let report = driver.run(&subjects(20)).await.unwrap();
        // Stop line is 9 calls this hour.
        assert_eq!(report.processed, 9);
        assert!(matches!(report.outcome, BatchOutcome::LimitReached { .. }));
        assert_eq!(report.usage.len(), 1);
        let usage = &report.usage[0];
        assert_eq!(usage.provider, "Wikipedia");
        assert_eq!(usage.total_calls_lifetime, 9);
    }

    #[tokio::test]
    async fn interrupt_stops_between_subjects() {
        let mut driver = BatchDriver::new(options(100));
        let (a, flushes) = FixedScorer::new("wikipedia", 10.0, 100);
        driver.add_scorer(Box::new(a), 100);
        driver.interrupt_flag().store(true, Ordering::SeqCst);

        let report = driver.run(&subjects(3)).await.unwrap();
        assert_eq!(report.outcome, BatchOutcome::Interrupted);
        assert_eq!(report.processed, 0);
        assert_eq!(*flushes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn from_config_adds_heuristics() {
        let config = AppConfig::default();
        let mut driver = BatchDriver::from_config(&config).unwrap();
        let report = driver
            .run(&[Subject::new("CNN Tonight", SubjectType::Video)])
            .await
            .unwrap();
        // Tier 1 score of 90 at weight 30.
        assert!((report.results[0].influence_score - 27.0).abs() < 1e-9);
        assert!(report.usage.is_empty());
    }

    #[test]
    fn from_config_rejects_bad_weights() {
        let mut config = AppConfig::default();
        config.scorers.wikipedia = 50;
        assert!(matches!(
            BatchDriver::from_config(&config),
            Err(ConfigError::WeightSum(80))
        ));
    }
}
