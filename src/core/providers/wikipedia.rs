//! Page-view lookups, rate limited per hour.

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};

use crate::core::batch::{ScoreOutput, Scorer};
use crate::core::client::{ManagerBinding, ProviderClient};
use crate::core::config::AppConfig;
use crate::core::error::QuotaError;
use crate::core::providers::{Fetched, Provider};
use crate::core::quota::{CostTable, UsageSummary};
use crate::core::subject::{base_name, Subject, SubjectType};

pub const CALL_SUMMARY: &str = "summary";
pub const CALL_PAGEVIEWS: &str = "pageviews";

/// The network seam. Implementations own request building and response parsing.
#[async_trait]
pub trait PageViewSource: Send + Sync {
    /// Canonical title if `term` names a standard article.
    async fn resolve_article(&self, term: &str) -> anyhow::Result<Option<String>>;

    /// Average daily views over the reporting window, if any were recorded.
    async fn average_daily_views(&self, title: &str) -> anyhow::Result<Option<f64>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikipediaRecord {
    pub has_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_daily_views: Option<u64>,
    pub score: f64,
}

impl WikipediaRecord {
    pub fn not_found() -> Self {
        Self {
            has_page: false,
            title: None,
            avg_daily_views: None,
            score: 0.0,
        }
    }

    pub fn found(title: String, avg_daily_views: f64) -> Self {
        Self {
            has_page: true,
            title: Some(title),
            avg_daily_views: Some(avg_daily_views.round() as u64),
            score: (avg_daily_views / 100.0).min(100.0),
        }
    }
}

pub fn cost_table() -> Result<CostTable, QuotaError> {
    CostTable::new(
        Provider::Wikipedia.display_name(),
        [(CALL_SUMMARY, 1), (CALL_PAGEVIEWS, 1)],
    )
}

pub fn cache_key(subject: &Subject) -> String {
    format!("{}_{}", subject.clean_name(), subject.subject_type)
}

/// Candidate article titles, most specific first, without duplicates.
pub fn search_terms(subject: &Subject) -> Vec<String> {
    let name = subject.clean_name();
    let base = base_name(name);
    let mut terms = vec![name.to_string(), base.to_string()];
    match subject.subject_type {
        SubjectType::Video => {
            terms.push(format!("{} (TV program)", base));
            terms.push(format!("{} (TV show)", base));
        }
        SubjectType::Audio => {
            terms.push(format!("{} (podcast)", base));
            terms.push(format!("{} podcast", base));
        }
        SubjectType::Article => {
            terms.push(format!("{} (website)", base));
            terms.push(format!("{}.com", base));
        }
    }
    let mut unique = Vec::with_capacity(terms.len());
    for term in terms {
        if !term.is_empty() && !unique.contains(&term) {
            unique.push(term);
        }
    }
    unique
}

pub struct WikipediaClient<S> {
    binding: ManagerBinding<WikipediaRecord>,
    source: S,
}

impl<S: PageViewSource> WikipediaClient<S> {
    pub fn new(binding: ManagerBinding<WikipediaRecord>, source: S) -> Self {
        Self { binding, source }
    }

    pub fn from_config(config: &AppConfig, source: S) -> Result<Self, QuotaError> {
        let manager_config = config.manager_config(Provider::Wikipedia);
        let binding = ManagerBinding::open::<Self>(Provider::Wikipedia, manager_config)?;
        Ok(Self::new(binding, source))
    }

    /// Cached record, or a fresh lookup across the candidate titles.
    ///
    /// Only definitive results are cached: a lookup that hit a transport
    /// error on some candidate and found nothing is retried next run.
    pub async fn lookup(&mut self, subject: &Subject) -> Result<WikipediaRecord, QuotaError> {
        let key = cache_key(subject);
        if let Some(hit) = self.cache_get(&key) {
            info!("Wikipedia cache HIT: {}", subject.clean_name());
            return Ok(hit);
        }
        info!("Wikipedia cache MISS: fetching {}", subject.clean_name());

        let mut record = WikipediaRecord::not_found();
        let mut definitive = true;

        for term in search_terms(subject) {
            self.ensure_quota(CALL_SUMMARY)?;
            let resolved = self.source.resolve_article(&term).await;
            self.log_call(&format!("summary for '{}'", term), CALL_SUMMARY);

            let title = match Fetched::settle(resolved, "Wikipedia", "summary") {
                Fetched::Found(title) => title,
                Fetched::Missing => continue,
                Fetched::Failed => {
                    definitive = false;
                    continue;
                }
            };

            self.ensure_quota(CALL_PAGEVIEWS)?;
            let views = self.source.average_daily_views(&title).await;
            self.log_call(&format!("pageviews for '{}'", title), CALL_PAGEVIEWS);

            match Fetched::settle(views, "Wikipedia", "pageviews") {
                Fetched::Found(avg) => {
                    info!("Found Wikipedia page: {} ({:.0} daily views)", title, avg);
                    record = WikipediaRecord::found(title, avg);
                    break;
                }
                Fetched::Missing => {}
                Fetched::Failed => definitive = false,
            }
        }

        if record.has_page || definitive {
            self.cache_set(&key, record.clone());
        }
        Ok(record)
    }
}

impl<S: PageViewSource> ProviderClient for WikipediaClient<S> {
    type Record = WikipediaRecord;

    fn provider(&self) -> Provider {
        Provider::Wikipedia
    }

    fn declare_cost_table() -> Result<CostTable, QuotaError> {
        cost_table()
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn supported_subject_types(&self) -> &'static [SubjectType] {
        &[SubjectType::Video, SubjectType::Audio, SubjectType::Article]
    }

    fn binding(&self) -> &ManagerBinding<WikipediaRecord> {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut ManagerBinding<WikipediaRecord> {
        &mut self.binding
    }
}

#[async_trait]
impl<S: PageViewSource> Scorer for WikipediaClient<S> {
    fn id(&self) -> &'static str {
        Provider::Wikipedia.id()
    }

    fn supports(&self, subject_type: SubjectType) -> bool {
        ProviderClient::supports(self, subject_type)
    }

    fn is_networked(&self) -> bool {
        true
    }

    async fn score(&mut self, subject: &Subject) -> Result<ScoreOutput, QuotaError> {
        let record = self.lookup(subject).await?;
        Ok(ScoreOutput {
            score: record.score,
            detail: serde_json::to_value(&record).unwrap_or_default(),
        })
    }

    fn flush(&self) -> bool {
        self.flush_cache()
    }

    fn usage_summary(&self) -> Option<UsageSummary> {
        ProviderClient::usage_summary(self)
    }
}
