//! Channel metrics against a daily unit budget.
//!
//! A channel is resolved from the subject's URL when it points at YouTube,
//! otherwise by searching for "<name> official". Searches are expensive
//! (100 units) compared to channel and video reads (1 unit each), so the
//! quota check before every call matters most here.

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::batch::{ScoreOutput, Scorer};
use crate::core::client::{ManagerBinding, ProviderClient};
use crate::core::config::AppConfig;
use crate::core::error::QuotaError;
use crate::core::providers::{Fetched, Provider};
use crate::core::quota::{CostTable, UsageSummary};
use crate::core::subject::{base_name, Subject, SubjectType};

pub const CALL_SEARCH: &str = "search";
pub const CALL_CHANNELS: &str = "channels";
pub const CALL_VIDEOS: &str = "videos";

/// How many recent uploads feed the engagement figures.
pub const RECENT_VIDEOS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub id: String,
    pub title: String,
    pub subscribers: Option<u64>,
    pub total_views: Option<u64>,
    pub video_count: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoStats {
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
}

/// The network seam. Each method maps to exactly one billable call.
#[async_trait]
pub trait ChannelSource: Send + Sync {
    async fn channel_by_id(&self, channel_id: &str) -> anyhow::Result<Option<ChannelStats>>;

    async fn channel_by_username(&self, username: &str) -> anyhow::Result<Option<ChannelStats>>;

    /// Id of the most relevant channel for `query`.
    async fn search_channel(&self, query: &str) -> anyhow::Result<Option<String>>;

    /// Ids of the channel's newest uploads, newest first.
    async fn recent_video_ids(&self, channel_id: &str, max: usize) -> anyhow::Result<Vec<String>>;

    async fn video_stats(&self, video_ids: &[String]) -> anyhow::Result<Vec<VideoStats>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Id(String),
    Username(String),
    Search(String),
}

impl ChannelRef {
    /// Resolve what to look up. Subjects without a URL are not looked up at all.
    pub fn from_subject(subject: &Subject) -> Option<Self> {
        let url = subject.url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }

        const MARKERS: [&str; 5] = [
            "youtube.com/channel/",
            "youtube.com/c/",
            "youtube.com/user/",
            "youtube.com/@",
            "youtu.be/",
        ];
        for marker in MARKERS {
            let Some(start) = url.find(marker) else {
                continue;
            };
            let rest = &url[start + marker.len()..];
            let identifier = rest.split(['/', '?']).next().unwrap_or_default();
            if identifier.is_empty() {
                continue;
            }
            if identifier.starts_with("UC") && identifier.len() == 24 {
                return Some(Self::Id(identifier.to_string()));
            }
            return Some(Self::Username(identifier.to_string()));
        }

        Some(Self::Search(format!(
            "{} official",
            base_name(subject.clean_name())
        )))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YouTubeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_views: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_views_per_video: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_videos: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_avg_views: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_score: Option<u32>,
}

impl YouTubeRecord {
    fn from_channel(channel: ChannelStats) -> Self {
        let avg_views_per_video = match (channel.total_views, channel.video_count) {
            (Some(views), Some(count)) if count > 0 => Some(views / count),
            _ => None,
        };
        Self {
            subscriber_score: channel.subscribers.map(subscriber_score),
            subscribers: channel.subscribers,
            total_views: channel.total_views,
            video_count: channel.video_count,
            avg_views_per_video,
            channel_id: Some(channel.id),
            channel_title: Some(channel.title),
            ..Self::default()
        }
    }

    fn add_recent(&mut self, videos: &[VideoStats]) {
        if videos.is_empty() {
            return;
        }
        let count = videos.len() as u64;
        let views: u64 = videos.iter().map(|v| v.views).sum();
        let reactions: u64 = videos.iter().map(|v| v.likes + v.comments).sum();

        self.recent_videos = Some(videos.len());
        self.recent_avg_views = Some(views / count);
        if views > 0 {
            let rate = (reactions as f64 / views as f64 * 100_000.0).round() / 1000.0;
            self.engagement_rate = Some(rate);
            self.engagement_score = Some(engagement_score(rate));
        }
    }

    pub fn has_channel(&self) -> bool {
        self.channel_id.is_some()
    }

    /// Mean of the available tier scores, 0 when nothing was found.
    pub fn score(&self) -> f64 {
        let parts: Vec<f64> = [self.subscriber_score, self.engagement_score]
            .into_iter()
            .flatten()
            .map(f64::from)
            .collect();
        if parts.is_empty() {
            return 0.0;
        }
        parts.iter().sum::<f64>() / parts.len() as f64
    }
}

pub fn subscriber_score(subscribers: u64) -> u32 {
    match subscribers {
        n if n >= 10_000_000 => 100,
        n if n >= 1_000_000 => 80,
        n if n >= 100_000 => 60,
        n if n >= 10_000 => 40,
        n if n >= 1_000 => 20,
        _ => 10,
    }
}

pub fn engagement_score(rate: f64) -> u32 {
    if rate >= 5.0 {
        100
    } else if rate >= 2.0 {
        80
    } else if rate >= 1.0 {
        60
    } else if rate >= 0.5 {
        40
    } else {
        20
    }
}

pub fn cost_table() -> Result<CostTable, QuotaError> {
    CostTable::new(
        Provider::YouTube.display_name(),
        [(CALL_SEARCH, 100), (CALL_CHANNELS, 1), (CALL_VIDEOS, 1)],
    )
}

pub fn cache_key(subject: &Subject) -> String {
    format!(
        "{}_{}",
        subject.clean_name(),
        subject.url.as_deref().unwrap_or("none")
    )
    .to_lowercase()
}

pub struct YouTubeClient<S> {
    binding: ManagerBinding<YouTubeRecord>,
    source: S,
    enabled: bool,
}

impl<S: ChannelSource> YouTubeClient<S> {
    pub fn new(binding: ManagerBinding<YouTubeRecord>, source: S, enabled: bool) -> Self {
        Self {
            binding,
            source,
            enabled,
        }
    }

    pub fn from_config(config: &AppConfig, source: S) -> Result<Self, QuotaError> {
        let enabled = config.provider(Provider::YouTube).has_credentials();
        let manager_config = config.manager_config(Provider::YouTube);
        let binding = ManagerBinding::open::<Self>(Provider::YouTube, manager_config)?;
        Ok(Self::new(binding, source, enabled))
    }

    pub async fn lookup(&mut self, subject: &Subject) -> Result<YouTubeRecord, QuotaError> {
        let key = cache_key(subject);
        if let Some(hit) = self.cache_get(&key) {
            info!("YouTube cache HIT: {}", subject.clean_name());
            return Ok(hit);
        }

        let Some(channel_ref) = ChannelRef::from_subject(subject) else {
            debug!("YouTube: no URL for {}, skipping lookup", subject.clean_name());
            let record = YouTubeRecord::default();
            self.cache_set(&key, record.clone());
            return Ok(record);
        };
        info!("YouTube cache MISS: fetching {}", subject.clean_name());

        let mut definitive = true;
        let channel = match self.resolve_channel(&channel_ref).await? {
            Fetched::Found(channel) => channel,
            Fetched::Missing => {
                let record = YouTubeRecord::default();
                self.cache_set(&key, record.clone());
                return Ok(record);
            }
            Fetched::Failed => return Ok(YouTubeRecord::default()),
        };

        let mut record = YouTubeRecord::from_channel(channel);
        if let Some(channel_id) = record.channel_id.clone() {
            match self.recent_videos(&channel_id).await? {
                Fetched::Found(videos) => record.add_recent(&videos),
                Fetched::Missing => {}
                Fetched::Failed => definitive = false,
            }
        }

        if definitive {
            self.cache_set(&key, record.clone());
        }
        Ok(record)
    }

    async fn resolve_channel(
        &mut self,
        channel_ref: &ChannelRef,
    ) -> Result<Fetched<ChannelStats>, QuotaError> {
        let channel_id = match channel_ref {
            ChannelRef::Id(id) => id.clone(),
            ChannelRef::Username(username) => {
                self.ensure_quota(CALL_CHANNELS)?;
                let result = self.source.channel_by_username(username).await;
                self.log_call(&format!("channel for user '{}'", username), CALL_CHANNELS);
                return Ok(Fetched::settle(result, "YouTube", "channel lookup"));
            }
            ChannelRef::Search(query) => {
                self.ensure_quota(CALL_SEARCH)?;
                let result = self.source.search_channel(query).await;
                self.log_call(&format!("channel search '{}'", query), CALL_SEARCH);
                match Fetched::settle(result, "YouTube", "channel search") {
                    Fetched::Found(id) => id,
                    Fetched::Missing => return Ok(Fetched::Missing),
                    Fetched::Failed => return Ok(Fetched::Failed),
                }
            }
        };

        self.ensure_quota(CALL_CHANNELS)?;
        let result = self.source.channel_by_id(&channel_id).await;
        self.log_call(&format!("channel {}", channel_id), CALL_CHANNELS);
        Ok(Fetched::settle(result, "YouTube", "channel lookup"))
    }

    async fn recent_videos(
        &mut self,
        channel_id: &str,
    ) -> Result<Fetched<Vec<VideoStats>>, QuotaError> {
        self.ensure_quota(CALL_SEARCH)?;
        let result = self.source.recent_video_ids(channel_id, RECENT_VIDEOS).await;
        self.log_call(&format!("recent uploads of {}", channel_id), CALL_SEARCH);
        let ids = match Fetched::settle(result.map(Some), "YouTube", "recent uploads") {
            Fetched::Found(ids) if !ids.is_empty() => ids,
            Fetched::Found(_) | Fetched::Missing => return Ok(Fetched::Missing),
            Fetched::Failed => return Ok(Fetched::Failed),
        };

        self.ensure_quota(CALL_VIDEOS)?;
        let result = self.source.video_stats(&ids).await;
        self.log_call(&format!("stats for {} videos", ids.len()), CALL_VIDEOS);
        Ok(Fetched::settle(result.map(Some), "YouTube", "video stats"))
    }
}

impl<S: ChannelSource> ProviderClient for YouTubeClient<S> {
    type Record = YouTubeRecord;

    fn provider(&self) -> Provider {
        Provider::YouTube
    }

    fn declare_cost_table() -> Result<CostTable, QuotaError> {
        cost_table()
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn supported_subject_types(&self) -> &'static [SubjectType] {
        &[SubjectType::Video, SubjectType::Audio]
    }

    fn binding(&self) -> &ManagerBinding<YouTubeRecord> {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut ManagerBinding<YouTubeRecord> {
        &mut self.binding
    }
}

#[async_trait]
impl<S: ChannelSource> Scorer for YouTubeClient<S> {
    fn id(&self) -> &'static str {
        Provider::YouTube.id()
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
            score: record.score(),
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
