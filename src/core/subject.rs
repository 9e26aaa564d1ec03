use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Video,
    Audio,
    Article,
}

impl SubjectType {
    /// Accepts the short ids and the spreadsheet labels ("TV/Video", "Podcast/Audio", "Web/Articles").
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "video" | "tv/video" | "tv" => Some(Self::Video),
            "audio" | "podcast/audio" | "podcast" => Some(Self::Audio),
            "article" | "web/articles" | "web" => Some(Self::Article),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Article => "article",
        }
    }
}

impl<'de> Deserialize<'de> for SubjectType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Self::from_label(&label).ok_or_else(|| {
            serde::de::Error::custom(format!("unknown subject type '{}'", label))
        })
    }
}

impl std::fmt::Display for SubjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// A media source to be scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub subject_type: SubjectType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Subject {
    pub fn new(name: impl Into<String>, subject_type: SubjectType) -> Self {
        Self {
            name: name.into(),
            subject_type,
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn clean_name(&self) -> &str {
        self.name.trim()
    }
}

/// Strip a trailing "(...)" qualifier and anything after a colon.
pub fn base_name(name: &str) -> &str {
    let mut base = name.trim();
    if base.ends_with(')') {
        if let Some(open) = base.rfind('(') {
            base = base[..open].trim_end();
        }
    }
    if let Some(colon) = base.find(':') {
        base = base[..colon].trim_end();
    }
    base.trim()
}
