use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity;

/// Trust tier of a source. Drives validation strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    Official,
    Trusted,
    Rss,
    ThirdParty,
    /// Entered by a human; only ever found on canonical records.
    Manual,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Official => "official",
            SourceType::Trusted => "trusted",
            SourceType::Rss => "rss",
            SourceType::ThirdParty => "third-party",
            SourceType::Manual => "manual",
        }
    }

    /// Official and trusted sources are expected to carry full job descriptions.
    pub fn is_high_trust(&self) -> bool {
        matches!(self, SourceType::Official | SourceType::Trusted | SourceType::Manual)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ephemeral output of one extraction pass. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftJobRecord {
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub source: Option<String>,
    pub source_type: SourceType,
    pub external_id: Option<String>,
    pub employment_type: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub region: Option<String>,
    pub is_remote: Option<bool>,
    pub is_trusted: bool,
    #[serde(default)]
    pub is_manually_edited: bool,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
}

impl DraftJobRecord {
    pub fn new(title: impl Into<String>, url: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            title: title.into(),
            company: None,
            location: None,
            description: None,
            url: url.into(),
            source: None,
            source_type,
            external_id: None,
            employment_type: None,
            posted_at: None,
            region: None,
            is_remote: None,
            is_trusted: false,
            is_manually_edited: false,
            requirements: Vec::new(),
            benefits: Vec::new(),
        }
    }

    pub fn dedup_key(&self) -> String {
        identity::dedup_key(
            self.external_id.as_deref(),
            &self.title,
            self.company.as_deref().unwrap_or(""),
            &self.url,
            self.source_type.as_str(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Closed,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub title: String,
    pub description: String,
}

/// Catalog-owned job record. Every optional field is explicit so the merger can
/// reason about presence field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanonicalJobRecord {
    pub id: String,
    pub company_id: Option<String>,
    pub dedup_key: Option<String>,

    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub source: Option<String>,
    pub source_type: Option<SourceType>,
    pub external_id: Option<String>,
    pub employment_type: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub region: Option<String>,
    pub is_remote: Option<bool>,
    pub is_trusted: Option<bool>,
    pub requirements: Vec<String>,
    pub benefits: Vec<String>,

    pub category: Option<String>,
    pub industry: Option<String>,
    pub experience_level: Option<String>,
    pub tags: Vec<String>,
    /// Free text ("$150k") or a structured range such as `{"min":..,"max":..,"currency":..}`.
    pub salary: Option<Value>,
    pub timezone: Option<String>,

    pub status: Option<JobStatus>,
    pub is_manually_edited: Option<bool>,
    pub is_approved: Option<bool>,
    pub is_featured: Option<bool>,
    pub can_refer: Option<bool>,
    pub risk_rating: Option<String>,
    pub admin_comment: Option<String>,

    pub translations: BTreeMap<String, Translation>,
    pub is_translated: Option<bool>,
    pub translated_at: Option<DateTime<Utc>>,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,

    /// Fields this crate does not model (admin flags like `hiddenFields`). Kept so
    /// a load/save cycle writes them back unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanonicalJobRecord {
    /// Promote a validated draft. The dedup key doubles as the id of a new record.
    pub fn from_draft(draft: DraftJobRecord, now: DateTime<Utc>) -> Self {
        let key = draft.dedup_key();
        Self {
            id: key.clone(),
            company_id: None,
            dedup_key: Some(key),
            title: draft.title,
            company: draft.company,
            location: draft.location,
            description: draft.description,
            url: draft.url,
            source: draft.source,
            source_type: Some(draft.source_type),
            external_id: draft.external_id,
            employment_type: draft.employment_type,
            posted_at: draft.posted_at,
            region: draft.region,
            is_remote: draft.is_remote,
            is_trusted: Some(draft.is_trusted),
            requirements: draft.requirements,
            benefits: draft.benefits,
            status: Some(JobStatus::Active),
            created_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        }
    }

    /// Stored key when present, otherwise derived from the identity fields.
    pub fn key(&self) -> String {
        match &self.dedup_key {
            Some(key) if !key.is_empty() => key.clone(),
            _ => identity::dedup_key(
                self.external_id.as_deref(),
                &self.title,
                self.company.as_deref().unwrap_or(""),
                &self.url,
                self.source_type.map(|s| s.as_str()).unwrap_or(""),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawStatus {
    #[default]
    Raw,
    Processed,
}

/// One feed entry as downloaded, before any interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFeedItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: Option<String>,
    pub guid: String,
    pub source: String,
    pub category: Option<String>,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub status: RawStatus,
}

/// A company whose career page is crawled directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub website: Option<String>,
    pub careers_page: Option<String>,
    pub logo: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub tags: Vec<String>,
    pub can_refer: bool,
    pub last_crawled_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Company {
    /// Careers page first, homepage as a fallback crawl target.
    pub fn crawl_url(&self) -> Option<&str> {
        usable_url(self.careers_page.as_deref()).or_else(|| usable_url(self.website.as_deref()))
    }
}

fn usable_url(url: Option<&str>) -> Option<&str> {
    url.map(str::trim).filter(|u| !u.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub category: String,
    pub url: String,
}
