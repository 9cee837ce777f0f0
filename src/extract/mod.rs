//! Job extraction from career pages.
//!
//! Strategies run in confidence order and the first one that yields anything wins.
//! Results are never merged across strategies.

pub mod detail;
pub mod feed;
mod keyword;
mod platform;
mod structured;

use std::collections::HashSet;

use scraper::{ElementRef, Html};
use tracing::{debug, warn};
use url::Url;

use crate::model::{DraftJobRecord, SourceType};
use crate::text::clean_text;

pub const DEFAULT_LOCATION: &str = "Remote";
pub const DEFAULT_EMPLOYMENT_TYPE: &str = "Full-time";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Ashby board data, JSON-LD `JobPosting` blocks, then framework hydration payloads.
    StructuredData,
    /// Known applicant-tracking-system markup.
    Platform,
    /// Anchors whose text reads like a job title.
    KeywordAnchors,
}

pub const CASCADE: [Strategy; 3] = [Strategy::StructuredData, Strategy::Platform, Strategy::KeywordAnchors];

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::StructuredData => "structured-data",
            Strategy::Platform => "platform",
            Strategy::KeywordAnchors => "keyword-anchors",
        }
    }

    fn run(&self, document: &Html, base: &Url) -> Vec<DraftJobRecord> {
        match self {
            Strategy::StructuredData => structured::extract(document, base),
            Strategy::Platform => platform::extract(document, base),
            Strategy::KeywordAnchors => keyword::extract(document, base),
        }
    }
}

#[derive(Debug, Default)]
pub struct Extraction {
    /// Strategy that produced `jobs`; `None` when nothing matched.
    pub strategy: Option<Strategy>,
    pub jobs: Vec<DraftJobRecord>,
}

/// Run the cascade over one career page.
pub fn extract_jobs(html: &str, base_url: &str) -> Extraction {
    let base = match Url::parse(base_url) {
        Ok(u) => u,
        Err(e) => {
            warn!("Cannot extract from {}: bad base URL ({})", base_url, e);
            return Extraction::default();
        }
    };

    let document = Html::parse_document(html);
    for strategy in CASCADE {
        let jobs = strategy.run(&document, &base);
        if !jobs.is_empty() {
            debug!("{} found {} jobs on {}", strategy.name(), jobs.len(), base_url);
            return Extraction { strategy: Some(strategy), jobs };
        }
    }
    Extraction::default()
}

/// Draft with the defaults every page strategy applies.
fn page_draft(title: String, url: String) -> DraftJobRecord {
    let mut draft = DraftJobRecord::new(title, url, SourceType::Trusted);
    draft.is_trusted = true;
    draft.location = Some(DEFAULT_LOCATION.to_string());
    draft.employment_type = Some(DEFAULT_EMPLOYMENT_TYPE.to_string());
    draft
}

/// Resolve `href` against `base`, keeping only http(s) results.
pub(crate) fn absolute_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Keep the first record for each key.
fn dedup_by<F>(jobs: Vec<DraftJobRecord>, key: F) -> Vec<DraftJobRecord>
where
    F: Fn(&DraftJobRecord) -> String,
{
    let mut seen = HashSet::new();
    jobs.into_iter().filter(|job| seen.insert(key(job))).collect()
}
