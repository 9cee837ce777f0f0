//! Quality gate applied to every draft before it reaches the catalog.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::{DraftJobRecord, SourceType};
use crate::text::{non_blank, strip_html};

pub const MIN_DESC_LEN_HIGH_TRUST: usize = 200;
pub const MIN_DESC_LEN_LOW_TRUST: usize = 50;

const PLACEHOLDER_COMPANIES: &[&str] = &["unknown company", "unknown", "null", "undefined", "n/a", "none"];

static BLACKLISTED_TITLES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^privacy( policy| notice| statement)?$",
        r"(?i)^terms( of (use|service)| and conditions| & conditions)?$",
        r"(?i)^cookies?( policy| settings| preferences)?$",
        r"(?i)^legal( notice)?$",
        r"(?i)^imprint$",
        r"(?i)^security$",
        r"(?i)^accessibility( statement)?$",
        r"(?i)^sitemap$",
        r"(?i)^test( job| posting)?\s*\d*$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static BAD_DESCRIPTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^privacy policy$",
        r"(?i)^terms of use$",
        r"(?i)^measure measure$",
        r"(?i)read [\w'’ ]*website terms of use",
        r"(?i)accept.*cookie",
        r"(?i)^loading\.\.\.$",
        r"(?i)^enable javascript",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const SECURITY_ROLE_HINTS: &[&str] = &["engineer", "analyst", "manager"];
const OFFICE_ONLY_HINTS: &[&str] = &["on-site", "onsite", "on site", "in-office", "in office", "office-based", "office based", "office only"];
const REMOTE_HINTS: &[&str] = &["remote", "hybrid", "anywhere", "work from home", "wfh", "distributed", "worldwide"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    InvalidCompanyName,
    InvalidTitle,
    MissingDescription,
    DescriptionTooShort,
    InvalidDescriptionContent,
    OfflineJob,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::InvalidCompanyName => "INVALID_COMPANY_NAME",
            ReasonCode::InvalidTitle => "INVALID_TITLE",
            ReasonCode::MissingDescription => "MISSING_DESCRIPTION",
            ReasonCode::DescriptionTooShort => "DESCRIPTION_TOO_SHORT",
            ReasonCode::InvalidDescriptionContent => "INVALID_DESCRIPTION_CONTENT",
            ReasonCode::OfflineJob => "OFFLINE_JOB",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub reason_code: Option<ReasonCode>,
}

impl ValidationVerdict {
    pub fn accept() -> Self {
        Self { is_valid: true, reason_code: None }
    }

    pub fn reject(reason: ReasonCode) -> Self {
        Self { is_valid: false, reason_code: Some(reason) }
    }
}

pub fn min_description_len(tier: SourceType) -> usize {
    if tier.is_high_trust() {
        MIN_DESC_LEN_HIGH_TRUST
    } else {
        MIN_DESC_LEN_LOW_TRUST
    }
}

/// Run the ordered quality checks, stopping at the first failure.
pub fn validate(draft: &DraftJobRecord, tier: SourceType) -> ValidationVerdict {
    if draft.is_manually_edited {
        return ValidationVerdict::accept();
    }

    match first_failure(draft, tier) {
        Some(reason) => ValidationVerdict::reject(reason),
        None => ValidationVerdict::accept(),
    }
}

fn first_failure(draft: &DraftJobRecord, tier: SourceType) -> Option<ReasonCode> {
    let company = non_blank(draft.company.as_deref());
    if company.map_or(true, is_placeholder_company) {
        return Some(ReasonCode::InvalidCompanyName);
    }

    let description = non_blank(draft.description.as_deref());
    let title = draft.title.trim();
    if title.is_empty() || (is_blacklisted_title(title) && !is_security_role(title, description)) {
        return Some(ReasonCode::InvalidTitle);
    }

    let Some(description) = description else {
        return Some(ReasonCode::MissingDescription);
    };

    let cleaned = strip_html(description);
    if cleaned.chars().count() < min_description_len(tier) {
        return Some(ReasonCode::DescriptionTooShort);
    }

    if BAD_DESCRIPTION_PATTERNS.iter().any(|re| re.is_match(&cleaned)) {
        return Some(ReasonCode::InvalidDescriptionContent);
    }

    if is_offline(draft.location.as_deref().unwrap_or(""), title) {
        return Some(ReasonCode::OfflineJob);
    }

    None
}

fn is_placeholder_company(name: &str) -> bool {
    let lower = name.to_lowercase();
    PLACEHOLDER_COMPANIES.contains(&lower.as_str())
}

fn is_blacklisted_title(title: &str) -> bool {
    BLACKLISTED_TITLES.iter().any(|re| re.is_match(title))
}

/// "Security" alone is usually a footer link, but is a real role when the body says so.
fn is_security_role(title: &str, description: Option<&str>) -> bool {
    if !title.eq_ignore_ascii_case("security") {
        return false;
    }
    let description = description.unwrap_or("").to_lowercase();
    SECURITY_ROLE_HINTS.iter().any(|hint| description.contains(hint))
}

fn is_offline(location: &str, title: &str) -> bool {
    let location = location.to_lowercase();
    let title = title.to_lowercase();
    let office_only = OFFICE_ONLY_HINTS.iter().any(|hint| location.contains(hint));
    let remote = REMOTE_HINTS
        .iter()
        .any(|hint| location.contains(hint) || title.contains(hint));
    office_only && !remote
}
