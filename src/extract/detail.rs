//! Description, requirements and benefits from a single job page.

use std::sync::LazyLock;
use std::time::Duration;

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};

use url::Url;

use super::{absolute_url, element_text};
use super::structured::job_postings;
use crate::fetch::Fetcher;
use crate::text::{clean_text, strip_html, truncate_chars};

pub const MAX_DESCRIPTION_CHARS: usize = 5000;
/// Generic content blocks shorter than this are navigation or teasers.
const MIN_CONTENT_CHARS: usize = 100;
const MAX_LIST_ITEMS: usize = 20;

static CONTENT_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        ".job-description",
        r#"[data-ui="job-description"]"#,
        ".description",
        r#"[class*="description"]"#,
        ".job-details",
        r#"[class*="details"]"#,
        ".content",
        r#"[class*="content"]"#,
        "article",
        "main",
        r#"[role="main"]"#,
    ]
    .iter()
    .map(|css| Selector::parse(css).unwrap())
    .collect()
});

static REQUIREMENT_ITEMS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        r#".requirements li, .qualifications li, [class*="requirement"] li, [data-ui="requirements"] li"#,
    )
    .unwrap()
});

static BENEFIT_ITEMS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#".benefits li, .perks li, [class*="benefit"] li, [data-ui="benefits"] li"#).unwrap()
});

static META_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:description"], meta[name="description"]"#).unwrap()
});
static FALLBACK_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#".description, [class*="description"], main p, article p, .hero-text, .intro-text"#).unwrap()
});
static META_IMAGE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:image"], meta[name="twitter:image"]"#).unwrap()
});
static ICON: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"link[rel="icon"], link[rel="shortcut icon"], link[rel="apple-touch-icon"]"#).unwrap()
});

const MAX_PROFILE_DESCRIPTION_CHARS: usize = 300;

/// Company metadata read from a homepage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyProfile {
    pub description: Option<String>,
    pub logo: Option<String>,
}

pub fn parse_company_profile(html: &str, base: &Url) -> CompanyProfile {
    let document = Html::parse_document(html);
    let attr = |selector: &Selector, name: &str| {
        document
            .select(selector)
            .filter_map(|el| el.value().attr(name))
            .map(clean_text)
            .find(|v| !v.is_empty())
    };

    let description = attr(&META_DESCRIPTION, "content")
        .filter(|d| d.chars().count() >= 50)
        .or_else(|| {
            document
                .select(&FALLBACK_DESCRIPTION)
                .map(element_text)
                .find(|t| t.chars().count() > 20)
                .map(|t| truncate_chars(&t, MAX_PROFILE_DESCRIPTION_CHARS))
        })
        .or_else(|| attr(&META_DESCRIPTION, "content"));

    let logo = attr(&ICON, "href")
        .or_else(|| attr(&META_IMAGE, "content"))
        .and_then(|href| absolute_url(base, &href));

    CompanyProfile { description, logo }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobDetails {
    pub description: String,
    pub requirements: Vec<String>,
    pub benefits: Vec<String>,
}

/// Fetch and parse a job page. Any failure, including the timeout, yields `None`.
pub async fn fetch_job_details(fetcher: &dyn Fetcher, url: &str, timeout: Duration) -> Option<JobDetails> {
    let html = match tokio::time::timeout(timeout, fetcher.fetch(url)).await {
        Ok(Ok(html)) => html,
        Ok(Err(e)) => {
            warn!("Detail fetch failed for {}: {}", url, e);
            return None;
        }
        Err(_) => {
            warn!("Detail fetch timed out for {}", url);
            return None;
        }
    };
    let details = parse_job_details(&html);
    debug!("Extracted {} chars for {}", details.description.chars().count(), url);
    Some(details).filter(|d| !d.description.is_empty())
}

pub fn parse_job_details(html: &str) -> JobDetails {
    let document = Html::parse_document(html);

    if let Some(details) = job_postings(&document).iter().find_map(from_posting) {
        return details;
    }

    let description = CONTENT_SELECTORS
        .iter()
        .flat_map(|sel| document.select(sel))
        .map(element_text)
        .find(|text| text.chars().count() > MIN_CONTENT_CHARS)
        .unwrap_or_default();

    JobDetails {
        description: truncate_chars(&description, MAX_DESCRIPTION_CHARS),
        requirements: list_items(&document, &REQUIREMENT_ITEMS),
        benefits: list_items(&document, &BENEFIT_ITEMS),
    }
}

fn list_items(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(element_text)
        .filter(|t| t.len() > 5 && t.len() < 500)
        .take(MAX_LIST_ITEMS)
        .collect()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    let items: Vec<&Value> = match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(v) => vec![v],
        None => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(strip_html(s)),
            Value::Null => None,
            other => Some(clean_text(&other.to_string())),
        })
        .filter(|s| !s.is_empty())
        .take(MAX_LIST_ITEMS)
        .collect()
}

fn from_posting(posting: &Value) -> Option<JobDetails> {
    let description = strip_html(posting.get("description")?.as_str()?);
    if description.is_empty() {
        return None;
    }
    let mut requirements = string_list(posting.get("responsibilities"));
    requirements.extend(string_list(posting.get("qualifications")));
    requirements.truncate(MAX_LIST_ITEMS);
    Some(JobDetails {
        description: truncate_chars(&description, MAX_DESCRIPTION_CHARS),
        requirements,
        benefits: string_list(posting.get("jobBenefits")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_ld_details_win() {
        let html = r#"<script type="application/ld+json">{"@type":"JobPosting","title":"SRE",
            "description":"<p>Keep the lights on.</p>","qualifications":["5 years Linux","On-call"],
            "jobBenefits":"Equity"}</script><main>ignored</main>"#;
        let details = parse_job_details(html);
        assert_eq!(details.description, "Keep the lights on.");
        assert_eq!(details.requirements, vec!["5 years Linux", "On-call"]);
        assert_eq!(details.benefits, vec!["Equity"]);
    }

    #[test]
    fn generic_content_needs_substance() {
        let long = "We are hiring an engineer to build reliable ingestion systems. ".repeat(3);
        let html = format!(
            r#"<div class="content">Short teaser</div><article>{}</article>
               <ul class="benefits"><li>Remote budget</li><li>ok</li></ul>"#,
            long
        );
        let details = parse_job_details(&html);
        assert_eq!(details.description, long.trim());
        assert_eq!(details.benefits, vec!["Remote budget"]);
    }

    #[test]
    fn later_matches_of_a_selector_are_considered() {
        let long = "Own the billing pipeline end to end and mentor two engineers. ".repeat(3);
        let html = format!(
            r#"<div class="description">Apply now</div><div class="description">{}</div>"#,
            long
        );
        let details = parse_job_details(&html);
        assert_eq!(details.description, long.trim());
    }

    #[test]
    fn company_profile_from_meta_tags() {
        let html = r#"<head>
            <meta name="description" content="Acme builds payment rails for small businesses across Europe and beyond.">
            <link rel="icon" href="/favicon.png"></head>"#;
        let base = Url::parse("https://acme.io/").unwrap();
        let profile = parse_company_profile(html, &base);
        assert!(profile.description.unwrap().starts_with("Acme builds payment rails"));
        assert_eq!(profile.logo.as_deref(), Some("https://acme.io/favicon.png"));
    }

    #[test]
    fn short_meta_description_falls_back_to_body() {
        let html = r#"<meta name="description" content="Acme"><main><p>We make invoicing painless for freelancers.</p></main>"#;
        let base = Url::parse("https://acme.io/").unwrap();
        let profile = parse_company_profile(html, &base);
        assert_eq!(profile.description.as_deref(), Some("We make invoicing painless for freelancers."));
        assert_eq!(profile.logo, None);
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let html = format!("<main>{}</main>", "a".repeat(6000));
        let details = parse_job_details(&html);
        assert_eq!(details.description.chars().count(), MAX_DESCRIPTION_CHARS + 3);
        assert!(details.description.ends_with("..."));
    }
}
