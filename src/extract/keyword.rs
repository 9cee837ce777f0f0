use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use super::{absolute_url, dedup_by, element_text, page_draft};
use crate::model::DraftJobRecord;

static ANCHORS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

const ROLE_KEYWORDS: &[&str] = &[
    "Engineer",
    "Developer",
    "Manager",
    "Designer",
    "Specialist",
    "Analyst",
    "Director",
    "Head of",
];

/// Anchor texts outside this open interval are navigation or prose, not titles.
const MIN_TITLE_LEN: usize = 5;
const MAX_TITLE_LEN: usize = 100;

pub(super) fn extract(document: &Html, base: &Url) -> Vec<DraftJobRecord> {
    let jobs = document
        .select(&ANCHORS)
        .filter_map(|anchor| {
            let text = element_text(anchor);
            if !looks_like_title(&text) {
                return None;
            }
            let url = absolute_url(base, anchor.value().attr("href")?)?;
            Some(page_draft(text, url))
        })
        .collect();
    dedup_by(jobs, |job| job.url.clone())
}

fn looks_like_title(text: &str) -> bool {
    let len = text.chars().count();
    len > MIN_TITLE_LEN && len < MAX_TITLE_LEN && ROLE_KEYWORDS.iter().any(|k| text.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(html: &str) -> Vec<DraftJobRecord> {
        extract(&Html::parse_document(html), &Url::parse("https://acme.io/careers/").unwrap())
    }

    #[test]
    fn keeps_role_like_anchors() {
        let html = r#"<nav><a href="/">Home</a><a href="/blog">Blog</a></nav>
            <ul><li><a href="roles/be">Senior Backend Engineer</a></li>
                <li><a href="https://acme.io/careers/roles/be">Senior Backend Engineer (again)</a></li>
                <li><a href="/roles/head">Head of Growth</a></li></ul>"#;
        let jobs = run(html);
        let titles: Vec<_> = jobs.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Senior Backend Engineer", "Head of Growth"]);
        assert_eq!(jobs[0].url, "https://acme.io/careers/roles/be");
        assert_eq!(jobs[0].location.as_deref(), Some("Remote"));
    }

    #[test]
    fn length_bounds_are_exclusive() {
        assert!(!looks_like_title("Ana"));
        assert!(!looks_like_title("Engineer ".repeat(12).trim()));
        assert!(looks_like_title("QA Analyst"));
    }

    #[test]
    fn skips_non_http_links() {
        let html = r#"<a href="mailto:talent@acme.io">Email our Engineering Manager</a>"#;
        assert!(run(html).is_empty());
    }
}
