use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{absolute_url, dedup_by, element_text, page_draft};
use crate::model::DraftJobRecord;

/// Row, title and location selectors for one applicant tracking system.
struct Signature {
    name: &'static str,
    row: Selector,
    title: Option<Selector>,
    link: Selector,
    location: Selector,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static SIGNATURES: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    vec![
        Signature {
            name: "greenhouse",
            row: selector(".opening"),
            title: None,
            link: selector("a[href]"),
            location: selector(".location"),
        },
        Signature {
            name: "lever",
            row: selector(".posting"),
            title: Some(selector(r#".posting-title h5, [data-qa="posting-name"]"#)),
            link: selector("a.posting-title[href], a[href]"),
            location: selector(".posting-categories .location, .sort-by-location"),
        },
        Signature {
            name: "workable",
            row: selector(r#"[data-ui="job"]"#),
            title: Some(selector(r#"[data-ui="job-title"]"#)),
            link: selector("a[href]"),
            location: selector(r#"[data-ui="job-location"]"#),
        },
    ]
});

pub(super) fn extract(document: &Html, base: &Url) -> Vec<DraftJobRecord> {
    for signature in SIGNATURES.iter() {
        let jobs: Vec<DraftJobRecord> = document
            .select(&signature.row)
            .filter_map(|row| from_row(signature, row, base))
            .collect();
        if !jobs.is_empty() {
            tracing::debug!("Matched {} markup ({} rows)", signature.name, jobs.len());
            return dedup_by(jobs, |job| job.url.clone());
        }
    }
    Vec::new()
}

fn from_row(signature: &Signature, row: ElementRef<'_>, base: &Url) -> Option<DraftJobRecord> {
    let link = row.select(&signature.link).next()?;
    let url = absolute_url(base, link.value().attr("href")?)?;

    let title = signature
        .title
        .as_ref()
        .and_then(|sel| row.select(sel).next())
        .map(element_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| element_text(link));
    if title.is_empty() {
        return None;
    }

    let mut draft = page_draft(title, url);
    if let Some(location) = row
        .select(&signature.location)
        .next()
        .map(element_text)
        .filter(|l| !l.is_empty())
    {
        draft.location = Some(location);
    }
    Some(draft)
}
