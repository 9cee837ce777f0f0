use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{absolute_url, dedup_by, page_draft, DEFAULT_EMPLOYMENT_TYPE, DEFAULT_LOCATION};
use crate::error::ParseError;
use crate::model::DraftJobRecord;

static JSON_LD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static HYDRATION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#__NEXT_DATA__, #__NUXT__").unwrap());
static SCRIPTS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());

/// Ashby job boards assign their listing to this global before rendering.
const ASHBY_APP_DATA: &str = "window.__appData";

const HYDRATION_URL_KEYS: &[&str] = &["url", "absolute_url", "application_url", "shortlink"];

pub(super) fn extract(document: &Html, base: &Url) -> Vec<DraftJobRecord> {
    let mut jobs = from_ashby(document, base);

    if jobs.is_empty() {
        jobs = job_postings(document)
            .iter()
            .filter_map(|posting| from_job_posting(posting, base))
            .collect();
    }

    if jobs.is_empty() {
        jobs = from_hydration(document, base);
    }

    dedup_by(jobs, |job| format!("{}|{}", job.title, job.url))
}

/// Every `JobPosting` object in the page's JSON-LD blocks. Unparseable blocks are skipped.
pub(crate) fn job_postings(document: &Html) -> Vec<Value> {
    let mut postings = Vec::new();
    for script in document.select(&JSON_LD) {
        match parse_block(&script.text().collect::<String>()) {
            Ok(value) => collect_postings(value, &mut postings),
            Err(e) => debug!("Skipping JSON-LD block: {}", e),
        }
    }
    postings
}

fn parse_block(raw: &str) -> Result<Value, ParseError> {
    Ok(serde_json::from_str(raw.trim())?)
}

fn collect_postings(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|item| collect_postings(item, out)),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                collect_postings(graph, out);
            }
            let value = Value::Object(map);
            if is_job_posting(&value) {
                out.push(value);
            }
        }
        _ => {}
    }
}

fn is_job_posting(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == "JobPosting",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("JobPosting")),
        _ => false,
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

fn from_job_posting(posting: &Value, base: &Url) -> Option<DraftJobRecord> {
    let title = str_field(posting, "title").or_else(|| str_field(posting, "name"))?;
    let url = str_field(posting, "url")
        .and_then(|u| absolute_url(base, u))
        .unwrap_or_else(|| base.to_string());

    let mut draft = page_draft(title.to_string(), url);
    draft.location = Some(posting_location(posting).unwrap_or_else(|| DEFAULT_LOCATION.to_string()));
    draft.employment_type =
        Some(employment_type(posting).unwrap_or_else(|| DEFAULT_EMPLOYMENT_TYPE.to_string()));
    draft.description = str_field(posting, "description").map(str::to_string);
    draft.posted_at = str_field(posting, "datePosted").and_then(parse_date);
    draft.company = posting
        .get("hiringOrganization")
        .and_then(|org| match org {
            Value::String(name) => Some(name.trim()),
            other => str_field(other, "name"),
        })
        .map(str::to_string);
    if str_field(posting, "jobLocationType") == Some("TELECOMMUTE") {
        draft.is_remote = Some(true);
    }
    Some(draft)
}

fn posting_location(posting: &Value) -> Option<String> {
    let location = match posting.get("jobLocation")? {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let address = location.get("address").unwrap_or(location);
    if let Value::String(s) = address {
        return Some(s.trim().to_string()).filter(|s| !s.is_empty());
    }
    ["addressLocality", "addressRegion", "addressCountry"]
        .iter()
        .find_map(|key| str_field(address, key))
        .map(str::to_string)
}

fn employment_type(posting: &Value) -> Option<String> {
    match posting.get("employmentType")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// The object assigned to `window.__appData`. Only the first JSON value after the
/// `=` is read, so whatever the script does next is ignored.
fn ashby_app_data(document: &Html) -> Option<Value> {
    document.select(&SCRIPTS).find_map(|script| {
        let text = script.text().collect::<String>();
        let start = text.find(ASHBY_APP_DATA)? + ASHBY_APP_DATA.len();
        let rest = text[start..].trim_start().strip_prefix('=')?;
        match serde_json::Deserializer::from_str(rest).into_iter::<Value>().next()? {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Skipping Ashby app data: {}", e);
                None
            }
        }
    })
}

/// Listed postings from an Ashby board. Unlisted ones are drafts or internal roles.
fn from_ashby(document: &Html, base: &Url) -> Vec<DraftJobRecord> {
    let Some(app) = ashby_app_data(document) else {
        return Vec::new();
    };
    let Some(postings) = app.pointer("/jobBoard/jobPostings").and_then(Value::as_array) else {
        return Vec::new();
    };
    let company = app.pointer("/organization/name").and_then(Value::as_str).map(str::trim);
    let board = base.as_str().trim_end_matches('/');

    postings
        .iter()
        .filter(|posting| posting.get("isListed").and_then(Value::as_bool) == Some(true))
        .filter_map(|posting| from_ashby_posting(posting, board, company))
        .collect()
}

fn from_ashby_posting(posting: &Value, board: &str, company: Option<&str>) -> Option<DraftJobRecord> {
    let title = str_field(posting, "title")?;
    let id = str_field(posting, "id")?;
    let mut draft = page_draft(title.to_string(), format!("{}/{}", board, id));

    let location = str_field(posting, "locationName").unwrap_or(DEFAULT_LOCATION);
    let workplace = str_field(posting, "workplaceType");
    draft.location = Some(match workplace {
        Some(kind) if !location.to_lowercase().contains(&kind.to_lowercase()) => format!("{} ({})", location, kind),
        _ => location.to_string(),
    });
    draft.employment_type = Some(ashby_employment_type(str_field(posting, "employmentType")).to_string());
    draft.is_remote = Some(is_remote_listing(location, workplace));
    draft.external_id = Some(format!("ashby_{}", id));
    draft.posted_at = str_field(posting, "publishedDate").and_then(parse_date);
    draft.description = str_field(posting, "descriptionHtml")
        .or_else(|| str_field(posting, "descriptionPlain"))
        .map(str::to_string);
    draft.company = company.filter(|name| !name.is_empty()).map(str::to_string);
    Some(draft)
}

fn ashby_employment_type(raw: Option<&str>) -> &'static str {
    let Some(raw) = raw else {
        return DEFAULT_EMPLOYMENT_TYPE;
    };
    let lower = raw.to_lowercase();
    if lower.contains("part") {
        "Part-time"
    } else if lower.contains("contract") {
        "Contract"
    } else if lower.contains("freelance") {
        "Freelance"
    } else if lower.contains("intern") {
        "Internship"
    } else if lower.contains("temp") {
        "Temporary"
    } else {
        DEFAULT_EMPLOYMENT_TYPE
    }
}

fn is_remote_listing(location: &str, workplace: Option<&str>) -> bool {
    let location = location.to_lowercase();
    workplace.is_some_and(|w| w.to_lowercase().contains("remote"))
        || ["remote", "anywhere", "worldwide"].iter().any(|word| location.contains(word))
}

fn from_hydration(document: &Html, base: &Url) -> Vec<DraftJobRecord> {
    let Some(script) = document.select(&HYDRATION).next() else {
        return Vec::new();
    };
    match parse_block(&script.text().collect::<String>()) {
        Ok(value) => {
            let mut jobs = Vec::new();
            find_job_arrays(&value, base, &mut jobs);
            jobs
        }
        Err(e) => {
            debug!("Skipping hydration payload: {}", e);
            Vec::new()
        }
    }
}

fn hydration_url(item: &Value) -> Option<&str> {
    HYDRATION_URL_KEYS.iter().find_map(|key| str_field(item, key))
}

fn looks_like_job(item: &Value) -> bool {
    str_field(item, "title").is_some() && hydration_url(item).is_some()
}

/// An array counts only when every element looks like a job; otherwise descend.
fn find_job_arrays(value: &Value, base: &Url, out: &mut Vec<DraftJobRecord>) {
    match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(looks_like_job) => {
            out.extend(items.iter().filter_map(|item| from_hydration_item(item, base)));
        }
        Value::Array(items) => items.iter().for_each(|item| find_job_arrays(item, base, out)),
        Value::Object(map) => map.values().for_each(|v| find_job_arrays(v, base, out)),
        _ => {}
    }
}

fn from_hydration_item(item: &Value, base: &Url) -> Option<DraftJobRecord> {
    let title = str_field(item, "title")?;
    let url = hydration_url(item)
        .and_then(|u| absolute_url(base, u))
        .unwrap_or_else(|| base.to_string());

    let mut draft = page_draft(title.to_string(), url);
    let location = item
        .get("location")
        .and_then(|loc| str_field(loc, "location_str").or_else(|| loc.as_str()))
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(location) = location {
        draft.location = Some(location.to_string());
    }
    if let Some(kind) = str_field(item, "employment_type").or_else(|| str_field(item, "type")) {
        draft.employment_type = Some(kind.to_string());
    }
    draft.description = str_field(item, "description")
        .or_else(|| str_field(item, "short_description"))
        .map(str::to_string);
    Some(draft)
}
