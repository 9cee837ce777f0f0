//! RSS 2.0 / Atom parsing and the feed-entry to draft mapping.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use regex::Regex;

use super::{DEFAULT_EMPLOYMENT_TYPE, DEFAULT_LOCATION};
use crate::error::ParseError;
use crate::identity::short_hash;
use crate::model::{DraftJobRecord, FeedSource, RawFeedItem, RawStatus, SourceType};

pub const UNKNOWN_COMPANY: &str = "Unknown Company";
pub const FEED_REGION: &str = "overseas";

/// Captured company names at or above this many chars are sentence fragments.
const MAX_COMPANY_LEN: usize = 50;

static AT_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\s+at\s+([^(\-|,)]+)").unwrap());
static COLON_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([^:]+):\s").unwrap());
static DASH_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+-\s+([^-]+)$").unwrap());

/// One `<item>` or `<entry>` with its text fields.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub description: String,
    pub content: String,
    pub pub_date: String,
    pub guid: String,
    pub category: String,
}

impl FeedEntry {
    /// Longer of summary and full content.
    pub fn body(&self) -> &str {
        if self.content.chars().count() > self.description.chars().count() {
            &self.content
        } else {
            &self.description
        }
    }
}

/// Entries parsed before the document ended or broke.
#[derive(Debug, Default)]
pub struct ParsedFeed {
    pub entries: Vec<FeedEntry>,
    pub error: Option<ParseError>,
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    Content,
    PubDate,
    Guid,
    Category,
}

impl Field {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" | b"summary" => Some(Field::Description),
            b"content:encoded" | b"content" => Some(Field::Content),
            b"pubDate" | b"published" | b"updated" | b"dc:date" => Some(Field::PubDate),
            b"guid" | b"id" => Some(Field::Guid),
            b"category" => Some(Field::Category),
            _ => None,
        }
    }

    fn slot<'a>(&self, entry: &'a mut FeedEntry) -> &'a mut String {
        match self {
            Field::Title => &mut entry.title,
            Field::Link => &mut entry.link,
            Field::Description => &mut entry.description,
            Field::Content => &mut entry.content,
            Field::PubDate => &mut entry.pub_date,
            Field::Guid => &mut entry.guid,
            Field::Category => &mut entry.category,
        }
    }
}

fn is_entry_tag(name: &[u8]) -> bool {
    name == b"item" || name == b"entry"
}

fn text_of(e: &BytesText<'_>) -> String {
    match e.unescape() {
        Ok(s) => s.into_owned(),
        Err(_) => String::from_utf8_lossy(e).into_owned(),
    }
}

fn attr(e: &BytesStart<'_>, key: &str) -> Result<Option<String>, quick_xml::Error> {
    match e.try_get_attribute(key)? {
        Some(a) => Ok(Some(a.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Atom `<link href>` and `<category term>` carry their value as an attribute.
fn apply_attributes(e: &BytesStart<'_>, entry: &mut FeedEntry) -> Result<(), quick_xml::Error> {
    match e.name().as_ref() {
        b"link" if entry.link.is_empty() => {
            let rel = attr(e, "rel")?;
            if rel.as_deref().map_or(true, |r| r == "alternate") {
                if let Some(href) = attr(e, "href")? {
                    entry.link = href.trim().to_string();
                }
            }
        }
        b"category" if entry.category.is_empty() => {
            if let Some(term) = attr(e, "term")? {
                entry.category = term.trim().to_string();
            }
        }
        _ => {}
    }
    Ok(())
}

#[derive(Default)]
struct FeedState {
    entries: Vec<FeedEntry>,
    current: Option<FeedEntry>,
    field: Option<Field>,
}

impl FeedState {
    fn handle(&mut self, event: Event<'_>) -> Result<(), quick_xml::Error> {
        match event {
            Event::Start(e) if is_entry_tag(e.name().as_ref()) => {
                self.current = Some(FeedEntry::default());
                self.field = None;
            }
            Event::Start(e) => {
                if let Some(entry) = self.current.as_mut() {
                    apply_attributes(&e, entry)?;
                    // First occurrence wins; nested <source><id> and the like are ignored.
                    self.field = Field::from_tag(e.name().as_ref()).filter(|f| f.slot(entry).is_empty());
                }
            }
            Event::Empty(e) => {
                if let Some(entry) = self.current.as_mut() {
                    apply_attributes(&e, entry)?;
                }
            }
            Event::Text(t) => {
                if let (Some(entry), Some(f)) = (self.current.as_mut(), self.field) {
                    f.slot(entry).push_str(&text_of(&t));
                }
            }
            Event::CData(c) => {
                if let (Some(entry), Some(f)) = (self.current.as_mut(), self.field) {
                    f.slot(entry).push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) if is_entry_tag(e.name().as_ref()) => {
                if let Some(mut entry) = self.current.take() {
                    entry.title = entry.title.trim().to_string();
                    entry.link = entry.link.trim().to_string();
                    entry.guid = entry.guid.trim().to_string();
                    if !entry.title.is_empty() && !entry.link.is_empty() {
                        self.entries.push(entry);
                    }
                }
                self.field = None;
            }
            Event::End(_) => self.field = None,
            _ => {}
        }
        Ok(())
    }
}

/// Stream through an RSS or Atom document. A malformed document keeps the entries
/// completed before the error.
pub fn parse_feed(xml: &str) -> ParsedFeed {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut state = FeedState::default();
    let mut error = None;

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(event) => {
                if let Err(e) = state.handle(event) {
                    error = Some(e.into());
                    break;
                }
            }
            Err(e) => {
                error = Some(e.into());
                break;
            }
        }
    }

    ParsedFeed { entries: state.entries, error }
}

/// Tag parsed entries with their feed and a stable id.
pub fn into_raw_items(entries: Vec<FeedEntry>, source: &FeedSource, fetched_at: DateTime<Utc>) -> Vec<RawFeedItem> {
    entries
        .into_iter()
        .map(|entry| {
            let guid = if entry.guid.is_empty() { entry.link.clone() } else { entry.guid.clone() };
            let category = Some(entry.category.trim())
                .filter(|c| !c.is_empty())
                .unwrap_or(source.category.as_str())
                .to_string();
            RawFeedItem {
                id: format!("rss_{}", short_hash(&format!("{}|{}", source.name, guid))),
                title: entry.title.clone(),
                link: entry.link.clone(),
                description: entry.body().trim().to_string(),
                pub_date: Some(entry.pub_date.trim().to_string()).filter(|d| !d.is_empty()),
                guid,
                source: source.name.clone(),
                category: Some(category),
                fetched_at,
                status: RawStatus::Raw,
            }
        })
        .collect()
}

/// Company name from the usual title shapes, else the placeholder.
pub fn extract_company(title: &str) -> String {
    [&*AT_PATTERN, &*COLON_PATTERN, &*DASH_PATTERN]
        .iter()
        .find_map(|re| {
            let captured = re.captures(title)?.get(1)?.as_str();
            (captured.chars().count() < MAX_COMPANY_LEN).then(|| captured.trim().to_string())
        })
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| UNKNOWN_COMPANY.to_string())
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Map a stored feed item into a low-trust draft.
pub fn draft_from_feed_item(item: &RawFeedItem) -> DraftJobRecord {
    let mut draft = DraftJobRecord::new(item.title.clone(), item.link.clone(), SourceType::Rss);
    draft.company = Some(extract_company(&item.title));
    draft.description = Some(item.description.clone());
    draft.location = Some(DEFAULT_LOCATION.to_string());
    draft.employment_type = Some(DEFAULT_EMPLOYMENT_TYPE.to_string());
    draft.source = Some(item.source.clone());
    draft.external_id = Some(item.id.clone());
    draft.posted_at = item.pub_date.as_deref().and_then(parse_pub_date);
    draft.region = Some(FEED_REGION.to_string());
    draft.is_remote = Some(true);
    draft.is_trusted = false;
    draft
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
        <rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
        <channel><title>Remote jobs</title><link>https://feed.example</link>
          <item>
            <title>Acme: Senior Rust Engineer</title>
            <link>https://feed.example/jobs/1</link>
            <description><![CDATA[<p>Build things.</p>]]></description>
            <content:encoded><![CDATA[<p>Build things. Long form body with more detail.</p>]]></content:encoded>
            <pubDate>Tue, 05 Mar 2024 10:00:00 +0000</pubDate>
            <guid>wwr-1</guid>
          </item>
          <item><title>No link</title></item>
        </channel></rss>"#;

    #[test]
    fn parses_rss_items() {
        let parsed = parse_feed(RSS);
        assert!(parsed.error.is_none());
        assert_eq!(parsed.entries.len(), 1);
        let entry = &parsed.entries[0];
        assert_eq!(entry.title, "Acme: Senior Rust Engineer");
        assert_eq!(entry.guid, "wwr-1");
        assert_eq!(entry.body(), "<p>Build things. Long form body with more detail.</p>");
    }

    #[test]
    fn parses_atom_entries() {
        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom"><id>urn:feed</id>
            <entry><title>Designer at Globex</title>
              <link rel="alternate" href="https://globex.example/jobs/9"/>
              <id>urn:job:9</id><updated>2024-03-05T10:00:00Z</updated>
              <summary>Design systems &amp; tooling.</summary>
              <category term="design"/></entry></feed>"#;
        let parsed = parse_feed(atom);
        assert_eq!(parsed.entries.len(), 1);
        let entry = &parsed.entries[0];
        assert_eq!(entry.link, "https://globex.example/jobs/9");
        assert_eq!(entry.guid, "urn:job:9");
        assert_eq!(entry.description, "Design systems & tooling.");
        assert_eq!(entry.category, "design");
    }

    #[test]
    fn broken_document_keeps_completed_items() {
        let xml = r#"<rss><channel>
            <item><title>Ops Engineer at Initech</title><link>https://x.example/1</link></item>
            <item><title>Broken</title></wrong></channel></rss>"#;
        let parsed = parse_feed(xml);
        assert_eq!(parsed.entries.len(), 1);
        assert!(parsed.error.is_some());
    }

    #[test]
    fn company_from_title_shapes() {
        assert_eq!(extract_company("Backend Engineer at Acme Corp"), "Acme Corp");
        assert_eq!(extract_company("Acme: Backend Engineer"), "Acme");
        assert_eq!(extract_company("Backend Engineer - Acme"), "Acme");
        assert_eq!(extract_company("Backend Engineer"), UNKNOWN_COMPANY);
        let long = format!("{}: Engineer", "x".repeat(60));
        assert_eq!(extract_company(&long), UNKNOWN_COMPANY);
    }

    #[test]
    fn feed_item_maps_to_low_trust_draft() {
        let source = FeedSource { name: "WeWorkRemotely".into(), category: "all".into(), url: "https://feed.example".into() };
        let items = into_raw_items(parse_feed(RSS).entries, &source, Utc::now());
        let draft = draft_from_feed_item(&items[0]);
        assert_eq!(draft.source_type, SourceType::Rss);
        assert_eq!(draft.company.as_deref(), Some("Acme"));
        assert_eq!(draft.location.as_deref(), Some("Remote"));
        assert_eq!(draft.region.as_deref(), Some("overseas"));
        assert_eq!(draft.external_id.as_deref(), Some(items[0].id.as_str()));
        assert!(draft.posted_at.is_some());
        assert!(!draft.is_trusted);
        assert_eq!(items[0].category.as_deref(), Some("all"));
    }

    #[test]
    fn raw_ids_are_stable_per_source_and_guid() {
        let source = FeedSource { name: "Remotive".into(), category: "all".into(), url: String::new() };
        let a = into_raw_items(parse_feed(RSS).entries, &source, Utc::now());
        let b = into_raw_items(parse_feed(RSS).entries, &source, Utc::now());
        assert_eq!(a[0].id, b[0].id);
    }
}
