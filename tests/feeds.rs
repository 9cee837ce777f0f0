use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use catalog_ingest::config::Settings;
use catalog_ingest::error::FetchError;
use catalog_ingest::extract::feed::{draft_from_feed_item, into_raw_items, parse_feed};
use catalog_ingest::fetch::Fetcher;
use catalog_ingest::model::{CanonicalJobRecord, FeedSource, RawFeedItem, RawStatus, SourceType};
use catalog_ingest::pipeline::tasks::{FetchRssTask, ProcessRssTask};
use catalog_ingest::pipeline::{PipelineContext, Task};
use catalog_ingest::store::{self, RecordKind, SqliteStore, Store};

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("missing fixture {}: {}", path.display(), e))
}

struct FixtureFetcher(HashMap<&'static str, String>);

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.0
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status { url: url.to_string(), status: 503 })
    }
}

const RSS_URL: &str = "https://jobs.example.com/feed.rss";
const ATOM_URL: &str = "https://atom.example.com/feed.atom";

fn sources() -> Vec<FeedSource> {
    vec![
        FeedSource { name: "ExampleJobs".into(), category: "programming".into(), url: RSS_URL.into() },
        FeedSource { name: "AtomJobs".into(), category: "all".into(), url: ATOM_URL.into() },
        FeedSource { name: "DeadFeed".into(), category: "all".into(), url: "https://gone.example/rss".into() },
    ]
}

#[test]
fn rss_fixture_maps_to_drafts() {
    let parsed = parse_feed(&fixture("remote_feed.xml"));
    assert!(parsed.error.is_none());
    assert_eq!(parsed.entries.len(), 4);

    let source = &sources()[0];
    let items = into_raw_items(parsed.entries, source, Utc::now());
    assert_eq!(items[0].category.as_deref(), Some("Programming"));
    assert_eq!(items[1].category.as_deref(), Some("programming"));
    assert_eq!(items[1].guid, "umbrella-backend-77");
    assert!(items[1].description.contains("patient-facing APIs"));

    let drafts: Vec<_> = items.iter().map(draft_from_feed_item).collect();
    let companies: Vec<_> = drafts.iter().map(|d| d.company.as_deref().unwrap_or("")).collect();
    assert_eq!(companies, vec!["Initech", "Umbrella Health", "Unknown Company", "Hooli"]);
    assert!(drafts.iter().all(|d| d.source_type == SourceType::Rss && !d.is_trusted));
    assert_eq!(drafts[0].region.as_deref(), Some("overseas"));
    assert!(drafts[0].posted_at.is_some());
}

#[test]
fn atom_fixture_reads_link_attributes() {
    let parsed = parse_feed(&fixture("atom_feed.xml"));
    assert!(parsed.error.is_none());
    assert_eq!(parsed.entries.len(), 2);
    assert_eq!(parsed.entries[0].link, "https://atom.example.com/jobs/vandelay-frontend");
    assert_eq!(parsed.entries[1].link, "https://atom.example.com/jobs/pied-piper-platform");
    assert!(parsed.entries[1].body().contains("compression infrastructure"));

    let items = into_raw_items(parsed.entries, &sources()[1], Utc::now());
    let drafts: Vec<_> = items.iter().map(draft_from_feed_item).collect();
    assert_eq!(drafts[0].company.as_deref(), Some("Vandelay Industries"));
    assert_eq!(drafts[1].company.as_deref(), Some("Pied Piper"));
}

#[tokio::test]
async fn daily_ingest_against_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(dir.path().join("catalog.sqlite")).unwrap());
    let fetcher = FixtureFetcher(HashMap::from([
        (RSS_URL, fixture("remote_feed.xml")),
        (ATOM_URL, fixture("atom_feed.xml")),
    ]));
    let ctx = Arc::new(PipelineContext {
        settings: Settings { feeds: sources(), ..Settings::default() },
        store: Arc::clone(&store),
        fetcher: Arc::new(fetcher),
        translator: None,
    });

    let fetched = FetchRssTask.run(Arc::clone(&ctx)).await.unwrap();
    assert_eq!(fetched.processed, 6);
    assert_eq!(fetched.updated, 6);
    assert_eq!(fetched.failed, 1);

    let processed = ProcessRssTask.run(Arc::clone(&ctx)).await.unwrap();
    assert_eq!(processed.processed, 6);
    assert_eq!(processed.updated, 4);
    assert_eq!(processed.failed, 2);
    assert!(processed.errors.iter().any(|e| e.ends_with("INVALID_COMPANY_NAME")));
    assert!(processed.errors.iter().any(|e| e.ends_with("DESCRIPTION_TOO_SHORT")));

    let jobs: Vec<CanonicalJobRecord> = store::load(store.as_ref(), RecordKind::Jobs).unwrap();
    assert_eq!(jobs.len(), 4);
    assert!(jobs.iter().all(|j| j.category.is_some() && j.dedup_key.is_some()));
    assert!(jobs.iter().all(|j| j.location.as_deref() == Some("Remote")));

    // A second day over the same feeds adds and changes nothing.
    let refetched = FetchRssTask.run(Arc::clone(&ctx)).await.unwrap();
    assert_eq!(refetched.updated, 0);
    let reprocessed = ProcessRssTask.run(Arc::clone(&ctx)).await.unwrap();
    assert_eq!(reprocessed.processed, 0);

    let raw: Vec<RawFeedItem> = store::load(store.as_ref(), RecordKind::RawItems).unwrap();
    assert_eq!(raw.len(), 6);
    assert!(raw.iter().all(|item| item.status == RawStatus::Processed));
    let after: Vec<CanonicalJobRecord> = store::load(store.as_ref(), RecordKind::Jobs).unwrap();
    assert_eq!(after, jobs);
}
