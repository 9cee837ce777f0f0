//! The five pipeline tasks. Each one reads what it needs from the store, does its
//! work, and writes back through the catalog so curated fields survive.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rayon::prelude::*;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use super::crawl::{crawl, CrawlOptions, CrawlOutcome, CrawlTarget};
use super::{promote, PipelineContext, Task, TaskSummary};
use crate::catalog;
use crate::classify::{classify_company, DEFAULT_INDUSTRY};
use crate::extract::detail::{fetch_job_details, parse_company_profile};
use crate::extract::extract_jobs;
use crate::extract::feed::{draft_from_feed_item, into_raw_items, parse_feed};
use crate::merge::MergeOptions;
use crate::model::{CanonicalJobRecord, Company, RawFeedItem, RawStatus, SourceType, Translation};
use crate::store::{load, load_partitioned, record_id, save, RecordKind, SaveMode, Store};
use crate::text::{non_blank, strip_html};
use crate::validate::validate;

pub const FETCH_RSS: &str = "fetch-rss";
pub const PROCESS_RSS: &str = "process-rss";
pub const CRAWL_TRUSTED_JOBS: &str = "crawl-trusted-jobs";
pub const TRANSLATE_JOBS: &str = "translate-jobs";
pub const ENRICH_COMPANIES: &str = "enrich-companies";

pub const TASK_IDS: [&str; 5] = [FETCH_RSS, PROCESS_RSS, CRAWL_TRUSTED_JOBS, TRANSLATE_JOBS, ENRICH_COMPANIES];

/// Feeds downloaded at once.
const FEED_BATCH: usize = 3;
const PROCESS_CHUNK: usize = 500;

pub fn build(id: &str) -> Option<Arc<dyn Task>> {
    let task: Arc<dyn Task> = match id {
        FETCH_RSS => Arc::new(FetchRssTask),
        PROCESS_RSS => Arc::new(ProcessRssTask),
        CRAWL_TRUSTED_JOBS => Arc::new(CrawlTrustedJobsTask),
        TRANSLATE_JOBS => Arc::new(TranslateJobsTask),
        ENRICH_COMPANIES => Arc::new(EnrichCompaniesTask),
        _ => return None,
    };
    Some(task)
}

fn load_jobs(store: &dyn Store) -> Result<Vec<CanonicalJobRecord>> {
    load(store, RecordKind::Jobs).context("Failed to load catalog")
}

/// Merge `incoming` into the stored catalog and write it back. Nothing is written
/// when the merge reports an integrity violation. Rows that cannot be read as
/// records are written back untouched, and incoming records that would replace
/// one of them are held back.
fn commit_jobs(store: &dyn Store, mut incoming: Vec<CanonicalJobRecord>) -> Result<usize> {
    if incoming.is_empty() {
        return Ok(0);
    }
    let loaded = load_partitioned::<CanonicalJobRecord>(store, RecordKind::Jobs)
        .context("Failed to load catalog")?;
    let held: HashSet<String> = loaded
        .unreadable
        .iter()
        .filter_map(|row| record_id(RecordKind::Jobs, row).ok())
        .collect();
    incoming.retain(|record| {
        let blocked = held.contains(&record.key()) || held.contains(&record.id);
        if blocked {
            warn!("Not updating {}: the stored row is unreadable", record.id);
        }
        !blocked
    });
    if incoming.is_empty() {
        return Ok(0);
    }

    let outcome = catalog::commit(loaded.records, incoming, MergeOptions::default())?;
    let mut rows = outcome
        .records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to encode catalog")?;
    rows.extend(loaded.unreadable);
    store.save_all(RecordKind::Jobs, &rows, SaveMode::Replace).context("Failed to save catalog")?;
    debug!("Catalog: {} inserted, {} updated", outcome.inserted, outcome.updated);
    Ok(outcome.inserted + outcome.updated)
}

pub struct FetchRssTask;

#[async_trait]
impl Task for FetchRssTask {
    fn id(&self) -> &'static str {
        FETCH_RSS
    }

    async fn run(&self, ctx: Arc<PipelineContext>) -> Result<TaskSummary> {
        let mut summary = TaskSummary::default();
        let stored: Vec<RawFeedItem> = load(ctx.store.as_ref(), RecordKind::RawItems)?;
        let mut seen: HashSet<String> = stored.into_iter().map(|item| item.id).collect();
        let mut fresh = Vec::new();

        for batch in ctx.settings.feeds.chunks(FEED_BATCH) {
            let mut set = JoinSet::new();
            for source in batch.iter().cloned() {
                let fetcher = Arc::clone(&ctx.fetcher);
                set.spawn(async move {
                    let result = fetcher.fetch(&source.url).await;
                    (source, result)
                });
            }

            while let Some(joined) = set.join_next().await {
                let (source, result) = match joined {
                    Ok(pair) => pair,
                    Err(e) => {
                        summary.record_failure(format!("feed fetch aborted: {}", e));
                        continue;
                    }
                };
                let body = match result {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("Feed {} ({}) failed: {}", source.name, source.category, e);
                        summary.record_failure(format!("{}: {}", source.url, e));
                        continue;
                    }
                };

                let parsed = parse_feed(&body);
                if let Some(e) = &parsed.error {
                    warn!("Feed {} is malformed, keeping {} items: {}", source.url, parsed.entries.len(), e);
                    if parsed.entries.is_empty() {
                        summary.record_failure(format!("{}: {}", source.url, e));
                        continue;
                    }
                }

                let items = into_raw_items(parsed.entries, &source, Utc::now());
                info!("{} ({}): {} items", source.name, source.category, items.len());
                summary.processed += items.len();
                fresh.extend(items.into_iter().filter(|item| seen.insert(item.id.clone())));
            }
        }

        if !fresh.is_empty() {
            save(ctx.store.as_ref(), RecordKind::RawItems, &fresh, SaveMode::Append)
                .context("Failed to save raw feed items")?;
        }
        summary.updated = fresh.len();
        Ok(summary)
    }
}

pub struct ProcessRssTask;

#[async_trait]
impl Task for ProcessRssTask {
    fn id(&self) -> &'static str {
        PROCESS_RSS
    }

    async fn run(&self, ctx: Arc<PipelineContext>) -> Result<TaskSummary> {
        let mut summary = TaskSummary::default();
        let raw: Vec<RawFeedItem> = load(ctx.store.as_ref(), RecordKind::RawItems)?;
        let mut pending: Vec<RawFeedItem> = raw.into_iter().filter(|item| item.status == RawStatus::Raw).collect();
        if pending.is_empty() {
            info!("No unprocessed feed items");
            return Ok(summary);
        }

        let now = Utc::now();
        let mut accepted = Vec::new();
        for chunk in pending.chunks(PROCESS_CHUNK) {
            let results: Vec<_> = chunk
                .par_iter()
                .map(|item| {
                    let draft = draft_from_feed_item(item);
                    let verdict = validate(&draft, SourceType::Rss);
                    match verdict.reason_code {
                        Some(reason) if !verdict.is_valid => Err(format!("{}: {}", item.id, reason)),
                        _ => Ok(promote(draft, now)),
                    }
                })
                .collect();

            for result in results {
                match result {
                    Ok(record) => accepted.push(record),
                    Err(message) => summary.record_failure(message),
                }
            }
        }

        summary.processed = pending.len();
        summary.updated = commit_jobs(ctx.store.as_ref(), accepted)?;

        for item in &mut pending {
            item.status = RawStatus::Processed;
        }
        save(ctx.store.as_ref(), RecordKind::RawItems, &pending, SaveMode::Append)
            .context("Failed to mark feed items processed")?;
        Ok(summary)
    }
}

pub struct CrawlTrustedJobsTask;

#[async_trait]
impl Task for CrawlTrustedJobsTask {
    fn id(&self) -> &'static str {
        CRAWL_TRUSTED_JOBS
    }

    async fn run(&self, ctx: Arc<PipelineContext>) -> Result<TaskSummary> {
        let mut summary = TaskSummary::default();
        let settings = &ctx.settings;
        let mut companies: Vec<Company> = load(ctx.store.as_ref(), RecordKind::Companies)?;

        // Never-crawled first, then the stalest.
        let mut due: Vec<&Company> = companies.iter().filter(|c| c.crawl_url().is_some()).collect();
        due.sort_by_key(|c| c.last_crawled_at);
        let targets: Vec<CrawlTarget> = due
            .into_iter()
            .take(settings.max_companies_per_run)
            .filter_map(|c| {
                Some(CrawlTarget {
                    company_id: c.id.clone(),
                    company_name: c.name.clone(),
                    url: c.crawl_url()?.to_string(),
                })
            })
            .collect();
        if targets.is_empty() {
            info!("No companies with a crawlable page");
            return Ok(summary);
        }

        info!("Crawling {} companies", targets.len());
        let results = crawl(Arc::clone(&ctx.fetcher), targets, CrawlOptions::from_settings(settings)).await;
        let can_refer: HashMap<&str, bool> = companies.iter().map(|c| (c.id.as_str(), c.can_refer)).collect();

        let now = Utc::now();
        let mut crawled = HashSet::new();
        let mut incoming = Vec::new();
        for result in results {
            let target = result.target;
            summary.processed += 1;
            let html = match result.outcome {
                CrawlOutcome::Fetched(html) => html,
                CrawlOutcome::Failed(e) => {
                    summary.record_failure(format!("{}: {}", target.company_name, e));
                    continue;
                }
                CrawlOutcome::Skipped => {
                    summary.record_failure(format!("{}: timed out", target.company_name));
                    continue;
                }
            };
            crawled.insert(target.company_id.clone());

            let extraction = extract_jobs(&html, &target.url);
            let strategy = extraction.strategy.map(|s| s.name()).unwrap_or("none");
            info!("{}: {} jobs via {}", target.company_name, extraction.jobs.len(), strategy);

            let mut drafts = extraction.jobs;
            for draft in &mut drafts {
                draft.company = Some(target.company_name.clone());
                draft.source = Some(target.company_name.clone());
            }
            for draft in drafts.iter_mut().take(settings.max_detail_fetches) {
                let Some(details) =
                    fetch_job_details(ctx.fetcher.as_ref(), &draft.url, settings.detail_timeout()).await
                else {
                    continue;
                };
                let current = draft.description.as_deref().map_or(0, |d| strip_html(d).chars().count());
                if details.description.chars().count() > current {
                    draft.description = Some(details.description);
                }
                if draft.requirements.is_empty() {
                    draft.requirements = details.requirements;
                }
                if draft.benefits.is_empty() {
                    draft.benefits = details.benefits;
                }
            }

            for draft in drafts {
                let verdict = validate(&draft, SourceType::Trusted);
                if let Some(reason) = verdict.reason_code.filter(|_| !verdict.is_valid) {
                    debug!("Rejected {} ({})", draft.url, reason);
                    summary.record_failure(format!("{}: {}", draft.url, reason));
                    continue;
                }
                let mut record = promote(draft, now);
                record.company_id = Some(target.company_id.clone());
                record.can_refer = can_refer.get(target.company_id.as_str()).copied();
                incoming.push(record);
            }
        }

        summary.updated = commit_jobs(ctx.store.as_ref(), incoming)?;

        for company in companies.iter_mut().filter(|c| crawled.contains(&c.id)) {
            company.last_crawled_at = Some(now);
        }
        let touched: Vec<&Company> = companies.iter().filter(|c| crawled.contains(&c.id)).collect();
        save(ctx.store.as_ref(), RecordKind::Companies, &touched, SaveMode::Append)
            .context("Failed to update crawl timestamps")?;
        Ok(summary)
    }
}

pub struct TranslateJobsTask;

#[async_trait]
impl Task for TranslateJobsTask {
    fn id(&self) -> &'static str {
        TRANSLATE_JOBS
    }

    async fn run(&self, ctx: Arc<PipelineContext>) -> Result<TaskSummary> {
        let mut summary = TaskSummary::default();
        let Some(translator) = ctx.translator.as_ref() else {
            info!("No translation endpoint configured, skipping");
            return Ok(summary);
        };
        let target = ctx.settings.translate_target.as_str();

        let jobs = load_jobs(ctx.store.as_ref())?;
        let pending: Vec<CanonicalJobRecord> = jobs
            .into_iter()
            .filter(|job| job.is_translated != Some(true) && !job.translations.contains_key(target))
            .take(ctx.settings.translate_batch_size)
            .collect();

        let mut translated = Vec::with_capacity(pending.len());
        for mut job in pending {
            summary.processed += 1;
            let description = strip_html(job.description.as_deref().unwrap_or(""));
            let result = async {
                let title = translator.translate(&job.title, target).await?;
                let description = translator.translate(&description, target).await?;
                anyhow::Ok(Translation { title, description })
            }
            .await;

            match result {
                Ok(translation) => {
                    let now = Utc::now();
                    job.translations.insert(target.to_string(), translation);
                    job.is_translated = Some(true);
                    job.translated_at = Some(now);
                    job.updated_at = Some(now);
                    translated.push(job);
                }
                Err(e) => {
                    warn!("Translation of {} failed: {:#}", job.id, e);
                    summary.record_failure(format!("{}: {:#}", job.id, e));
                }
            }
        }

        summary.updated = commit_jobs(ctx.store.as_ref(), translated)?;
        Ok(summary)
    }
}

pub struct EnrichCompaniesTask;

#[async_trait]
impl Task for EnrichCompaniesTask {
    fn id(&self) -> &'static str {
        ENRICH_COMPANIES
    }

    async fn run(&self, ctx: Arc<PipelineContext>) -> Result<TaskSummary> {
        let mut summary = TaskSummary::default();
        let mut companies: Vec<Company> = load(ctx.store.as_ref(), RecordKind::Companies)?;

        let targets: Vec<CrawlTarget> = companies
            .iter()
            .filter(|c| non_blank(c.logo.as_deref()).is_none() || non_blank(c.description.as_deref()).is_none())
            .filter_map(|c| {
                Some(CrawlTarget {
                    company_id: c.id.clone(),
                    company_name: c.name.clone(),
                    url: non_blank(c.website.as_deref())?.to_string(),
                })
            })
            .take(ctx.settings.max_companies_per_run)
            .collect();

        let mut profiles = HashMap::new();
        for result in crawl(Arc::clone(&ctx.fetcher), targets, CrawlOptions::from_settings(&ctx.settings)).await {
            let target = result.target;
            match (result.outcome, Url::parse(&target.url)) {
                (CrawlOutcome::Fetched(html), Ok(base)) => {
                    profiles.insert(target.company_id, parse_company_profile(&html, &base));
                }
                (CrawlOutcome::Fetched(_), Err(e)) => {
                    summary.record_failure(format!("{}: bad website URL ({})", target.company_name, e))
                }
                (CrawlOutcome::Failed(e), _) => summary.record_failure(format!("{}: {}", target.company_name, e)),
                (CrawlOutcome::Skipped, _) => summary.record_failure(format!("{}: timed out", target.company_name)),
            }
        }

        let mut changed = Vec::new();
        for company in &mut companies {
            summary.processed += 1;
            let before = company.clone();
            if let Some(profile) = profiles.remove(&company.id) {
                if non_blank(company.description.as_deref()).is_none() {
                    company.description = profile.description;
                }
                if non_blank(company.logo.as_deref()).is_none() {
                    company.logo = profile.logo;
                }
            }
            if non_blank(company.industry.as_deref()).is_none() {
                let (industry, tags) = classify_company(&company.name, company.description.as_deref().unwrap_or(""));
                if industry != DEFAULT_INDUSTRY {
                    company.industry = Some(industry.to_string());
                }
                if company.tags.is_empty() {
                    company.tags = tags.into_iter().map(str::to_string).collect();
                }
            }
            if *company != before {
                changed.push(company.clone());
            }
        }
        if !changed.is_empty() {
            save(ctx.store.as_ref(), RecordKind::Companies, &changed, SaveMode::Append)
                .context("Failed to save companies")?;
        }

        let linked = link_jobs_to_companies(load_jobs(ctx.store.as_ref())?, &companies);
        info!("{} companies enriched, {} jobs linked", changed.len(), linked.len());
        summary.updated = changed.len() + commit_jobs(ctx.store.as_ref(), linked)?;
        Ok(summary)
    }
}

/// Unlinked jobs whose company name matches a tracked company, updated to point at it.
fn link_jobs_to_companies(jobs: Vec<CanonicalJobRecord>, companies: &[Company]) -> Vec<CanonicalJobRecord> {
    let by_name: HashMap<String, &Company> = companies
        .iter()
        .filter(|c| !c.name.trim().is_empty())
        .map(|c| (c.name.trim().to_lowercase(), c))
        .collect();

    jobs.into_iter()
        .filter_map(|mut job| {
            let name = non_blank(job.company.as_deref())?.to_lowercase();
            let company = by_name.get(&name)?;
            // Already linked, possibly by hand to another company.
            match non_blank(job.company_id.as_deref()) {
                Some(id) if id != company.id => return None,
                Some(_) if job.is_trusted == Some(true) => return None,
                _ => {}
            }
            job.company_id = Some(company.id.clone());
            job.is_trusted = Some(true);
            job.updated_at = Some(Utc::now());
            Some(job)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::Settings;
    use crate::error::FetchError;
    use crate::fetch::Fetcher;
    use crate::model::{DraftJobRecord, FeedSource};
    use crate::store::MemoryStore;
    use crate::translate::Translator;

    struct PageFetcher(HashMap<String, String>);

    #[async_trait]
    impl Fetcher for PageFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Status { url: url.to_string(), status: 404 })
        }
    }

    struct Bracketing;

    #[async_trait]
    impl Translator for Bracketing {
        async fn translate(&self, text: &str, target: &str) -> Result<String> {
            Ok(format!("[{}] {}", target, text))
        }
    }

    fn context(pages: &[(&str, &str)], feeds: Vec<FeedSource>) -> Arc<PipelineContext> {
        let settings = Settings { feeds, crawl_delay_ms: 0, ..Settings::default() };
        let pages = pages.iter().map(|(u, b)| (u.to_string(), b.to_string())).collect();
        Arc::new(PipelineContext {
            settings,
            store: Arc::new(MemoryStore::default()),
            fetcher: Arc::new(PageFetcher(pages)),
            translator: Some(Arc::new(Bracketing)),
        })
    }

    const FEED: &str = r#"<rss><channel>
        <item><title>Acme: Senior Rust Engineer</title><link>https://feed.example/1</link>
          <description>Build reliable ingestion services in Rust with a small distributed team.</description>
          <guid>a-1</guid></item>
        <item><title>Great opportunity</title><link>https://feed.example/2</link>
          <description>An exciting role for a motivated person who loves building products.</description>
          <guid>a-2</guid></item>
    </channel></rss>"#;

    fn feed_source() -> FeedSource {
        FeedSource { name: "Board".into(), category: "dev".into(), url: "https://feed.example/rss".into() }
    }

    #[tokio::test]
    async fn fetch_then_process_feed() {
        let ctx = context(&[("https://feed.example/rss", FEED)], vec![feed_source()]);

        let fetched = FetchRssTask.run(Arc::clone(&ctx)).await.unwrap();
        assert_eq!((fetched.processed, fetched.updated), (2, 2));
        let again = FetchRssTask.run(Arc::clone(&ctx)).await.unwrap();
        assert_eq!(again.updated, 0);

        let processed = ProcessRssTask.run(Arc::clone(&ctx)).await.unwrap();
        assert_eq!(processed.processed, 2);
        assert_eq!(processed.updated, 1);
        assert_eq!(processed.failed, 1);
        assert!(processed.errors[0].ends_with("INVALID_COMPANY_NAME"));

        let jobs = load_jobs(ctx.store.as_ref()).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].company.as_deref(), Some("Acme"));
        assert_eq!(jobs[0].source_type, Some(SourceType::Rss));

        let raw: Vec<RawFeedItem> = load(ctx.store.as_ref(), RecordKind::RawItems).unwrap();
        assert!(raw.iter().all(|item| item.status == RawStatus::Processed));
        let idle = ProcessRssTask.run(ctx).await.unwrap();
        assert_eq!(idle.processed, 0);
    }

    #[tokio::test]
    async fn unreachable_feed_is_a_recorded_failure() {
        let ctx = context(&[], vec![feed_source()]);
        let summary = FetchRssTask.run(ctx).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed, 0);
    }

    #[tokio::test]
    async fn crawl_links_jobs_and_stamps_company() {
        let description = "You will design and operate the data platform. ".repeat(6);
        let page = format!(
            r#"<script type="application/ld+json">{{"@type":"JobPosting","title":"Data Engineer",
               "url":"https://acme.io/jobs/7","description":"{}"}}</script>"#,
            description
        );
        let ctx = context(&[("https://acme.io/careers", page.as_str())], Vec::new());
        let company = Company {
            id: "acme".into(),
            name: "Acme".into(),
            careers_page: Some("https://acme.io/careers".into()),
            can_refer: true,
            ..Default::default()
        };
        save(ctx.store.as_ref(), RecordKind::Companies, &[company], SaveMode::Append).unwrap();

        let summary = CrawlTrustedJobsTask.run(Arc::clone(&ctx)).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.updated, 1);

        let jobs = load_jobs(ctx.store.as_ref()).unwrap();
        assert_eq!(jobs[0].company_id.as_deref(), Some("acme"));
        assert_eq!(jobs[0].can_refer, Some(true));
        assert_eq!(jobs[0].source_type, Some(SourceType::Trusted));

        let companies: Vec<Company> = load(ctx.store.as_ref(), RecordKind::Companies).unwrap();
        assert!(companies[0].last_crawled_at.is_some());
    }

    #[tokio::test]
    async fn translation_fills_target_language() {
        let ctx = context(&[], Vec::new());
        let mut draft = DraftJobRecord::new("Designer", "https://acme.io/jobs/2", SourceType::Trusted);
        draft.company = Some("Acme".into());
        draft.description = Some("<p>Shape the product.</p>".into());
        let record = promote(draft, Utc::now());
        save(ctx.store.as_ref(), RecordKind::Jobs, &[record], SaveMode::Replace).unwrap();

        let summary = TranslateJobsTask.run(Arc::clone(&ctx)).await.unwrap();
        assert_eq!(summary.updated, 1);
        let jobs = load_jobs(ctx.store.as_ref()).unwrap();
        let zh = &jobs[0].translations["zh"];
        assert_eq!(zh.title, "[zh] Designer");
        assert_eq!(zh.description, "[zh] Shape the product.");
        assert_eq!(jobs[0].is_translated, Some(true));

        let second = TranslateJobsTask.run(ctx).await.unwrap();
        assert_eq!(second.processed, 0);
    }

    #[tokio::test]
    async fn enrich_fills_profile_and_links_jobs() {
        let home = r#"<meta property="og:description" content="Acme builds payment infrastructure and banking APIs for startups.">
            <link rel="icon" href="/icon.png">"#;
        let ctx = context(&[("https://acme.io", home)], Vec::new());
        let company = Company {
            id: "acme".into(),
            name: "Acme".into(),
            website: Some("https://acme.io".into()),
            ..Default::default()
        };
        save(ctx.store.as_ref(), RecordKind::Companies, &[company], SaveMode::Append).unwrap();

        let mut draft = DraftJobRecord::new("Backend Engineer", "https://feed.example/9", SourceType::Rss);
        draft.company = Some("ACME".into());
        let record = promote(draft, Utc::now());
        save(ctx.store.as_ref(), RecordKind::Jobs, &[record], SaveMode::Replace).unwrap();

        let summary = EnrichCompaniesTask.run(Arc::clone(&ctx)).await.unwrap();
        assert_eq!(summary.failed, 0);

        let companies: Vec<Company> = load(ctx.store.as_ref(), RecordKind::Companies).unwrap();
        assert_eq!(companies[0].logo.as_deref(), Some("https://acme.io/icon.png"));
        assert!(companies[0].description.as_deref().unwrap().starts_with("Acme builds payment"));

        let jobs = load_jobs(ctx.store.as_ref()).unwrap();
        assert_eq!(jobs[0].company_id.as_deref(), Some("acme"));
        assert_eq!(jobs[0].is_trusted, Some(true));
    }

    fn stored_jobs(ctx: &PipelineContext) -> HashMap<String, serde_json::Value> {
        ctx.store
            .get_all(RecordKind::Jobs)
            .unwrap()
            .into_iter()
            .map(|row| (row["id"].as_str().unwrap().to_string(), row))
            .collect()
    }

    #[tokio::test]
    async fn feed_commit_keeps_curated_and_unreadable_rows() {
        let ctx = context(&[("https://feed.example/rss", FEED)], vec![feed_source()]);
        let curated = json!({
            "id": "id:curated",
            "title": "Staff Engineer",
            "url": "https://acme.io/jobs/curated",
            "industry": "Fintech",
            "isManuallyEdited": true,
            "isApproved": true,
            "salary": {"min": 150000, "max": 190000, "currency": "USD"},
        });
        let hidden = json!({
            "id": "id:other",
            "title": "Designer",
            "url": "https://acme.io/jobs/other",
            "hiddenFields": ["salary"],
        });
        let broken = json!({"id": "id:broken", "title": "Analyst", "postedAt": "last tuesday"});
        ctx.store
            .save_all(RecordKind::Jobs, &[curated, hidden, broken.clone()], SaveMode::Replace)
            .unwrap();

        FetchRssTask.run(Arc::clone(&ctx)).await.unwrap();
        let summary = ProcessRssTask.run(Arc::clone(&ctx)).await.unwrap();
        assert_eq!(summary.updated, 1);

        let jobs = stored_jobs(&ctx);
        assert_eq!(jobs.len(), 4);
        assert_eq!(jobs["id:curated"]["salary"], json!({"min": 150000, "max": 190000, "currency": "USD"}));
        assert_eq!(jobs["id:curated"]["isManuallyEdited"], true);
        assert_eq!(jobs["id:curated"]["industry"], "Fintech");
        assert_eq!(jobs["id:other"]["hiddenFields"], json!(["salary"]));
        assert_eq!(jobs["id:broken"], broken);
    }

    #[test]
    fn commit_holds_back_records_that_would_replace_unreadable_rows() {
        let store = MemoryStore::default();
        let broken = json!({"id": "id:broken", "title": "Analyst", "postedAt": "last tuesday"});
        store.save_all(RecordKind::Jobs, &[broken.clone()], SaveMode::Replace).unwrap();

        let incoming = CanonicalJobRecord {
            id: "id:broken".into(),
            dedup_key: Some("id:broken".into()),
            title: "Analyst".into(),
            ..Default::default()
        };
        assert_eq!(commit_jobs(&store, vec![incoming]).unwrap(), 0);
        assert_eq!(store.get_all(RecordKind::Jobs).unwrap(), vec![broken]);
    }

    #[test]
    fn linking_leaves_jobs_already_assigned_elsewhere() {
        let companies = [Company { id: "acme".into(), name: "Acme".into(), ..Default::default() }];
        let job = |id: &str, company_id: Option<&str>, trusted: Option<bool>| CanonicalJobRecord {
            id: id.into(),
            company: Some("Acme".into()),
            company_id: company_id.map(str::to_string),
            is_trusted: trusted,
            ..Default::default()
        };
        let jobs = vec![
            job("id:1", Some("acme-holdings"), Some(true)),
            job("id:2", Some("acme-holdings"), None),
            job("id:3", Some("acme"), Some(true)),
            job("id:4", Some("acme"), None),
            job("id:5", None, None),
        ];

        let linked = link_jobs_to_companies(jobs, &companies);
        let ids: Vec<&str> = linked.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["id:4", "id:5"]);
        assert!(linked.iter().all(|j| j.company_id.as_deref() == Some("acme") && j.is_trusted == Some(true)));

        let again = link_jobs_to_companies(linked, &companies);
        assert!(again.is_empty());
    }
}
