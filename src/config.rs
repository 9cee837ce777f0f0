use std::path::Path;
use std::time::Duration;

use config::Config;
use serde::{Deserialize, Serialize};

use crate::model::FeedSource;

const DEFAULT_CONFIG_FILE: &str = "ingest.toml";
const ENV_PREFIX: &str = "INGEST";

/// Runtime settings. Layered: built-in defaults, optional TOML file, `INGEST__*` env vars.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: String,
    pub user_agent: String,
    pub fetch_timeout_ms: u64,
    pub detail_timeout_ms: u64,
    pub crawl_concurrency: usize,
    pub crawl_delay_ms: u64,
    pub max_companies_per_run: usize,
    pub max_detail_fetches: usize,
    pub max_body_bytes: usize,
    pub translate_batch_size: usize,
    pub translate_target: String,
    pub translate_endpoint: Option<String>,
    pub feeds: Vec<FeedSource>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: "data/catalog.sqlite".into(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
            fetch_timeout_ms: 15_000,
            detail_timeout_ms: 8_000,
            crawl_concurrency: 2,
            crawl_delay_ms: 1_000,
            max_companies_per_run: 10,
            max_detail_fetches: 3,
            max_body_bytes: 5 * 1024 * 1024,
            translate_batch_size: 20,
            translate_target: "zh".into(),
            translate_endpoint: None,
            feeds: default_feeds(),
        }
    }
}

fn feed(name: &str, category: &str, url: &str) -> FeedSource {
    FeedSource { name: name.into(), category: category.into(), url: url.into() }
}

fn default_feeds() -> Vec<FeedSource> {
    vec![
        feed("WeWorkRemotely", "all", "https://weworkremotely.com/remote-jobs.rss"),
        feed("WeWorkRemotely", "programming", "https://weworkremotely.com/categories/remote-programming-jobs.rss"),
        feed("WeWorkRemotely", "design", "https://weworkremotely.com/categories/remote-design-jobs.rss"),
        feed("Remotive", "all", "https://remotive.com/remote-jobs/feed"),
        feed("Remotive", "software-dev", "https://remotive.com/remote-jobs/feed/software-dev"),
        feed("Himalayas", "all", "https://himalayas.app/jobs/rss"),
        feed("NoDesk", "all", "https://nodesk.substack.com/feed"),
    ]
}

impl Settings {
    /// Load from `path` (or `ingest.toml` when present) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_millis(self.detail_timeout_ms)
    }

    pub fn crawl_delay(&self) -> Duration {
        Duration::from_millis(self.crawl_delay_ms)
    }
}
