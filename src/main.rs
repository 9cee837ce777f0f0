use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use catalog_ingest::config::Settings;
use catalog_ingest::fetch::{Fetcher, HttpFetcher};
use catalog_ingest::identity::short_hash;
use catalog_ingest::model::{CanonicalJobRecord, Company};
use catalog_ingest::pipeline::events::EventType;
use catalog_ingest::pipeline::tasks::TASK_IDS;
use catalog_ingest::pipeline::{self, PipelineContext, TaskState, SEQUENCES};
use catalog_ingest::store::{self, RecordKind, SaveMode, SqliteStore, Store};
use catalog_ingest::translate::{HttpTranslator, Translator};

#[derive(Parser)]
#[command(name = "catalog_ingest", about = "Job catalog ingestion pipeline")]
struct Cli {
    /// Settings file (default: ./ingest.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a named sequence or a single task, streaming events to stdout
    Run {
        /// Sequence name (daily-ingest, daily-enrich, full) or task id
        task: String,
        /// Show a progress bar on stderr
        #[arg(long)]
        progress: bool,
    },
    /// Show catalog statistics
    Stats,
    /// Register a company whose career page should be crawled
    AddCompany {
        name: String,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        careers_page: Option<String>,
        #[arg(long)]
        can_refer: bool,
    },
    /// List sequences and task ids
    ListTasks,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    let result = match cli.command {
        Commands::Run { task, progress } => run(settings, &task, progress).await,
        Commands::Stats => {
            let store = SqliteStore::open(&settings.db_path)?;
            print_stats(&store)
        }
        Commands::AddCompany { name, website, careers_page, can_refer } => {
            let store = SqliteStore::open(&settings.db_path)?;
            let name = name.trim().to_string();
            if name.is_empty() {
                bail!("Company name must not be empty");
            }
            let company = Company {
                id: format!("company_{}", short_hash(&name.to_lowercase())),
                name,
                website,
                careers_page,
                can_refer,
                ..Default::default()
            };
            if company.crawl_url().is_none() {
                eprintln!("Note: {} has no website or careers page and will not be crawled", company.name);
            }
            store::save(&store, RecordKind::Companies, &[&company], SaveMode::Append)?;
            println!("Saved {} ({})", company.name, company.id);
            Ok(())
        }
        Commands::ListTasks => {
            println!("Sequences:");
            for (name, ids) in SEQUENCES {
                println!("  {:<14} {}", name, ids.join(" -> "));
            }
            println!("Tasks:");
            for id in TASK_IDS {
                println!("  {}", id);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run(settings: Settings, name: &str, progress: bool) -> anyhow::Result<()> {
    let Some(tasks) = pipeline::resolve(name) else {
        bail!("Unknown task or sequence '{}'. See 'list-tasks'.", name);
    };

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&settings.db_path).context("Failed to open store")?);
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&settings)?);
    let translator = HttpTranslator::from_settings(&settings)?.map(|t| Arc::new(t) as Arc<dyn Translator>);
    let ctx = Arc::new(PipelineContext { settings, store, fetcher, translator });

    let pb = if progress {
        let pb = ProgressBar::new(tasks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let (tx, mut rx) = mpsc::channel(16);
    let driver = tokio::spawn(pipeline::run_sequence(tasks, ctx, tx));

    let mut stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        match event.event_type {
            EventType::TaskStart => pb.set_message(event.task.clone().unwrap_or_default()),
            EventType::TaskComplete | EventType::TaskError => pb.inc(1),
            _ => {}
        }
        stdout.write_all(event.to_sse_frame()?.as_bytes())?;
        stdout.flush()?;
    }
    pb.finish_and_clear();

    let outcomes = driver.await.context("Sequence driver stopped unexpectedly")?;
    let failed: Vec<_> = outcomes.iter().filter(|o| o.state == TaskState::Failed).map(|o| o.task).collect();
    if !failed.is_empty() {
        eprintln!("{} of {} tasks failed: {}", failed.len(), outcomes.len(), failed.join(", "));
    }
    Ok(())
}

fn print_stats(store: &dyn Store) -> anyhow::Result<()> {
    let jobs: Vec<CanonicalJobRecord> = store::load(store, RecordKind::Jobs)?;
    let raw = store.get_all(RecordKind::RawItems)?;
    let companies = store.get_all(RecordKind::Companies)?;

    let trusted = jobs.iter().filter(|j| j.is_trusted == Some(true)).count();
    let translated = jobs.iter().filter(|j| j.is_translated == Some(true)).count();
    let curated = jobs.iter().filter(|j| j.is_manually_edited == Some(true)).count();

    println!("Jobs:       {}", jobs.len());
    println!("  trusted:    {}", trusted);
    println!("  translated: {}", translated);
    println!("  curated:    {}", curated);
    println!("Raw items:  {}", raw.len());
    println!("Companies:  {}", companies.len());
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
