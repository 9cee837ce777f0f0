//! Sequential task driver.
//!
//! A sequence runs its tasks strictly one after another and reports progress on an
//! event channel. Each task runs on its own tokio task, so an error or a panic inside
//! it is contained at that boundary and the sequence moves on.

pub mod crawl;
pub mod events;
pub mod tasks;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::classify::classify_job;
use crate::config::Settings;
use crate::fetch::Fetcher;
use crate::model::{CanonicalJobRecord, DraftJobRecord};
use crate::store::Store;
use crate::translate::Translator;
use events::{EventType, PipelineTaskEvent};

/// Per-task error lists stop growing here; `failed` keeps counting.
pub const MAX_REPORTED_ERRORS: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskSummary {
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl TaskSummary {
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.failed += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(message.into());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Shared collaborators handed to every task.
pub struct PipelineContext {
    pub settings: Settings,
    pub store: Arc<dyn Store>,
    pub fetcher: Arc<dyn Fetcher>,
    pub translator: Option<Arc<dyn Translator>>,
}

#[async_trait]
pub trait Task: Send + Sync {
    fn id(&self) -> &'static str;
    async fn run(&self, ctx: Arc<PipelineContext>) -> anyhow::Result<TaskSummary>;
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: &'static str,
    pub state: TaskState,
    pub summary: Option<TaskSummary>,
    pub error: Option<String>,
}

/// Named sequences and the single tasks they are built from.
pub const SEQUENCES: &[(&str, &[&str])] = &[
    ("daily-ingest", &[tasks::FETCH_RSS, tasks::PROCESS_RSS]),
    ("daily-enrich", &[tasks::TRANSLATE_JOBS, tasks::ENRICH_COMPANIES, tasks::CRAWL_TRUSTED_JOBS]),
    (
        "full",
        &[
            tasks::FETCH_RSS,
            tasks::PROCESS_RSS,
            tasks::CRAWL_TRUSTED_JOBS,
            tasks::TRANSLATE_JOBS,
            tasks::ENRICH_COMPANIES,
        ],
    ),
];

/// Task ids for a sequence name or a single task id.
pub fn sequence_task_ids(name: &str) -> Option<Vec<&'static str>> {
    if let Some((_, ids)) = SEQUENCES.iter().find(|(n, _)| *n == name) {
        return Some(ids.to_vec());
    }
    tasks::TASK_IDS.iter().find(|id| **id == name).map(|id| vec![*id])
}

pub fn resolve(name: &str) -> Option<Vec<Arc<dyn Task>>> {
    sequence_task_ids(name)?.into_iter().map(tasks::build).collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `tasks` in order. Exactly one `sequence_complete` is sent, after which the
/// sender is dropped and the stream ends. A closed receiver does not stop the run.
pub async fn run_sequence(
    tasks: Vec<Arc<dyn Task>>,
    ctx: Arc<PipelineContext>,
    events: mpsc::Sender<PipelineTaskEvent>,
) -> Vec<TaskOutcome> {
    let total = tasks.len();
    let mut outcomes: Vec<TaskOutcome> = tasks
        .iter()
        .map(|t| TaskOutcome { task: t.id(), state: TaskState::Pending, summary: None, error: None })
        .collect();

    let ids: Vec<_> = tasks.iter().map(|t| t.id()).collect();
    let _ = events
        .send(PipelineTaskEvent::sequence(
            EventType::SequenceStart,
            total,
            format!("Running {}", ids.join(", ")),
        ))
        .await;

    for (i, task) in tasks.into_iter().enumerate() {
        let id = task.id();
        let index = i + 1;
        outcomes[i].state = TaskState::Running;
        info!("[{}/{}] Starting {}", index, total, id);
        let _ = events
            .send(PipelineTaskEvent::task(EventType::TaskStart, id, index, total, format!("Starting {}", id)))
            .await;

        let task_ctx = Arc::clone(&ctx);
        let handle = tokio::spawn(async move { task.run(task_ctx).await });
        let result = match handle.await {
            Ok(Ok(summary)) => Ok(summary),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(join_error) if join_error.is_panic() => {
                Err(format!("task panicked: {}", panic_message(join_error.into_panic())))
            }
            Err(join_error) => Err(format!("task cancelled: {}", join_error)),
        };

        let event = match result {
            Ok(summary) => {
                info!(
                    "[{}/{}] {} done: {} processed, {} updated, {} failed",
                    index, total, id, summary.processed, summary.updated, summary.failed
                );
                let message = serde_json::to_string(&summary).unwrap_or_default();
                outcomes[i].state = TaskState::Completed;
                outcomes[i].summary = Some(summary);
                PipelineTaskEvent::task(EventType::TaskComplete, id, index, total, message)
            }
            Err(message) => {
                error!("[{}/{}] {} failed: {}", index, total, id, message);
                outcomes[i].state = TaskState::Failed;
                outcomes[i].error = Some(message.clone());
                PipelineTaskEvent::task(EventType::TaskError, id, index, total, message)
            }
        };
        let _ = events.send(event).await;
    }

    let failed = outcomes.iter().filter(|o| o.state == TaskState::Failed).count();
    let _ = events
        .send(PipelineTaskEvent::sequence(
            EventType::SequenceComplete,
            total,
            format!("{} completed, {} failed", total - failed, failed),
        ))
        .await;

    outcomes
}

/// Promote a validated draft, attaching classification.
pub(crate) fn promote(draft: DraftJobRecord, now: DateTime<Utc>) -> CanonicalJobRecord {
    let classification = classify_job(&draft.title, draft.description.as_deref().unwrap_or(""));
    let mut record = CanonicalJobRecord::from_draft(draft, now);
    record.category = Some(classification.category.to_string());
    record.experience_level = Some(classification.experience_level.to_string());
    record.industry = Some(classification.industry.to_string());
    record.tags = classification.tags.iter().map(|t| t.to_string()).collect();
    record
}
