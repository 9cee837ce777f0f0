use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SequenceStart,
    TaskStart,
    TaskComplete,
    TaskError,
    SequenceComplete,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SequenceStart => "sequence_start",
            EventType::TaskStart => "task_start",
            EventType::TaskComplete => "task_complete",
            EventType::TaskError => "task_error",
            EventType::SequenceComplete => "sequence_complete",
        }
    }
}

/// Progress event streamed while a sequence runs. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineTaskEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub total: usize,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl PipelineTaskEvent {
    pub fn sequence(event_type: EventType, total: usize, message: impl Into<String>) -> Self {
        Self {
            event_type,
            task: None,
            index: None,
            total,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn task(
        event_type: EventType,
        task: &str,
        index: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            task: Some(task.to_string()),
            index: Some(index),
            total,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// `event: <type>` / `data: <json>` frame with its blank-line terminator.
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!(
            "event: {}\ndata: {}\n\n",
            self.event_type.as_str(),
            serde_json::to_string(self)?
        ))
    }
}
