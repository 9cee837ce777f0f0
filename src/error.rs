use std::fmt;

use thiserror::Error;

/// Network or HTTP-level failure for one source. Recorded per source, never batch-fatal.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("fetch of {url} timed out")]
    Timeout { url: String },
}

/// Malformed structured data or markup inside one extraction strategy.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON block: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid feed XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("record encoding: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("store path: {0}")]
    Io(#[from] std::io::Error),
    #[error("{kind} record has no string id")]
    MissingId { kind: &'static str },
    #[error("store lock poisoned")]
    Poisoned,
}

/// A critical field that was populated before a merge and is empty after it.
#[derive(Debug, Clone, PartialEq)]
pub struct LostField {
    pub field: &'static str,
    pub previous: String,
}

/// Raised when a merge would erase curated data. The write must not happen.
#[derive(Debug, Clone, PartialEq)]
pub struct DataIntegrityViolation {
    pub record_id: String,
    pub lost: Vec<LostField>,
}

impl fmt::Display for DataIntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[DataIntegrityViolation] refusing write of {}: critical data lost",
            self.record_id
        )?;
        for lost in &self.lost {
            write!(f, "; {} (was {}, now empty)", lost.field, lost.previous)?;
        }
        Ok(())
    }
}

impl std::error::Error for DataIntegrityViolation {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_message_lists_every_field() {
        let err = DataIntegrityViolation {
            record_id: "hash:abc".into(),
            lost: vec![
                LostField { field: "industry", previous: "\"Fintech\"".into() },
                LostField { field: "isApproved", previous: "true".into() },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("[DataIntegrityViolation]"));
        assert!(msg.contains("industry (was \"Fintech\""));
        assert!(msg.contains("isApproved (was true"));
    }
}
