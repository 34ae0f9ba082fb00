//! Job kinds, identifiers and status documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of remote job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Crawl,
    BatchScrape,
    Extract,
    Agent,
}

const SCRAPE_TERMINAL: &[&str] = &["completed", "failed", "cancelled"];
const AGENT_TERMINAL: &[&str] = &["completed", "failed", "stopped"];

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::Crawl,
        JobKind::BatchScrape,
        JobKind::Extract,
        JobKind::Agent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::BatchScrape => "batch_scrape",
            Self::Extract => "extract",
            Self::Agent => "agent",
        }
    }

    /// Statuses after which the job never changes again
    pub fn terminal_statuses(self) -> &'static [&'static str] {
        match self {
            Self::Crawl | Self::BatchScrape | Self::Extract => SCRAPE_TERMINAL,
            Self::Agent => AGENT_TERMINAL,
        }
    }

    pub fn is_terminal(self, status: &str) -> bool {
        self.terminal_statuses().contains(&status)
    }

    /// Whether a terminal status means the result can be fetched
    pub fn is_success(self, status: &str) -> bool {
        status == "completed"
    }

    /// Crawl and batch scrape results arrive in page batches
    pub fn is_paginated(self) -> bool {
        matches!(self, Self::Crawl | Self::BatchScrape)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-assigned job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Status document returned by a status check
///
/// `status` stays a raw JSON value; the poller rejects anything that is not
/// a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusDocument {
    #[serde(default)]
    pub status: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_used: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusDocument {
    pub fn new(status: impl Into<Value>) -> Self {
        Self {
            status: status.into(),
            completed: None,
            total: None,
            credits_used: None,
            expires_at: None,
            error: None,
        }
    }

    pub fn with_progress(mut self, completed: u64, total: u64) -> Self {
        self.completed = Some(completed);
        self.total = Some(total);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_sets() {
        assert!(JobKind::Crawl.is_terminal("cancelled"));
        assert!(!JobKind::Crawl.is_terminal("stopped"));
        assert!(JobKind::Agent.is_terminal("stopped"));
        assert!(!JobKind::Agent.is_terminal("cancelled"));

        for kind in JobKind::ALL {
            assert!(kind.is_terminal("completed"));
            assert!(kind.is_terminal("failed"));
            assert!(!kind.is_terminal("scraping"));
            assert!(!kind.is_terminal("processing"));
        }
    }

    #[test]
    fn test_paginated_kinds() {
        assert!(JobKind::Crawl.is_paginated());
        assert!(JobKind::BatchScrape.is_paginated());
        assert!(!JobKind::Extract.is_paginated());
        assert!(!JobKind::Agent.is_paginated());
    }

    #[test]
    fn test_kind_serde_matches_display() {
        for kind in JobKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, json!(kind.to_string()));
        }
    }

    #[test]
    fn test_status_document_camel_case() {
        let doc: JobStatusDocument = serde_json::from_value(json!({
            "status": "scraping",
            "completed": 3,
            "total": 10,
            "creditsUsed": 3,
            "expiresAt": "2026-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(doc.status, json!("scraping"));
        assert_eq!(doc.credits_used, Some(3));
        assert!(doc.expires_at.is_some());
        assert_eq!(doc.error, None);
    }

    #[test]
    fn test_status_document_missing_status_is_null() {
        let doc: JobStatusDocument = serde_json::from_value(json!({ "total": 2 })).unwrap();
        assert_eq!(doc.status, Value::Null);
    }
}
