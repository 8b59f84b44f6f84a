//! Pipeline run persistence

use crate::config::ConfigManager;
use crate::error::{DrydockError, DrydockResult};
use crate::tag::TagSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::fs;
use uuid::Uuid;

/// Final status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Done,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Record of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run ID
    pub id: Uuid,

    /// Full source revision id this run built
    pub revision: String,

    /// Repository fully-qualified name
    pub repository: String,

    /// Current status
    pub status: RunStatus,

    /// Stage the run last entered (terminal stage on failure)
    pub stage: String,

    /// Tags published by this run, once generated
    pub tags: Option<TagSet>,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished, if it has
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Create a new running record
    pub fn new(revision: String, repository: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            revision,
            repository,
            status: RunStatus::Running,
            stage: "restore".to_string(),
            tags: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Mark the run finished
    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// Save the record under the state directory
    pub async fn save(&self) -> DrydockResult<()> {
        let dir = ConfigManager::runs_dir();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| DrydockError::io("creating runs directory", e))?;

        let path = dir.join(format!("{}.json", self.id));
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)
            .await
            .map_err(|e| DrydockError::io(format!("writing run record {}", path.display()), e))
    }

    /// Load every recorded run, most recent first
    pub async fn list() -> DrydockResult<Vec<Self>> {
        let dir = ConfigManager::runs_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| DrydockError::io("listing runs directory", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DrydockError::io("reading runs entry", e))?
        {
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(entry.path())
                .await
                .map_err(|e| DrydockError::io("reading run record", e))?;
            match serde_json::from_str::<Self>(&content) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable run record: {}", e),
            }
        }

        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_running() {
        let record = RunRecord::new("abc1234def".to_string(), "org/repo".to_string());
        assert_eq!(record.status, RunStatus::Running);
        assert!(record.finished_at.is_none());
        assert!(record.tags.is_none());
    }

    #[test]
    fn finish_sets_timestamp() {
        let mut record = RunRecord::new("abc1234def".to_string(), "org/repo".to_string());
        record.finish(RunStatus::Done);
        assert_eq!(record.status, RunStatus::Done);
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn status_display() {
        assert_eq!(RunStatus::Done.to_string(), "done");
        assert_eq!(RunStatus::Failed.to_string(), "failed");
    }
}
