//! Revision ledger: short-tag collision detection
//!
//! Maps every short revision tag ever published to the full revision id it
//! was derived from. Two genuinely distinct revisions sharing a short prefix
//! must fail loudly instead of silently overwriting each other's tag.

use crate::error::{DrydockError, DrydockResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Persisted map of short revision tag -> full revision id
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RevisionLedger {
    entries: HashMap<String, String>,

    #[serde(skip)]
    path: PathBuf,
}

impl RevisionLedger {
    /// Load the ledger from `path`, starting empty if the file is absent
    pub async fn load(path: &Path) -> DrydockResult<Self> {
        if !path.exists() {
            return Ok(Self {
                entries: HashMap::new(),
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| DrydockError::io(format!("reading ledger {}", path.display()), e))?;

        let mut ledger: Self = serde_json::from_str(&content)?;
        ledger.path = path.to_path_buf();
        Ok(ledger)
    }

    /// Record `short -> revision`, rejecting a short tag already claimed by a
    /// different full revision. Re-recording the same revision is a no-op so
    /// pipeline re-runs stay idempotent.
    pub async fn record(&mut self, short: &str, revision: &str) -> DrydockResult<()> {
        match self.entries.get(short) {
            Some(existing) if existing != revision => {
                return Err(DrydockError::TagCollision {
                    short: short.to_string(),
                    existing: existing.clone(),
                    incoming: revision.to_string(),
                });
            }
            Some(_) => {
                debug!("Revision {} already in ledger", short);
                return Ok(());
            }
            None => {}
        }

        self.entries
            .insert(short.to_string(), revision.to_string());
        self.save().await
    }

    /// Full revision id recorded for a short tag, if any
    pub fn lookup(&self, short: &str) -> Option<&str> {
        self.entries.get(short).map(String::as_str)
    }

    /// Number of recorded revisions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger has no recorded revisions
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn save(&self) -> DrydockResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DrydockError::io("creating ledger directory", e))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, content)
            .await
            .map_err(|e| DrydockError::io(format!("writing ledger {}", self.path.display()), e))
    }
}
