//! Training Audit Trail
//!
//! Append-only record of every training run.
//!
//! Log format: JSON Lines (.jsonl), one `TrainingRun` per line.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use super::run::TrainingRun;
use crate::error::RiskResult;

// ============================================================================
// CONSTANTS
// ============================================================================

const AUDIT_FILE_NAME: &str = "training_audit.jsonl";

pub trait TrainingAudit: Send + Sync {
    fn append(&self, run: &TrainingRun) -> RiskResult<()>;

    /// All recorded runs, oldest first
    fn runs(&self) -> RiskResult<Vec<TrainingRun>>;
}

// ============================================================================
// IN-MEMORY
// ============================================================================

#[derive(Default)]
pub struct InMemoryAudit {
    runs: RwLock<Vec<TrainingRun>>,
}

impl InMemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }
}

impl TrainingAudit for InMemoryAudit {
    fn append(&self, run: &TrainingRun) -> RiskResult<()> {
        self.runs.write().push(run.clone());
        Ok(())
    }

    fn runs(&self) -> RiskResult<Vec<TrainingRun>> {
        Ok(self.runs.read().clone())
    }
}

// ============================================================================
// JSONL FILE
// ============================================================================

/// File-backed trail. Each append opens, writes one line and flushes.
pub struct JsonlAudit {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAudit {
    pub fn new(path: impl Into<PathBuf>) -> RiskResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// `{dir}/training_audit.jsonl`
    pub fn in_dir(dir: impl AsRef<Path>) -> RiskResult<Self> {
        Self::new(dir.as_ref().join(AUDIT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrainingAudit for JsonlAudit {
    fn append(&self, run: &TrainingRun) -> RiskResult<()> {
        let line = serde_json::to_string(run)?;
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }

    fn runs(&self) -> RiskResult<Vec<TrainingRun>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut runs = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TrainingRun>(&line) {
                Ok(run) => runs.push(run),
                Err(e) => log::warn!("Skipping unreadable audit line {}: {}", n + 1, e),
            }
        }
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_jsonl_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let audit = JsonlAudit::in_dir(dir.path().join("audit")).unwrap();
        assert!(audit.runs().unwrap().is_empty());

        let now = Utc::now();
        audit.append(&TrainingRun::new("run-1", "w", now, now)).unwrap();
        audit.append(&TrainingRun::new("run-2", "w", now, now)).unwrap();

        // torn write from a crash
        let mut f = OpenOptions::new().append(true).open(audit.path()).unwrap();
        writeln!(f, "{{\"run_id\": \"trunc").unwrap();

        let runs = audit.runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, "run-1");
        assert_eq!(runs[1].run_id, "run-2");
    }

    #[test]
    fn test_memory_audit() {
        let audit = InMemoryAudit::new();
        let now = Utc::now();
        audit.append(&TrainingRun::new("a", "w", now, now)).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit.runs().unwrap()[0].run_id, "a");
    }
}
