//! Append-only JSONL provenance trail for capture/restore requests.
//!
//! One canonical JSON object per line, each carrying the SHA-256 hash of
//! the previous line so a reader can detect any line being edited or
//! removed after the fact. Kept local to this crate rather than pulled
//! in as a dependency since the snapshot store only ever needs two
//! event kinds.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    Captured {
        version_id: Uuid,
        hash: String,
        actor: Uuid,
    },
    RestoreRequested {
        version_id: Uuid,
        actor: Uuid,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProvenanceRecord {
    ts_utc: DateTime<Utc>,
    #[serde(flatten)]
    event: ProvenanceEvent,
    hash_prev: Option<String>,
    hash_self: String,
}

pub struct ProvenanceLog {
    path: PathBuf,
    last_hash: Option<String>,
}

impl ProvenanceLog {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {parent:?}"))?;
            }
        }
        Ok(ProvenanceLog {
            path,
            last_hash: None,
        })
    }

    pub fn append(&mut self, event: ProvenanceEvent) -> Result<()> {
        let mut record = ProvenanceRecord {
            ts_utc: Utc::now(),
            event,
            hash_prev: self.last_hash.clone(),
            hash_self: String::new(),
        };

        let hash = hash_of(&record)?;
        record.hash_self = hash.clone();
        self.last_hash = Some(hash);

        let line = serde_json::to_string(&record).context("serialize provenance record")?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open provenance log {:?}", self.path))?;
        f.write_all(line.as_bytes())?;
        f.write_all(b"\n")?;
        Ok(())
    }
}

fn hash_of(record: &ProvenanceRecord) -> Result<String> {
    let mut for_hash = record.clone();
    for_hash.hash_self.clear();
    let canonical = serde_json::to_string(&for_hash).context("canonicalize provenance record")?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_hashes_link_successive_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provenance.jsonl");
        let mut log = ProvenanceLog::new(&path).unwrap();

        log.append(ProvenanceEvent::Captured {
            version_id: Uuid::new_v4(),
            hash: "abc".to_string(),
            actor: Uuid::new_v4(),
        })
        .unwrap();
        log.append(ProvenanceEvent::RestoreRequested {
            version_id: Uuid::new_v4(),
            actor: Uuid::new_v4(),
        })
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: ProvenanceRecord = serde_json::from_str(lines[0]).unwrap();
        let second: ProvenanceRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.hash_prev, Some(first.hash_self));
    }
}
