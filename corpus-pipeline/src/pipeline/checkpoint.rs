//! Durable per-stage progress records enabling resume after interruption.
//!
//! Each stage owns one NDJSON log; every committed batch appends a record
//! carrying the attempted ids and the surviving output chunks. Recovery
//! replays the log; a torn trailing line from a crash mid-write is skipped,
//! leaving every earlier record intact.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use corpus_core::domain::Chunk;
use corpus_core::{CorpusError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::observability::metrics;

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRecord {
    stage_name: String,
    processed_chunk_ids: Vec<String>,
    outputs: Vec<Chunk>,
    committed_at: DateTime<Utc>,
}

/// The replayed state of one stage's log.
#[derive(Debug, Default)]
pub struct Checkpoint {
    pub processed_chunk_ids: HashSet<String>,
    pub outputs: Vec<Chunk>,
    pub timestamp: Option<DateTime<Utc>>,
}

pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            CorpusError::resource(format!(
                "cannot create checkpoint directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    fn log_path(&self, stage_name: &str) -> PathBuf {
        self.dir.join(format!("{}.ndjson", stage_name))
    }

    /// Append one committed batch. The record is flushed and fsynced before
    /// returning; an id is only ever visible with its output alongside it.
    pub fn save(&self, stage_name: &str, processed_ids: &[String], outputs: &[Chunk]) -> Result<()> {
        let record = CheckpointRecord {
            stage_name: stage_name.to_string(),
            processed_chunk_ids: processed_ids.to_vec(),
            outputs: outputs.to_vec(),
            committed_at: Utc::now(),
        };
        let line = serde_json::to_string(&record)
            .map_err(|e| CorpusError::resource(format!("checkpoint serialization failed: {}", e)))?;

        let path = self.log_path(stage_name);
        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            writeln!(file, "{}", line)?;
            file.flush()?;
            file.sync_all()
        };
        match write() {
            Ok(()) => {
                metrics::checkpoint::write_success();
                metrics::checkpoint::write_bytes(line.len());
                debug!(
                    "Committed checkpoint for {} ({} ids)",
                    stage_name,
                    processed_ids.len()
                );
                Ok(())
            }
            Err(e) => {
                metrics::checkpoint::write_error();
                Err(CorpusError::resource(format!(
                    "checkpoint append to '{}' failed: {}",
                    path.display(),
                    e
                )))
            }
        }
    }

    /// Replay a stage's log. Returns None when the stage never committed.
    pub fn load(&self, stage_name: &str) -> Result<Option<Checkpoint>> {
        let path = self.log_path(stage_name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CorpusError::resource(format!(
                    "cannot read checkpoint log '{}': {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut checkpoint = Checkpoint::default();
        let mut replayed = 0usize;
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CheckpointRecord>(line) {
                Ok(record) => {
                    checkpoint
                        .processed_chunk_ids
                        .extend(record.processed_chunk_ids);
                    checkpoint.outputs.extend(record.outputs);
                    checkpoint.timestamp = Some(record.committed_at);
                    replayed += 1;
                }
                Err(e) => {
                    // A torn final line from an interrupted write is expected;
                    // everything before it is still durable.
                    warn!(
                        "Skipping unreadable checkpoint record in {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }
        if replayed == 0 {
            return Ok(None);
        }
        debug!(
            "Replayed {} checkpoint records for {} ({} ids)",
            replayed,
            stage_name,
            checkpoint.processed_chunk_ids.len()
        );
        Ok(Some(checkpoint))
    }

    /// Ids to skip when (re)running a stage.
    pub fn resume_set(&self, stage_name: &str) -> Result<HashSet<String>> {
        Ok(self
            .load(stage_name)?
            .map(|cp| cp.processed_chunk_ids)
            .unwrap_or_default())
    }

    /// Remove all stage logs, forcing the next run to start from scratch.
    pub fn clear(&self) -> Result<()> {
        for entry in fs::read_dir(&self.dir).map_err(|e| {
            CorpusError::resource(format!("cannot list checkpoint directory: {}", e))
        })? {
            let entry = entry.map_err(|e| CorpusError::resource(e.to_string()))?;
            if entry.path().extension().map_or(false, |ext| ext == "ndjson") {
                fs::remove_file(entry.path())
                    .map_err(|e| CorpusError::resource(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Delete logs older than `max_age`. Returns how many were removed.
    #[allow(dead_code)]
    pub fn cleanup_older_than(&self, max_age: Duration) -> Result<usize> {
        let mut removed = 0usize;
        let now = SystemTime::now();
        for entry in fs::read_dir(&self.dir).map_err(|e| {
            CorpusError::resource(format!("cannot list checkpoint directory: {}", e))
        })? {
            let entry = entry.map_err(|e| CorpusError::resource(e.to_string()))?;
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "ndjson") {
                continue;
            }
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            if now.duration_since(modified).unwrap_or_default() > max_age {
                if fs::remove_file(&path).is_ok() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
