//! Durable checkpoint store.
//!
//! One checkpoint is written after each successfully completed stage, as a
//! numbered JSON file under `<base>/<run-id>/`. Files are append-only per
//! run; loading returns the highest sequence number. Writes go through a
//! temp file plus rename so a reader never observes a partially written
//! checkpoint.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use crate::domain::Session;

use super::error::PipelineError;
use super::stage::StageKind;

/// A point-in-time serialization of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Run this checkpoint belongs to
    pub run_id: Uuid,

    /// Stage whose completion produced this checkpoint
    pub stage: StageKind,

    /// Monotonic sequence within the run (1-based)
    pub sequence: usize,

    /// When the checkpoint was written
    pub saved_at: DateTime<Utc>,

    /// Full session snapshot
    pub session: Session,
}

/// File-based checkpoint store
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    base_dir: PathBuf,
}

impl CheckpointStore {
    /// Store rooted at the configured runs directory
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::open(crate::config::runs_dir()?))
    }

    /// Store rooted at an explicit directory (tests use a temp dir)
    pub fn open(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Base directory for all runs
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.base_dir.join(run_id.to_string())
    }

    /// Write a checkpoint for a completed stage.
    ///
    /// The sequence number is the session's completed-stage count, so
    /// checkpoints sort by filename in completion order.
    pub async fn save(&self, session: &Session, stage: StageKind) -> Result<PathBuf, PipelineError> {
        let run_dir = self.run_dir(session.id);
        fs::create_dir_all(&run_dir)
            .await
            .map_err(|e| PipelineError::Persistence(format!("create {}: {}", run_dir.display(), e)))?;

        let sequence = session.completed_stages.len();
        let checkpoint = Checkpoint {
            run_id: session.id,
            stage,
            sequence,
            saved_at: Utc::now(),
            session: session.clone(),
        };

        let json = serde_json::to_vec_pretty(&checkpoint)
            .map_err(|e| PipelineError::Persistence(format!("serialize checkpoint: {}", e)))?;

        let final_path = run_dir.join(format!("ckpt-{:04}-{}.json", sequence, stage.id()));
        let tmp_path = run_dir.join(format!(".ckpt-{:04}.tmp", sequence));

        fs::write(&tmp_path, &json)
            .await
            .map_err(|e| PipelineError::Persistence(format!("write {}: {}", tmp_path.display(), e)))?;
        fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| PipelineError::Persistence(format!("rename {}: {}", final_path.display(), e)))?;

        Ok(final_path)
    }

    /// Load the most recent checkpoint for a run, if any
    pub async fn load_latest(&self, run_id: Uuid) -> Result<Option<Checkpoint>, PipelineError> {
        let run_dir = self.run_dir(run_id);
        if !run_dir.exists() {
            return Ok(None);
        }

        let mut paths: Vec<PathBuf> = Vec::new();
        let mut entries = fs::read_dir(&run_dir)
            .await
            .map_err(|e| PipelineError::Persistence(format!("read {}: {}", run_dir.display(), e)))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with("ckpt-") && name.ends_with(".json") {
                    paths.push(entry.path());
                }
            }
        }

        // Filenames embed the zero-padded sequence number
        paths.sort();
        let Some(latest) = paths.last() else {
            return Ok(None);
        };

        let content = fs::read_to_string(latest)
            .await
            .map_err(|e| PipelineError::Persistence(format!("read {}: {}", latest.display(), e)))?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)
            .map_err(|e| PipelineError::Persistence(format!("parse {}: {}", latest.display(), e)))?;

        Ok(Some(checkpoint))
    }

    /// List all run IDs with at least one checkpoint
    pub async fn list_runs(&self) -> Result<Vec<Uuid>, PipelineError> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        let mut entries = fs::read_dir(&self.base_dir)
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| PipelineError::Persistence(e.to_string()))?
                .is_dir();
            if is_dir {
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(uuid) = Uuid::parse_str(name) {
                        runs.push(uuid);
                    }
                }
            }
        }

        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModuleSettings, Segment, Story};
    use tempfile::TempDir;

    fn session_with_segments() -> Session {
        let mut session = Session::new(
            Story::new("A knight explores a castle."),
            ModuleSettings::default(),
        );
        session.segments.push(Segment::new(0, 5.0, "A knight explores a castle."));
        session.completed_stages.push(StageKind::Segmentation);
        session
    }

    #[tokio::test]
    async fn test_save_and_load_latest() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path());
        let session = session_with_segments();

        store.save(&session, StageKind::Segmentation).await.unwrap();

        let loaded = store.load_latest(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.run_id, session.id);
        assert_eq!(loaded.stage, StageKind::Segmentation);
        assert_eq!(loaded.sequence, 1);
        assert_eq!(loaded.session.segments.len(), 1);
        assert_eq!(loaded.session.segments[0].content, session.segments[0].content);
    }

    #[tokio::test]
    async fn test_latest_wins_across_stages() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path());
        let mut session = session_with_segments();

        store.save(&session, StageKind::Segmentation).await.unwrap();
        session.completed_stages.push(StageKind::Taxonomy);
        store.save(&session, StageKind::Taxonomy).await.unwrap();

        let loaded = store.load_latest(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.stage, StageKind::Taxonomy);
        assert_eq!(loaded.sequence, 2);
    }

    #[tokio::test]
    async fn test_no_partial_files_remain() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path());
        let session = session_with_segments();

        store.save(&session, StageKind::Segmentation).await.unwrap();

        let run_dir = temp.path().join(session.id.to_string());
        for entry in std::fs::read_dir(run_dir).unwrap() {
            let name = entry.unwrap().file_name();
            assert!(!name.to_string_lossy().ends_with(".tmp"));
        }
    }

    #[tokio::test]
    async fn test_missing_run_loads_none() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path());
        assert!(store.load_latest(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_runs() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path());

        assert!(store.list_runs().await.unwrap().is_empty());

        let session = session_with_segments();
        store.save(&session, StageKind::Segmentation).await.unwrap();

        let runs = store.list_runs().await.unwrap();
        assert_eq!(runs, vec![session.id]);
    }
}
