//! Persistent storage backends for scheduler jobs (spec §6: "Job storage.
//! CRUD over a map of job id → Job record").
//!
//! Adapted near-verbatim from the reference framework's
//! `cron::storage` (`CronStorage` trait, memory and file-backed impls) —
//! the storage contract did not need to change, only the record type it
//! stores.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::job::{Job, JobId};
use crate::error::SchedulerError;

/// Result alias for job storage operations.
pub type StorageResult<T> = Result<T, SchedulerError>;

/// CRUD storage for scheduler jobs.
#[async_trait]
pub trait JobStorage: Send + Sync {
    /// List every stored job.
    async fn list(&self) -> StorageResult<Vec<Job>>;

    /// Get a job by id.
    async fn get(&self, id: &JobId) -> StorageResult<Option<Job>>;

    /// Insert or update a job (upsert).
    async fn save(&self, job: &Job) -> StorageResult<()>;

    /// Delete a job by id. Not an error if it does not exist — callers
    /// check existence themselves when they need `ErrJobNotFound`.
    async fn delete(&self, id: &JobId) -> StorageResult<()>;
}

/// In-memory job storage (no persistence across restarts).
#[derive(Debug, Default)]
pub struct MemoryJobStorage {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl MemoryJobStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStorage for MemoryJobStorage {
    async fn list(&self) -> StorageResult<Vec<Job>> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }

    async fn get(&self, id: &JobId) -> StorageResult<Option<Job>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn save(&self, job: &Job) -> StorageResult<()> {
        self.jobs.write().await.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn delete(&self, id: &JobId) -> StorageResult<()> {
        self.jobs.write().await.remove(id);
        Ok(())
    }
}

/// File-backed job storage: an in-memory cache mirrored to a single JSON
/// file on every mutation.
#[derive(Debug)]
pub struct FileJobStorage {
    path: PathBuf,
    cache: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl FileJobStorage {
    /// Point storage at `path`; call [`FileJobStorage::init`] to load any
    /// existing contents before use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Load jobs from disk into the cache. A missing file is not an error
    /// (fresh install).
    pub async fn init(&self) -> StorageResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        let jobs: Vec<Job> = serde_json::from_str(&content)?;
        let mut cache = self.cache.write().await;
        cache.clear();
        for job in jobs {
            cache.insert(job.id.clone(), job);
        }
        Ok(())
    }

    async fn persist(&self) -> StorageResult<()> {
        let cache = self.cache.read().await;
        let jobs: Vec<&Job> = cache.values().collect();
        let content = serde_json::to_string_pretty(&jobs)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl JobStorage for FileJobStorage {
    async fn list(&self) -> StorageResult<Vec<Job>> {
        Ok(self.cache.read().await.values().cloned().collect())
    }

    async fn get(&self, id: &JobId) -> StorageResult<Option<Job>> {
        Ok(self.cache.read().await.get(id).cloned())
    }

    async fn save(&self, job: &Job) -> StorageResult<()> {
        {
            let mut cache = self.cache.write().await;
            cache.insert(job.id.clone(), job.clone());
        }
        self.persist().await
    }

    async fn delete(&self, id: &JobId) -> StorageResult<()> {
        {
            let mut cache = self.cache.write().await;
            cache.remove(id);
        }
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::job::{Job, JobSchedule};

    fn sample_job(id: &str) -> Job {
        Job::builder(
            id,
            JobSchedule::OneShot {
                execute_at: chrono::Utc::now(),
            },
        )
        .tool("send_message")
        .message("hello")
        .session_id("telegram:1")
        .build()
        .unwrap()
    }

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryJobStorage::new();
        let job = sample_job("j1");
        storage.save(&job).await.unwrap();

        let retrieved = storage.get(&job.id).await.unwrap();
        assert_eq!(retrieved.unwrap().tool, "send_message");
        assert_eq!(storage.list().await.unwrap().len(), 1);

        storage.delete(&job.id).await.unwrap();
        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");

        let storage = FileJobStorage::new(&path);
        storage.init().await.unwrap();
        storage.save(&sample_job("j1")).await.unwrap();

        let reopened = FileJobStorage::new(&path);
        reopened.init().await.unwrap();
        assert_eq!(reopened.list().await.unwrap().len(), 1);
    }
}
