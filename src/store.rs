//! Task store: persists `(Task, TaskHistory)` pairs keyed by task id.
//! Two variants: an in-memory map and an on-disk JSON-pair-per-task
//! layout.
//!
//! Both variants deep-copy on `load`/`save` boundaries so callers can
//! never mutate stored state through a returned reference, and both
//! serialize `save` calls per task id so a cancel request and a
//! concurrently-running handler never interleave mid-write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{A2AError, A2AResult};
use crate::types::{Task, TaskAndHistory, TaskHistory};

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Load a task and its history. Returns `None` if no task with this
    /// id exists.
    async fn load(&self, task_id: &str) -> A2AResult<Option<TaskAndHistory>>;

    /// Save (overwriting any prior entry for the same id) a task and
    /// its history together.
    async fn save(&self, snapshot: &TaskAndHistory) -> A2AResult<()>;
}

/// Rejects any id containing a path separator or a `..` component, so
/// it can never escape the store directory. Returns the id unchanged
/// when safe, so callers can use it directly as a filename stem.
pub fn sanitize_task_id(task_id: &str) -> A2AResult<&str> {
    if task_id.is_empty()
        || task_id.contains('/')
        || task_id.contains('\\')
        || task_id.split(['/', '\\']).any(|seg| seg == "..")
        || task_id == ".."
    {
        return Err(A2AError::invalid_params(format!(
            "task id {task_id:?} is not a valid identifier (path separators and '..' are rejected)"
        )));
    }
    Ok(task_id)
}

// ---------------------------------------------------------------------------
// In-memory variant
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, TaskAndHistory>>,
    /// One lock per task id, so concurrent `save`s for the same id
    /// serialize even though the map itself uses a `RwLock`.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, task_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(task_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn load(&self, task_id: &str) -> A2AResult<Option<TaskAndHistory>> {
        let tasks = self.tasks.read().await;
        let found = tasks.get(task_id).cloned();
        debug!(task_id = %task_id, found = found.is_some(), "task load");
        Ok(found)
    }

    async fn save(&self, snapshot: &TaskAndHistory) -> A2AResult<()> {
        let per_task_lock = self.lock_for(&snapshot.task.id).await;
        let _guard = per_task_lock.lock().await;
        let mut tasks = self.tasks.write().await;
        tasks.insert(snapshot.task.id.clone(), snapshot.clone());
        debug!(task_id = %snapshot.task.id, "task saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Disk variant
// ---------------------------------------------------------------------------

pub struct DiskTaskStore {
    base_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DiskTaskStore {
    pub async fn new(base_dir: impl AsRef<Path>) -> A2AResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&base_dir).await?;
        Ok(DiskTaskStore {
            base_dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    fn task_path(&self, safe_id: &str) -> PathBuf {
        self.base_dir.join(format!("{safe_id}.json"))
    }

    fn history_path(&self, safe_id: &str) -> PathBuf {
        self.base_dir.join(format!("{safe_id}.history.json"))
    }

    async fn lock_for(&self, task_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(task_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn read_history(path: &Path) -> TaskHistory {
        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<TaskHistory>(&bytes) {
                Ok(history) => history,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "malformed history file, using empty history");
                    TaskHistory::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "history file missing, using empty history");
                TaskHistory::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read history file, using empty history");
                TaskHistory::default()
            }
        }
    }
}

#[async_trait]
impl TaskStore for DiskTaskStore {
    async fn load(&self, task_id: &str) -> A2AResult<Option<TaskAndHistory>> {
        let safe_id = sanitize_task_id(task_id)?;
        let task_path = self.task_path(safe_id);

        let task: Task = match tokio::fs::read(&task_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(task_id = %task_id, "task load: not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let history = Self::read_history(&self.history_path(safe_id)).await;
        debug!(task_id = %task_id, "task load: found");
        Ok(Some(TaskAndHistory { task, history }))
    }

    async fn save(&self, snapshot: &TaskAndHistory) -> A2AResult<()> {
        let safe_id = sanitize_task_id(&snapshot.task.id)?.to_string();
        let per_task_lock = self.lock_for(&safe_id).await;
        let _guard = per_task_lock.lock().await;

        let task_json = serde_json::to_vec_pretty(&snapshot.task)?;
        let history_json = serde_json::to_vec_pretty(&snapshot.history)?;

        tokio::fs::write(self.task_path(&safe_id), task_json).await?;
        tokio::fs::write(self.history_path(&safe_id), history_json).await?;

        debug!(task_id = %safe_id, "task saved to disk");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, Status, TaskState};

    fn snapshot(id: &str) -> TaskAndHistory {
        TaskAndHistory {
            task: Task::new(id, None),
            history: TaskHistory {
                messages: vec![Message::user_text("hi")],
            },
        }
    }

    #[tokio::test]
    async fn memory_store_roundtrips_deep_equal() {
        let store = InMemoryTaskStore::new();
        let snap = snapshot("t1");
        store.save(&snap).await.unwrap();
        let loaded = store.load("t1").await.unwrap().unwrap();
        assert_eq!(loaded, snap);
    }

    #[tokio::test]
    async fn memory_store_load_missing_is_none() {
        let store = InMemoryTaskStore::new();
        assert!(store.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_save_overwrites() {
        let store = InMemoryTaskStore::new();
        let mut snap = snapshot("t1");
        store.save(&snap).await.unwrap();
        snap.task.status = Status::new(TaskState::Completed);
        store.save(&snap).await.unwrap();
        let loaded = store.load("t1").await.unwrap().unwrap();
        assert_eq!(loaded.task.status.state, TaskState::Completed);
    }

    #[tokio::test]
    async fn disk_store_roundtrips_deep_equal() {
        let dir = tempfile_dir();
        let store = DiskTaskStore::new(&dir).await.unwrap();
        let snap = snapshot("t2");
        store.save(&snap).await.unwrap();
        let loaded = store.load("t2").await.unwrap().unwrap();
        assert_eq!(loaded.task, snap.task);
        assert_eq!(loaded.history, snap.history);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn disk_store_rejects_path_traversal() {
        let dir = tempfile_dir();
        let store = DiskTaskStore::new(&dir).await.unwrap();
        let err = store.save(&snapshot("../escape")).await.unwrap_err();
        assert_eq!(err.code(), crate::error::INVALID_PARAMS);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn disk_store_missing_history_file_yields_empty_history() {
        let dir = tempfile_dir();
        let store = DiskTaskStore::new(&dir).await.unwrap();
        let task = Task::new("t3", None);
        tokio::fs::write(dir.join("t3.json"), serde_json::to_vec(&task).unwrap())
            .await
            .unwrap();
        let loaded = store.load("t3").await.unwrap().unwrap();
        assert!(loaded.history.messages.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    fn tempfile_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("a2a-store-test-{}", uuid::Uuid::new_v4()));
        dir
    }
}
