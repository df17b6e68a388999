//! File-backed task store.
//!
//! Layout, one directory per task under `base_dir`:
//!
//! ```text
//! <base_dir>/<task_id>/metadata.json
//! <base_dir>/<task_id>/journal.jsonl
//! <base_dir>/<task_id>/checkpoint.json
//! ```
//!
//! JSON documents are replaced atomically (temp file, fsync, rename). The
//! journal is only ever appended to, one complete JSON object per line.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::models::{Checkpoint, TaskEvent, TaskId, TaskMetadata, TaskStatus};
use crate::domain::ports::errors::StoreError;
use crate::domain::ports::task_store::{apply_status_transition, TaskExecutionStore};

const METADATA_FILE: &str = "metadata.json";
const JOURNAL_FILE: &str = "journal.jsonl";
const CHECKPOINT_FILE: &str = "checkpoint.json";

/// Lock entries kept before idle ones are pruned.
const MAX_LOCK_ENTRIES: usize = 256;

/// Durable store keeping each task in its own directory.
///
/// A restarted process opening the same `base_dir` sees identical state.
#[derive(Debug)]
pub struct FileTaskStore {
    base_dir: PathBuf,
    // An entry is only removed while nothing else holds it, so a lock in
    // use stays the only lock for its task.
    locks: StdMutex<HashMap<TaskId, Arc<Mutex<()>>>>,
}

impl FileTaskStore {
    /// Create a store rooted at `base_dir`. Directories are created lazily.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn lock_for(&self, task_id: &TaskId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.len() >= MAX_LOCK_ENTRIES {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(locks.entry(task_id.clone()).or_default())
    }

    /// Forget the lock for `task_id` if no caller is using it.
    fn release_lock(&self, task_id: &TaskId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(task_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(task_id);
        }
    }

    fn task_dir(&self, task_id: &TaskId) -> Result<PathBuf, StoreError> {
        validate_task_id(task_id)?;
        Ok(self.base_dir.join(task_id.as_str()))
    }

    async fn read_metadata(&self, task_id: &TaskId) -> Result<Option<TaskMetadata>, StoreError> {
        let path = self.task_dir(task_id)?.join(METADATA_FILE);
        read_json(&path).await
    }

    async fn write_metadata(&self, metadata: &TaskMetadata) -> Result<(), StoreError> {
        let dir = self.task_dir(metadata.id())?;
        write_json_atomic(&dir, METADATA_FILE, metadata).await
    }
}

#[async_trait]
impl TaskExecutionStore for FileTaskStore {
    async fn save_metadata(&self, metadata: &TaskMetadata) -> Result<(), StoreError> {
        let lock = self.lock_for(metadata.id());
        let _guard = lock.lock().await;
        self.write_metadata(metadata).await
    }

    async fn load_metadata(&self, task_id: &TaskId) -> Result<Option<TaskMetadata>, StoreError> {
        let lock = self.lock_for(task_id);
        let _guard = lock.lock().await;
        self.read_metadata(task_id).await
    }

    async fn append_event(&self, event: &TaskEvent) -> Result<(), StoreError> {
        let dir = self.task_dir(&event.task_id)?;
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let lock = self.lock_for(&event.task_id);
        let _guard = lock.lock().await;

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        let path = dir.join(JOURNAL_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        truncate_torn_tail(&mut file, &event.task_id)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        file.write_all(&line)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.sync_data()
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        debug!(task_id = %event.task_id, event_type = event.type_name(), "Appended journal event");
        Ok(())
    }

    async fn load_events(&self, task_id: &TaskId) -> Result<Vec<TaskEvent>, StoreError> {
        let path = self.task_dir(task_id)?.join(JOURNAL_FILE);

        let lock = self.lock_for(task_id);
        let _guard = lock.lock().await;

        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        parse_journal(task_id, &raw)
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let dir = self.task_dir(&checkpoint.task_id)?;
        let lock = self.lock_for(&checkpoint.task_id);
        let _guard = lock.lock().await;
        write_json_atomic(&dir, CHECKPOINT_FILE, checkpoint).await
    }

    async fn load_checkpoint(&self, task_id: &TaskId) -> Result<Option<Checkpoint>, StoreError> {
        let path = self.task_dir(task_id)?.join(CHECKPOINT_FILE);
        let lock = self.lock_for(task_id);
        let _guard = lock.lock().await;
        read_json(&path).await
    }

    async fn get_all_task_ids(&self) -> Result<HashSet<TaskId>, StoreError> {
        let mut entries = match fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(StoreError::io(&self.base_dir, e)),
        };

        let mut ids = HashSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.base_dir, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| StoreError::io(entry.path(), e))?
                .is_dir();
            let has_metadata = fs::try_exists(entry.path().join(METADATA_FILE))
                .await
                .unwrap_or(false);
            if !is_dir || !has_metadata {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                ids.insert(TaskId::new(name));
            }
        }
        Ok(ids)
    }

    async fn delete(&self, task_id: &TaskId) -> Result<bool, StoreError> {
        let dir = self.task_dir(task_id)?;
        let lock = self.lock_for(task_id);
        let guard = lock.lock().await;

        let removed = match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&dir, e)),
        };
        drop(guard);
        drop(lock);
        self.release_lock(task_id);
        removed
    }

    async fn compare_and_set_status(
        &self,
        task_id: &TaskId,
        expected: TaskStatus,
        new: TaskStatus,
        failure_reason: Option<String>,
    ) -> Result<Option<TaskMetadata>, StoreError> {
        let lock = self.lock_for(task_id);
        let _guard = lock.lock().await;

        let Some(current) = self.read_metadata(task_id).await? else {
            return Ok(None);
        };
        let updated = apply_status_transition(&current, expected, new, failure_reason)?;
        if let Some(updated) = &updated {
            self.write_metadata(updated).await?;
        }
        Ok(updated)
    }
}

fn validate_task_id(task_id: &TaskId) -> Result<(), StoreError> {
    let id = task_id.as_str();
    let invalid = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StoreError::InvalidTaskId(id.to_string()));
    }
    Ok(())
}

/// Parse the journal. A final line without its newline was never
/// acknowledged and is skipped even when it parses, matching what the next
/// append truncates.
fn parse_journal(task_id: &TaskId, raw: &str) -> Result<Vec<TaskEvent>, StoreError> {
    let (body, tail) = match raw.rfind('\n') {
        Some(pos) => raw.split_at(pos + 1),
        None => ("", raw),
    };
    if !tail.is_empty() {
        warn!(task_id = %task_id, bytes = tail.len(), "Skipping torn journal tail");
    }

    let mut events = Vec::new();
    for (index, line) in body.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TaskEvent>(line) {
            Ok(event) => events.push(event),
            Err(source) => {
                return Err(StoreError::CorruptedJournal {
                    task_id: task_id.clone(),
                    line: index + 1,
                    source,
                });
            }
        }
    }
    Ok(events)
}

/// Drop a partially written final line left behind by a crash, so the next
/// record starts on a line of its own. The fragment was never acknowledged.
async fn truncate_torn_tail(file: &mut fs::File, task_id: &TaskId) -> std::io::Result<()> {
    const CHUNK: u64 = 4096;

    let len = file.metadata().await?.len();
    if len == 0 {
        return Ok(());
    }

    let mut end = len;
    let mut keep = 0;
    let mut buf = vec![0u8; CHUNK as usize];
    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let size = usize::try_from(end - start).unwrap_or(buf.len());
        file.seek(SeekFrom::Start(start)).await?;
        file.read_exact(&mut buf[..size]).await?;

        if end == len && buf[size - 1] == b'\n' {
            return Ok(());
        }
        if let Some(pos) = buf[..size].iter().rposition(|b| *b == b'\n') {
            keep = start + pos as u64 + 1;
            break;
        }
        end = start;
    }

    warn!(
        task_id = %task_id,
        dropped_bytes = len - keep,
        "Truncating torn journal tail"
    );
    file.set_len(keep).await?;
    file.sync_data().await
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Write `value` to `dir/file_name` so readers see either the old or the
/// new document, never a partial one.
async fn write_json_atomic<T: Serialize + ?Sized>(
    dir: &Path,
    file_name: &str,
    value: &T,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::create_dir_all(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;

    let target = dir.join(file_name);
    let tmp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    let written = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        fs::rename(&tmp, &target).await
    }
    .await;

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp).await;
        return Err(StoreError::io(&target, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TaskEventKind;
    use tempfile::TempDir;

    fn event(task_id: &str, reason: &str) -> TaskEvent {
        TaskEvent::now(
            TaskId::new(task_id),
            TaskEventKind::TaskPaused {
                reason: reason.to_string(),
                pending_agent_name: None,
            },
        )
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileTaskStore::new(dir.path());

        for bad in ["", ".", "..", "a/b", "a\\b"] {
            let err = store.load_events(&TaskId::new(bad)).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidTaskId(_)), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn test_torn_tail_is_skipped_and_repaired() {
        let dir = TempDir::new().unwrap();
        let store = FileTaskStore::new(dir.path());
        let id = TaskId::new("t-1");

        store.append_event(&event("t-1", "first")).await.unwrap();

        // Simulate a crash halfway through the second append
        let journal = dir.path().join("t-1").join(JOURNAL_FILE);
        let mut file = std::fs::OpenOptions::new().append(true).open(&journal).unwrap();
        std::io::Write::write_all(&mut file, b"{\"taskId\":\"t-1\",\"ty").unwrap();
        drop(file);

        let events = store.load_events(&id).await.unwrap();
        assert_eq!(events.len(), 1);

        store.append_event(&event("t-1", "third")).await.unwrap();
        let raw = fs::read_to_string(&journal).await.unwrap();
        assert_eq!(raw.lines().count(), 2);

        let reasons: Vec<String> = store
            .load_events(&id)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|e| match e.kind {
                TaskEventKind::TaskPaused { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(reasons, vec!["first".to_string(), "third".to_string()]);
    }

    #[tokio::test]
    async fn test_unterminated_tail_is_never_visible() {
        let dir = TempDir::new().unwrap();
        let store = FileTaskStore::new(dir.path());
        let id = TaskId::new("t-4");

        store.append_event(&event("t-4", "first")).await.unwrap();

        // A complete record whose newline never reached the disk
        let journal = dir.path().join("t-4").join(JOURNAL_FILE);
        let unterminated = serde_json::to_string(&event("t-4", "second")).unwrap();
        let mut file = std::fs::OpenOptions::new().append(true).open(&journal).unwrap();
        std::io::Write::write_all(&mut file, unterminated.as_bytes()).unwrap();
        drop(file);

        let before = store.load_events(&id).await.unwrap();
        store.append_event(&event("t-4", "third")).await.unwrap();
        let after = store.load_events(&id).await.unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
        assert_eq!(after[0], before[0]);
        assert!(matches!(
            &after[1].kind,
            TaskEventKind::TaskPaused { reason, .. } if reason == "third"
        ));
    }

    #[tokio::test]
    async fn test_delete_releases_task_lock() {
        let dir = TempDir::new().unwrap();
        let store = FileTaskStore::new(dir.path());
        let id = TaskId::new("t-5");

        store.append_event(&event("t-5", "x")).await.unwrap();
        assert!(store.delete(&id).await.unwrap());
        assert!(!store.locks.lock().unwrap().contains_key(&id));
    }

    #[test]
    fn test_idle_locks_are_pruned() {
        let dir = TempDir::new().unwrap();
        let store = FileTaskStore::new(dir.path());

        let held = store.lock_for(&TaskId::new("held"));
        for n in 0..MAX_LOCK_ENTRIES * 2 {
            drop(store.lock_for(&TaskId::new(format!("idle-{n}"))));
        }

        let locks = store.locks.lock().unwrap();
        assert!(locks.len() <= MAX_LOCK_ENTRIES);
        assert!(Arc::ptr_eq(&locks[&TaskId::new("held")], &held));
    }

    #[tokio::test]
    async fn test_corrupted_interior_line_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileTaskStore::new(dir.path());
        let task_dir = dir.path().join("t-2");
        fs::create_dir_all(&task_dir).await.unwrap();

        let good = serde_json::to_string(&event("t-2", "ok")).unwrap();
        fs::write(task_dir.join(JOURNAL_FILE), format!("not json\n{good}\n"))
            .await
            .unwrap();

        let err = store.load_events(&TaskId::new("t-2")).await.unwrap_err();
        assert!(matches!(err, StoreError::CorruptedJournal { line: 1, .. }));
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = FileTaskStore::new(dir.path());
        let meta = TaskMetadata::create(TaskId::new("t-3"), "writer", HashMap::new());

        store.save_metadata(&meta).await.unwrap();
        store.save_metadata(&meta).await.unwrap();

        let mut names = Vec::new();
        let mut entries = fs::read_dir(dir.path().join("t-3")).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec![METADATA_FILE.to_string()]);
    }

    #[tokio::test]
    async fn test_listing_ignores_dirs_without_metadata() {
        let dir = TempDir::new().unwrap();
        let store = FileTaskStore::new(dir.path());

        store.append_event(&event("journal-only", "x")).await.unwrap();
        let meta = TaskMetadata::create(TaskId::new("full"), "writer", HashMap::new());
        store.save_metadata(&meta).await.unwrap();

        let ids = store.get_all_task_ids().await.unwrap();
        assert_eq!(ids, HashSet::from([TaskId::new("full")]));
    }

    #[tokio::test]
    async fn test_missing_base_dir_lists_nothing() {
        let dir = TempDir::new().unwrap();
        let store = FileTaskStore::new(dir.path().join("not-created"));
        assert!(store.get_all_task_ids().await.unwrap().is_empty());
    }
}
