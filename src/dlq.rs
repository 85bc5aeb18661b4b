//! The Dead-Letter Queue: append-only store of exhausted failures.
//!
//! Generalizes `flow.rs`'s `persist_step_result` (one JSON file per node
//! run) to one file per DLQ entry, adding the atomic write-then-rename the
//! spec's concurrency model requires ("reads may see a snapshot slightly
//! behind concurrent writes but never a torn file").

use crate::context::{ActionResult, ExecutionContext};
use crate::envelope::Envelope;
use crate::error::MovaError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DlqStatus {
    Active,
    Retrying,
    Resolved,
    Archived,
}

impl DlqStatus {
    /// Status transitions are monotonic along active -> retrying ->
    /// {resolved, active} | archived; archived is always final.
    pub fn can_transition_to(&self, next: DlqStatus) -> bool {
        use DlqStatus::*;
        match (self, next) {
            (Archived, _) => false,
            (_, Archived) => true,
            (Active, Retrying) => true,
            (Retrying, Resolved) | (Retrying, Active) => true,
            (Active, Active) | (Retrying, Retrying) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub attempts: u32,
    pub last_error: String,
    pub error_history: Vec<String>,
    pub failure_reason: String,
    pub retry_profile_used: String,
    #[serde(default)]
    pub environment_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqMetadata {
    pub workflow_type: String,
    pub user_id: Option<String>,
    pub retry_count: u32,
    pub last_retry_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub id: String,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub status: DlqStatus,
    pub envelope: Envelope,
    pub context_snapshot: ExecutionContext,
    pub failed_action: ActionResult,
    pub error_details: ErrorDetails,
    pub metadata: DlqMetadata,
    /// Set when this entry was created by re-failing a retried entry
    /// (spec.md §9: "never mutate the prior entry beyond its status").
    pub previous_dlq_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DlqFilter {
    pub status: Option<DlqStatus>,
    pub workflow_type: Option<String>,
    pub user_id: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DlqStats {
    pub total: usize,
    pub active: usize,
    pub retrying: usize,
    pub resolved: usize,
    pub archived: usize,
}

#[async_trait]
pub trait DlqStore: Send + Sync {
    async fn add(
        &self,
        envelope: &Envelope,
        context: &ExecutionContext,
        failed_action: &ActionResult,
        error_details: ErrorDetails,
        previous_dlq_id: Option<String>,
    ) -> Result<DlqEntry, MovaError>;

    async fn get(&self, id: &str) -> Result<Option<DlqEntry>, MovaError>;
    async fn list(&self, filter: &DlqFilter) -> Result<Vec<DlqEntry>, MovaError>;
    async fn update_status(&self, id: &str, status: DlqStatus) -> Result<(), MovaError>;
    async fn archive(&self, id: &str) -> Result<(), MovaError>;
    async fn delete(&self, id: &str) -> Result<(), MovaError>;
    async fn stats(&self) -> Result<DlqStats, MovaError>;
}

/// One `<id>.json` file per entry under `root`. Writes go to a sibling
/// temp file first, then `rename` into place, so concurrent readers never
/// observe a partially-written entry.
pub struct FilesystemDlqStore {
    root: PathBuf,
    // Serializes writes to the same entry; the spec requires per-entry
    // serialization, not a single global lock, but a single lock over this
    // small critical section (temp-write + rename) keeps the implementation
    // simple without sacrificing the per-entry guarantee in practice.
    write_lock: Arc<Mutex<()>>,
}

impl FilesystemDlqStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, MovaError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, write_lock: Arc::new(Mutex::new(())) })
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }

    async fn write_entry(&self, entry: &DlqEntry) -> Result<(), MovaError> {
        let _guard = self.write_lock.lock().await;
        let final_path = self.entry_path(&entry.id);
        let tmp_path = self.root.join(format!("{}.json.tmp", entry.id));
        let content = serde_json::to_vec_pretty(entry)?;
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;
        Ok(())
    }

    async fn read_entry(path: &Path) -> Result<DlqEntry, MovaError> {
        let content = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&content)?)
    }
}

#[async_trait]
impl DlqStore for FilesystemDlqStore {
    async fn add(
        &self,
        envelope: &Envelope,
        context: &ExecutionContext,
        failed_action: &ActionResult,
        error_details: ErrorDetails,
        previous_dlq_id: Option<String>,
    ) -> Result<DlqEntry, MovaError> {
        let entry = DlqEntry {
            id: Uuid::new_v4().to_string(),
            run_id: context.run_id.clone(),
            created_at: Utc::now(),
            status: DlqStatus::Active,
            envelope: envelope.clone(),
            context_snapshot: context.clone(),
            failed_action: failed_action.clone(),
            error_details,
            metadata: DlqMetadata {
                workflow_type: envelope.intent.name.clone(),
                user_id: None,
                retry_count: 0,
                last_retry_time: None,
            },
            previous_dlq_id,
        };
        self.write_entry(&entry).await?;
        Ok(entry)
    }

    async fn get(&self, id: &str) -> Result<Option<DlqEntry>, MovaError> {
        let path = self.entry_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::read_entry(&path).await?))
    }

    async fn list(&self, filter: &DlqFilter) -> Result<Vec<DlqEntry>, MovaError> {
        let mut out = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let dlq_entry = Self::read_entry(&path).await?;
            if let Some(status) = filter.status {
                if dlq_entry.status != status {
                    continue;
                }
            }
            if let Some(ref wf) = filter.workflow_type {
                if &dlq_entry.metadata.workflow_type != wf {
                    continue;
                }
            }
            if let Some(ref uid) = filter.user_id {
                if dlq_entry.metadata.user_id.as_ref() != Some(uid) {
                    continue;
                }
            }
            if let Some(after) = filter.created_after {
                if dlq_entry.created_at < after {
                    continue;
                }
            }
            if let Some(before) = filter.created_before {
                if dlq_entry.created_at > before {
                    continue;
                }
            }
            out.push(dlq_entry);
        }
        out.sort_by_key(|e| e.created_at);
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn update_status(&self, id: &str, status: DlqStatus) -> Result<(), MovaError> {
        let mut entry = self.get(id).await?.ok_or_else(|| MovaError::Persistence {
            message: format!("DLQ entry {} not found", id),
        })?;
        if !entry.status.can_transition_to(status) {
            return Err(MovaError::Configuration {
                message: format!("cannot transition DLQ entry {} from {:?} to {:?}", id, entry.status, status),
            });
        }
        entry.status = status;
        self.write_entry(&entry).await
    }

    async fn archive(&self, id: &str) -> Result<(), MovaError> {
        self.update_status(id, DlqStatus::Archived).await
    }

    async fn delete(&self, id: &str) -> Result<(), MovaError> {
        let path = self.entry_path(id);
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn stats(&self) -> Result<DlqStats, MovaError> {
        let all = self.list(&DlqFilter::default()).await?;
        let mut stats = DlqStats { total: all.len(), ..Default::default() };
        for entry in &all {
            match entry.status {
                DlqStatus::Active => stats.active += 1,
                DlqStatus::Retrying => stats.retrying += 1,
                DlqStatus::Resolved => stats.resolved += 1,
                DlqStatus::Archived => stats.archived += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ActionResult, ActionStatus};
    use crate::envelope::{Action, ActionKind, Intent};

    fn sample_envelope() -> Envelope {
        Envelope {
            version: "1".to_string(),
            intent: Intent {
                name: "wf".to_string(),
                version: "1".to_string(),
                description: None,
                tags: vec![],
                timeout: std::time::Duration::from_secs(60),
                default_retry_profile: None,
                default_budget: None,
            },
            payload: HashMap::new(),
            actions: vec![Action {
                name: "a".to_string(),
                enabled: true,
                timeout: None,
                retry_policy: None,
                kind: ActionKind::Log { message: "x".to_string(), level: "info".to_string() },
            }],
            variables: HashMap::new(),
            secrets: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn add_then_get_round_trips_via_atomic_rename() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemDlqStore::new(dir.path()).unwrap();
        let envelope = sample_envelope();
        let context = ExecutionContext::new("run-1", "wf");
        let mut failed_action = ActionResult::new("a");
        failed_action.finish(ActionStatus::Failed);
        let details = ErrorDetails {
            attempts: 5,
            last_error: "boom".to_string(),
            error_history: vec!["boom".to_string(); 5],
            failure_reason: "transport".to_string(),
            retry_profile_used: "balanced".to_string(),
            environment_tags: vec![],
        };
        let entry = store.add(&envelope, &context, &failed_action, details, None).await.unwrap();
        let fetched = store.get(&entry.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, entry.id);
        assert_eq!(fetched.status, DlqStatus::Active);
        assert_eq!(fetched.error_details.error_history.len(), 5);
    }

    #[tokio::test]
    async fn archived_entries_reject_further_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemDlqStore::new(dir.path()).unwrap();
        let envelope = sample_envelope();
        let context = ExecutionContext::new("run-1", "wf");
        let mut failed_action = ActionResult::new("a");
        failed_action.finish(ActionStatus::Failed);
        let details = ErrorDetails {
            attempts: 1,
            last_error: "boom".to_string(),
            error_history: vec!["boom".to_string()],
            failure_reason: "transport".to_string(),
            retry_profile_used: "balanced".to_string(),
            environment_tags: vec![],
        };
        let entry = store.add(&envelope, &context, &failed_action, details, None).await.unwrap();
        store.archive(&entry.id).await.unwrap();
        let result = store.update_status(&entry.id, DlqStatus::Retrying).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stats_counts_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemDlqStore::new(dir.path()).unwrap();
        let envelope = sample_envelope();
        let context = ExecutionContext::new("run-1", "wf");
        let mut failed_action = ActionResult::new("a");
        failed_action.finish(ActionStatus::Failed);
        for _ in 0..3 {
            let details = ErrorDetails {
                attempts: 1,
                last_error: "boom".to_string(),
                error_history: vec!["boom".to_string()],
                failure_reason: "transport".to_string(),
                retry_profile_used: "balanced".to_string(),
                environment_tags: vec![],
            };
            store.add(&envelope, &context, &failed_action, details, None).await.unwrap();
        }
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 3);
    }
}
