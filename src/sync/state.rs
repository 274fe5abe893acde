//! Persisted sync state.
//!
//! The state file is the sole source of truth for which Notion records are
//! already paired with which GitHub issues. It is read once at pass start
//! and written once at pass end as a single atomic replacement: write to a
//! temp file, fsync, rename over the target. A `load` can therefore never
//! observe a partially written state.
//!
//! The on-disk format is camelCase JSON, compatible with state files
//! written by earlier deployments; unknown fields are ignored on load and
//! missing fields are defaulted, so the schema is forward-compatible.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The join record binding one Notion task to one GitHub issue.
///
/// Invariant: within a [`SyncState`], at most one entry per `notion_id`
/// and at most one per `github_issue_number` — the pairing is a bijection
/// over the tracked set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncedTask {
    pub notion_id: String,
    pub github_issue_id: u64,
    pub github_issue_number: u64,
    pub github_project_item_id: Option<String>,
    /// Last Notion edit timestamp a forward sync accounted for.
    pub last_notion_edit: Option<DateTime<Utc>>,
    /// Last GitHub update timestamp a reverse sync accounted for.
    pub last_github_edit: Option<DateTime<Utc>>,
    /// Fingerprint of the content as of the last propagated change.
    pub content_hash: String,
}

impl Default for SyncedTask {
    fn default() -> Self {
        Self {
            notion_id: String::new(),
            github_issue_id: 0,
            github_issue_number: 0,
            github_project_item_id: None,
            last_notion_edit: None,
            last_github_edit: None,
            content_hash: String::new(),
        }
    }
}

/// The aggregate persisted between passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncState {
    pub last_sync: Option<DateTime<Utc>>,
    pub synced_tasks: Vec<SyncedTask>,
}

impl SyncState {
    /// Index of the entry tracking this Notion page, if any.
    #[must_use]
    pub fn find_by_notion_id(&self, notion_id: &str) -> Option<usize> {
        self.synced_tasks
            .iter()
            .position(|t| t.notion_id == notion_id)
    }

    /// Index of the entry tracking this issue number, if any.
    #[must_use]
    pub fn find_by_issue_number(&self, number: u64) -> Option<usize> {
        self.synced_tasks
            .iter()
            .position(|t| t.github_issue_number == number)
    }
}

/// Durable store for [`SyncState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state.
    ///
    /// A missing file is not an error: it yields the empty state, which is
    /// the normal condition on first run.
    ///
    /// # Errors
    ///
    /// Returns `Error::State` when the file exists but cannot be read or
    /// parsed.
    pub fn load(&self) -> Result<SyncState> {
        if !self.path.exists() {
            return Ok(SyncState::default());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| {
            Error::State(format!("cannot read {}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| Error::State(format!("cannot parse {}: {e}", self.path.display())))
    }

    /// Persist the complete new state as a single atomic replacement.
    ///
    /// # Errors
    ///
    /// Returns `Error::State` when the temp file cannot be written or
    /// renamed over the target.
    pub fn save(&self, state: &SyncState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        let temp_path = self.path.with_extension("json.tmp");

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::State(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        {
            let file = File::create(&temp_path).map_err(|e| {
                Error::State(format!("cannot create {}: {e}", temp_path.display()))
            })?;
            let mut writer = BufWriter::new(file);
            writer
                .write_all(json.as_bytes())
                .and_then(|()| writer.flush())
                .and_then(|()| writer.get_ref().sync_all())
                .map_err(|e| {
                    Error::State(format!("cannot write {}: {e}", temp_path.display()))
                })?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            Error::State(format!(
                "cannot replace {}: {e}",
                self.path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(notion_id: &str, number: u64) -> SyncedTask {
        SyncedTask {
            notion_id: notion_id.to_string(),
            github_issue_id: number * 100,
            github_issue_number: number,
            github_project_item_id: Some(format!("PVTI_{number}")),
            last_notion_edit: Some(Utc::now()),
            last_github_edit: Some(Utc::now()),
            content_hash: "abc".to_string(),
        }
    }

    #[test]
    fn missing_file_loads_as_empty_state() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("sync-state.json"));

        let state = store.load().unwrap();
        assert!(state.last_sync.is_none());
        assert!(state.synced_tasks.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("sync-state.json"));

        let state = SyncState {
            last_sync: Some(Utc::now()),
            synced_tasks: vec![entry("n1", 7), entry("n2", 8)],
        };
        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn save_replaces_previous_state_completely() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("sync-state.json"));

        store
            .save(&SyncState {
                last_sync: None,
                synced_tasks: vec![entry("n1", 7)],
            })
            .unwrap();
        store
            .save(&SyncState {
                last_sync: None,
                synced_tasks: vec![entry("n2", 8)],
            })
            .unwrap();

        let state = store.load().unwrap();
        assert_eq!(state.synced_tasks.len(), 1);
        assert_eq!(state.synced_tasks[0].notion_id, "n2");
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("state.json"));

        store.save(&SyncState::default()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn unknown_fields_are_ignored_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync-state.json");
        std::fs::write(
            &path,
            r#"{"lastSync": null, "syncedTasks": [], "schemaVersion": 3}"#,
        )
        .unwrap();

        let state = StateStore::new(path).load().unwrap();
        assert!(state.synced_tasks.is_empty());
    }

    #[test]
    fn legacy_entries_with_missing_fields_are_defaulted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync-state.json");
        std::fs::write(
            &path,
            r#"{"syncedTasks": [{"notionId": "n1", "githubIssueNumber": 7}]}"#,
        )
        .unwrap();

        let state = StateStore::new(path).load().unwrap();
        assert_eq!(state.synced_tasks[0].notion_id, "n1");
        assert_eq!(state.synced_tasks[0].github_issue_number, 7);
        assert!(state.synced_tasks[0].last_notion_edit.is_none());
        assert!(state.synced_tasks[0].content_hash.is_empty());
    }

    #[test]
    fn corrupt_file_is_a_state_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync-state.json");
        std::fs::write(&path, "not json").unwrap();

        let err = StateStore::new(path).load().unwrap_err();
        assert!(matches!(err, Error::State(_)));
    }

    #[test]
    fn find_helpers_locate_entries() {
        let state = SyncState {
            last_sync: None,
            synced_tasks: vec![entry("n1", 7), entry("n2", 8)],
        };
        assert_eq!(state.find_by_notion_id("n2"), Some(1));
        assert_eq!(state.find_by_issue_number(7), Some(0));
        assert_eq!(state.find_by_notion_id("n3"), None);
        assert_eq!(state.find_by_issue_number(9), None);
    }
}
