//! The reconciliation engine.
//!
//! One pass runs four strictly ordered phases over a consistent snapshot:
//!
//! 1. **Snapshot** — fetch all Notion tasks, all GitHub issues, and the
//!    project metadata. Any fetch failure aborts the pass before a single
//!    mutation; the persisted state is untouched.
//! 2. **Forward** — propagate Notion edits to GitHub, creating issues for
//!    unpaired tasks (after pairing recovery by embedded marker or exact
//!    title).
//! 3. **Reverse** — propagate GitHub edits to Notion, creating pages for
//!    organically created issues.
//! 4. **Cleanup** — reconcile pairings whose Notion record vanished
//!    (cancel-and-close) or whose both sides vanished (drop).
//!
//! Two gates keep passes quiet: a timestamp comparison decides whether a
//! record is even worth looking at, and the content fingerprint decides
//! whether a remote write actually happens. A pass over an already
//! converged pair performs zero mutations, which also suppresses the echo
//! of the engine's own writes on the following pass.
//!
//! Per-record mutation failures are logged and counted but never abort the
//! pass; the stale state entry is kept so the next pass retries.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{Mappings, CANCELLED_STATUS, DONE_STATUS};
use crate::error::Result;
use crate::model::{
    GithubStatus, IssueDraft, IssueRecord, NotionStatus, PageFields, ProjectMetadata,
    StatusUpdate, TaskRecord,
};
use crate::sync::body::{compose_body, extract_notion_id, strip_generated};
use crate::sync::fingerprint::{fingerprint_issue, fingerprint_task};
use crate::sync::ports::{GithubPort, NotionPort};
use crate::sync::state::{StateStore, SyncState, SyncedTask};

/// Mutation counts for one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    pub issues_created: usize,
    pub issues_updated: usize,
    pub issues_closed: usize,
    pub pages_created: usize,
    pub pages_updated: usize,
    /// Pairings re-adopted from a marker or exact title match.
    pub recovered: usize,
    /// State entries dropped because the tracked remote objects vanished.
    pub dropped: usize,
    /// Per-record mutation failures (pass continued, entry kept for retry).
    pub failures: usize,
}

impl PassStats {
    /// Total remote writes performed during the pass.
    #[must_use]
    pub const fn total_mutations(&self) -> usize {
        self.issues_created
            + self.issues_updated
            + self.issues_closed
            + self.pages_created
            + self.pages_updated
    }
}

/// The engine, generic over its two remote adapters.
pub struct SyncEngine<N, G> {
    notion: N,
    github: G,
    store: StateStore,
    mappings: Mappings,
}

impl<N: NotionPort, G: GithubPort> SyncEngine<N, G> {
    pub fn new(notion: N, github: G, store: StateStore, mappings: Mappings) -> Self {
        Self {
            notion,
            github,
            store,
            mappings,
        }
    }

    /// Run one full reconciliation pass.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot phase fails or the final state
    /// write fails. Per-record mutation failures do not surface here; they
    /// are counted in [`PassStats::failures`].
    pub async fn run_pass(&self) -> Result<PassStats> {
        let mut state = self.store.load()?;
        let mut stats = PassStats::default();

        let (tasks, issues) = tokio::try_join!(
            self.notion.fetch_task_records(),
            self.github.fetch_issue_records(),
        )?;
        let metadata = self.github.fetch_project_metadata().await?;
        debug!(
            tasks = tasks.len(),
            issues = issues.len(),
            tracked = state.synced_tasks.len(),
            "snapshot complete"
        );

        // Pairings appended during this pass reference remote objects
        // absent from the snapshots taken above; cleanup must not mistake
        // them for vanished records.
        let mut fresh: HashSet<String> = HashSet::new();

        self.forward_pass(&mut state, &tasks, &issues, &metadata, &mut fresh, &mut stats)
            .await;
        self.reverse_pass(&mut state, &issues, &mut fresh, &mut stats)
            .await;
        self.cleanup_pass(&mut state, &tasks, &issues, &metadata, &fresh, &mut stats)
            .await;

        state.last_sync = Some(Utc::now());
        self.store.save(&state)?;

        info!(
            mutations = stats.total_mutations(),
            failures = stats.failures,
            tracked = state.synced_tasks.len(),
            "pass complete"
        );
        Ok(stats)
    }

    // ── Forward: Notion → GitHub ──────────────────────────────

    async fn forward_pass(
        &self,
        state: &mut SyncState,
        tasks: &[TaskRecord],
        issues: &[IssueRecord],
        metadata: &ProjectMetadata,
        fresh: &mut HashSet<String>,
        stats: &mut PassStats,
    ) {
        for task in tasks.iter().filter(|t| !t.archived) {
            match state.find_by_notion_id(&task.id) {
                Some(index) => {
                    self.sync_paired_task(state, index, task, issues, metadata, stats)
                        .await;
                }
                None => {
                    self.pair_new_task(state, task, issues, metadata, fresh, stats)
                        .await;
                }
            }
        }
    }

    async fn sync_paired_task(
        &self,
        state: &mut SyncState,
        index: usize,
        task: &TaskRecord,
        issues: &[IssueRecord],
        metadata: &ProjectMetadata,
        stats: &mut PassStats,
    ) {
        let entry = &state.synced_tasks[index];
        if let Some(seen) = entry.last_notion_edit {
            if task.last_edited <= seen {
                return;
            }
        }

        let fingerprint = fingerprint_task(task, &self.mappings);
        if fingerprint == entry.content_hash {
            // The edit did not touch any synced field (or the mapping
            // collapsed it); advance the watermark so the record is not
            // re-examined every pass.
            state.synced_tasks[index].last_notion_edit = Some(task.last_edited);
            return;
        }

        let number = entry.github_issue_number;
        let draft = self.issue_draft(task);
        if let Err(e) = self.github.update_issue(number, &draft).await {
            warn!(task = %task.id, issue = number, error = %e, "issue update failed, will retry");
            stats.failures += 1;
            return;
        }
        stats.issues_updated += 1;

        let snapshot = issues.iter().find(|i| i.number == number);
        let item_id = state.synced_tasks[index]
            .github_project_item_id
            .clone()
            .or_else(|| snapshot.and_then(|i| i.project_item_id.clone()));
        let mapped = self.mappings.status.to_github(&task.status);
        let board_current = snapshot.and_then(|i| i.board_status.as_ref());
        if board_current != Some(&mapped) {
            if let Some(item_id) = &item_id {
                self.apply_board_status(item_id, metadata, StatusUpdate::Label(task.status.clone()))
                    .await;
            }
        }

        let entry = &mut state.synced_tasks[index];
        entry.last_notion_edit = Some(task.last_edited);
        entry.content_hash = fingerprint;
        entry.github_project_item_id = item_id;
        info!(task = %task.id, issue = number, "issue updated from task");
    }

    async fn pair_new_task(
        &self,
        state: &mut SyncState,
        task: &TaskRecord,
        issues: &[IssueRecord],
        metadata: &ProjectMetadata,
        fresh: &mut HashSet<String>,
        stats: &mut PassStats,
    ) {
        let paired: HashSet<u64> = state
            .synced_tasks
            .iter()
            .map(|t| t.github_issue_number)
            .collect();

        if let Some(issue) = recover_issue(task, issues, &paired) {
            info!(task = %task.id, issue = issue.number, "recovered existing pairing");
            state.synced_tasks.push(SyncedTask {
                notion_id: task.id.clone(),
                github_issue_id: issue.id,
                github_issue_number: issue.number,
                github_project_item_id: issue.project_item_id.clone(),
                last_notion_edit: Some(task.last_edited),
                last_github_edit: Some(issue.last_updated),
                content_hash: fingerprint_task(task, &self.mappings),
            });
            fresh.insert(task.id.clone());
            stats.recovered += 1;
            return;
        }

        let draft = self.issue_draft(task);
        let issue = match self.github.create_issue(&draft).await {
            Ok(issue) => issue,
            Err(e) => {
                warn!(task = %task.id, error = %e, "issue creation failed, will retry");
                stats.failures += 1;
                return;
            }
        };
        stats.issues_created += 1;

        // The issue exists from here on: board placement is best-effort
        // so a GraphQL hiccup cannot cost us the pairing and duplicate
        // the issue on the next pass.
        let item_id = match self
            .github
            .add_issue_to_project(&issue.node_id, metadata)
            .await
        {
            Ok(item_id) => {
                self.apply_board_status(
                    &item_id,
                    metadata,
                    StatusUpdate::Label(task.status.clone()),
                )
                .await;
                Some(item_id)
            }
            Err(e) => {
                warn!(task = %task.id, issue = issue.number, error = %e, "board placement failed");
                None
            }
        };

        state.synced_tasks.push(SyncedTask {
            notion_id: task.id.clone(),
            github_issue_id: issue.id,
            github_issue_number: issue.number,
            github_project_item_id: item_id,
            last_notion_edit: Some(task.last_edited),
            last_github_edit: Some(issue.last_updated),
            content_hash: fingerprint_task(task, &self.mappings),
        });
        fresh.insert(task.id.clone());
        info!(task = %task.id, issue = issue.number, "issue created for task");
    }

    // ── Reverse: GitHub → Notion ──────────────────────────────

    async fn reverse_pass(
        &self,
        state: &mut SyncState,
        issues: &[IssueRecord],
        fresh: &mut HashSet<String>,
        stats: &mut PassStats,
    ) {
        for issue in issues {
            match state.find_by_issue_number(issue.number) {
                Some(index) => self.sync_paired_issue(state, index, issue, stats).await,
                None => self.pair_new_issue(state, issue, fresh, stats).await,
            }
        }
    }

    async fn sync_paired_issue(
        &self,
        state: &mut SyncState,
        index: usize,
        issue: &IssueRecord,
        stats: &mut PassStats,
    ) {
        let entry = &state.synced_tasks[index];
        if let Some(seen) = entry.last_github_edit {
            if issue.last_updated <= seen {
                return;
            }
        }

        let fingerprint = fingerprint_issue(issue, &self.mappings);
        if fingerprint == entry.content_hash {
            state.synced_tasks[index].last_github_edit = Some(issue.last_updated);
            return;
        }

        let page_id = entry.notion_id.clone();
        let fields = self.page_fields(issue);
        if let Err(e) = self.notion.update_page(&page_id, &fields).await {
            warn!(issue = issue.number, page = %page_id, error = %e, "page update failed, will retry");
            stats.failures += 1;
            return;
        }
        stats.pages_updated += 1;

        let entry = &mut state.synced_tasks[index];
        entry.last_github_edit = Some(issue.last_updated);
        entry.content_hash = fingerprint;
        info!(issue = issue.number, page = %page_id, "page updated from issue");
    }

    async fn pair_new_issue(
        &self,
        state: &mut SyncState,
        issue: &IssueRecord,
        fresh: &mut HashSet<String>,
        stats: &mut PassStats,
    ) {
        if let Some(notion_id) = extract_notion_id(&issue.body) {
            // A generated issue whose pairing we no longer track and whose
            // page is not in the snapshot under that id. Creating a page
            // here would resurrect deleted tasks, so leave it alone.
            debug!(issue = issue.number, notion_id, "marker references unknown page, skipping");
            return;
        }

        let fields = self.page_fields(issue);
        let page_id = match self.notion.create_page(&fields).await {
            Ok(page_id) => page_id,
            Err(e) => {
                warn!(issue = issue.number, error = %e, "page creation failed, will retry");
                stats.failures += 1;
                return;
            }
        };
        stats.pages_created += 1;

        state.synced_tasks.push(SyncedTask {
            notion_id: page_id.clone(),
            github_issue_id: issue.id,
            github_issue_number: issue.number,
            github_project_item_id: issue.project_item_id.clone(),
            last_notion_edit: None,
            last_github_edit: Some(issue.last_updated),
            content_hash: fingerprint_issue(issue, &self.mappings),
        });
        fresh.insert(page_id.clone());
        info!(issue = issue.number, page = %page_id, "page created for issue");
    }

    // ── Cleanup ───────────────────────────────────────────────

    async fn cleanup_pass(
        &self,
        state: &mut SyncState,
        tasks: &[TaskRecord],
        issues: &[IssueRecord],
        metadata: &ProjectMetadata,
        fresh: &HashSet<String>,
        stats: &mut PassStats,
    ) {
        let active_tasks: HashSet<&str> = tasks
            .iter()
            .filter(|t| !t.archived)
            .map(|t| t.id.as_str())
            .collect();
        let issue_numbers: HashSet<u64> = issues.iter().map(|i| i.number).collect();

        let entries = std::mem::take(&mut state.synced_tasks);
        for entry in entries {
            // Entries appended this pass are trivially alive on both sides.
            if fresh.contains(&entry.notion_id) {
                state.synced_tasks.push(entry);
                continue;
            }
            let task_present = active_tasks.contains(entry.notion_id.as_str());
            let issue_present = issue_numbers.contains(&entry.github_issue_number);

            match (task_present, issue_present) {
                (true, true) => state.synced_tasks.push(entry),
                (true, false) => {
                    // Presence on either side keeps the pairing alive.
                    warn!(task = %entry.notion_id, issue = entry.github_issue_number,
                        "tracked issue missing from snapshot, keeping pairing");
                    state.synced_tasks.push(entry);
                }
                (false, true) => {
                    self.cancel_and_close(state, entry, issues, metadata, stats)
                        .await;
                }
                (false, false) => {
                    debug!(task = %entry.notion_id, issue = entry.github_issue_number,
                        "both sides gone, dropping entry");
                    stats.dropped += 1;
                }
            }
        }
    }

    /// The Notion record vanished but its issue survives: mark the board
    /// item cancelled, close the issue, and drop the entry. A close
    /// failure keeps the entry so the next pass retries.
    async fn cancel_and_close(
        &self,
        state: &mut SyncState,
        entry: SyncedTask,
        issues: &[IssueRecord],
        metadata: &ProjectMetadata,
        stats: &mut PassStats,
    ) {
        let number = entry.github_issue_number;
        let already_closed = issues
            .iter()
            .find(|i| i.number == number)
            .is_some_and(|i| i.state.is_closed());

        let item_id = entry.github_project_item_id.clone().or_else(|| {
            issues
                .iter()
                .find(|i| i.number == number)
                .and_then(|i| i.project_item_id.clone())
        });
        if let Some(item_id) = &item_id {
            self.apply_board_status(
                item_id,
                metadata,
                StatusUpdate::Precomputed(GithubStatus::new(CANCELLED_STATUS)),
            )
            .await;
        }

        if already_closed {
            info!(issue = number, "task removed, issue already closed, unpairing");
            stats.dropped += 1;
            return;
        }

        match self.github.close_issue(number).await {
            Ok(()) => {
                info!(issue = number, "task removed, issue closed");
                stats.issues_closed += 1;
                stats.dropped += 1;
            }
            Err(e) => {
                warn!(issue = number, error = %e, "issue close failed, will retry");
                stats.failures += 1;
                state.synced_tasks.push(entry);
            }
        }
    }

    // ── Shared helpers ────────────────────────────────────────

    /// Apply a board-status change, resolving a raw Notion label through
    /// the status map first. Failures are logged, never fatal.
    async fn apply_board_status(
        &self,
        item_id: &str,
        metadata: &ProjectMetadata,
        update: StatusUpdate,
    ) {
        let status = match update {
            StatusUpdate::Label(label) => self.mappings.status.to_github(&label),
            StatusUpdate::Precomputed(status) => status,
        };
        if let Err(e) = self.github.set_board_status(item_id, metadata, &status).await {
            warn!(item = item_id, status = %status, error = %e, "board status update failed");
        }
    }

    /// Project a task into an issue draft, applying all mapping tables.
    fn issue_draft(&self, task: &TaskRecord) -> IssueDraft {
        let assignees = task
            .assignees
            .iter()
            .filter_map(|name| self.mappings.users.to_login(name).map(str::to_string))
            .collect();
        let labels = task
            .priority
            .as_deref()
            .map(str::to_lowercase)
            .into_iter()
            .collect();
        IssueDraft {
            title: task.title.clone(),
            body: compose_body(&task.description, task.due_date.as_deref(), &task.id),
            labels,
            assignees,
        }
    }

    /// Project an issue into Notion page fields, applying the inverse
    /// mapping tables. A closed issue always lands on the done status.
    fn page_fields(&self, issue: &IssueRecord) -> PageFields {
        let status = if issue.state.is_closed() {
            Some(NotionStatus::new(DONE_STATUS))
        } else {
            issue
                .board_status
                .as_ref()
                .and_then(|s| self.mappings.status.to_notion(s))
        };
        let assignees = issue
            .assignees
            .iter()
            .filter_map(|login| self.mappings.users.to_name(login).map(str::to_string))
            .collect();
        PageFields {
            title: issue.title.clone(),
            description: strip_generated(&issue.body),
            status,
            assignees,
            priority: crate::config::priority_from_labels(&issue.labels),
        }
    }
}

/// Find an existing issue for an unpaired task: the embedded marker is
/// authoritative, an exact title match is the fallback. Issues already
/// paired to another task are never candidates.
fn recover_issue<'a>(
    task: &TaskRecord,
    issues: &'a [IssueRecord],
    paired: &HashSet<u64>,
) -> Option<&'a IssueRecord> {
    let candidates = || issues.iter().filter(|i| !paired.contains(&i.number));
    candidates()
        .find(|i| extract_notion_id(&i.body) == Some(task.id.as_str()))
        .or_else(|| candidates().find(|i| i.title == task.title))
}
