//! Content fingerprinting for change detection.
//!
//! A fingerprint is a SHA-256 digest over the five semantically relevant
//! fields of a task: title, description, status, assignees, priority. Both
//! sides are projected into GitHub space before hashing (status through the
//! status map, assignees mapped to logins, priority lowercased), so a
//! Notion record and its correctly synced issue produce the same digest.
//!
//! The digest separates "real" edits from timestamp noise: timestamp
//! comparison gates the sync attempt, the fingerprint gates the actual
//! remote write. An edit that the mapping collapses (two Notion labels
//! mapping to the same board option) does not change the digest, which is
//! fine because it is invisible on the remote side anyway.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::{priority_from_labels, Mappings};
use crate::model::{IssueRecord, TaskRecord};
use crate::sync::body::strip_generated;

/// The canonical projection hashed on both sides.
#[derive(Serialize)]
struct Projection<'a> {
    title: &'a str,
    description: &'a str,
    status: &'a str,
    assignees: &'a [String],
    priority: Option<&'a str>,
}

fn digest(projection: &Projection<'_>) -> String {
    // Serialization of a struct of strings cannot fail.
    let json = serde_json::to_string(projection).expect("projection serializes");
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprint a Notion task record.
#[must_use]
pub fn fingerprint_task(task: &TaskRecord, mappings: &Mappings) -> String {
    let status = mappings.status.to_github(&task.status);
    let mut assignees: Vec<String> = task
        .assignees
        .iter()
        .filter_map(|name| mappings.users.to_login(name).map(str::to_string))
        .collect();
    assignees.sort_unstable();
    let priority = task.priority.as_deref().map(str::to_lowercase);

    digest(&Projection {
        title: &task.title,
        description: task.description.trim(),
        status: status.as_str(),
        assignees: &assignees,
        priority: priority.as_deref(),
    })
}

/// Fingerprint a GitHub issue record.
#[must_use]
pub fn fingerprint_issue(issue: &IssueRecord, mappings: &Mappings) -> String {
    let status = issue
        .board_status
        .clone()
        .unwrap_or_else(|| mappings.status.default_status());
    let mut assignees = issue.assignees.clone();
    assignees.sort_unstable();
    let description = strip_generated(&issue.body);
    let priority = priority_from_labels(&issue.labels);

    digest(&Projection {
        title: &issue.title,
        description: &description,
        status: status.as_str(),
        assignees: &assignees,
        priority: priority.as_deref(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GithubStatus, IssueState, NotionStatus};
    use crate::sync::body::compose_body;
    use chrono::Utc;

    fn mappings() -> Mappings {
        Mappings::defaults().unwrap()
    }

    fn task() -> TaskRecord {
        TaskRecord {
            id: "n1".to_string(),
            title: "Fix bug".to_string(),
            description: "The login flow breaks".to_string(),
            status: NotionStatus::new("Sin Empezar"),
            assignees: vec!["Alex Craviotto".to_string()],
            priority: Some("High".to_string()),
            due_date: None,
            archived: false,
            last_edited: Utc::now(),
        }
    }

    fn issue_for(task: &TaskRecord) -> IssueRecord {
        IssueRecord {
            id: 1,
            node_id: "I_1".to_string(),
            number: 7,
            title: task.title.clone(),
            body: compose_body(&task.description, None, &task.id),
            state: IssueState::Open,
            assignees: vec!["alexcraviotto".to_string()],
            labels: vec!["high".to_string()],
            last_updated: Utc::now(),
            project_item_id: Some("PVTI_1".to_string()),
            board_status: Some(GithubStatus::new("Backlog")),
        }
    }

    #[test]
    fn fingerprint_is_stable() {
        let task = task();
        assert_eq!(
            fingerprint_task(&task, &mappings()),
            fingerprint_task(&task, &mappings())
        );
    }

    #[test]
    fn each_semantic_field_changes_the_digest() {
        let base = task();
        let reference = fingerprint_task(&base, &mappings());

        let mut changed = base.clone();
        changed.title = "Fix another bug".to_string();
        assert_ne!(fingerprint_task(&changed, &mappings()), reference);

        let mut changed = base.clone();
        changed.description = "Different description".to_string();
        assert_ne!(fingerprint_task(&changed, &mappings()), reference);

        let mut changed = base.clone();
        changed.status = NotionStatus::new("En progreso");
        assert_ne!(fingerprint_task(&changed, &mappings()), reference);

        let mut changed = base.clone();
        changed.assignees = vec![];
        assert_ne!(fingerprint_task(&changed, &mappings()), reference);

        let mut changed = base.clone();
        changed.priority = Some("Low".to_string());
        assert_ne!(fingerprint_task(&changed, &mappings()), reference);
    }

    #[test]
    fn timestamp_changes_do_not_affect_the_digest() {
        let mut task = task();
        let before = fingerprint_task(&task, &mappings());
        task.last_edited = Utc::now();
        assert_eq!(fingerprint_task(&task, &mappings()), before);
    }

    #[test]
    fn synced_task_and_issue_agree() {
        let task = task();
        let issue = issue_for(&task);
        assert_eq!(
            fingerprint_task(&task, &mappings()),
            fingerprint_issue(&issue, &mappings())
        );
    }

    #[test]
    fn assignee_order_is_canonical() {
        let mut issue = issue_for(&task());
        issue.assignees = vec!["zed".to_string(), "abe".to_string()];
        let reference = fingerprint_issue(&issue, &mappings());
        issue.assignees = vec!["abe".to_string(), "zed".to_string()];
        assert_eq!(fingerprint_issue(&issue, &mappings()), reference);
    }
}
