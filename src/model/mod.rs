//! Domain types shared across the sync engine and adapters.
//!
//! The two sides of the sync use deliberately distinct status types:
//! [`NotionStatus`] is the free-text label on the Notion status property,
//! [`GithubStatus`] is the single-select option name on the GitHub Project
//! board. They are joined only through the status mapping table, never by
//! direct comparison.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Tagged status types ───────────────────────────────────────

/// A status label as it appears on the Notion status property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotionStatus(String);

impl NotionStatus {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NotionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single-select option name on the GitHub Project status field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GithubStatus(String);

impl GithubStatus {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GithubStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Snapshot records ──────────────────────────────────────────

/// A task row as read from the Notion database.
///
/// Created, edited, and archived entirely on the Notion side; the engine
/// only reads it, except for reverse-sync writes through the page API.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    /// Notion page id (immutable identity).
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: NotionStatus,
    /// Person names on the "Asignado a" property.
    pub assignees: Vec<String>,
    pub priority: Option<String>,
    /// ISO date from the due-date property, if set.
    pub due_date: Option<String>,
    pub archived: bool,
    /// Monotonically increasing per edit on the Notion side.
    pub last_edited: DateTime<Utc>,
}

/// Open/closed state of a GitHub issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// A GitHub issue as read from the REST API, enriched with its
/// project-board item and status from GraphQL.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRecord {
    /// REST numeric id.
    pub id: u64,
    /// GraphQL node id, needed to add the issue to a project.
    pub node_id: String,
    /// Issue number (immutable identity once created).
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: IssueState,
    /// GitHub logins.
    pub assignees: Vec<String>,
    pub labels: Vec<String>,
    pub last_updated: DateTime<Utc>,
    /// Project-board item id, if the issue is on the board.
    pub project_item_id: Option<String>,
    /// Current status option on the board, if resolvable.
    pub board_status: Option<GithubStatus>,
}

// ── Project metadata ──────────────────────────────────────────

/// A single-select option on a project field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: String,
    pub name: String,
}

/// A single-select field on the project board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectField {
    pub id: String,
    pub name: String,
    pub options: Vec<FieldOption>,
}

/// Field/option metadata for the GitHub Project, resolved once per pass
/// in the snapshot phase and treated as read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub project_id: String,
    pub fields: Vec<ProjectField>,
}

impl ProjectMetadata {
    /// Resolve the `Status` field id and the option id for `status`.
    ///
    /// Returns `None` when the board has no `Status` field or no option
    /// with that name; callers treat this as a logged no-op, never an
    /// error.
    #[must_use]
    pub fn status_option(&self, status: &GithubStatus) -> Option<(&str, &str)> {
        let field = self.fields.iter().find(|f| f.name == "Status")?;
        let option = field.options.iter().find(|o| o.name == status.as_str())?;
        Some((field.id.as_str(), option.id.as_str()))
    }
}

// ── Status update variant ─────────────────────────────────────

/// A board-status change request, resolved once at the call boundary.
///
/// The forward path carries the raw Notion label and maps it through the
/// status table; the cleanup path carries an already-resolved board option
/// name (`Cancelado`). A single variant type keeps the update path from
/// conflating the two.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    /// A Notion status label still to be mapped.
    Label(NotionStatus),
    /// An already-resolved board option name.
    Precomputed(GithubStatus),
}

// ── Drafts (engine → adapter) ─────────────────────────────────

/// Fields for creating or updating a GitHub issue.
///
/// Built by the engine with all mapping already applied: `labels` holds
/// the lowercased priority, `assignees` holds GitHub logins. `body` ends
/// with a `<!-- notion:<id> -->` marker used for pairing recovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueDraft {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

/// Fields for creating or updating a Notion page during reverse sync.
///
/// Everything is already in Notion space: `assignees` are person names
/// (inverse user map applied), `status` a Notion label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageFields {
    pub title: String,
    pub description: String,
    pub status: Option<NotionStatus>,
    pub assignees: Vec<String>,
    pub priority: Option<String>,
}
