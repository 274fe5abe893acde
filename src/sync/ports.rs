//! Adapter seams between the engine and the two remote APIs.
//!
//! The engine is generic over these two traits so its phase logic can be
//! tested against in-memory fakes. The real implementations live in
//! [`crate::notion`] and [`crate::github`].
//!
//! Mutation methods take fully mapped inputs ([`crate::model::IssueDraft`],
//! [`crate::model::PageFields`]): all vocabulary translation happens in the
//! engine, adapters only speak wire formats.

use std::future::Future;

use crate::error::Result;
use crate::model::{
    GithubStatus, IssueDraft, IssueRecord, PageFields, ProjectMetadata, TaskRecord,
};

/// Read/write access to the Notion task database.
pub trait NotionPort: Send + Sync {
    /// Fetch every task row, following pagination to the end.
    fn fetch_task_records(&self) -> impl Future<Output = Result<Vec<TaskRecord>>> + Send;

    /// Create a page for an organically created issue; returns the new
    /// page id.
    fn create_page(&self, fields: &PageFields) -> impl Future<Output = Result<String>> + Send;

    /// Overwrite the mapped properties of an existing page.
    fn update_page(
        &self,
        page_id: &str,
        fields: &PageFields,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Read/write access to the GitHub repository and its project board.
pub trait GithubPort: Send + Sync {
    /// Fetch every issue (open and closed), enriched with board status
    /// where resolvable. Pull requests are excluded.
    fn fetch_issue_records(&self) -> impl Future<Output = Result<Vec<IssueRecord>>> + Send;

    /// Resolve the project id plus its single-select fields and options.
    fn fetch_project_metadata(&self) -> impl Future<Output = Result<ProjectMetadata>> + Send;

    /// Create an issue; returns the created record.
    fn create_issue(&self, draft: &IssueDraft) -> impl Future<Output = Result<IssueRecord>> + Send;

    /// Add an issue (by GraphQL node id) to the project board; returns
    /// the new project item id.
    fn add_issue_to_project(
        &self,
        node_id: &str,
        metadata: &ProjectMetadata,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Set the board status option on a project item.
    ///
    /// A status with no matching board option is a logged no-op, not an
    /// error.
    fn set_board_status(
        &self,
        item_id: &str,
        metadata: &ProjectMetadata,
        status: &GithubStatus,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Overwrite title, body, labels, and assignees of an issue.
    fn update_issue(
        &self,
        number: u64,
        draft: &IssueDraft,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Close an issue.
    fn close_issue(&self, number: u64) -> impl Future<Output = Result<()>> + Send;
}
