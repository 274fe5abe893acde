//! GitHub API adapter.
//!
//! Issues are read and written through the REST API; everything touching
//! the Project board (field metadata, board placement, status options)
//! goes through GraphQL, which is the only surface Projects v2 exposes.
//!
//! Board enrichment is deliberately forgiving: an issue whose project item
//! cannot be resolved still enters the snapshot, just without a board
//! status. Dropping it entirely would make the engine treat the issue as
//! vanished.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::GithubConfig;
use crate::error::{Error, Result};
use crate::model::{
    FieldOption, GithubStatus, IssueDraft, IssueRecord, IssueState, ProjectField,
    ProjectMetadata,
};
use crate::sync::GithubPort;

const GITHUB_API: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("notion-github-sync/", env!("CARGO_PKG_VERSION"));

/// Label colors for the priority labels this service creates.
fn priority_color(label: &str) -> &'static str {
    match label {
        "high" | "alta" => "e11d21",
        "medium" | "media" => "fbca04",
        "low" | "baja" => "009800",
        _ => "666666",
    }
}

/// Client for one repository and its project board.
pub struct GithubClient {
    client: reqwest::Client,
    token: String,
    owner: String,
    repo: String,
    project_number: u32,
}

impl GithubClient {
    #[must_use]
    pub fn new(config: &GithubConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: config.token.clone(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            project_number: config.project_number,
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{GITHUB_API}/repos/{}/{}/{path}", self.owner, self.repo)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
    }

    async fn check(response: reqwest::Response, context: &str) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Github(format!("{context}: HTTP {status}: {body}")));
        }
        Ok(response.json().await?)
    }

    /// Run a GraphQL query/mutation and return its `data` object.
    async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let response = self
            .request(reqwest::Method::POST, format!("{GITHUB_API}/graphql"))
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        let mut body = Self::check(response, "graphql request").await?;
        if let Some(errors) = body["errors"].as_array() {
            if !errors.is_empty() {
                let messages: Vec<&str> = errors
                    .iter()
                    .filter_map(|e| e["message"].as_str())
                    .collect();
                return Err(Error::Github(format!(
                    "graphql errors: {}",
                    messages.join("; ")
                )));
            }
        }
        Ok(body["data"].take())
    }

    /// Resolve the project item and board status for one issue, matching
    /// on the configured project number.
    async fn board_lookup(&self, number: u64) -> Result<(Option<String>, Option<GithubStatus>)> {
        let query = r#"
            query($owner: String!, $repo: String!, $number: Int!) {
              repository(owner: $owner, name: $repo) {
                issue(number: $number) {
                  projectItems(first: 10) {
                    nodes {
                      id
                      project { number }
                      fieldValueByName(name: "Status") {
                        ... on ProjectV2ItemFieldSingleSelectValue { name }
                      }
                    }
                  }
                }
              }
            }"#;
        let variables = json!({
            "owner": self.owner,
            "repo": self.repo,
            "number": number,
        });
        let data = self.graphql(query, variables).await?;
        let nodes = &data["repository"]["issue"]["projectItems"]["nodes"];
        Ok(board_item(nodes, self.project_number))
    }

    /// Make sure each label exists in the repository, creating missing
    /// ones with the priority color scheme.
    async fn ensure_labels(&self, labels: &[String]) -> Result<()> {
        for label in labels {
            let url = self.repo_url(&format!("labels/{label}"));
            let response = self.request(reqwest::Method::GET, url).send().await?;
            if response.status().is_success() {
                continue;
            }
            if response.status() != reqwest::StatusCode::NOT_FOUND {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Github(format!(
                    "checking label {label}: HTTP {status}: {body}"
                )));
            }
            let create = self
                .request(reqwest::Method::POST, self.repo_url("labels"))
                .json(&json!({ "name": label, "color": priority_color(label) }))
                .send()
                .await?;
            Self::check(create, "creating label").await?;
            debug!(label, "created missing label");
        }
        Ok(())
    }

    /// Keep only assignees with repository access; GitHub rejects issue
    /// writes naming non-collaborators.
    async fn filter_collaborators(&self, assignees: &[String]) -> Result<Vec<String>> {
        let mut allowed = Vec::with_capacity(assignees.len());
        for login in assignees {
            let url = self.repo_url(&format!("collaborators/{login}"));
            let response = self.request(reqwest::Method::GET, url).send().await?;
            if response.status().is_success() {
                allowed.push(login.clone());
            } else {
                warn!(login, "not a repository collaborator, dropping assignee");
            }
        }
        Ok(allowed)
    }

    /// Query the project under one owner root (`user` or `organization`)
    /// and return the raw `projectV2` object.
    async fn project_query(&self, root: &str) -> Result<Value> {
        let query = format!(
            r"query($owner: String!, $number: Int!) {{
              {root}(login: $owner) {{
                projectV2(number: $number) {{
                  id
                  fields(first: 20) {{
                    nodes {{
                      ... on ProjectV2SingleSelectField {{
                        id
                        name
                        options {{ id name }}
                      }}
                    }}
                  }}
                }}
              }}
            }}"
        );
        let variables = json!({ "owner": self.owner, "number": self.project_number });
        let mut data = self.graphql(&query, variables).await?;
        let project = data[root]["projectV2"].take();
        if project.is_object() {
            Ok(project)
        } else {
            Err(Error::Github(format!("no projectV2 under {root}")))
        }
    }

    async fn issue_payload(&self, draft: &IssueDraft) -> Result<Value> {
        self.ensure_labels(&draft.labels).await?;
        let assignees = self.filter_collaborators(&draft.assignees).await?;
        Ok(json!({
            "title": draft.title,
            "body": draft.body,
            "labels": draft.labels,
            "assignees": assignees,
        }))
    }
}

impl GithubPort for GithubClient {
    async fn fetch_issue_records(&self) -> Result<Vec<IssueRecord>> {
        let mut issues = Vec::new();
        let mut page = 1u32;
        loop {
            let url = self.repo_url(&format!(
                "issues?state=all&sort=updated&per_page=100&page={page}"
            ));
            let response = self.request(reqwest::Method::GET, url).send().await?;
            let body = Self::check(response, "listing issues").await?;
            let entries = body
                .as_array()
                .ok_or_else(|| Error::Github("issue list is not an array".to_string()))?;

            for entry in entries {
                // The issues endpoint interleaves pull requests.
                if entry.get("pull_request").is_some() {
                    continue;
                }
                match parse_issue(entry) {
                    Some(issue) => issues.push(issue),
                    None => warn!("skipping malformed issue entry"),
                }
            }
            if entries.len() < 100 {
                break;
            }
            page += 1;
        }

        for issue in &mut issues {
            match self.board_lookup(issue.number).await {
                Ok((item_id, status)) => {
                    issue.project_item_id = item_id;
                    issue.board_status = status;
                }
                Err(e) => {
                    warn!(issue = issue.number, error = %e, "board lookup failed");
                }
            }
        }
        debug!(count = issues.len(), "fetched issue records");
        Ok(issues)
    }

    async fn fetch_project_metadata(&self) -> Result<ProjectMetadata> {
        // The owner can be a user or an organization; the wrong root
        // errors, so try the user form first and fall back.
        let project = match self.project_query("user").await {
            Ok(project) => project,
            Err(_) => self.project_query("organization").await.map_err(|_| {
                Error::Github(format!(
                    "project {} not found for {}",
                    self.project_number, self.owner
                ))
            })?,
        };
        parse_metadata(&project)
    }

    async fn create_issue(&self, draft: &IssueDraft) -> Result<IssueRecord> {
        let payload = self.issue_payload(draft).await?;
        let response = self
            .request(reqwest::Method::POST, self.repo_url("issues"))
            .json(&payload)
            .send()
            .await?;
        let body = Self::check(response, "creating issue").await?;
        parse_issue(&body)
            .ok_or_else(|| Error::Github("issue creation response is malformed".to_string()))
    }

    async fn add_issue_to_project(
        &self,
        node_id: &str,
        metadata: &ProjectMetadata,
    ) -> Result<String> {
        let query = r"
            mutation($projectId: ID!, $contentId: ID!) {
              addProjectV2ItemById(input: { projectId: $projectId, contentId: $contentId }) {
                item { id }
              }
            }";
        let variables = json!({ "projectId": metadata.project_id, "contentId": node_id });
        let data = self.graphql(query, variables).await?;
        data["addProjectV2ItemById"]["item"]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Github("project item id missing from response".to_string()))
    }

    async fn set_board_status(
        &self,
        item_id: &str,
        metadata: &ProjectMetadata,
        status: &GithubStatus,
    ) -> Result<()> {
        let Some((field_id, option_id)) = metadata.status_option(status) else {
            warn!(status = %status, "board has no matching status option, leaving item as-is");
            return Ok(());
        };
        let query = r"
            mutation($projectId: ID!, $itemId: ID!, $fieldId: ID!, $optionId: String!) {
              updateProjectV2ItemFieldValue(input: {
                projectId: $projectId,
                itemId: $itemId,
                fieldId: $fieldId,
                value: { singleSelectOptionId: $optionId }
              }) {
                projectV2Item { id }
              }
            }";
        let variables = json!({
            "projectId": metadata.project_id,
            "itemId": item_id,
            "fieldId": field_id,
            "optionId": option_id,
        });
        self.graphql(query, variables).await?;
        Ok(())
    }

    async fn update_issue(&self, number: u64, draft: &IssueDraft) -> Result<()> {
        let payload = self.issue_payload(draft).await?;
        let url = self.repo_url(&format!("issues/{number}"));
        let response = self
            .request(reqwest::Method::PATCH, url)
            .json(&payload)
            .send()
            .await?;
        Self::check(response, "updating issue").await?;
        Ok(())
    }

    async fn close_issue(&self, number: u64) -> Result<()> {
        let url = self.repo_url(&format!("issues/{number}"));
        let response = self
            .request(reqwest::Method::PATCH, url)
            .json(&json!({ "state": "closed" }))
            .send()
            .await?;
        Self::check(response, "closing issue").await?;
        Ok(())
    }
}

// ── Response parsing ──────────────────────────────────────────

/// Parse one REST issue object. Board fields start empty and are filled
/// by the GraphQL enrichment step.
fn parse_issue(value: &Value) -> Option<IssueRecord> {
    let state = match value["state"].as_str()? {
        "closed" => IssueState::Closed,
        _ => IssueState::Open,
    };
    Some(IssueRecord {
        id: value["id"].as_u64()?,
        node_id: value["node_id"].as_str()?.to_string(),
        number: value["number"].as_u64()?,
        title: value["title"].as_str()?.to_string(),
        body: value["body"].as_str().unwrap_or_default().to_string(),
        state,
        assignees: value["assignees"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|a| a["login"].as_str().map(str::to_string))
            .collect(),
        labels: value["labels"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|l| l["name"].as_str().map(str::to_string))
            .collect(),
        last_updated: chrono::DateTime::parse_from_rfc3339(value["updated_at"].as_str()?)
            .ok()?
            .with_timezone(&chrono::Utc),
        project_item_id: None,
        board_status: None,
    })
}

/// Pick the project item belonging to `project_number` out of an issue's
/// `projectItems` nodes.
fn board_item(nodes: &Value, project_number: u32) -> (Option<String>, Option<GithubStatus>) {
    let node = nodes.as_array().into_iter().flatten().find(|n| {
        n["project"]["number"]
            .as_u64()
            .is_some_and(|n| n == u64::from(project_number))
    });
    let Some(node) = node else {
        return (None, None);
    };
    let item_id = node["id"].as_str().map(str::to_string);
    let status = node["fieldValueByName"]["name"]
        .as_str()
        .map(GithubStatus::new);
    (item_id, status)
}

/// Parse a `projectV2` object into [`ProjectMetadata`]. Non-single-select
/// fields come back as empty objects and are skipped.
fn parse_metadata(project: &Value) -> Result<ProjectMetadata> {
    let project_id = project["id"]
        .as_str()
        .ok_or_else(|| Error::Github("project metadata has no id".to_string()))?
        .to_string();
    let fields = project["fields"]["nodes"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|node| {
            let id = node["id"].as_str()?.to_string();
            let name = node["name"].as_str()?.to_string();
            let options = node["options"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|o| {
                    Some(FieldOption {
                        id: o["id"].as_str()?.to_string(),
                        name: o["name"].as_str()?.to_string(),
                    })
                })
                .collect();
            Some(ProjectField { id, name, options })
        })
        .collect();
    Ok(ProjectMetadata { project_id, fields })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_issue() -> Value {
        json!({
            "id": 123456,
            "node_id": "I_abc",
            "number": 7,
            "title": "Fix bug",
            "body": "Login flow breaks\n\n<!-- notion:n1 -->",
            "state": "open",
            "assignees": [{ "login": "alexcraviotto" }],
            "labels": [{ "name": "high" }],
            "updated_at": "2026-08-20T10:30:00Z"
        })
    }

    #[test]
    fn parses_a_rest_issue() {
        let issue = parse_issue(&sample_issue()).unwrap();
        assert_eq!(issue.id, 123_456);
        assert_eq!(issue.node_id, "I_abc");
        assert_eq!(issue.number, 7);
        assert_eq!(issue.state, IssueState::Open);
        assert_eq!(issue.assignees, vec!["alexcraviotto"]);
        assert_eq!(issue.labels, vec!["high"]);
        assert!(issue.project_item_id.is_none());
    }

    #[test]
    fn null_body_becomes_empty_string() {
        let mut value = sample_issue();
        value["body"] = Value::Null;
        assert_eq!(parse_issue(&value).unwrap().body, "");
    }

    #[test]
    fn closed_state_is_parsed() {
        let mut value = sample_issue();
        value["state"] = json!("closed");
        assert!(parse_issue(&value).unwrap().state.is_closed());
    }

    #[test]
    fn board_item_matches_on_project_number() {
        let nodes = json!([
            {
                "id": "PVTI_other",
                "project": { "number": 2 },
                "fieldValueByName": { "name": "Done" }
            },
            {
                "id": "PVTI_ours",
                "project": { "number": 5 },
                "fieldValueByName": { "name": "Backlog" }
            }
        ]);
        let (item_id, status) = board_item(&nodes, 5);
        assert_eq!(item_id.as_deref(), Some("PVTI_ours"));
        assert_eq!(status.unwrap().as_str(), "Backlog");
    }

    #[test]
    fn board_item_without_status_value_keeps_item_id() {
        let nodes = json!([
            { "id": "PVTI_1", "project": { "number": 5 }, "fieldValueByName": null }
        ]);
        let (item_id, status) = board_item(&nodes, 5);
        assert_eq!(item_id.as_deref(), Some("PVTI_1"));
        assert!(status.is_none());
    }

    #[test]
    fn metadata_skips_non_select_fields() {
        let project = json!({
            "id": "PVT_1",
            "fields": { "nodes": [
                {},
                {
                    "id": "F1",
                    "name": "Status",
                    "options": [{ "id": "O1", "name": "Backlog" }]
                }
            ]}
        });
        let metadata = parse_metadata(&project).unwrap();
        assert_eq!(metadata.project_id, "PVT_1");
        assert_eq!(metadata.fields.len(), 1);
        assert_eq!(metadata.fields[0].options[0].name, "Backlog");
    }

    #[test]
    fn priority_colors_match_the_label_scheme() {
        assert_eq!(priority_color("high"), "e11d21");
        assert_eq!(priority_color("media"), "fbca04");
        assert_eq!(priority_color("low"), "009800");
        assert_eq!(priority_color("bug"), "666666");
    }
}
