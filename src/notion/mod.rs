//! Notion API adapter.
//!
//! Talks to the Notion REST API (version pinned below) for one task
//! database. Response parsing is kept in pure functions so the property
//! layout can be tested without a server.
//!
//! The database uses the Spanish property names of the original board:
//! `Nombre` (title), `Descripcion`, `Estado`, `Asignado a`, `Prioridad`,
//! `Fecha Limite`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::NotionConfig;
use crate::error::{Error, Result};
use crate::model::{NotionStatus, PageFields, TaskRecord};
use crate::sync::NotionPort;

const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Client for one Notion task database.
pub struct NotionClient {
    client: reqwest::Client,
    api_key: String,
    database_id: String,
    /// Workspace person name → Notion user id, resolved once per process.
    user_ids: Mutex<Option<HashMap<String, String>>>,
}

impl NotionClient {
    #[must_use]
    pub fn new(config: &NotionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            database_id: config.database_id.clone(),
            user_ids: Mutex::new(None),
        }
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn check(response: reqwest::Response, context: &str) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Notion(format!("{context}: HTTP {status}: {body}")));
        }
        Ok(response.json().await?)
    }

    /// Map person names to Notion user ids, fetching and caching the
    /// workspace user list on first use. Unknown names are dropped with a
    /// warning.
    async fn resolve_user_ids(&self, names: &[String]) -> Result<Vec<String>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut cache = self.user_ids.lock().await;
        let map = match cache.take() {
            Some(map) => map,
            None => self.fetch_users().await?,
        };
        let ids = names
            .iter()
            .filter_map(|name| match map.get(name) {
                Some(id) => Some(id.clone()),
                None => {
                    warn!(user = name, "no Notion user with this name, dropping assignee");
                    None
                }
            })
            .collect();
        *cache = Some(map);
        Ok(ids)
    }

    async fn fetch_users(&self) -> Result<HashMap<String, String>> {
        let mut users = HashMap::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut url = format!("{NOTION_API}/users?page_size=100");
            if let Some(c) = &cursor {
                url.push_str("&start_cursor=");
                url.push_str(c);
            }
            let response = self.request(reqwest::Method::GET, url).send().await?;
            let page = Self::check(response, "listing users").await?;
            for user in page["results"].as_array().into_iter().flatten() {
                if let (Some(name), Some(id)) = (user["name"].as_str(), user["id"].as_str()) {
                    users.insert(name.to_string(), id.to_string());
                }
            }
            if !page["has_more"].as_bool().unwrap_or(false) {
                break;
            }
            cursor = page["next_cursor"].as_str().map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }
        debug!(count = users.len(), "resolved workspace users");
        Ok(users)
    }
}

impl NotionPort for NotionClient {
    async fn fetch_task_records(&self) -> Result<Vec<TaskRecord>> {
        let url = format!("{NOTION_API}/databases/{}/query", self.database_id);
        let mut tasks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({ "page_size": 100 });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }
            let response = self
                .request(reqwest::Method::POST, url.clone())
                .json(&body)
                .send()
                .await?;
            let page = Self::check(response, "querying task database").await?;

            for result in page["results"].as_array().into_iter().flatten() {
                match parse_task(result) {
                    Some(task) => tasks.push(task),
                    None => warn!("skipping malformed database row"),
                }
            }
            if !page["has_more"].as_bool().unwrap_or(false) {
                break;
            }
            cursor = page["next_cursor"].as_str().map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }
        debug!(count = tasks.len(), "fetched task records");
        Ok(tasks)
    }

    async fn create_page(&self, fields: &PageFields) -> Result<String> {
        let user_ids = self.resolve_user_ids(&fields.assignees).await?;
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": build_properties(fields, &user_ids),
        });
        let response = self
            .request(reqwest::Method::POST, format!("{NOTION_API}/pages"))
            .json(&body)
            .send()
            .await?;
        let page = Self::check(response, "creating page").await?;
        page["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Notion("page creation response has no id".to_string()))
    }

    async fn update_page(&self, page_id: &str, fields: &PageFields) -> Result<()> {
        let user_ids = self.resolve_user_ids(&fields.assignees).await?;
        let body = json!({ "properties": build_properties(fields, &user_ids) });
        let response = self
            .request(reqwest::Method::PATCH, format!("{NOTION_API}/pages/{page_id}"))
            .json(&body)
            .send()
            .await?;
        Self::check(response, "updating page").await?;
        Ok(())
    }
}

// ── Response parsing ──────────────────────────────────────────

/// Parse one database row into a [`TaskRecord`].
///
/// Returns `None` only when the row lacks an id or a parseable edit
/// timestamp; missing properties degrade to empty values instead.
fn parse_task(value: &Value) -> Option<TaskRecord> {
    let id = value["id"].as_str()?.to_string();
    let last_edited = parse_timestamp(value["last_edited_time"].as_str()?)?;
    let properties = &value["properties"];

    let status = properties["Estado"]["status"]["name"]
        .as_str()
        .unwrap_or("Sin Empezar");
    let assignees = properties["Asignado a"]["people"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|p| p["name"].as_str().map(str::to_string))
        .collect();

    Some(TaskRecord {
        id,
        title: rich_text_plain(&properties["Nombre"]["title"]),
        description: rich_text_plain(&properties["Descripcion"]["rich_text"]),
        status: NotionStatus::new(status),
        assignees,
        priority: properties["Prioridad"]["select"]["name"]
            .as_str()
            .map(str::to_string),
        due_date: properties["Fecha Limite"]["date"]["start"]
            .as_str()
            .map(str::to_string),
        archived: value["archived"].as_bool().unwrap_or(false),
        last_edited,
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Concatenate the plain text of a rich-text or title array.
fn rich_text_plain(value: &Value) -> String {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|t| t["plain_text"].as_str())
        .collect()
}

/// Build the properties object for a page create/update.
///
/// `user_ids` are already-resolved Notion user ids for the assignees.
fn build_properties(fields: &PageFields, user_ids: &[String]) -> Value {
    let mut properties = json!({
        "Nombre": { "title": [{ "text": { "content": fields.title } }] },
        "Descripcion": {
            "rich_text": [{ "text": { "content": fields.description } }]
        },
    });
    if let Some(status) = &fields.status {
        properties["Estado"] = json!({ "status": { "name": status.as_str() } });
    }
    if let Some(priority) = &fields.priority {
        properties["Prioridad"] = json!({ "select": { "name": priority } });
    }
    if !user_ids.is_empty() {
        let people: Vec<Value> = user_ids.iter().map(|id| json!({ "id": id })).collect();
        properties["Asignado a"] = json!({ "people": people });
    }
    properties
}
