//! Status and user mapping tables.
//!
//! Two independent lookup tables join the Notion and GitHub vocabularies:
//!
//! - [`StatusMap`]: Notion status label → board status option. A miss falls
//!   back to a single default (`Backlog`) with a warning, never an error.
//! - [`UserMap`]: Notion person name → GitHub login, plus the derived
//!   inverse. A miss drops that assignee with a warning. Building the
//!   inverse fails loudly at configuration-load time when two names map to
//!   the same login, since that would make reverse sync ambiguous.
//!
//! Both tables are plain data constructed once at startup and passed into
//! the engine by reference; there is no ambient global lookup.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{GithubStatus, NotionStatus};

/// Terminal board/status label a closed issue maps to on the Notion side.
pub const DONE_STATUS: &str = "Completado";

/// Terminal board option set on an issue whose Notion record disappeared.
pub const CANCELLED_STATUS: &str = "Cancelado";

/// Priority labels recognized when recovering a priority from issue labels.
const KNOWN_PRIORITIES: &[&str] = &["high", "medium", "low", "alta", "media", "baja"];

/// Pick the first issue label that names a known priority.
#[must_use]
pub fn priority_from_labels(labels: &[String]) -> Option<String> {
    labels
        .iter()
        .find(|l| KNOWN_PRIORITIES.contains(&l.to_lowercase().as_str()))
        .map(|l| l.to_lowercase())
}

// ── Status map ────────────────────────────────────────────────

/// Notion status label → GitHub board option, with a well-defined default.
#[derive(Debug, Clone)]
pub struct StatusMap {
    forward: BTreeMap<String, String>,
    inverse: HashMap<String, String>,
    default: String,
}

impl StatusMap {
    /// Build the table and its best-effort inverse.
    ///
    /// The forward map may legitimately collapse several Notion labels onto
    /// one board option; the inverse keeps the lexicographically first
    /// Notion label per option so reverse lookups stay deterministic.
    #[must_use]
    pub fn new(forward: BTreeMap<String, String>, default: impl Into<String>) -> Self {
        let mut inverse = HashMap::new();
        for (notion, github) in &forward {
            inverse
                .entry(github.clone())
                .or_insert_with(|| notion.clone());
        }
        Self {
            forward,
            inverse,
            default: default.into(),
        }
    }

    /// Table used by the original deployment (Spanish and English labels).
    #[must_use]
    pub fn defaults() -> Self {
        let table = [
            ("Sin Empezar", "Backlog"),
            ("En progreso", "En progreso"),
            ("En proceso", "En progreso"),
            ("En revision", "En revision"),
            ("Completado", "Completado"),
            ("Terminado", "Completado"),
            ("Preparado", "Disponible"),
            ("Disponible", "Disponible"),
            ("Cancelado", "Cancelado"),
            ("Backlog", "Backlog"),
            ("In progress", "In progress"),
            ("In review", "In review"),
            ("Done", "Done"),
            ("Ready", "Ready"),
            ("Canceled", "Canceled"),
        ];
        let forward = table
            .iter()
            .map(|(n, g)| ((*n).to_string(), (*g).to_string()))
            .collect();
        Self::new(forward, "Backlog")
    }

    /// Map a Notion label to its board option.
    ///
    /// A miss returns the default option and logs a warning.
    #[must_use]
    pub fn to_github(&self, status: &NotionStatus) -> GithubStatus {
        match self.forward.get(status.as_str()) {
            Some(mapped) => GithubStatus::new(mapped.clone()),
            None => {
                warn!(
                    status = %status,
                    default = %self.default,
                    "no status mapping found, using default"
                );
                GithubStatus::new(self.default.clone())
            }
        }
    }

    /// Reverse lookup for organic issues; `None` when no forward entry
    /// produces this board option.
    #[must_use]
    pub fn to_notion(&self, status: &GithubStatus) -> Option<NotionStatus> {
        self.inverse
            .get(status.as_str())
            .map(|s| NotionStatus::new(s.clone()))
    }

    /// The default board option used on lookup misses.
    #[must_use]
    pub fn default_status(&self) -> GithubStatus {
        GithubStatus::new(self.default.clone())
    }
}

// ── User map ──────────────────────────────────────────────────

/// Notion person name → GitHub login, with a validated inverse.
#[derive(Debug, Clone)]
pub struct UserMap {
    forward: BTreeMap<String, String>,
    inverse: HashMap<String, String>,
}

impl UserMap {
    /// Build the table and its inverse.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when two Notion names map to the same GitHub
    /// login; the inverse would be ambiguous, so this is rejected before
    /// any pass runs.
    pub fn new(forward: BTreeMap<String, String>) -> Result<Self> {
        let mut inverse = HashMap::with_capacity(forward.len());
        for (name, login) in &forward {
            if let Some(existing) = inverse.insert(login.clone(), name.clone()) {
                return Err(Error::Config(format!(
                    "user map is ambiguous: both \"{existing}\" and \"{name}\" map to GitHub login \"{login}\""
                )));
            }
        }
        Ok(Self { forward, inverse })
    }

    /// Table used by the original deployment.
    pub fn defaults() -> Result<Self> {
        let forward = [("Alex Craviotto", "alexcraviotto")]
            .iter()
            .map(|(n, g)| ((*n).to_string(), (*g).to_string()))
            .collect();
        Self::new(forward)
    }

    /// Look up the GitHub login for a Notion person name.
    ///
    /// A miss returns `None` and logs a warning; the caller drops that
    /// assignee rather than aborting the sync.
    #[must_use]
    pub fn to_login(&self, name: &str) -> Option<&str> {
        let login = self.forward.get(name).map(String::as_str);
        if login.is_none() {
            warn!(user = name, "no GitHub login mapped for Notion user, dropping assignee");
        }
        login
    }

    /// Look up the Notion person name for a GitHub login.
    #[must_use]
    pub fn to_name(&self, login: &str) -> Option<&str> {
        let name = self.inverse.get(login).map(String::as_str);
        if name.is_none() {
            warn!(login, "no Notion user mapped for GitHub login, dropping assignee");
        }
        name
    }
}

// ── Combined tables ───────────────────────────────────────────

/// The two mapping tables, constructed once at startup.
#[derive(Debug, Clone)]
pub struct Mappings {
    pub status: StatusMap,
    pub users: UserMap,
}

/// On-disk override format for `MAPPINGS_FILE`.
#[derive(Debug, Deserialize)]
struct MappingsFile {
    #[serde(default)]
    status: Option<BTreeMap<String, String>>,
    #[serde(default)]
    default_status: Option<String>,
    #[serde(default)]
    users: Option<BTreeMap<String, String>>,
}

impl Mappings {
    /// Built-in tables matching the original deployment.
    pub fn defaults() -> Result<Self> {
        Ok(Self {
            status: StatusMap::defaults(),
            users: UserMap::defaults()?,
        })
    }

    /// Load overrides from a JSON file; sections not present keep the
    /// built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for unreadable/invalid files or an
    /// ambiguous user map.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read mappings file {}: {e}", path.display()))
        })?;
        let file: MappingsFile = serde_json::from_str(&text).map_err(|e| {
            Error::Config(format!("invalid mappings file {}: {e}", path.display()))
        })?;

        let status = match file.status {
            Some(table) => StatusMap::new(
                table,
                file.default_status.unwrap_or_else(|| "Backlog".to_string()),
            ),
            None => StatusMap::defaults(),
        };
        let users = match file.users {
            Some(table) => UserMap::new(table)?,
            None => UserMap::defaults()?,
        };
        Ok(Self { status, users })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn status_map_exact_match() {
        let map = StatusMap::defaults();
        assert_eq!(
            map.to_github(&NotionStatus::new("Sin Empezar")).as_str(),
            "Backlog"
        );
        assert_eq!(
            map.to_github(&NotionStatus::new("Terminado")).as_str(),
            "Completado"
        );
    }

    #[test]
    fn status_map_miss_falls_back_to_default() {
        let map = StatusMap::defaults();
        assert_eq!(
            map.to_github(&NotionStatus::new("Estado Inventado")).as_str(),
            "Backlog"
        );
    }

    #[test]
    fn status_inverse_is_deterministic() {
        let map = StatusMap::defaults();
        // "Completado" and "Terminado" both map to "Completado"; the
        // lexicographically first notion label wins.
        assert_eq!(
            map.to_notion(&GithubStatus::new("Completado")).unwrap().as_str(),
            "Completado"
        );
    }

    #[test]
    fn user_map_lookup_and_inverse() {
        let users = UserMap::defaults().unwrap();
        assert_eq!(users.to_login("Alex Craviotto"), Some("alexcraviotto"));
        assert_eq!(users.to_name("alexcraviotto"), Some("Alex Craviotto"));
        assert_eq!(users.to_login("Nadie Conocido"), None);
    }

    #[test]
    fn duplicate_user_targets_are_rejected() {
        let forward: BTreeMap<String, String> = [
            ("Alice".to_string(), "shared".to_string()),
            ("Bob".to_string(), "shared".to_string()),
        ]
        .into_iter()
        .collect();

        let err = UserMap::new(forward).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("shared"));
    }

    #[test]
    fn priority_recovered_from_labels() {
        let labels = vec!["bug".to_string(), "High".to_string()];
        assert_eq!(priority_from_labels(&labels), Some("high".to_string()));
        assert_eq!(priority_from_labels(&["bug".to_string()]), None);
    }

    #[test]
    fn mappings_file_overrides_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"status": {{"Todo": "Backlog"}}, "users": {{"Jane Doe": "janedoe"}}}}"#
        )
        .unwrap();

        let mappings = Mappings::from_file(file.path()).unwrap();
        assert_eq!(
            mappings.status.to_github(&NotionStatus::new("Todo")).as_str(),
            "Backlog"
        );
        assert_eq!(mappings.users.to_login("Jane Doe"), Some("janedoe"));
    }
}
