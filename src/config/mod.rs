//! Configuration management.
//!
//! All runtime configuration comes from the environment (a `.env` file is
//! loaded by the binary before parsing). Configuration problems are fatal
//! at startup, before any sync pass runs; the engine itself never reads
//! the environment.

mod mappings;

pub use mappings::{
    priority_from_labels, Mappings, StatusMap, UserMap, CANCELLED_STATUS, DONE_STATUS,
};

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default interval between passes when `SYNC_INTERVAL_SECS` is unset.
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

/// Notion credentials and database selection.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub api_key: String,
    pub database_id: String,
}

/// GitHub credentials, repository, and project selection.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub project_number: u32,
}

/// Full service configuration, constructed once at process start and
/// passed by ownership into the engine builder.
#[derive(Debug, Clone)]
pub struct Config {
    pub notion: NotionConfig,
    pub github: GithubConfig,
    pub state_file: PathBuf,
    pub sync_interval: Duration,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingEnv` for absent required variables and
    /// `Error::Config` for unparseable values.
    pub fn from_env() -> Result<Self> {
        let notion = NotionConfig {
            api_key: require_env("NOTION_API_KEY")?,
            database_id: require_env("NOTION_DATABASE_ID")?,
        };
        let github = GithubConfig {
            token: require_env("GITHUB_TOKEN")?,
            owner: require_env("GITHUB_OWNER")?,
            repo: require_env("GITHUB_REPO")?,
            project_number: parse_env("GITHUB_PROJECT_NUMBER", require_env("GITHUB_PROJECT_NUMBER")?)?,
        };

        let state_file = std::env::var("STATE_FILE_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(default_state_file, PathBuf::from);

        let sync_interval = match std::env::var("SYNC_INTERVAL_SECS") {
            Ok(raw) if !raw.trim().is_empty() => {
                Duration::from_secs(parse_env("SYNC_INTERVAL_SECS", raw)?)
            }
            _ => Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
        };

        Ok(Self {
            notion,
            github,
            state_file,
            sync_interval,
        })
    }

    /// Load the mapping tables: `MAPPINGS_FILE` override when set,
    /// built-in defaults otherwise.
    pub fn load_mappings() -> Result<Mappings> {
        match std::env::var("MAPPINGS_FILE") {
            Ok(path) if !path.trim().is_empty() => Mappings::from_file(&PathBuf::from(path)),
            _ => Mappings::defaults(),
        }
    }
}

fn require_env(name: &'static str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(Error::MissingEnv(name))
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: String) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("invalid {name} value \"{raw}\": {e}")))
}

/// Default state file location: `~/.notion-github-sync/sync-state.json`,
/// falling back to the working directory when no home is resolvable.
#[must_use]
pub fn default_state_file() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("./sync-state.json"),
        |dirs| {
            dirs.home_dir()
                .join(".notion-github-sync")
                .join("sync-state.json")
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_file_has_expected_name() {
        let path = default_state_file();
        assert!(path.ends_with("sync-state.json"));
    }

    #[test]
    fn parse_env_reports_variable_name() {
        let err = parse_env::<u32>("GITHUB_PROJECT_NUMBER", "abc".to_string()).unwrap_err();
        assert!(err.to_string().contains("GITHUB_PROJECT_NUMBER"));
    }

    #[test]
    fn parse_env_accepts_padded_numbers() {
        let value: u64 = parse_env("SYNC_INTERVAL_SECS", " 60 ".to_string()).unwrap();
        assert_eq!(value, 60);
    }
}
