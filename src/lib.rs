//! notion-github-sync - keeps a Notion task database and a GitHub Project
//! in agreement.
//!
//! The core is a four-phase reconciliation engine that runs the same pass
//! on a schedule or on demand: snapshot both sides, push Notion edits to
//! GitHub, push GitHub edits to Notion, then reconcile deletions.
//!
//! # Architecture
//!
//! - [`config`] - Environment configuration and the status/user mapping tables
//! - [`model`] - Domain types (task records, issue records, project metadata)
//! - [`sync`] - Fingerprinting, persisted state, and the reconciliation engine
//! - [`notion`] - Notion REST adapter
//! - [`github`] - GitHub REST + GraphQL adapter
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod github;
pub mod model;
pub mod notion;
pub mod sync;

pub use error::{Error, Result};
