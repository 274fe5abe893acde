//! Issue body composition and the embedded Notion back-reference.
//!
//! Bodies pushed to GitHub are generated from the Notion description plus
//! two annotation lines: an optional due-date line and an HTML-comment
//! marker carrying the Notion page id. The marker is what lets a later
//! pass recover a lost pairing without guessing; stripping both
//! annotations recovers the description for fingerprinting and reverse
//! sync.

const MARKER_PREFIX: &str = "<!-- notion:";
const MARKER_SUFFIX: &str = "-->";
const DUE_DATE_PREFIX: &str = "**Fecha límite**:";

/// The back-reference line embedded in every generated issue body.
#[must_use]
pub fn notion_marker(notion_id: &str) -> String {
    format!("{MARKER_PREFIX}{notion_id} {MARKER_SUFFIX}")
}

/// Recover the Notion page id from an issue body, if a marker is present.
#[must_use]
pub fn extract_notion_id(body: &str) -> Option<&str> {
    for line in body.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(MARKER_PREFIX) {
            if let Some(id) = rest.strip_suffix(MARKER_SUFFIX) {
                let id = id.trim();
                if !id.is_empty() {
                    return Some(id);
                }
            }
        }
    }
    None
}

/// Build the full issue body for a task: description, optional due-date
/// line, and the back-reference marker, blank-line separated.
#[must_use]
pub fn compose_body(description: &str, due_date: Option<&str>, notion_id: &str) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(3);
    let description = description.trim();
    if !description.is_empty() {
        parts.push(description.to_string());
    }
    if let Some(due) = due_date {
        parts.push(format!("{DUE_DATE_PREFIX} {due}"));
    }
    parts.push(notion_marker(notion_id));
    parts.join("\n\n")
}

/// Strip generated annotation lines from an issue body, recovering the
/// plain description. Inverse of [`compose_body`] for trimmed input.
#[must_use]
pub fn strip_generated(body: &str) -> String {
    let kept: Vec<&str> = body
        .lines()
        .filter(|line| {
            let line = line.trim();
            !(line.starts_with(MARKER_PREFIX) || line.starts_with(DUE_DATE_PREFIX))
        })
        .collect();
    kept.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_round_trips() {
        let body = compose_body("Fix the login flow", None, "n1");
        assert_eq!(extract_notion_id(&body), Some("n1"));
    }

    #[test]
    fn extract_ignores_bodies_without_marker() {
        assert_eq!(extract_notion_id("just some text"), None);
        assert_eq!(extract_notion_id(""), None);
    }

    #[test]
    fn compose_includes_due_date_line() {
        let body = compose_body("Desc", Some("2026-09-01"), "n1");
        assert!(body.contains("**Fecha límite**: 2026-09-01"));
    }

    #[test]
    fn strip_recovers_description() {
        let body = compose_body("Fix the login flow", Some("2026-09-01"), "n1");
        assert_eq!(strip_generated(&body), "Fix the login flow");
    }

    #[test]
    fn strip_preserves_multiline_descriptions() {
        let description = "First paragraph.\n\nSecond paragraph.";
        let body = compose_body(description, None, "n1");
        assert_eq!(strip_generated(&body), description);
    }

    #[test]
    fn empty_description_yields_marker_only_body() {
        let body = compose_body("", None, "n1");
        assert_eq!(body, notion_marker("n1"));
        assert_eq!(strip_generated(&body), "");
    }
}
