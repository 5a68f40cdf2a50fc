//! Keyword-based download suggestions.
//!
//! A fixed lookup from keywords found in the user's message to downloadable
//! profile documents. Independent of retrieval.

use serde::Serialize;
use std::collections::BTreeSet;

/// Keyword → profile labels. Keywords match case-insensitively as substrings.
const KEYWORD_TABLE: &[(&str, &[&str])] = &[
    ("ai", &["Profile 1", "Profile 3"]),
    ("python", &["Profile 2"]),
    ("web", &["Profile 4"]),
    ("projects", &["Profile 3", "Profile 5"]),
    ("experience", &["Profile 1", "Profile 2"]),
];

/// A downloadable file offered alongside a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub label: String,
    pub path: String,
}

/// Asset path for a label: `"Profile 3"` → `assets/profile3.pdf`.
pub fn asset_path(label: &str) -> String {
    let slug: String = label
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    format!("assets/{}.pdf", slug)
}

/// Suggestions for `text`, deduplicated and sorted by label.
pub fn suggest_downloads(text: &str) -> Vec<Suggestion> {
    let lower = text.to_lowercase();

    let labels: BTreeSet<&str> = KEYWORD_TABLE
        .iter()
        .filter(|(keyword, _)| lower.contains(keyword))
        .flat_map(|(_, labels)| labels.iter().copied())
        .collect();

    labels
        .into_iter()
        .map(|label| Suggestion {
            label: label.to_string(),
            path: asset_path(label),
        })
        .collect()
}
