//! Query values: the draft/committed text pair and the query handed to the
//! search-execution collaborator.

use serde::Serialize;

use crate::error::{Error, Result};

/// Draft text as typed versus the last text that was committed.
///
/// `draft_text` changes on every keystroke; `committed_text` only changes
/// when a commit fires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryState {
    pub committed_text: String,
    pub draft_text: String,
}

impl QueryState {
    /// Both texts start at `initial`, so nothing is pending.
    #[must_use]
    pub fn new(initial: impl Into<String>) -> Self {
        let initial = initial.into();
        Self {
            committed_text: initial.clone(),
            draft_text: initial,
        }
    }

    /// Whether the draft differs from what was last committed.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.committed_text != self.draft_text
    }
}

/// Result ordering for the legacy search list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    AlphaAsc,
    AlphaDesc,
}

impl SortOrder {
    /// Parse `alpha-asc` / `alpha-desc` (case-insensitive, `_` accepted).
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "alpha-asc" | "asc" => Ok(Self::AlphaAsc),
            "alpha-desc" | "desc" => Ok(Self::AlphaDesc),
            other => Err(Error::InvalidArgument(format!(
                "unknown sort order {other:?} (expected alpha-asc or alpha-desc)"
            ))),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlphaAsc => "alpha-asc",
            Self::AlphaDesc => "alpha-desc",
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the legacy results list groups dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchLayout {
    #[default]
    Folders,
    List,
}

impl SearchLayout {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "folders" | "folder" => Ok(Self::Folders),
            "list" => Ok(Self::List),
            other => Err(Error::InvalidArgument(format!(
                "unknown layout {other:?} (expected folders or list)"
            ))),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Folders => "folders",
            Self::List => "list",
        }
    }
}

impl std::fmt::Display for SearchLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The committed query delivered to the search backend.
///
/// The new search mode only ever sets `query`; tags, sort and layout are
/// driven by the legacy mode's filter row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOrder>,
    pub layout: SearchLayout,
}

impl SearchQuery {
    #[must_use]
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Replace the tag filter, trimming entries and dropping blanks and duplicates.
    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.clear();
        for tag in tags {
            self.add_tag(tag.as_ref());
        }
    }

    /// Append `tag` unless it is blank or already present. Returns whether it was added.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_state_starts_clean() {
        let state = QueryState::new("cpu");
        assert_eq!(state.committed_text, "cpu");
        assert_eq!(state.draft_text, "cpu");
        assert!(!state.is_dirty());
    }

    #[test]
    fn sort_order_parse_accepts_aliases() {
        assert_eq!(SortOrder::parse("alpha-asc").unwrap(), SortOrder::AlphaAsc);
        assert_eq!(SortOrder::parse("ALPHA_DESC").unwrap(), SortOrder::AlphaDesc);
        assert_eq!(SortOrder::parse(" desc ").unwrap(), SortOrder::AlphaDesc);
        let err = SortOrder::parse("newest").unwrap_err();
        assert_eq!(err.error_type(), "INVALID_ARGUMENT");
    }

    #[test]
    fn layout_parse_and_display() {
        assert_eq!(SearchLayout::parse("List").unwrap(), SearchLayout::List);
        assert_eq!(SearchLayout::parse("folder").unwrap(), SearchLayout::Folders);
        assert!(SearchLayout::parse("grid").is_err());
        assert_eq!(SearchLayout::List.to_string(), "list");
        assert_eq!(SearchLayout::default(), SearchLayout::Folders);
    }

    #[test]
    fn add_tag_dedupes_and_trims() {
        let mut q = SearchQuery::text("cpu");
        assert!(q.add_tag(" prod "));
        assert!(!q.add_tag("prod"));
        assert!(!q.add_tag("   "));
        assert!(q.add_tag("k8s"));
        assert_eq!(q.tags, vec!["prod", "k8s"]);
    }

    #[test]
    fn set_tags_replaces_existing() {
        let mut q = SearchQuery::text("");
        q.add_tag("old");
        q.set_tags(["a", "b", "a", ""]);
        assert_eq!(q.tags, vec!["a", "b"]);
    }

    #[test]
    fn search_query_json_shape() {
        let q = SearchQuery::text("gra");
        let json = serde_json::to_string(&q).unwrap();
        assert_eq!(json, r#"{"query":"gra","layout":"folders"}"#);

        let mut legacy = SearchQuery::text("x");
        legacy.add_tag("prod");
        legacy.sort = Some(SortOrder::AlphaDesc);
        legacy.layout = SearchLayout::List;
        let json = serde_json::to_string(&legacy).unwrap();
        assert_eq!(
            json,
            r#"{"query":"x","tags":["prod"],"sort":"alpha-desc","layout":"list"}"#
        );
    }
}
