//! Deterministic replay of timed input scripts.
//!
//! A script has one event per line, `<ms> <payload>`, where `<ms>` is the
//! offset from the start of the session. Blank lines and lines starting with
//! `#` are skipped.
//!
//! ```text
//! # rapid typing
//! 0 g
//! 50 gr
//! 100 gra
//! 400 !panels off
//! 900 !close
//! ```
//!
//! Payloads starting with `!` are directives (`!close`, `!flush`,
//! `!panels on|off`, `!tag <name>`, `!sort <order|none>`,
//! `!layout <folders|list>`); `!!` escapes a literal leading `!`. Anything
//! else is the draft text, taken verbatim after the single separating space.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::parse_bool;
use crate::error::{Error, Result};
use crate::mode::{DashboardSearch, SearchController};
use crate::query::{SearchLayout, SearchQuery, SortOrder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptAction {
    Draft(String),
    Close,
    Flush,
    Panels(bool),
    Tag(String),
    Sort(Option<SortOrder>),
    Layout(SearchLayout),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEvent {
    pub at_ms: u64,
    /// 1-based line number in the script.
    pub line: usize,
    pub action: ScriptAction,
}

/// A query that reached the search backend during replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayCommit {
    pub at_ms: u64,
    pub query: SearchQuery,
    pub include_panels: bool,
}

fn line_error(line: usize, msg: impl std::fmt::Display) -> Error {
    Error::InvalidArgument(format!("line {line}: {msg}"))
}

/// Parse a whole script, checking that timestamps never go backwards.
pub fn parse_script(script: &str) -> Result<Vec<ScriptEvent>> {
    let mut events = Vec::new();
    let mut last_ms = 0_u64;
    for (idx, raw) in script.lines().enumerate() {
        let line = idx + 1;
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (ms_part, payload) = trimmed.split_once(' ').unwrap_or((trimmed, ""));
        let at_ms: u64 = ms_part
            .parse()
            .map_err(|_| line_error(line, format!("invalid timestamp {ms_part:?}")))?;
        if at_ms < last_ms {
            return Err(line_error(
                line,
                format!("timestamp {at_ms} is before previous event at {last_ms}"),
            ));
        }
        last_ms = at_ms;
        let action = parse_action(payload).map_err(|msg| line_error(line, msg))?;
        events.push(ScriptEvent { at_ms, line, action });
    }
    Ok(events)
}

fn parse_action(payload: &str) -> std::result::Result<ScriptAction, String> {
    if let Some(escaped) = payload.strip_prefix("!!") {
        return Ok(ScriptAction::Draft(format!("!{escaped}")));
    }
    let Some(directive) = payload.strip_prefix('!') else {
        return Ok(ScriptAction::Draft(payload.to_string()));
    };
    let (name, arg) = directive
        .trim()
        .split_once(char::is_whitespace)
        .map_or((directive.trim(), ""), |(n, a)| (n, a.trim()));
    match name {
        "close" => Ok(ScriptAction::Close),
        "flush" => Ok(ScriptAction::Flush),
        "panels" => parse_bool(arg)
            .map(ScriptAction::Panels)
            .ok_or_else(|| format!("!panels expects on or off, got {arg:?}")),
        "tag" if !arg.is_empty() => Ok(ScriptAction::Tag(arg.to_string())),
        "tag" => Err("!tag expects a tag name".to_string()),
        "sort" if arg.eq_ignore_ascii_case("none") => Ok(ScriptAction::Sort(None)),
        "sort" => SortOrder::parse(arg)
            .map(|s| ScriptAction::Sort(Some(s)))
            .map_err(|e| e.to_string()),
        "layout" => SearchLayout::parse(arg)
            .map(ScriptAction::Layout)
            .map_err(|e| e.to_string()),
        other => Err(format!("unknown directive !{other}")),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn offset_ms(start: Instant, at: Instant) -> u64 {
    at.saturating_duration_since(start).as_millis() as u64
}

/// Drive `search` through `events`, returning every commit in order.
///
/// Due deadlines fire at their exact time before the next event is applied,
/// and the final outstanding deadline is drained after the last event.
pub fn replay_events(
    events: &[ScriptEvent],
    search: &mut DashboardSearch,
    start: Instant,
) -> Result<Vec<ReplayCommit>> {
    let mut commits = Vec::new();
    let mut record = |search: &DashboardSearch, at_ms: u64, query: Option<SearchQuery>| {
        if let Some(query) = query {
            commits.push(ReplayCommit {
                at_ms,
                query,
                include_panels: search.include_panels(),
            });
        }
    };

    for event in events {
        let now = start + Duration::from_millis(event.at_ms);
        while let Some(deadline) = search.next_deadline()
            && deadline <= now
        {
            let fired = search.poll_at(deadline);
            record(search, offset_ms(start, deadline), fired);
        }

        let fired = match &event.action {
            ScriptAction::Draft(text) => search.on_draft_change_at(text, now),
            ScriptAction::Close => {
                search.close();
                None
            }
            ScriptAction::Flush => search.flush(),
            ScriptAction::Panels(value) => {
                let before = search.include_panels();
                search.set_include_panels(*value).map_err(|e| match e {
                    Error::Unsupported(_) => line_error(event.line, e),
                    other => other,
                })?;
                (!search.is_closed() && search.include_panels() != before)
                    .then(|| search.query().clone())
            }
            ScriptAction::Tag(tag) => legacy(search, event.line)?.add_tag(tag),
            ScriptAction::Sort(sort) => legacy(search, event.line)?.set_sort(*sort),
            ScriptAction::Layout(layout) => legacy(search, event.line)?.set_layout(*layout),
        };
        record(search, event.at_ms, fired);
    }

    if let Some(deadline) = search.next_deadline() {
        let fired = search.poll_at(deadline);
        record(search, offset_ms(start, deadline), fired);
    }
    tracing::debug!(events = events.len(), commits = commits.len(), "replay finished");
    Ok(commits)
}

fn legacy(search: &mut DashboardSearch, line: usize) -> Result<&mut crate::mode::LegacySearch> {
    search
        .as_legacy_mut()
        .ok_or_else(|| line_error(line, "filter directives need the legacy search mode"))
}

/// Parse and replay `script` in one step.
pub fn replay(script: &str, search: &mut DashboardSearch, start: Instant) -> Result<Vec<ReplayCommit>> {
    let events = parse_script(script)?;
    replay_events(&events, search, start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, FeatureToggles};
    use crate::preference::PreferenceStore;

    fn mount(panel_title_search: bool) -> DashboardSearch {
        let config = Config {
            toggles: FeatureToggles {
                panel_title_search,
                include_panels: true,
            },
            ..Config::default()
        };
        DashboardSearch::mount(&config, PreferenceStore::in_memory())
    }

    fn texts(commits: &[ReplayCommit]) -> Vec<(u64, &str)> {
        commits.iter().map(|c| (c.at_ms, c.query.query.as_str())).collect()
    }

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let events = parse_script("# hi\n\n0 a\r\n  \n10 !flush\n").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, ScriptAction::Draft("a".into()));
        assert_eq!(events[1].line, 5);
        assert_eq!(events[1].action, ScriptAction::Flush);
    }

    #[test]
    fn parse_keeps_draft_text_verbatim() {
        let events = parse_script("0 two  words \n5\n6 !!bang\n").unwrap();
        assert_eq!(events[0].action, ScriptAction::Draft("two  words ".into()));
        assert_eq!(events[1].action, ScriptAction::Draft(String::new()));
        assert_eq!(events[2].action, ScriptAction::Draft("!bang".into()));
    }

    #[test]
    fn parse_directives() {
        let events =
            parse_script("0 !panels off\n0 !tag prod\n0 !sort alpha-desc\n0 !sort none\n0 !layout list\n0 !close")
                .unwrap();
        let actions: Vec<_> = events.into_iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                ScriptAction::Panels(false),
                ScriptAction::Tag("prod".into()),
                ScriptAction::Sort(Some(SortOrder::AlphaDesc)),
                ScriptAction::Sort(None),
                ScriptAction::Layout(SearchLayout::List),
                ScriptAction::Close,
            ]
        );
    }

    #[test]
    fn parse_rejects_bad_lines_with_line_number() {
        let err = parse_script("0 a\n10 b\n5 c\n").unwrap_err();
        assert_eq!(err.error_type(), "INVALID_ARGUMENT");
        assert!(err.to_string().contains("line 3"));

        let err = parse_script("x a").unwrap_err();
        assert!(err.to_string().contains("line 1"));

        let err = parse_script("0 a\n1 !explode").unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(err.to_string().contains("!explode"));

        assert!(parse_script("0 !panels maybe").is_err());
        assert!(parse_script("0 !sort newest").is_err());
        assert!(parse_script("0 !tag").is_err());
    }

    #[test]
    fn rapid_typing_commits_once() {
        let mut search = mount(true);
        let commits = replay("0 g\n50 gr\n100 gra\n", &mut search, Instant::now()).unwrap();
        assert_eq!(texts(&commits), vec![(300, "gra")]);
        assert!(commits[0].include_panels);
    }

    #[test]
    fn spaced_typing_commits_each() {
        let mut search = mount(true);
        let commits = replay("0 a\n250 ab\n", &mut search, Instant::now()).unwrap();
        assert_eq!(texts(&commits), vec![(200, "a"), (450, "ab")]);
    }

    #[test]
    fn close_before_deadline_drops_commit() {
        let mut search = mount(true);
        let commits = replay("0 mem\n100 !close\n500 more\n", &mut search, Instant::now()).unwrap();
        assert!(commits.is_empty());
    }

    #[test]
    fn flush_and_panels_toggle() {
        let mut search = mount(true);
        let script = "0 cpu\n20 !flush\n40 !panels off\n60 !panels off\n";
        let commits = replay(script, &mut search, Instant::now()).unwrap();
        assert_eq!(texts(&commits), vec![(20, "cpu"), (40, "cpu")]);
        assert!(commits[0].include_panels);
        assert!(!commits[1].include_panels);
    }

    #[test]
    fn legacy_script_commits_each_event() {
        let mut search = mount(false);
        let script = "0 g\n10 gr\n20 !tag prod\n30 !sort alpha-asc\n40 !layout list\n";
        let commits = replay(script, &mut search, Instant::now()).unwrap();
        assert_eq!(commits.len(), 5);
        let last = &commits[4].query;
        assert_eq!(last.query, "gr");
        assert_eq!(last.tags, vec!["prod"]);
        assert_eq!(last.sort, Some(SortOrder::AlphaAsc));
        assert_eq!(last.layout, SearchLayout::List);
        assert!(commits.iter().all(|c| !c.include_panels));
    }

    #[test]
    fn filter_directive_in_new_mode_is_rejected() {
        let mut search = mount(true);
        let err = replay("0 a\n10 !tag prod\n", &mut search, Instant::now()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn panels_directive_in_legacy_mode_is_rejected() {
        let mut search = mount(false);
        let err = replay("0 !panels on\n", &mut search, Instant::now()).unwrap_err();
        assert_eq!(err.error_type(), "INVALID_ARGUMENT");
        assert!(err.to_string().contains("line 1"), "{err}");
        assert!(!search.include_panels());
    }
}
