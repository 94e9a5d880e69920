//! Search strategies and the mount-time mode selector.
//!
//! [`DashboardSearch::mount`] reads the `panelTitleSearch` toggle once and
//! builds either a [`NewSearch`] (debounced, panel-aware) or a
//! [`LegacySearch`] (immediate commits, tag/sort/layout filters). The choice
//! never changes for the life of the value; callers drive it through the
//! [`SearchController`] trait without knowing which one is active.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::Config;
use crate::debounce::DebounceController;
use crate::error::{Error, Result};
use crate::preference::{
    INCLUDE_PANELS_DEFAULT, PreferenceStore, SEARCH_PANELS_KEY, SEARCH_PREVIEWS_KEY,
    SHOW_PREVIEWS_DEFAULT, resolve_preference,
};
use crate::query::{SearchLayout, SearchQuery, SortOrder};

pub const PLACEHOLDER_WITH_PANELS: &str = "Search dashboards and panels by name";
pub const PLACEHOLDER_DASHBOARDS: &str = "Search dashboards by name";

/// Which strategy a [`DashboardSearch`] was mounted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    New,
    Legacy,
}

impl RenderMode {
    #[must_use]
    pub const fn from_flag(panel_title_search: bool) -> Self {
        if panel_title_search { Self::New } else { Self::Legacy }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Legacy => "legacy",
        }
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities shared by both search strategies.
///
/// Every method returning `Option<SearchQuery>` yields `Some` exactly when a
/// commit fired; the caller hands that query to the search backend.
pub trait SearchController {
    fn mode(&self) -> RenderMode;

    /// A keystroke in the search box.
    fn on_draft_change_at(&mut self, text: &str, now: Instant) -> Option<SearchQuery>;

    fn on_draft_change(&mut self, text: &str) -> Option<SearchQuery> {
        self.on_draft_change_at(text, Instant::now())
    }

    /// Query text rewritten from outside the input box (e.g. a tag click in
    /// the results list). Same path as a keystroke.
    fn set_draft_text_at(&mut self, text: &str, now: Instant) -> Option<SearchQuery> {
        self.on_draft_change_at(text, now)
    }

    /// Fire a pending commit whose deadline has been reached.
    fn poll_at(&mut self, now: Instant) -> Option<SearchQuery>;

    fn poll(&mut self) -> Option<SearchQuery> {
        self.poll_at(Instant::now())
    }

    fn next_deadline(&self) -> Option<Instant>;

    /// Commit any pending draft immediately.
    fn flush(&mut self) -> Option<SearchQuery>;

    /// The last committed query.
    fn query(&self) -> &SearchQuery;

    fn draft_text(&self) -> &str;

    /// Effective include-panels value (flag and preference applied).
    fn include_panels(&self) -> bool;

    fn set_include_panels(&mut self, value: bool) -> Result<()>;

    fn placeholder(&self) -> &'static str;

    /// The overlay closed. Pending work is dropped and later input ignored.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

// ─────────────────────────────────────────────────────────────────────────────
// New strategy
// ─────────────────────────────────────────────────────────────────────────────

/// Debounced search with the include-panels preference.
#[derive(Debug)]
pub struct NewSearch {
    debounce: DebounceController,
    query: SearchQuery,
    store: PreferenceStore,
    include_panels_flag: bool,
    include_panels: bool,
}

impl NewSearch {
    /// The preference is read here, once.
    #[must_use]
    pub fn new(quiet_period: Duration, include_panels_flag: bool, mut store: PreferenceStore) -> Self {
        let include_panels =
            store.get_gated(SEARCH_PANELS_KEY, INCLUDE_PANELS_DEFAULT, include_panels_flag);
        Self {
            debounce: DebounceController::new(quiet_period, ""),
            query: SearchQuery::default(),
            store,
            include_panels_flag,
            include_panels,
        }
    }

    #[must_use]
    pub const fn debounce(&self) -> &DebounceController {
        &self.debounce
    }

    /// Drop a pending commit but keep accepting input.
    pub fn cancel(&mut self) -> bool {
        self.debounce.cancel()
    }

    fn committed(&mut self, text: Option<String>) -> Option<SearchQuery> {
        self.query.query = text?;
        Some(self.query.clone())
    }
}

impl SearchController for NewSearch {
    fn mode(&self) -> RenderMode {
        RenderMode::New
    }

    fn on_draft_change_at(&mut self, text: &str, now: Instant) -> Option<SearchQuery> {
        let fired = self.debounce.on_draft_change_at(text, now);
        self.committed(fired)
    }

    fn poll_at(&mut self, now: Instant) -> Option<SearchQuery> {
        let fired = self.debounce.poll_at(now);
        self.committed(fired)
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.debounce.next_deadline()
    }

    fn flush(&mut self) -> Option<SearchQuery> {
        let fired = self.debounce.flush();
        self.committed(fired)
    }

    fn query(&self) -> &SearchQuery {
        &self.query
    }

    fn draft_text(&self) -> &str {
        self.debounce.draft_text()
    }

    fn include_panels(&self) -> bool {
        self.include_panels
    }

    /// Persists even while the flag is off; the effective value stays `false`
    /// until the flag is enabled.
    fn set_include_panels(&mut self, value: bool) -> Result<()> {
        self.include_panels =
            resolve_preference(Some(value), self.include_panels_flag, INCLUDE_PANELS_DEFAULT);
        self.store.set_preference(SEARCH_PANELS_KEY, value)
    }

    fn placeholder(&self) -> &'static str {
        if self.include_panels {
            PLACEHOLDER_WITH_PANELS
        } else {
            PLACEHOLDER_DASHBOARDS
        }
    }

    fn close(&mut self) {
        self.debounce.teardown();
    }

    fn is_closed(&self) -> bool {
        self.debounce.is_torn_down()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Legacy strategy
// ─────────────────────────────────────────────────────────────────────────────

/// Immediate-commit search with tag, sort and layout filters.
#[derive(Debug)]
pub struct LegacySearch {
    query: SearchQuery,
    store: PreferenceStore,
    show_previews: bool,
    closed: bool,
}

impl LegacySearch {
    #[must_use]
    pub fn new(mut store: PreferenceStore) -> Self {
        let show_previews = store.get_preference(SEARCH_PREVIEWS_KEY, SHOW_PREVIEWS_DEFAULT);
        Self {
            query: SearchQuery::default(),
            store,
            show_previews,
            closed: false,
        }
    }

    fn commit(&self) -> Option<SearchQuery> {
        if self.closed {
            return None;
        }
        tracing::debug!(query = %self.query.query, tags = ?self.query.tags, "legacy query committed");
        Some(self.query.clone())
    }

    pub fn set_tag_filter<I, S>(&mut self, tags: I) -> Option<SearchQuery>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.closed {
            return None;
        }
        self.query.set_tags(tags);
        self.commit()
    }

    /// Commits only if the tag was not already in the filter.
    pub fn add_tag(&mut self, tag: &str) -> Option<SearchQuery> {
        if self.closed || !self.query.add_tag(tag) {
            return None;
        }
        self.commit()
    }

    pub fn set_sort(&mut self, sort: Option<SortOrder>) -> Option<SearchQuery> {
        if self.closed {
            return None;
        }
        self.query.sort = sort;
        self.commit()
    }

    pub fn set_layout(&mut self, layout: SearchLayout) -> Option<SearchQuery> {
        if self.closed {
            return None;
        }
        self.query.layout = layout;
        self.commit()
    }

    #[must_use]
    pub const fn show_previews(&self) -> bool {
        self.show_previews
    }

    pub fn set_show_previews(&mut self, value: bool) -> Result<()> {
        self.show_previews = value;
        self.store.set_preference(SEARCH_PREVIEWS_KEY, value)
    }
}

impl SearchController for LegacySearch {
    fn mode(&self) -> RenderMode {
        RenderMode::Legacy
    }

    fn on_draft_change_at(&mut self, text: &str, _now: Instant) -> Option<SearchQuery> {
        if self.closed {
            tracing::debug!("draft change after close ignored");
            return None;
        }
        text.clone_into(&mut self.query.query);
        self.commit()
    }

    fn poll_at(&mut self, _now: Instant) -> Option<SearchQuery> {
        None
    }

    fn next_deadline(&self) -> Option<Instant> {
        None
    }

    fn flush(&mut self) -> Option<SearchQuery> {
        None
    }

    fn query(&self) -> &SearchQuery {
        &self.query
    }

    fn draft_text(&self) -> &str {
        &self.query.query
    }

    fn include_panels(&self) -> bool {
        false
    }

    fn set_include_panels(&mut self, _value: bool) -> Result<()> {
        Err(Error::Unsupported("include panels requires panel title search"))
    }

    fn placeholder(&self) -> &'static str {
        PLACEHOLDER_DASHBOARDS
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mode selector
// ─────────────────────────────────────────────────────────────────────────────

/// A search overlay instance with its strategy fixed at mount.
#[derive(Debug)]
pub enum DashboardSearch {
    New(NewSearch),
    Legacy(LegacySearch),
}

impl DashboardSearch {
    /// Select the strategy from `config.toggles.panel_title_search`.
    #[must_use]
    pub fn mount(config: &Config, store: PreferenceStore) -> Self {
        let mode = RenderMode::from_flag(config.toggles.panel_title_search);
        tracing::debug!(
            mode = mode.as_str(),
            debounce_ms = config.debounce_ms,
            include_panels_flag = config.toggles.include_panels,
            backend = store.backend_name(),
            "search mounted"
        );
        match mode {
            RenderMode::New => Self::New(NewSearch::new(
                config.quiet_period(),
                config.toggles.include_panels,
                store,
            )),
            RenderMode::Legacy => Self::Legacy(LegacySearch::new(store)),
        }
    }

    #[must_use]
    pub const fn as_legacy(&self) -> Option<&LegacySearch> {
        match self {
            Self::Legacy(l) => Some(l),
            Self::New(_) => None,
        }
    }

    pub const fn as_legacy_mut(&mut self) -> Option<&mut LegacySearch> {
        match self {
            Self::Legacy(l) => Some(l),
            Self::New(_) => None,
        }
    }

    #[must_use]
    pub const fn as_new(&self) -> Option<&NewSearch> {
        match self {
            Self::New(n) => Some(n),
            Self::Legacy(_) => None,
        }
    }
}

/// Forward a call to whichever strategy was mounted.
macro_rules! delegate {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {
        match $self {
            DashboardSearch::New(n) => n.$method($($arg),*),
            DashboardSearch::Legacy(l) => l.$method($($arg),*),
        }
    };
}

impl SearchController for DashboardSearch {
    fn mode(&self) -> RenderMode {
        delegate!(self.mode())
    }

    fn on_draft_change_at(&mut self, text: &str, now: Instant) -> Option<SearchQuery> {
        delegate!(self.on_draft_change_at(text, now))
    }

    fn poll_at(&mut self, now: Instant) -> Option<SearchQuery> {
        delegate!(self.poll_at(now))
    }

    fn next_deadline(&self) -> Option<Instant> {
        delegate!(self.next_deadline())
    }

    fn flush(&mut self) -> Option<SearchQuery> {
        delegate!(self.flush())
    }

    fn query(&self) -> &SearchQuery {
        delegate!(self.query())
    }

    fn draft_text(&self) -> &str {
        delegate!(self.draft_text())
    }

    fn include_panels(&self) -> bool {
        delegate!(self.include_panels())
    }

    fn set_include_panels(&mut self, value: bool) -> Result<()> {
        delegate!(self.set_include_panels(value))
    }

    fn placeholder(&self) -> &'static str {
        delegate!(self.placeholder())
    }

    fn close(&mut self) {
        delegate!(self.close());
    }

    fn is_closed(&self) -> bool {
        delegate!(self.is_closed())
    }
}
