//! Glue between a mounted [`DashboardSearch`] and the search backend.

use std::time::Instant;

use crate::error::Result;
use crate::mode::{DashboardSearch, SearchController};
use crate::query::SearchQuery;

/// The search-execution collaborator.
pub trait QueryExecutor {
    fn execute(&mut self, query: &SearchQuery, include_panels: bool);
}

impl<F> QueryExecutor for F
where
    F: FnMut(&SearchQuery, bool),
{
    fn execute(&mut self, query: &SearchQuery, include_panels: bool) {
        self(query, include_panels);
    }
}

/// Delivers every commit produced by a [`DashboardSearch`] to an executor,
/// exactly once.
#[derive(Debug)]
pub struct SearchSession<E> {
    search: DashboardSearch,
    executor: E,
    executed: u64,
}

impl<E: QueryExecutor> SearchSession<E> {
    #[must_use]
    pub const fn new(search: DashboardSearch, executor: E) -> Self {
        Self {
            search,
            executor,
            executed: 0,
        }
    }

    #[must_use]
    pub const fn search(&self) -> &DashboardSearch {
        &self.search
    }

    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Number of queries handed to the executor.
    #[must_use]
    pub const fn executed(&self) -> u64 {
        self.executed
    }

    /// Run `op` against the search and execute whatever it commits.
    /// Returns whether a query was executed.
    pub fn apply<F>(&mut self, op: F) -> bool
    where
        F: FnOnce(&mut DashboardSearch) -> Option<SearchQuery>,
    {
        let Some(query) = op(&mut self.search) else {
            return false;
        };
        let include_panels = self.search.include_panels();
        tracing::debug!(query = %query.query, include_panels, "executing search");
        self.executor.execute(&query, include_panels);
        self.executed += 1;
        true
    }

    pub fn on_draft_change_at(&mut self, text: &str, now: Instant) -> bool {
        self.apply(|s| s.on_draft_change_at(text, now))
    }

    pub fn poll_at(&mut self, now: Instant) -> bool {
        self.apply(|s| s.poll_at(now))
    }

    pub fn flush(&mut self) -> bool {
        self.apply(|s| s.flush())
    }

    /// Change the include-panels preference. When the effective value flips,
    /// the committed query is executed again so results pick up the change.
    pub fn set_include_panels(&mut self, value: bool) -> Result<bool> {
        let before = self.search.include_panels();
        let outcome = self.search.set_include_panels(value);
        let rerun = !self.search.is_closed() && self.search.include_panels() != before;
        if rerun {
            self.apply(|s| Some(s.query().clone()));
        }
        outcome.map(|()| rerun)
    }

    pub fn close(&mut self) {
        self.search.close();
    }

    #[must_use]
    pub fn into_parts(self) -> (DashboardSearch, E) {
        (self.search, self.executor)
    }
}
