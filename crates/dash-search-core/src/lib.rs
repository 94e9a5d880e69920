//! Interaction core for the dashboard search overlay
//!
//! This crate provides:
//! - Debounced propagation of typed text to the committed query
//! - Persisted, flag-gated search preferences with pluggable storage
//! - The mount-time choice between the new and legacy search strategies
//! - Configuration, errors, and deterministic replay of timed input scripts

#![forbid(unsafe_code)]

pub mod config;
pub mod debounce;
pub mod error;
pub mod mode;
pub mod paths;
pub mod preference;
pub mod query;
pub mod replay;
pub mod session;

// Re-export key types for convenience
pub use config::{Config, FeatureToggles, PreferenceBackendKind};
pub use debounce::DebounceController;
pub use error::{Error as SearchError, Result as SearchResult};
pub use mode::{DashboardSearch, LegacySearch, NewSearch, RenderMode, SearchController};
pub use preference::{
    EnvfileBackend, JsonFileBackend, MemoryBackend, PreferenceBackend, PreferenceStore,
    SEARCH_PANELS_KEY, SEARCH_PREVIEWS_KEY, open_backend, resolve_preference,
};
pub use query::{QueryState, SearchLayout, SearchQuery, SortOrder};
pub use replay::{ReplayCommit, ScriptAction, ScriptEvent, parse_script, replay};
pub use session::{QueryExecutor, SearchSession};
