//! Configuration management for the dashboard search core
//!
//! Configuration is loaded from environment variables, falling back to a
//! `.env` file in the working directory. Feature toggles that are missing or
//! unparseable resolve to disabled; nothing in here is fatal.

use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Default quiet period before a draft is committed.
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Toggle name selecting the new search strategy.
pub const TOGGLE_PANEL_TITLE_SEARCH: &str = "panelTitleSearch";
/// Toggle name governing whether panels may be included in results.
pub const TOGGLE_INCLUDE_PANELS: &str = "searchIncludePanels";

/// Runtime feature toggles relevant to the search overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureToggles {
    /// Selects the new (debounced) search strategy.
    pub panel_title_search: bool,
    /// Allows the include-panels preference to take effect.
    pub include_panels: bool,
}

impl FeatureToggles {
    /// Build toggles from a comma-separated list of enabled toggle names.
    ///
    /// Matching is case-insensitive. Unknown names are ignored.
    #[must_use]
    pub fn from_csv(value: &str) -> Self {
        let mut toggles = Self::default();
        for name in parse_csv(value) {
            if name.eq_ignore_ascii_case(TOGGLE_PANEL_TITLE_SEARCH) {
                toggles.panel_title_search = true;
            } else if name.eq_ignore_ascii_case(TOGGLE_INCLUDE_PANELS) {
                toggles.include_panels = true;
            } else {
                tracing::debug!(toggle = %name, "ignoring unknown feature toggle");
            }
        }
        toggles
    }

    /// Names of the enabled toggles, in a stable order.
    #[must_use]
    pub fn enabled_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.panel_title_search {
            names.push(TOGGLE_PANEL_TITLE_SEARCH);
        }
        if self.include_panels {
            names.push(TOGGLE_INCLUDE_PANELS);
        }
        names
    }
}

/// Which storage mechanism holds the persisted preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreferenceBackendKind {
    /// JSON object file, written atomically.
    #[default]
    Json,
    /// `KEY=value` envfile.
    Envfile,
    /// Process-local map; nothing survives a restart.
    Memory,
}

impl PreferenceBackendKind {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" | "file" => Some(Self::Json),
            "envfile" | "env" => Some(Self::Envfile),
            "memory" | "mem" => Some(Self::Memory),
            _ => None,
        }
    }
}

impl std::fmt::Display for PreferenceBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Envfile => write!(f, "envfile"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Main configuration struct for the search overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub toggles: FeatureToggles,
    /// Quiet period for the debounce controller, in milliseconds.
    pub debounce_ms: u64,
    /// Where persisted preferences live.
    pub prefs_path: PathBuf,
    pub prefs_backend: PreferenceBackendKind,
    /// Default tracing filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            toggles: FeatureToggles::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            prefs_path: crate::paths::default_prefs_path(),
            prefs_backend: PreferenceBackendKind::default(),
            log_filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Feature toggles: CSV first, then per-toggle overrides.
        if let Some(v) = env_value("DASH_SEARCH_FEATURE_TOGGLES") {
            config.toggles = FeatureToggles::from_csv(&v);
        }
        config.toggles.panel_title_search = env_bool(
            "DASH_SEARCH_PANEL_TITLE_SEARCH",
            config.toggles.panel_title_search,
        );
        config.toggles.include_panels = env_bool(
            "DASH_SEARCH_INCLUDE_PANELS_FLAG",
            config.toggles.include_panels,
        );

        // Debounce
        config.debounce_ms = env_u64("DASH_SEARCH_DEBOUNCE_MS", config.debounce_ms);

        // Preference storage
        if let Some(v) = env_value("DASH_SEARCH_PREFS_PATH") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                config.prefs_path = PathBuf::from(trimmed);
            }
        }
        if let Some(v) = env_value("DASH_SEARCH_PREFS_BACKEND") {
            match PreferenceBackendKind::parse(&v) {
                Some(kind) => config.prefs_backend = kind,
                None => tracing::warn!(value = %v, "unknown DASH_SEARCH_PREFS_BACKEND, using json"),
            }
        }

        // Logging
        if let Some(v) = env_value("DASH_SEARCH_LOG") {
            config.log_filter = v;
        }

        config
    }

    /// The debounce quiet period as a [`Duration`].
    #[must_use]
    pub const fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

// Helper functions for environment variable parsing

static DOTENV_VALUES: OnceLock<HashMap<String, String>> = OnceLock::new();

#[cfg(test)]
thread_local! {
    static TEST_ENV_OVERRIDES: std::cell::RefCell<HashMap<String, String>> =
        std::cell::RefCell::new(HashMap::new());
}

#[cfg(test)]
fn test_env_override_value(key: &str) -> Option<String> {
    TEST_ENV_OVERRIDES.with(|cell| cell.borrow().get(key).cloned())
}

fn dotenv_values() -> &'static HashMap<String, String> {
    DOTENV_VALUES.get_or_init(|| load_dotenv_file(Path::new(".env")))
}

/// Read a value from the .env file (if present).
#[must_use]
pub fn dotenv_value(key: &str) -> Option<String> {
    dotenv_values().get(key).cloned()
}

/// Read a value from the real environment first, falling back to .env.
#[must_use]
pub fn env_value(key: &str) -> Option<String> {
    #[cfg(test)]
    if let Some(v) = test_env_override_value(key) {
        return Some(v);
    }
    env::var(key).ok().or_else(|| dotenv_value(key))
}

fn load_dotenv_file(path: &Path) -> HashMap<String, String> {
    let Ok(contents) = fs::read_to_string(path) else {
        return HashMap::new();
    };
    parse_dotenv_contents(&contents)
}

/// Update (or create) an envfile at `path` by replacing/adding the provided `KEY=value` pairs.
///
/// Preserves unrelated lines and comments. Keys are matched on `KEY=` after optional leading
/// whitespace and optional `export ` prefix.
pub fn update_envfile<S: std::hash::BuildHasher>(
    path: &Path,
    updates: &HashMap<&str, String, S>,
) -> io::Result<()> {
    rewrite_envfile(path, updates, &HashSet::new())
}

/// Remove `keys` from the envfile at `path`, preserving every other line.
///
/// A missing file is left missing.
pub fn remove_envfile_keys(path: &Path, keys: &[&str]) -> io::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let removals: HashSet<&str> = keys.iter().copied().collect();
    rewrite_envfile(path, &HashMap::<&str, String>::new(), &removals)
}

fn rewrite_envfile<S: std::hash::BuildHasher>(
    path: &Path,
    updates: &HashMap<&str, String, S>,
    removals: &HashSet<&str>,
) -> io::Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out_lines: Vec<String> = Vec::new();

    for line in existing.lines() {
        let trimmed = line.trim_start();
        let content = trimmed.strip_prefix("export ").unwrap_or(trimmed);

        let Some((key_str, _)) = content.split_once('=') else {
            out_lines.push(line.to_string());
            continue;
        };
        let key = key_str.trim();

        if removals.contains(key) {
            continue;
        }

        let Some(value) = updates.get(key) else {
            out_lines.push(line.to_string());
            continue;
        };

        let comment = extract_inline_comment(line);

        // Keep everything up to and including the first '=' after the key.
        let key_start_in_line = line.find(key).unwrap_or(0);
        let equals_relative_to_key = line[key_start_in_line..].find('=').unwrap_or(0);
        let equals_idx = key_start_in_line + equals_relative_to_key;
        let prefix = &line[..=equals_idx];
        let suffix = comment.map_or_else(String::new, |c| format!(" {c}"));

        out_lines.push(format!("{prefix}{value}{suffix}"));
        if let Some((k, _)) = updates.get_key_value(key) {
            seen.insert(*k);
        }
    }

    let mut sorted_updates: Vec<_> = updates.iter().collect();
    sorted_updates.sort_by_key(|(k, _)| *k);

    for (key, value) in sorted_updates {
        if !seen.contains(key) {
            out_lines.push(format!("{key}={value}"));
        }
    }

    let mut out = out_lines.join("\n");
    out.push('\n');

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, out)?;

    Ok(())
}

pub fn parse_dotenv_contents(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = parse_dotenv_value(value.trim());
        map.insert(key.to_string(), value);
    }
    map
}

fn parse_dotenv_value(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    // Double quotes with escapes
    if trimmed.starts_with('"') {
        let mut escaped = false;
        let mut closing_idx = None;
        for (i, c) in trimmed.char_indices().skip(1) {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                closing_idx = Some(i);
                break;
            }
        }
        if let Some(end) = closing_idx {
            let rem_trim = trimmed[end + 1..].trim_start();
            if rem_trim.is_empty() || rem_trim.starts_with('#') {
                return unescape_double_quotes(&trimmed[1..end]);
            }
        }
    }

    // Single quotes (no escapes)
    if trimmed.starts_with('\'') {
        let closing_idx = trimmed
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '\'')
            .map(|(i, _)| i);
        if let Some(end) = closing_idx {
            let rem_trim = trimmed[end + 1..].trim_start();
            if rem_trim.is_empty() || rem_trim.starts_with('#') {
                return trimmed[1..end].to_string();
            }
        }
    }

    strip_inline_comment(trimmed).to_string()
}

fn strip_inline_comment(value: &str) -> &str {
    let bytes = value.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] == b'#' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return value[..i].trim_end();
        }
    }
    value
}

fn extract_inline_comment(line: &str) -> Option<&str> {
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escaped = false;

    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if in_single_quote {
            if b == b'\'' {
                in_single_quote = false;
            }
            continue;
        }
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b'\'' if !in_double_quote => in_single_quote = true,
            b'"' => in_double_quote = !in_double_quote,
            b'#' if !in_double_quote && (i == 0 || bytes[i - 1].is_ascii_whitespace()) => {
                return Some(&line[i..]);
            }
            _ => {}
        }
    }
    None
}

fn unescape_double_quotes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('\\') | None => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Parse a loose boolean (`1/true/yes/on` vs `0/false/no/off`).
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env_value(key).map_or(default, |v| parse_bool(&v).unwrap_or(default))
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_value(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
