//! CLI commands for the dashboard search core
//!
//! - `config`: resolved configuration and the render mode it selects
//! - `prefs`: inspect, set, and clear persisted search preferences
//! - `replay`: run a timed input script through the search controller

#![forbid(unsafe_code)]

use std::ffi::OsString;
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use dash_search_core::config::parse_bool;
use dash_search_core::preference::{INCLUDE_PANELS_DEFAULT, SHOW_PREVIEWS_DEFAULT};
use dash_search_core::{
    Config, DashboardSearch, PreferenceBackendKind, PreferenceStore, RenderMode,
    SEARCH_PANELS_KEY, SEARCH_PREVIEWS_KEY, SearchError, open_backend, resolve_preference,
};

pub mod output;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "dash-search", version, about = "Dashboard search controller tooling")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides applied on top of the environment configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Preference file path.
    #[arg(long, global = true, value_name = "PATH")]
    pub prefs: Option<PathBuf>,
    /// Preference backend.
    #[arg(long, global = true, value_name = "KIND", value_parser = parse_backend_arg)]
    pub backend: Option<PreferenceBackendKind>,
    /// Debounce quiet period in milliseconds.
    #[arg(long, global = true, value_name = "MS")]
    pub debounce_ms: Option<u64>,
    /// Force the panelTitleSearch toggle (selects the new search mode).
    #[arg(long, global = true, value_name = "BOOL", action = ArgAction::Set, value_parser = parse_bool_arg)]
    pub panel_title_search: Option<bool>,
    /// Force the searchIncludePanels toggle.
    #[arg(long, global = true, value_name = "BOOL", action = ArgAction::Set, value_parser = parse_bool_arg)]
    pub include_panels_flag: Option<bool>,
    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the resolved configuration and render mode.
    Config {
        #[arg(long)]
        json: bool,
    },
    /// Read or change persisted preferences.
    Prefs {
        #[command(subcommand)]
        action: PrefsCommand,
    },
    /// Replay a timed input script and print each executed query.
    ///
    /// Script lines are `<ms> <text>` or `<ms> !directive`. Preference
    /// changes in the script go to the configured backend; pass
    /// `--backend memory` to keep them out of storage.
    Replay {
        /// Script file, or `-` for stdin.
        script: PathBuf,
        /// Emit one JSON object per commit.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    Get {
        #[arg(long)]
        json: bool,
    },
    Set {
        key: PrefKey,
        #[arg(value_name = "BOOL", action = ArgAction::Set, value_parser = parse_bool_arg)]
        value: bool,
    },
    /// Remove one preference, or all of them.
    Clear { key: Option<PrefKey> },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefKey {
    IncludePanels,
    ShowPreviews,
}

impl PrefKey {
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::IncludePanels => SEARCH_PANELS_KEY,
            Self::ShowPreviews => SEARCH_PREVIEWS_KEY,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IncludePanels => "include-panels",
            Self::ShowPreviews => "show-previews",
        }
    }
}

fn parse_bool_arg(value: &str) -> Result<bool, String> {
    parse_bool(value).ok_or_else(|| format!("expected true or false, got {value:?}"))
}

fn parse_backend_arg(value: &str) -> Result<PreferenceBackendKind, String> {
    PreferenceBackendKind::parse(value)
        .ok_or_else(|| format!("expected json, envfile, or memory, got {value:?}"))
}

pub fn run() -> i32 {
    run_with_args(std::env::args_os())
}

/// Parse `args` (including the program name) and execute. Returns the exit code.
pub fn run_with_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return err.exit_code();
        }
    };
    let config = resolve_config(&cli.global);
    init_tracing(&config, cli.global.verbose);
    match execute(cli.command, &config) {
        Ok(()) => 0,
        Err(err) => {
            output::error(&err.to_string());
            err_exit_code(&err)
        }
    }
}

const fn err_exit_code(err: &CliError) -> i32 {
    match err {
        CliError::Search(e) if e.is_recoverable() => 2,
        _ => 1,
    }
}

/// Environment configuration with command-line overrides applied.
#[must_use]
pub fn resolve_config(global: &GlobalArgs) -> Config {
    let mut config = Config::from_env();
    if let Some(path) = &global.prefs {
        config.prefs_path.clone_from(path);
    }
    if let Some(kind) = global.backend {
        config.prefs_backend = kind;
    }
    if let Some(ms) = global.debounce_ms {
        config.debounce_ms = ms;
    }
    if let Some(v) = global.panel_title_search {
        config.toggles.panel_title_search = v;
    }
    if let Some(v) = global.include_panels_flag {
        config.toggles.include_panels = v;
    }
    config
}

fn init_tracing(config: &Config, verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn execute(command: Commands, config: &Config) -> CliResult<()> {
    tracing::debug!(?config, "configuration resolved");
    match command {
        Commands::Config { json } => handle_config(config, json),
        Commands::Prefs { action } => handle_prefs(action, config),
        Commands::Replay { script, json } => handle_replay(&script, json, config),
    }
}

// ── config ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ConfigReport {
    mode: RenderMode,
    feature_toggles: Vec<&'static str>,
    panel_title_search: bool,
    include_panels_flag: bool,
    debounce_ms: u64,
    prefs_backend: String,
    prefs_path: String,
    log_filter: String,
}

impl ConfigReport {
    fn new(config: &Config) -> Self {
        Self {
            mode: RenderMode::from_flag(config.toggles.panel_title_search),
            feature_toggles: config.toggles.enabled_names(),
            panel_title_search: config.toggles.panel_title_search,
            include_panels_flag: config.toggles.include_panels,
            debounce_ms: config.debounce_ms,
            prefs_backend: config.prefs_backend.to_string(),
            prefs_path: config.prefs_path.display().to_string(),
            log_filter: config.log_filter.clone(),
        }
    }
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

fn handle_config(config: &Config, json: bool) -> CliResult<()> {
    let report = ConfigReport::new(config);
    output::json_or_table(json, &report, || {
        output::kv("mode", report.mode.as_str());
        output::kv("panel_title_search", on_off(report.panel_title_search));
        output::kv("include_panels_flag", on_off(report.include_panels_flag));
        output::kv("debounce_ms", &report.debounce_ms.to_string());
        output::kv("prefs_backend", &report.prefs_backend);
        output::kv("prefs_path", &report.prefs_path);
        output::kv("log_filter", &report.log_filter);
    })?;
    Ok(())
}

// ── prefs ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PrefsReport {
    include_panels: bool,
    include_panels_stored: Option<bool>,
    include_panels_flag: bool,
    show_previews: bool,
    show_previews_stored: Option<bool>,
    backend: String,
    path: String,
}

fn stored_label(v: Option<bool>) -> String {
    v.map_or_else(|| "unset".to_string(), |b| b.to_string())
}

fn handle_prefs(action: PrefsCommand, config: &Config) -> CliResult<()> {
    let mut store = PreferenceStore::new(open_backend(config));
    match action {
        PrefsCommand::Get { json } => {
            let panels_stored = store.stored(SEARCH_PANELS_KEY);
            let previews_stored = store.stored(SEARCH_PREVIEWS_KEY);
            let report = PrefsReport {
                include_panels: resolve_preference(
                    panels_stored,
                    config.toggles.include_panels,
                    INCLUDE_PANELS_DEFAULT,
                ),
                include_panels_stored: panels_stored,
                include_panels_flag: config.toggles.include_panels,
                show_previews: previews_stored.unwrap_or(SHOW_PREVIEWS_DEFAULT),
                show_previews_stored: previews_stored,
                backend: store.backend_name().to_string(),
                path: config.prefs_path.display().to_string(),
            };
            output::json_or_table(json, &report, || {
                let mut table = output::CliTable::new(&["KEY", "EFFECTIVE", "STORED"]);
                table.add_row(vec![
                    PrefKey::IncludePanels.as_str().to_string(),
                    report.include_panels.to_string(),
                    stored_label(report.include_panels_stored),
                ]);
                table.add_row(vec![
                    PrefKey::ShowPreviews.as_str().to_string(),
                    report.show_previews.to_string(),
                    stored_label(report.show_previews_stored),
                ]);
                table.render();
            })?;
        }
        PrefsCommand::Set { key, value } => {
            store.set_preference(key.storage_key(), value)?;
            output::success(&format!("{} set to {value}", key.as_str()));
            if key == PrefKey::IncludePanels && !config.toggles.include_panels {
                output::warn("searchIncludePanels is off; the stored value applies once it is enabled");
            }
        }
        PrefsCommand::Clear { key } => {
            let keys = key.map_or_else(
                || vec![PrefKey::IncludePanels, PrefKey::ShowPreviews],
                |k| vec![k],
            );
            for k in keys {
                store.clear(k.storage_key())?;
                output::success(&format!("{} cleared", k.as_str()));
            }
        }
    }
    Ok(())
}

// ── replay ───────────────────────────────────────────────────────────────

fn read_script(path: &std::path::Path) -> CliResult<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    Ok(std::fs::read_to_string(path)?)
}

fn handle_replay(path: &std::path::Path, json: bool, config: &Config) -> CliResult<()> {
    let script = read_script(path)?;
    let mut search = DashboardSearch::mount(config, PreferenceStore::new(open_backend(config)));
    let commits = dash_search_core::replay(&script, &mut search, Instant::now())?;
    tracing::info!(commits = commits.len(), mode = %RenderMode::from_flag(config.toggles.panel_title_search), "replay complete");
    for commit in &commits {
        if json {
            println!("{}", serde_json::to_string(commit)?);
        } else {
            println!("{}", output::commit_line(commit));
        }
    }
    Ok(())
}
