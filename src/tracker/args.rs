use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "sitetime-host", version)]
#[command(about = "Native messaging host tracking active browsing time per domain", long_about = None)]
pub struct HostArgs {
    /// Browsers start native hosts with the caller's origin (Chromium) or the manifest path and
    /// extension id (Firefox). They are only logged.
    #[arg(num_args = 0..)]
    pub browser_args: Vec<String>,
    /// Passed by Chromium on Windows.
    #[arg(long = "parent-window")]
    pub parent_window: Option<String>,
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    pub dir: Option<PathBuf>,
    /// Mirror logs to stderr. Stdout belongs to the browser.
    #[arg(long = "log-stderr")]
    pub log_stderr: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
    #[arg(
        long = "tick-interval-ms",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "How often the active domain's total is committed"
    )]
    pub tick_interval_ms: u64,
}
