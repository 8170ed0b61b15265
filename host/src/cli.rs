use std::path::PathBuf;

use clap::Parser;

/// Native messaging host for the LearnFlow browser extension.
///
/// The browser launches this binary and speaks length-prefixed JSON on
/// stdin/stdout; logs go to stderr.
#[derive(Debug, Parser)]
#[command(name = "learnflow-host", version, about)]
pub struct Cli {
    /// Directory holding learnflow.db (defaults to the platform data dir)
    #[arg(long, env = "LEARNFLOW_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LEARNFLOW_LOG", default_value = "info")]
    pub log_level: String,

    /// Arguments the browser appends (caller origin, parent window)
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub caller: Vec<String>,
}
