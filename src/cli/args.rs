use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::sandbox::HostValue;

#[derive(Parser, Debug)]
#[clap(name = "scriptlet")]
#[clap(version, about = "Sandboxed JavaScript evaluation")]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(flatten)]
    pub global_opts: GlobalOpts,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalOpts {
    /// Configuration file path
    #[clap(short, long, global = true, env = "SCRIPTLET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[clap(long, global = true, default_value = "text", value_enum)]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a script in a fresh sandbox
    Eval(EvalArgs),

    /// Initialize a new scriptlet configuration
    Init(InitArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

// ============================================================================
// Eval Command
// ============================================================================

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Script file to evaluate ("-" or omitted reads stdin)
    pub file: Option<PathBuf>,

    /// Evaluate this source text instead of a file
    #[clap(short = 'e', long = "eval", conflicts_with = "file")]
    pub code: Option<String>,

    /// Script heap budget in bytes
    #[clap(long)]
    pub memory_limit: Option<usize>,

    /// Wall-clock budget in milliseconds (0 disables it)
    #[clap(long, allow_negative_numbers = true)]
    pub timeout_ms: Option<i64>,

    /// Maximum captured console output in bytes
    #[clap(long)]
    pub console_max_size: Option<usize>,

    /// Enable fetch() through the built-in HTTP client
    #[clap(long)]
    pub allow_net: bool,

    /// Restrict fetch() to these hosts (implies --allow-net)
    #[clap(long = "allow-host")]
    pub allow_hosts: Vec<String>,

    /// Global variables to define before evaluation (NAME=JSON; non-JSON values are strings)
    #[clap(long = "var", value_parser = parse_var)]
    pub vars: Vec<(String, HostValue)>,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force overwrite existing configuration
    #[clap(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[clap(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
}

// ============================================================================
// Common Types
// ============================================================================

fn parse_var(s: &str) -> Result<(String, HostValue), String> {
    let (name, raw) = s
        .split_once('=')
        .ok_or_else(|| "Variable format: NAME=VALUE".to_string())?;
    if name.is_empty() {
        return Err("Variable name cannot be empty".to_string());
    }

    let value = serde_json::from_str::<serde_json::Value>(raw)
        .map(HostValue::from)
        .unwrap_or_else(|_| HostValue::from(raw));
    Ok((name.to_string(), value))
}

#[derive(Debug, Clone, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
