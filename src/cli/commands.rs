use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::cli::args::{ConfigAction, ConfigArgs, EvalArgs, InitArgs, OutputFormat};
use crate::config::loader::get_config_path;
use crate::config::types::{HttpConfig, ScriptletConfig};
use crate::error::{Result, ScriptletError};
use crate::sandbox::create_http_backend;
use crate::session::{EvalOutcome, Session, SessionLimits};

/// Process exit codes for `scriptlet eval`.
pub const EXIT_OK: i32 = 0;
pub const EXIT_SCRIPT_ERROR: i32 = 1;
pub const EXIT_SYNTAX_ERROR: i32 = 2;
pub const EXIT_TIMEOUT: i32 = 3;

// ============================================================================
// Eval Command
// ============================================================================

/// Evaluate one script and print its outcome. Returns the process exit code.
pub fn eval(args: EvalArgs, config: ScriptletConfig, format: OutputFormat) -> Result<i32> {
    let source = read_source(&args)?;
    let limits = eval_limits(&args, &config);
    let http = http_config(&args, config.http);

    let mut session = Session::create(limits)?;
    session.set_http_callback(create_http_backend(&http)?);

    for (name, value) in &args.vars {
        session.set_variable(name, value)?;
    }

    info!(bytes = source.len(), "Evaluating script");
    let outcome = session.eval(&source);
    session.destroy();

    let code = exit_code(&outcome);
    match format {
        OutputFormat::Text => output_text(outcome),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }
    Ok(code)
}

// ============================================================================
// Config Commands
// ============================================================================

pub fn init(args: InitArgs) -> Result<()> {
    let config_path = get_config_path();

    if config_path.exists() && !args.force {
        println!("Configuration already exists at: {}", config_path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    // Create parent directories if needed
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let default_config = ScriptletConfig::default();
    let toml_str = toml::to_string_pretty(&default_config)
        .map_err(|e| ScriptletError::Config(e.to_string()))?;

    std::fs::write(&config_path, toml_str)?;

    println!("Created configuration at: {}", config_path.display());
    println!("\nQuick start:");
    println!("  # Evaluate an expression");
    println!("  scriptlet eval -e \"print('hello'); 1 + 2\"");
    println!();
    println!("  # Run a script file with a 100 ms budget");
    println!("  scriptlet eval --timeout-ms 100 script.js");
    println!();
    println!("  # Allow fetch() to a single host");
    println!("  scriptlet eval --allow-host api.example.com script.js");

    Ok(())
}

pub fn config(args: ConfigArgs, config: ScriptletConfig) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let toml_str =
                toml::to_string_pretty(&config).map_err(|e| ScriptletError::Config(e.to_string()))?;
            println!("{}", toml_str);
        }
        ConfigAction::Path => {
            println!("{}", get_config_path().display());
        }
    }
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn read_source(args: &EvalArgs) -> Result<String> {
    if let Some(code) = &args.code {
        return Ok(code.clone());
    }

    match args.file.as_deref() {
        Some(path) if path != Path::new("-") => {
            debug!(path = %path.display(), "Reading script file");
            Ok(std::fs::read_to_string(path)?)
        }
        _ => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}

fn eval_limits(args: &EvalArgs, config: &ScriptletConfig) -> SessionLimits {
    let defaults = SessionLimits::from(&config.sandbox);
    SessionLimits {
        memory_limit_bytes: args.memory_limit.unwrap_or(defaults.memory_limit_bytes),
        timeout_ms: args.timeout_ms.unwrap_or(defaults.timeout_ms),
        console_max_size_bytes: args
            .console_max_size
            .unwrap_or(defaults.console_max_size_bytes),
    }
}

fn http_config(args: &EvalArgs, mut http: HttpConfig) -> HttpConfig {
    if args.allow_net || !args.allow_hosts.is_empty() {
        http.enabled = true;
    }
    if !args.allow_hosts.is_empty() {
        http.allowed_hosts = args.allow_hosts.clone();
    }
    http
}

fn exit_code(outcome: &EvalOutcome) -> i32 {
    match outcome {
        EvalOutcome::Completed(_) => EXIT_OK,
        EvalOutcome::TimedOut { .. } => EXIT_TIMEOUT,
        EvalOutcome::Excepted(exception) if exception.is_syntax() => EXIT_SYNTAX_ERROR,
        EvalOutcome::Excepted(_) => EXIT_SCRIPT_ERROR,
    }
}

fn output_text(outcome: EvalOutcome) {
    if let EvalOutcome::Completed(result) = &outcome {
        print!("{}", result.console_output);
        if result.console_truncated {
            eprintln!("[console output truncated]");
        }
        if !result.value.is_null() {
            println!("{}", result.value);
        }
        return;
    }

    if let Err(err) = outcome.into_result() {
        eprintln!("{}", err);
        if let ScriptletError::Script {
            stack: Some(stack), ..
        } = &err
        {
            eprintln!("{}", stack.trim_end());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{ExceptionKind, ScriptException};

    fn eval_args(argv: &[&str]) -> EvalArgs {
        use clap::Parser;

        let mut full = vec!["scriptlet", "eval"];
        full.extend_from_slice(argv);
        match crate::cli::args::Cli::try_parse_from(full).unwrap().command {
            crate::cli::args::Commands::Eval(args) => args,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_flags_override_config_limits() {
        let args = eval_args(&["-e", "1", "--timeout-ms", "250"]);
        let limits = eval_limits(&args, &ScriptletConfig::default());
        assert_eq!(limits.timeout_ms, 250);
        assert_eq!(limits.memory_limit_bytes, 50_000);
        assert_eq!(limits.console_max_size_bytes, 10_000);
    }

    #[test]
    fn test_allow_host_enables_network() {
        let args = eval_args(&["-e", "1", "--allow-host", "api.example.com"]);
        let http = http_config(&args, HttpConfig::default());
        assert!(http.enabled);
        assert_eq!(http.allowed_hosts, vec!["api.example.com"]);

        let args = eval_args(&["-e", "1"]);
        assert!(!http_config(&args, HttpConfig::default()).enabled);
    }

    #[test]
    fn test_exit_codes() {
        let syntax = EvalOutcome::Excepted(ScriptException {
            kind: ExceptionKind::Syntax,
            message: "SyntaxError: unexpected end of input".to_string(),
            stack: None,
        });
        assert_eq!(exit_code(&syntax), EXIT_SYNTAX_ERROR);
        assert_eq!(
            exit_code(&EvalOutcome::TimedOut { timeout_ms: 5 }),
            EXIT_TIMEOUT
        );
    }

    #[test]
    fn test_read_source_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.js");
        std::fs::write(&path, "print('hi')").unwrap();

        let args = eval_args(&[path.to_str().unwrap()]);
        assert_eq!(read_source(&args).unwrap(), "print('hi')");
    }
}
