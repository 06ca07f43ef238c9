use clap::Parser;

use scriptlet::cli::args::{Cli, Commands};
use scriptlet::cli::commands;
use scriptlet::config::loader::load_config;
use scriptlet::error::Result;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.global_opts.verbose);

    // Load configuration (file + CLI overrides)
    let config = load_config(cli.global_opts.config.as_deref())?;
    let format = cli.global_opts.format.clone();

    // Dispatch to subcommand handler
    match cli.command {
        Commands::Eval(args) => {
            let code = commands::eval(args, config, format)?;
            if code != commands::EXIT_OK {
                std::process::exit(code);
            }
        }
        Commands::Init(args) => {
            commands::init(args)?;
        }
        Commands::Config(args) => {
            commands::config(args, config)?;
        }
    }

    Ok(())
}

fn init_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Script output owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
