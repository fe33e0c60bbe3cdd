#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_precision_loss)]

mod commands;
mod logging;

use clap::Parser;
use kiln_core::Mode;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(author, version, about = "A deterministic module bundler", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Path to the config file (defaults to kiln.config.json in the project root)
    #[arg(long, short = 'c', global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Build mode: development or production (overrides NODE_ENV and the config file)
    #[arg(long, short = 'm', global = true, value_parser = parse_mode)]
    mode: Option<Mode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Build the project once
    Build {
        /// Output directory (overrides output.path)
        #[arg(long, short = 'o', value_name = "DIR")]
        out: Option<PathBuf>,

        /// Remove previous output before writing
        #[arg(long)]
        clean: bool,
    },

    /// Watch the project, rebuild on change and serve the output with hot reload
    Dev {
        /// Port to listen on (overrides devServer.port)
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Host to bind to (overrides devServer.host)
        #[arg(long)]
        host: Option<String>,
    },

    /// Print the resolved configuration as JSON
    Config,
}

fn parse_mode(value: &str) -> Result<Mode, String> {
    Mode::from_name(value).ok_or_else(|| format!("unknown mode '{value}' (expected development or production)"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    let _span = tracing::info_span!("cmd", cwd = %cwd.display()).entered();

    match cli.command {
        Commands::Build { out, clean } => commands::build::run(
            commands::build::BuildAction {
                cwd,
                config: cli.config,
                mode: cli.mode,
                out,
                clean,
            },
            cli.json,
        ),
        Commands::Dev { port, host } => commands::dev::run(commands::dev::DevAction {
            cwd,
            config: cli.config,
            mode: cli.mode,
            port,
            host,
        }),
        Commands::Config => commands::config::run(&cwd, cli.config.as_deref(), cli.mode),
    }
}
