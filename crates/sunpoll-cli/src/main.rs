use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "sunpoll",
    version,
    about = "Record SolarEdge production readings in InfluxDB"
)]
struct Cli {
    /// TOML config file. Environment variables override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll one minute past every quarter hour until a fatal error (default)
    Run,
    /// Run a single poll cycle now and print what happened
    Once {
        /// Print the cycle report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the timestamps already recorded
    Tracker {
        #[command(flatten)]
        args: commands::tracker::TrackerArgs,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::run(config_path),
        Commands::Once { json } => commands::run::once(config_path, json),
        Commands::Tracker { args } => commands::tracker::run(config_path, args),
    };

    if let Err(e) = result {
        log::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
