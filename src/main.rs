//! tickflow - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tickflow::demo::run_demo;
use tickflow::util::config::load_or_default;
use tickflow::util::logger::{self, LogLevel};
use tickflow::{NAME, VERSION};

/// Cooperative task scheduling for simulation loops
#[derive(Parser, Debug)]
#[command(name = "tickflow")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scripted demo simulation
    Demo {
        /// Number of ticks to simulate
        #[arg(long)]
        ticks: Option<u64>,

        /// Seconds per tick
        #[arg(long)]
        dt: Option<f64>,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_with_level(LogLevel::from_verbosity(args.verbose));

    let mut config = load_or_default(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("Failed to load config: {}", path.display()),
        None => "Failed to load default config".to_string(),
    })?;

    match args.command {
        Commands::Demo { ticks, dt } => {
            if let Some(ticks) = ticks {
                config.demo.ticks = ticks;
            }
            if let Some(dt) = dt {
                config.demo.dt = dt;
            }
            let report = run_demo(&config).context("Demo simulation failed")?;
            println!(
                "{} ticks, {} events, {} tasks left",
                report.ticks,
                report.events.len(),
                report.remaining
            );
        }
        Commands::Config => {
            print!("{}", config.to_toml_string().context("Failed to render config")?);
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}
