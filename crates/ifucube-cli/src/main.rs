mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ifucube", about = "IFU datacube reconstruction tool")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resample frame bundles into a datacube
    Combine(commands::combine::CombineArgs),
    /// Print or save the default coadd config
    Config(commands::config::ConfigArgs),
    /// Show datacube metadata
    Info(commands::info::InfoArgs),
    /// Collapse a datacube into a whitelight image
    Whitelight(commands::whitelight::WhitelightArgs),
    /// Extract the boxcar spectrum of a standard star
    Extract(commands::extract::ExtractArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Combine(args) => commands::combine::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Whitelight(args) => commands::whitelight::run(args),
        Commands::Extract(args) => commands::extract::run(args),
    }
}
