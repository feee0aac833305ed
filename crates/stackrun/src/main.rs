mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stackrun")]
#[command(about = "Deploy, verify and tear down Terraform templates", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one deploy/destroy life-cycle of a template
    Run(commands::run::RunArgs),
    /// Run every pending test case of a suite directory
    Suite(commands::suite::SuiteArgs),
    /// Destroy and delete leftover stacks by name prefix
    Clean(commands::clean::CleanArgs),
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries user-facing output; logs go to stderr
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match cli.command {
        Commands::Version => {
            println!("stackrun {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Run(args) => commands::run::handle(args).await?,
        Commands::Suite(args) => commands::suite::handle(args).await?,
        Commands::Clean(args) => commands::clean::handle(args).await?,
    }

    Ok(())
}
