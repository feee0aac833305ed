use super::TargetArgs;
use clap::Args;
use colored::Colorize;
use stackrun_cloud::TeardownSequencer;
use stackrun_config::CloudConnections;

#[derive(Args, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Only stacks whose name starts with this prefix are removed
    #[arg(long, default_value = "StressTest")]
    pub prefix: String,
}

pub async fn handle(args: CleanArgs) -> anyhow::Result<()> {
    let config = args.target.config(CloudConnections::default())?;
    println!(
        "{}",
        format!(
            "Removing stacks starting with '{}' from {}",
            args.prefix, config.target
        )
        .yellow()
    );
    let client = super::connect(&config).await?;

    // leftovers are already settled
    let sequencer = TeardownSequencer::new(
        client,
        config.settings.poll_interval(),
        std::time::Duration::ZERO,
    );
    let summary = sequencer
        .clean(&args.prefix, config.settings.job_timeout())
        .await?;

    for name in &summary.removed {
        println!("{}", format!("  ✓ {}", name).green());
    }
    for name in &summary.failed {
        println!("{}", format!("  ✗ {}", name).red());
    }
    println!(
        "{}",
        format!(
            "{} removed, {} failed",
            summary.removed.len(),
            summary.failed.len()
        )
        .bold()
    );

    if !summary.failed.is_empty() {
        anyhow::bail!("{} stacks could not be removed", summary.failed.len());
    }
    Ok(())
}
