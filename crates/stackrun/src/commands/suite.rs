use anyhow::Context;
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use stackrun_cloud::{CaseStatus, DeploymentResult, Statistics, SuiteDir, TestCase};
use stackrun_config::Settings;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Args, Debug)]
pub struct SuiteArgs {
    /// Directory of test case files
    pub dir: PathBuf,

    /// Number of cases run concurrently
    #[arg(long)]
    pub pool_size: Option<usize>,

    /// Seconds between two progress checks
    #[arg(long)]
    pub worker_pause: Option<u64>,

    /// Write a statistics report here once every case has finished
    #[arg(long)]
    pub report: Option<PathBuf>,
}

pub async fn handle(args: SuiteArgs) -> anyhow::Result<()> {
    let settings = Settings::load()?;
    let pool_size = args.pool_size.unwrap_or(settings.pool_size).max(1);
    let pause = args
        .worker_pause
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.worker_pause());

    let suite = SuiteDir::new(&args.dir);
    let cases = suite.discover().await?;
    let pending: Vec<TestCase> = cases
        .iter()
        .filter(|case| case.status.is_runnable())
        .cloned()
        .collect();
    println!(
        "{}",
        format!(
            "{} of {} test cases to run, {} at a time",
            pending.len(),
            cases.len(),
            pool_size
        )
        .cyan()
    );

    let program = std::env::current_exe().context("Cannot locate the stackrun binary")?;
    let start_time = Utc::now();
    let pool = Arc::new(Semaphore::new(pool_size));
    let mut workers = JoinSet::new();
    for case in pending {
        let pool = pool.clone();
        let program = program.clone();
        workers.spawn(async move {
            let name = case.display_name();
            let outcome = run_case(&program, case, pool).await;
            (name, outcome)
        });
    }

    let mut monitor = tokio::time::interval(pause);
    // the first tick completes immediately
    monitor.tick().await;
    loop {
        tokio::select! {
            joined = workers.join_next() => match joined {
                Some(Ok((name, Ok(status)))) => {
                    tracing::info!("Test case {} finished with status {}", name, status);
                }
                Some(Ok((name, Err(e)))) => {
                    tracing::error!("Test case {} could not be run: {:#}", name, e);
                }
                Some(Err(e)) => tracing::error!("Worker panicked: {}", e),
                None => break,
            },
            _ = monitor.tick() => match SuiteDir::summarize(&cases).await {
                Ok(summary) => {
                    let running = summary
                        .statuses
                        .iter()
                        .filter(|(_, status)| *status == CaseStatus::InProgress)
                        .count();
                    tracing::info!("{} running, {}", running, summary);
                }
                // the workers keep going; the next tick reads again
                Err(e) => tracing::warn!("Cannot read suite progress: {}", e),
            },
        }
    }

    let summary = SuiteDir::summarize(&cases).await?;
    println!();
    for (name, status) in &summary.statuses {
        let line = format!("  {} {}", name, status);
        match status {
            CaseStatus::Success => println!("{}", line.green()),
            CaseStatus::Failure => println!("{}", line.red()),
            _ => println!("{}", line.dimmed()),
        }
    }
    println!("{}", summary.to_string().bold());

    if let Some(path) = &args.report {
        let mut stats = Statistics::from_results(&collect_results(&cases));
        stats.start_time = Some(start_time);
        stats.end_time = Some(Utc::now());
        let stats = stats
            .with_context("Test cases", args.dir.display().to_string())
            .with_context("Number of workers", pool_size.to_string());
        std::fs::write(path, stats.report())
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    if !summary.all_succeeded() {
        anyhow::bail!("{}", summary);
    }
    Ok(())
}

/// Run one case as a child `stackrun run` process
///
/// The case file is marked in progress before the child starts and success
/// or failure after it exits.
async fn run_case(
    program: &Path,
    mut case: TestCase,
    pool: Arc<Semaphore>,
) -> anyhow::Result<CaseStatus> {
    let _permit = pool.acquire_owned().await?;
    SuiteDir::set_status(&mut case, CaseStatus::InProgress).await?;

    let status = match spawn_run(program, &case).await {
        Ok(true) => CaseStatus::Success,
        Ok(false) => CaseStatus::Failure,
        Err(e) => {
            SuiteDir::set_status(&mut case, CaseStatus::Failure).await?;
            return Err(e);
        }
    };
    SuiteDir::set_status(&mut case, status).await?;
    Ok(status)
}

async fn spawn_run(program: &Path, case: &TestCase) -> anyhow::Result<bool> {
    let args = case.run_args()?;
    if let Some(parent) = case.log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let log = std::fs::File::create(&case.log_file)
        .with_context(|| format!("Cannot create log file {}", case.log_file.display()))?;

    tracing::info!("Starting test case {}", case.display_name());
    tracing::debug!("{} {}", program.display(), args.join(" "));
    let status = tokio::process::Command::new(program)
        .args(&args)
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log.try_clone()?))
        .stderr(Stdio::from(log))
        .status()
        .await?;
    Ok(status.success())
}

/// Results the children wrote; cases without one are skipped
fn collect_results(cases: &[TestCase]) -> Vec<DeploymentResult> {
    cases
        .iter()
        .filter_map(|case| {
            let path = case.result_file();
            let content = std::fs::read_to_string(&path).ok()?;
            match serde_json::from_str(&content) {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable result {}: {}", path.display(), e);
                    None
                }
            }
        })
        .collect()
}
