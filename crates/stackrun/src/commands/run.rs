use super::{ConnectionArgs, TargetArgs};
use anyhow::Context;
use clap::Args;
use colored::Colorize;
use stackrun_cloud::retry::{COMMAND_ATTEMPTS, COMMAND_WAIT};
use stackrun_cloud::variables::{load_overrides, load_variable_files};
use stackrun_cloud::{
    CamVariables, DeploymentInput, DeploymentResult, Lifecycle, LifecycleOptions,
    LifecycleRequest, Overrides, Template, TemplateFormat, TemplateSource, Variables,
    run_retryable_command,
};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Terraform template, JSON or HCL
    #[arg(short, long)]
    pub template: PathBuf,

    /// Variable declaration file; repeatable, later files win.
    /// Defaults to the `variable` block of a JSON template
    #[arg(long = "variables")]
    pub variables: Vec<PathBuf>,

    /// CAM variable file sent as the stack parameters
    #[arg(long)]
    pub cam_variables: Option<PathBuf>,

    /// Values that win over every declaration
    #[arg(long)]
    pub overrides: Option<PathBuf>,

    /// Stack name (default: template file name plus a timestamp)
    #[arg(short, long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub connections: ConnectionArgs,

    /// Tear down a deployment whose job failed
    #[arg(long)]
    pub delete_failed_deployments: bool,

    /// Keep a successful deployment
    #[arg(long)]
    pub no_autodestroy: bool,

    /// Import the template resource from this git repository first
    #[arg(long)]
    pub template_repo: Option<String>,

    /// Template directory inside the repository
    #[arg(long, default_value = "/")]
    pub template_dir: String,

    #[arg(long, default_value = "master")]
    pub git_ref: String,

    #[arg(long, env = "GIT_TOKEN", hide_env_values = true, default_value = "")]
    pub git_token: String,

    /// Existing template resource to link the stack to
    #[arg(long, conflicts_with = "template_repo")]
    pub template_id: Option<String>,

    /// Shell command run before logging in, retried on connection failures
    #[arg(long)]
    pub pre_hook: Option<String>,

    /// Write the deployment result as JSON
    #[arg(long)]
    pub result_file: Option<PathBuf>,
}

pub async fn handle(args: RunArgs) -> anyhow::Result<()> {
    if let Some(hook) = &args.pre_hook {
        run_pre_hook(hook).await?;
    }

    let template = Template::load(&args.template)?;
    let variables = load_variables(&args.variables, &template)?;
    let cam_variables = args
        .cam_variables
        .as_deref()
        .map(CamVariables::load)
        .transpose()?;
    let overrides = match &args.overrides {
        Some(path) => load_overrides(path)?,
        None => Overrides::new(),
    };
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| default_stack_name(&args.template));

    let config = args.target.config(args.connections.clone().into())?;
    println!(
        "{}",
        format!("Running {} against {}", name, config.target).cyan()
    );
    let client = super::connect(&config).await?;

    let mut options = LifecycleOptions::from_settings(&config.settings);
    options.delete_failed_deployment = args.delete_failed_deployments;
    options.autodestroy = !args.no_autodestroy;

    let template_source = args.template_repo.as_ref().map(|repo_url| TemplateSource {
        kind: "github".to_string(),
        repo_url: repo_url.clone(),
        dir: args.template_dir.clone(),
        git_ref: args.git_ref.clone(),
        token: args.git_token.clone(),
        template_type: None,
    });
    let request = LifecycleRequest {
        input: DeploymentInput {
            name: name.clone(),
            template,
            variables,
            cam_variables,
            overrides,
        },
        template_source,
        template_id: args.template_id.clone(),
    };

    let lifecycle = Lifecycle::new(client, config.connections.clone(), options);
    let result = lifecycle.run(&request).await?;

    if let Some(path) = &args.result_file {
        write_result(path, &result)?;
    }
    report(&result)
}

async fn run_pre_hook(hook: &str) -> anyhow::Result<()> {
    tracing::info!("Running pre-hook: {}", hook);
    let output = run_retryable_command(hook, &[], COMMAND_ATTEMPTS, COMMAND_WAIT).await?;
    if !output.success() {
        anyhow::bail!(
            "Pre-hook failed with exit code {:?}\n{}{}",
            output.code,
            output.stdout,
            output.stderr
        );
    }
    Ok(())
}

/// Explicit files win; otherwise a JSON template's own `variable` block
fn load_variables(files: &[PathBuf], template: &Template) -> anyhow::Result<Variables> {
    if !files.is_empty() {
        return Ok(load_variable_files(files)?);
    }
    if template.format != TemplateFormat::Json {
        return Ok(Variables::new());
    }
    let root: serde_json::Value = serde_json::from_str(&template.content)?;
    match root.get("variable") {
        Some(declarations) => serde_json::from_value(declarations.clone())
            .context("Invalid variable block in template"),
        None => Ok(Variables::new()),
    }
}

fn default_stack_name(template: &Path) -> String {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stack".to_string());
    format!("{}-{}", stem, chrono::Local::now().format("%Y%m%d%H%M%S"))
}

fn write_result(path: &Path, result: &DeploymentResult) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(result)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write result to {}", path.display()))
}

fn report(result: &DeploymentResult) -> anyhow::Result<()> {
    println!();
    if let Some(duration) = result.deploy_duration {
        println!("  deploy:  {}s", duration.as_secs());
    }
    if let Some(duration) = result.destroy_duration {
        println!("  destroy: {}s", duration.as_secs());
    }

    if result.is_success() {
        println!("{}", format!("✓ {} passed", result.name).green().bold());
        return Ok(());
    }

    for error in result.errors() {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }
    anyhow::bail!("Life-cycle of {} failed", result.name)
}
