//! ReadmeForge CLI: generate a readme.md for a local repository, or serve
//! the same pipeline over HTTP.
//!
//! Logs go to stderr; the finished README goes to stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use readmeforge_core::config::ForgeConfig;
use readmeforge_hub::api::{ApiState, GitCloner};
use readmeforge_hub::pipeline::{ReadmePipeline, ReadmeSource};
use readmeforge_hub::providers::FallbackController;

// ─── CLI Definition ────────────────────────────────────────

/// Generate a README for a repository with a rotating pool of LLM keys.
#[derive(Parser)]
#[command(name = "readmeforge", version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Repository root to document
    path: Option<PathBuf>,

    /// Config file (defaults to the user config dir)
    #[arg(short, long, global = true, env = "READMEFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Attempts per LLM request before giving up
    #[arg(long, global = true)]
    max_retries: Option<usize>,

    /// Print the README without writing it
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value_t = 5001)]
        port: u16,

        /// Directory that receives cloned repositories
        #[arg(long, default_value = "temp")]
        workdir: PathBuf,
    },
}

fn status(symbol: &str, message: impl std::fmt::Display) {
    eprintln!("{} {}", symbol.cyan().bold(), message);
}

/// An explicit `--config` must exist; the default location may be absent.
fn load_config(cli: &Cli) -> anyhow::Result<ForgeConfig> {
    let mut config = match &cli.config {
        Some(path) => ForgeConfig::load_required(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            let path = ForgeConfig::default_path();
            ForgeConfig::load(&path)
                .with_context(|| format!("loading config from {}", path.display()))?
        }
    };
    config.apply_env_overrides();
    if let Some(max_retries) = cli.max_retries {
        config.retry.max_retries = max_retries;
    }
    Ok(config)
}

// ─── Entry Point ───────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,readmeforge_core=debug,readmeforge_hub=debug")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let controller = FallbackController::from_config(&config)
        .context("no usable LLM backend; set GROQ_API_KEY or GEMINI_API_KEY")?;
    let pipeline = ReadmePipeline::new(config.pipeline.clone(), config.request_options());

    match &cli.command {
        Some(Commands::Serve {
            host,
            port,
            workdir,
        }) => run_serve(controller, pipeline, host, *port, workdir).await,
        None => {
            let path = cli
                .path
                .as_deref()
                .context("missing repository path; pass <PATH> or use `serve`")?;
            run_generate(&controller, &pipeline, &config, path, cli.dry_run).await
        }
    }
}

// ─── Generate ──────────────────────────────────────────────

async fn run_generate(
    controller: &FallbackController,
    pipeline: &ReadmePipeline,
    config: &ForgeConfig,
    path: &Path,
    dry_run: bool,
) -> anyhow::Result<()> {
    status("▸", format!("Documenting {}", path.display()));

    let output = if dry_run {
        pipeline.run(controller, path).await
    } else {
        pipeline.run_and_write(controller, path).await
    };

    let metrics = controller.metrics().to_json();
    info!(metrics = %serde_json::to_string(&metrics)?, "Run finished");

    let output = output.context("README generation failed")?;

    match output.source {
        ReadmeSource::Full => status("✓", "README generated"),
        ReadmeSource::Reduced => status("✓", "README generated from a reduced prompt".yellow()),
        ReadmeSource::Template => status("!", "API limits reached, using template README".yellow()),
    }
    if dry_run {
        status("▸", "Dry run, nothing written".dimmed());
    } else {
        let written = path.join(&config.pipeline.output_file);
        status("✓", format!("Saved to {}", written.display()).green());
    }

    println!("{}", output.readme);
    Ok(())
}

// ─── Serve (REST API) ──────────────────────────────────────

async fn run_serve(
    controller: FallbackController,
    pipeline: ReadmePipeline,
    host: &str,
    port: u16,
    workdir: &Path,
) -> anyhow::Result<()> {
    status("▸", format!("Serving on http://{}:{}", host, port).green().bold());
    status("▸", format!("Clones go to {}", workdir.display()).dimmed());
    eprintln!("    {} — Health check", "GET  /health".cyan());
    eprintln!("    {} — Clone and document a repo", "POST /api/generate-readme".cyan());
    eprintln!("    {} — README exists?", "GET  /api/check-readme?folder=".cyan());
    eprintln!("    {} — Fetch README", "GET  /api/get-readme/{folder}".cyan());

    let state = ApiState {
        completer: Arc::new(controller),
        fetcher: Arc::new(GitCloner),
        pipeline,
        workdir: workdir.to_path_buf(),
    };

    readmeforge_hub::api::start_server(state, host, port)
        .await
        .context("API server stopped")?;
    Ok(())
}
