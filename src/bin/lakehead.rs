use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lakehead::pipeline::resolve_project_dir;
use lakehead::{
    interrupt, preflight, runs, BuildPipeline, PipelineOptions, RunRecorder, Settings,
    SourceFetcher, SystemRunner,
};

/// Build a project's packages with mock and publish them into the repository.
#[derive(Parser, Debug)]
#[command(name = "lakehead", version, about)]
struct Cli {
    /// Project to build; its directory holds `<project>.json` and `<project>.spec`.
    #[arg(short, long)]
    project: String,

    /// Keep staging directories after the run.
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    interrupt::install_handlers().context("installing signal handlers")?;

    let settings = Settings::discover().context("loading settings")?;
    preflight::check_settings_tools(&settings)?;

    let project_dir = resolve_project_dir(&settings, &cli.project)?;
    let fetcher = SourceFetcher::new(project_dir);
    let recorder = RunRecorder::start(&settings.runs_dir, &cli.project)
        .with_context(|| format!("recording run for '{}'", cli.project))?;
    tracing::info!(project = %cli.project, run = recorder.run_id(), "starting run");

    let mut pipeline = BuildPipeline::new(
        &settings,
        &SystemRunner,
        &fetcher,
        PipelineOptions {
            preserve: cli.debug,
        },
    );
    let outcome = pipeline.run(&cli.project);

    let manifest = match &outcome {
        Ok(report) => recorder.succeed(pipeline.descriptor(), pipeline.history(), report),
        Err(err) => recorder.fail(
            pipeline.descriptor(),
            pipeline.history(),
            pipeline.failed_at(),
            err,
        ),
    };
    match manifest {
        Ok(manifest) => {
            let project_runs = settings.runs_dir.join(&cli.project);
            match runs::prune_old_runs(&project_runs, settings.keep_runs) {
                Ok(0) => {}
                Ok(n) => tracing::debug!(removed = n, "pruned old runs"),
                Err(err) => tracing::warn!(error = %err, "failed to prune old runs"),
            }
            tracing::debug!(run = %manifest.run_id, status = ?manifest.status, "run recorded");
        }
        Err(err) => tracing::warn!(error = %err, "failed to record run manifest"),
    }

    let report = outcome.with_context(|| format!("building '{}'", cli.project))?;
    for path in &report.published {
        println!("published {}", path.display());
    }
    Ok(())
}
