use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::error;
use serde::Serialize;

use next_worker_bundler::manifest::ResolvedPages;
use next_worker_bundler::{BuildContext, BuilderConfig, NextAppLayout, build_worker};

/// Turn a Next.js standalone build into a single sandbox-ready worker script.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Bundle and rewrite the standalone server into a worker.
  Build {
    /// Root of the Next.js application.
    app_dir: PathBuf,
    /// Worker entry module, relative to the application root.
    #[arg(long)]
    entry: Option<String>,
    /// Output directory, relative to the application root.
    #[arg(long)]
    output: Option<String>,
    /// Configuration file to use instead of `worker-builder.config.json`.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Fail when an expected rewrite site is missing.
    #[arg(long)]
    strict: bool,
  },
  /// Print the build facts that would be inlined into the worker.
  Inspect {
    /// Root of the Next.js application.
    app_dir: PathBuf,
    /// Configuration file to use instead of `worker-builder.config.json`.
    #[arg(long)]
    config: Option<PathBuf>,
  },
}

#[derive(Serialize)]
struct InspectReport<'a> {
  build_id: &'a str,
  standalone_app_dir: String,
  manifest_files: &'a [String],
  pages: &'a ResolvedPages,
}

fn load_config(app_dir: &Path, path: Option<&PathBuf>) -> Result<BuilderConfig> {
  match path {
    Some(path) => BuilderConfig::from_path(path)
      .with_context(|| format!("failed to load config from {}", path.display())),
    None => Ok(BuilderConfig::discover(app_dir)),
  }
}

fn run(cli: Cli) -> Result<()> {
  match cli.command {
    Command::Build {
      app_dir,
      entry,
      output,
      config,
      strict,
    } => {
      let mut config = load_config(&app_dir, config.as_ref())?;
      if entry.is_some() {
        config.worker_entrypoint = entry;
      }
      if let Some(output) = output {
        config.output_dir = output;
      }
      config.strict |= strict;

      let artifacts = build_worker(&app_dir, &config)?;
      println!(
        "{} ({} bytes), {} static files in {}",
        artifacts.worker_path.display(),
        artifacts.worker_bytes,
        artifacts.static_files,
        artifacts.static_dir.display()
      );
    }
    Command::Inspect { app_dir, config } => {
      let config = load_config(&app_dir, config.as_ref())?;
      let layout = NextAppLayout::new(&app_dir, &config);
      let context = BuildContext::discover(&layout, &config)?;
      let report = InspectReport {
        build_id: &context.build_id,
        standalone_app_dir: context.standalone_app_dir.display().to_string(),
        manifest_files: &context.manifest_files,
        pages: &context.pages,
      };
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
  }
  Ok(())
}

fn main() -> ExitCode {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  match run(Cli::parse()) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      error!("{err:#}");
      ExitCode::FAILURE
    }
  }
}
