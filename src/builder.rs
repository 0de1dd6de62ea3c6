//! Worker build orchestrator: bundle, rewrite, persist and copy static assets.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::info;

use crate::assets::mirror_static_dir;
use crate::bundler::{BundleRequest, Bundler, EsbuildScript, ShimModules};
use crate::config::BuilderConfig;
use crate::project::{BuildContext, NextAppLayout, read_standalone_config};
use crate::rewrite::RuleSet;

const SCRATCH_DIR: &str = ".build";
const RAW_BUNDLE_FILE: &str = "worker.raw.js";
const ESBUILD_SCRIPT_FILE: &str = "bundle.mjs";

/// Files produced by a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerArtifacts {
  /// The rewritten worker script.
  pub worker_path: PathBuf,
  /// Size of the worker script in bytes.
  pub worker_bytes: usize,
  /// Directory holding the mirrored client assets.
  pub static_dir: PathBuf,
  /// Number of static files mirrored.
  pub static_files: usize,
}

/// Runs the bundler and the rewrite rules for one Next.js application.
#[derive(Debug)]
pub struct WorkerBuilder<B> {
  layout: NextAppLayout,
  config: BuilderConfig,
  bundler: B,
  rules: RuleSet,
}

impl<B: Bundler> WorkerBuilder<B> {
  /// Create a builder with the standard worker rule set.
  pub fn new(layout: NextAppLayout, config: BuilderConfig, bundler: B) -> Self {
    let rules = RuleSet::worker_rules().strict(config.strict);
    Self {
      layout,
      config,
      bundler,
      rules,
    }
  }

  /// Replace the rule set.
  pub fn with_rules(mut self, rules: RuleSet) -> Self {
    self.rules = rules;
    self
  }

  /// The bundler this builder drives.
  pub fn bundler(&self) -> &B {
    &self.bundler
  }

  /// Bundle `entrypoint`, rewrite the result and write it to `output_path`.
  ///
  /// The output file is only written once every rule has succeeded.
  pub fn run(
    &self,
    entrypoint: &Path,
    output_path: &Path,
    context: &BuildContext,
  ) -> Result<WorkerArtifacts> {
    let scratch_dir = self.scratch_dir();
    let next_config = read_standalone_config(&self.layout.server_js())?;
    let shims = ShimModules::write(&scratch_dir.join("shims"))?;

    let raw_bundle = scratch_dir.join(RAW_BUNDLE_FILE);
    let request = BundleRequest::for_worker(entrypoint, &raw_bundle, &shims, &next_config);
    self.bundler.bundle(&request)?;

    let text = fs::read_to_string(&raw_bundle)
      .with_context(|| format!("failed to read bundler output {}", raw_bundle.display()))?;
    info!("applying rewrites: {}", self.rules.names().join(", "));
    let text = self.rules.apply(text, context)?;

    if let Some(parent) = output_path.parent() {
      fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(output_path, &text)
      .with_context(|| format!("failed to write {}", output_path.display()))?;

    let static_dir = self.config.static_output_path(&self.layout.app_dir);
    let static_files = mirror_static_dir(&self.layout.static_dir(), &static_dir)?;

    info!("worker saved in {}", output_path.display());
    Ok(WorkerArtifacts {
      worker_path: output_path.to_path_buf(),
      worker_bytes: text.len(),
      static_dir,
      static_files,
    })
  }

  fn scratch_dir(&self) -> PathBuf {
    self
      .config
      .output_dir_path(&self.layout.app_dir)
      .join(SCRATCH_DIR)
  }
}

/// Build the worker for the application at `app_dir` with esbuild, following `config`.
///
/// Relative paths are resolved against the current directory before anything is handed to Node.
pub fn build_worker(app_dir: &Path, config: &BuilderConfig) -> Result<WorkerArtifacts> {
  let app_dir = std::path::absolute(app_dir)
    .with_context(|| format!("failed to resolve {}", app_dir.display()))?;
  let layout = NextAppLayout::new(&app_dir, config);
  let entry = config
    .worker_entrypoint
    .as_deref()
    .map(|entry| app_dir.join(entry))
    .ok_or_else(|| anyhow!("no worker entrypoint configured"))?;

  let context = BuildContext::discover(&layout, config)?;
  let scratch = config.output_dir_path(&app_dir).join(SCRATCH_DIR);
  let bundler = EsbuildScript::new(
    config.node_binary.clone(),
    &app_dir,
    scratch.join(ESBUILD_SCRIPT_FILE),
  );

  let output_path = config.worker_output_path(&app_dir);
  WorkerBuilder::new(layout, config.clone(), bundler).run(&entry, &output_path, &context)
}
