//! Builder configuration describing where inputs live and where the worker is written.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "worker-builder.config.json";

/// Discoverable configuration for turning a standalone build into a worker bundle.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
  /// Next.js build directory, relative to the application root.
  pub dot_next_dir: String,
  /// Standalone output directory, relative to the build directory.
  pub standalone_dir: String,
  /// Worker entry module handed to the bundler. Relative to the application root.
  pub worker_entrypoint: Option<String>,
  /// Directory receiving the deployable output, relative to the application root.
  pub output_dir: String,
  /// Worker script location inside the output directory.
  pub worker_file: String,
  /// Destination of the copied static assets inside the output directory.
  pub static_output_dir: String,
  /// Node executable used to drive esbuild.
  pub node_binary: String,
  /// Package exposing Node-compatible `url.parse` and `url.format`.
  pub url_polyfill_module: String,
  /// Fail when an expected rewrite site is missing from the bundle.
  pub strict: bool,
}

impl Default for BuilderConfig {
  fn default() -> Self {
    Self {
      dot_next_dir: ".next".into(),
      standalone_dir: "standalone".into(),
      worker_entrypoint: None,
      output_dir: ".worker-next".into(),
      worker_file: "assets/_worker.js".into(),
      static_output_dir: "assets/_next".into(),
      node_binary: "node".into(),
      url_polyfill_module: "node-url".into(),
      strict: false,
    }
  }
}

impl BuilderConfig {
  /// Load `worker-builder.config.json` from `app_dir`, or defaults when absent or invalid.
  pub fn discover(app_dir: &Path) -> Self {
    let candidate = app_dir.join(DEFAULT_CONFIG_FILE);
    if !candidate.exists() {
      return Self::default();
    }
    Self::from_path(&candidate).unwrap_or_else(|| {
      warn!("ignoring unparsable {}", candidate.display());
      Self::default()
    })
  }

  /// Read configuration from a specific JSON file.
  pub fn from_path(path: &Path) -> Option<Self> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
  }

  /// Absolute output directory for the application at `app_dir`.
  pub fn output_dir_path(&self, app_dir: &Path) -> PathBuf {
    app_dir.join(&self.output_dir)
  }

  /// Absolute worker script path for the application at `app_dir`.
  pub fn worker_output_path(&self, app_dir: &Path) -> PathBuf {
    self.output_dir_path(app_dir).join(&self.worker_file)
  }

  /// Absolute static asset destination for the application at `app_dir`.
  pub fn static_output_path(&self, app_dir: &Path) -> PathBuf {
    self.output_dir_path(app_dir).join(&self.static_output_dir)
  }
}
