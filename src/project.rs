//! Filesystem layout of a Next.js build and the immutable facts gathered from it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use regex::Regex;

use crate::config::BuilderConfig;
use crate::error::BuildError;
use crate::inline::AssetInliner;
use crate::manifest::{ResolvedPages, discover_manifest_files, resolve_pages};

/// Locations inside a Next.js application that has been built with `output: "standalone"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextAppLayout {
  /// Root of the Next.js application.
  pub app_dir: PathBuf,
  /// The application's `.next` build directory.
  pub dot_next_dir: PathBuf,
  /// Directory of the standalone server copy of the application.
  pub standalone_app_dir: PathBuf,
}

impl NextAppLayout {
  /// Derive the layout for `app_dir` using the directory names from `config`.
  pub fn new(app_dir: impl Into<PathBuf>, config: &BuilderConfig) -> Self {
    let app_dir = app_dir.into();
    let dot_next_dir = app_dir.join(&config.dot_next_dir);
    let standalone_app_dir = dot_next_dir.join(&config.standalone_dir);
    Self {
      app_dir,
      dot_next_dir,
      standalone_app_dir,
    }
  }

  /// `.next` directory inside the standalone copy.
  pub fn standalone_dot_next_dir(&self) -> PathBuf {
    self.standalone_app_dir.join(".next")
  }

  /// Compiled server output inside the standalone copy.
  pub fn standalone_server_dir(&self) -> PathBuf {
    self.standalone_dot_next_dir().join("server")
  }

  /// Generated standalone server entry script.
  pub fn server_js(&self) -> PathBuf {
    self.standalone_app_dir.join("server.js")
  }

  /// Client assets served under `/_next/static`.
  pub fn static_dir(&self) -> PathBuf {
    self.dot_next_dir.join("static")
  }
}

/// Read-only build facts shared by every rewrite rule during one pipeline run.
#[derive(Debug, Clone)]
pub struct BuildContext {
  /// Directory generated module paths are resolved against.
  pub standalone_app_dir: PathBuf,
  /// Contents of `.next/BUILD_ID`.
  pub build_id: String,
  /// `*-manifest.json` files relative to the standalone application directory.
  pub manifest_files: Vec<String>,
  /// Page artifacts listed by the route indices.
  pub pages: ResolvedPages,
  /// Module providing Node-compatible `parse` and `format` URL helpers.
  pub url_polyfill_module: String,
}

impl BuildContext {
  /// Gather every build-time fact for `layout`. Fails if the build id is missing.
  pub fn discover(layout: &NextAppLayout, config: &BuilderConfig) -> Result<Self> {
    let standalone_app_dir = std::path::absolute(&layout.standalone_app_dir).with_context(|| {
      format!("failed to resolve {}", layout.standalone_app_dir.display())
    })?;
    let inliner = AssetInliner::new(&standalone_app_dir);

    let build_id = inliner.inline(".next/BUILD_ID")?.literal_value;
    let manifest_files = discover_manifest_files(&standalone_app_dir)?;
    let pages = resolve_pages(&layout.standalone_server_dir(), &standalone_app_dir)?;

    info!(
      "build {build_id}: {} manifests, {} html pages, {} page modules",
      manifest_files.len(),
      pages.markup_files.len(),
      pages.module_files.len()
    );

    Ok(Self {
      standalone_app_dir,
      build_id,
      manifest_files,
      pages,
      url_polyfill_module: config.url_polyfill_module.clone(),
    })
  }

  /// Inliner rooted at the standalone application directory.
  pub fn inliner(&self) -> AssetInliner {
    AssetInliner::new(&self.standalone_app_dir)
  }

  /// Absolute, forward-slash path of a file relative to the standalone application.
  pub fn absolute_module_path(&self, relative: &str) -> String {
    self
      .standalone_app_dir
      .join(relative)
      .to_string_lossy()
      .replace('\\', "/")
  }
}

/// Extract the serialised `nextConfig` object the standalone `server.js` embeds.
///
/// Falls back to `{}` when the assignment is absent; a missing `server.js` is fatal.
pub fn read_standalone_config(server_js: &Path) -> Result<String> {
  let source = fs::read_to_string(server_js)
    .map_err(|err| BuildError::asset_missing(server_js, err))
    .with_context(|| "the standalone build must contain server.js")?;
  Ok(extract_next_config(&source))
}

fn extract_next_config(source: &str) -> String {
  let pattern = Regex::new(r"const nextConfig = (\{.+?\})\n").expect("invalid nextConfig regex");
  match pattern.captures(source).and_then(|caps| caps.get(1)) {
    Some(config) => config.as_str().to_string(),
    None => {
      debug!("no nextConfig assignment in server.js, using an empty config");
      "{}".to_string()
    }
  }
}
