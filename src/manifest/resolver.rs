//! Resolve the generated page artifacts listed by the route manifest indices.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::BuildError;

/// Route index for the `pages/` router.
pub const PAGES_MANIFEST: &str = "pages-manifest.json";
/// Route index for the `app/` router.
pub const APP_PATHS_MANIFEST: &str = "app-paths-manifest.json";
/// Folder every resolved path is re-rooted under.
pub const SERVER_OUTPUT_PREFIX: &str = ".next/server/";

const MARKUP_EXTENSION: &str = ".html";
const MODULE_EXTENSION: &str = ".js";

/// Kind of artifact a route resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
  /// Pre-rendered HTML.
  Markup,
  /// Compiled JavaScript module.
  Module,
}

/// Single route artifact relative to the standalone application directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
  /// Normalised path such as `.next/server/pages/index.js`.
  pub relative_path: String,
  /// Artifact kind derived from the file suffix.
  pub kind: ManifestKind,
}

impl ManifestEntry {
  fn classify(relative_path: String) -> Option<Self> {
    let kind = if relative_path.ends_with(MARKUP_EXTENSION) {
      ManifestKind::Markup
    } else if relative_path.ends_with(MODULE_EXTENSION) {
      ManifestKind::Module
    } else {
      return None;
    };
    Some(Self {
      relative_path,
      kind,
    })
  }
}

/// Page artifacts partitioned by kind, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedPages {
  /// Pre-rendered HTML pages.
  pub markup_files: Vec<String>,
  /// Compiled page and route modules.
  pub module_files: Vec<String>,
}

impl ResolvedPages {
  /// Build the partition from classified entries, keeping the first of any duplicate.
  pub fn from_entries(entries: impl IntoIterator<Item = ManifestEntry>) -> Self {
    let mut seen = BTreeSet::new();
    let mut pages = Self::default();
    for entry in entries {
      if !seen.insert(entry.relative_path.clone()) {
        continue;
      }
      match entry.kind {
        ManifestKind::Markup => pages.markup_files.push(entry.relative_path),
        ManifestKind::Module => pages.module_files.push(entry.relative_path),
      }
    }
    pages
  }

  /// Whether neither index produced any artifact.
  pub fn is_empty(&self) -> bool {
    self.markup_files.is_empty() && self.module_files.is_empty()
  }
}

/// Read both route indices from `server_dir` and partition their artifacts.
///
/// `standalone_app_dir` is stripped from entries that were recorded as absolute paths.
pub fn resolve_pages(
  server_dir: &Path,
  standalone_app_dir: &Path,
) -> Result<ResolvedPages, BuildError> {
  let app_root = standalone_app_dir.to_string_lossy().replace('\\', "/");
  let mut entries = Vec::new();

  for index in [PAGES_MANIFEST, APP_PATHS_MANIFEST] {
    for value in read_route_index(&server_dir.join(index))? {
      let relative_path = normalize_artifact_path(&value, &app_root);
      match ManifestEntry::classify(relative_path) {
        Some(entry) => entries.push(entry),
        None => debug!("ignoring {value} from {index}: not a page artifact"),
      }
    }
  }

  Ok(ResolvedPages::from_entries(entries))
}

/// Values of a route index in file order; an absent index yields nothing.
fn read_route_index(path: &Path) -> Result<Vec<String>, BuildError> {
  let content = match fs::read_to_string(path) {
    Ok(content) => content,
    Err(err) if err.kind() == ErrorKind::NotFound => {
      debug!("{} not present, skipping", path.display());
      return Ok(Vec::new());
    }
    Err(err) => return Err(BuildError::asset_missing(path, err)),
  };

  let invalid = |reason: String| BuildError::InvalidManifest {
    path: path.to_path_buf(),
    reason,
  };
  let map: Map<String, Value> =
    serde_json::from_str(&content).map_err(|err| invalid(err.to_string()))?;

  map
    .into_iter()
    .map(|(route, value)| match value {
      Value::String(file) => Ok(file),
      other => Err(invalid(format!("route {route} maps to non-string {other}"))),
    })
    .collect()
}

/// Re-root a manifest value under [`SERVER_OUTPUT_PREFIX`].
fn normalize_artifact_path(value: &str, app_root: &str) -> String {
  let mut path = value.replace('\\', "/");

  let app_prefix = format!("{}/", app_root.trim_end_matches('/'));
  if !app_root.is_empty() && path.starts_with(&app_prefix) {
    path = path[app_prefix.len()..].to_string();
  }

  let trimmed = path.trim_start_matches("./").trim_start_matches('/');
  if trimmed.starts_with(SERVER_OUTPUT_PREFIX) {
    trimmed.to_string()
  } else {
    format!("{SERVER_OUTPUT_PREFIX}{trimmed}")
  }
}
