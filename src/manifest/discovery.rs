//! Locate the JSON manifests the server loads through `loadManifest`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

const MANIFEST_SUFFIX: &str = "-manifest.json";
const SKIPPED_DIRS: [&str; 2] = ["node_modules", "cache"];

/// Every `*-manifest.json` below `<standalone_app_dir>/.next`, relative to `standalone_app_dir`.
///
/// Paths use forward slashes and are sorted so the generated dispatch is stable between builds.
pub fn discover_manifest_files(standalone_app_dir: &Path) -> Result<Vec<String>> {
  let dot_next = standalone_app_dir.join(".next");
  let mut found = Vec::new();
  if dot_next.is_dir() {
    collect_manifests(&dot_next, Path::new(".next"), &mut found)?;
  }
  found.sort();
  Ok(found)
}

fn collect_manifests(dir: &Path, relative: &Path, found: &mut Vec<String>) -> Result<()> {
  let entries =
    fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

  for entry in entries {
    let entry = entry?;
    let file_name = entry.file_name();
    let name = file_name.to_string_lossy();
    if name.starts_with('.') {
      continue;
    }

    let child_relative = relative.join(&file_name);
    let file_type = entry.file_type()?;
    if file_type.is_dir() {
      if SKIPPED_DIRS.iter().any(|skipped| name == *skipped) {
        continue;
      }
      collect_manifests(&entry.path(), &child_relative, found)?;
    } else if file_type.is_file() && name.ends_with(MANIFEST_SUFFIX) {
      found.push(child_relative.to_string_lossy().replace('\\', "/"));
    }
  }

  Ok(())
}
