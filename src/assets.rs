//! Mirror the client static directory into the deployable output.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use same_file::is_same_file;

/// Make `destination` an exact mirror of `source`, returning how many files it holds.
///
/// Files are hard linked where possible and copied otherwise; anything in `destination` that
/// no longer exists in `source` is removed.
pub fn mirror_static_dir(source: &Path, destination: &Path) -> Result<usize> {
  if !source.is_dir() {
    debug!("no static directory at {}", source.display());
    return Ok(0);
  }

  let mut files = BTreeSet::new();
  collect_files(source, Path::new(""), &mut files)
    .with_context(|| format!("failed to scan {}", source.display()))?;

  fs::create_dir_all(destination)
    .with_context(|| format!("failed to create {}", destination.display()))?;
  remove_stale(destination, Path::new(""), &files)
    .with_context(|| format!("failed to prune {}", destination.display()))?;

  for relative in &files {
    let target = destination.join(relative);
    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent)?;
    }
    install_file(&source.join(relative), &target)
      .with_context(|| format!("failed to install {}", target.display()))?;
  }

  info!(
    "mirrored {} static files into {}",
    files.len(),
    destination.display()
  );
  Ok(files.len())
}

fn collect_files(dir: &Path, relative: &Path, files: &mut BTreeSet<PathBuf>) -> std::io::Result<()> {
  for entry in fs::read_dir(dir)? {
    let entry = entry?;
    let child_relative = relative.join(entry.file_name());
    let file_type = entry.file_type()?;
    if file_type.is_dir() {
      collect_files(&entry.path(), &child_relative, files)?;
    } else if file_type.is_file() {
      files.insert(child_relative);
    }
  }
  Ok(())
}

/// Delete files under `dir` that the mirror no longer lists, then any directory left empty.
fn remove_stale(dir: &Path, relative: &Path, keep: &BTreeSet<PathBuf>) -> std::io::Result<()> {
  for entry in fs::read_dir(dir)? {
    let entry = entry?;
    let path = entry.path();
    let child_relative = relative.join(entry.file_name());
    if entry.file_type()?.is_dir() {
      remove_stale(&path, &child_relative, keep)?;
      if fs::read_dir(&path)?.next().is_none() {
        fs::remove_dir(&path)?;
      }
    } else if !keep.contains(&child_relative) {
      fs::remove_file(&path)?;
    }
  }
  Ok(())
}

/// Hard link `source` to `destination`, copying when linking is not possible.
fn install_file(source: &Path, destination: &Path) -> std::io::Result<()> {
  match fs::symlink_metadata(destination) {
    Ok(_) if is_same_file(source, destination)? => return Ok(()),
    Ok(_) => fs::remove_file(destination)?,
    Err(err) if err.kind() == ErrorKind::NotFound => {}
    Err(err) => return Err(err),
  }
  if fs::hard_link(source, destination).is_err() {
    fs::copy(source, destination)?;
  }
  Ok(())
}
