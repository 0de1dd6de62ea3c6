//! Error types raised while preparing the worker bundle.

use std::path::PathBuf;

/// Fatal build-time failures. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
  /// A file the bundle depends on at build time could not be read.
  #[error("required build asset missing: {}", .path.display())]
  AssetMissing {
    /// Path that failed to read.
    path: PathBuf,
    /// Underlying I/O failure.
    #[source]
    source: std::io::Error,
  },

  /// A route manifest index exists but is not a JSON object of string paths.
  #[error("invalid manifest index {}: {reason}", .path.display())]
  InvalidManifest {
    /// Index file that failed to parse.
    path: PathBuf,
    /// Parser or shape error description.
    reason: String,
  },

  /// An expected rewrite site was absent while running in strict mode.
  #[error("rewrite rule `{rule}` did not find its pattern in the bundle")]
  PatternNotFound {
    /// Name of the rule that skipped.
    rule: &'static str,
  },

  /// The external bundler exited unsuccessfully.
  #[error("bundler failed: {message}")]
  BundlerFailed {
    /// Exit status or spawn failure reported by the bundler.
    message: String,
  },
}

impl BuildError {
  pub(crate) fn asset_missing(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::AssetMissing {
      path: path.into(),
      source,
    }
  }
}
