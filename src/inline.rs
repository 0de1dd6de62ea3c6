//! Build-time file reads that become literals inside the worker bundle.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::BuildError;

/// File contents captured at build time for embedding in generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinedAsset {
  /// Path the contents were read from.
  pub source_path: PathBuf,
  /// Exact UTF-8 contents of the file.
  pub literal_value: String,
}

impl InlinedAsset {
  /// Render the contents as a JavaScript string literal.
  pub fn as_string_literal(&self) -> String {
    js_string(&self.literal_value)
  }

  /// Render the contents verbatim, for documents that are already valid expressions (JSON).
  pub fn as_expression(&self) -> &str {
    &self.literal_value
  }
}

/// Reads build-time assets relative to the standalone application directory.
#[derive(Debug, Clone)]
pub struct AssetInliner {
  root: PathBuf,
}

impl AssetInliner {
  /// Create an inliner resolving relative paths against `root`.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Directory relative paths are resolved against.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Read the asset at `path`. Absolute paths are used as given.
  pub fn inline(&self, path: impl AsRef<Path>) -> Result<InlinedAsset, BuildError> {
    let source_path = self.root.join(path.as_ref());
    let literal_value = fs::read_to_string(&source_path)
      .map_err(|err| BuildError::asset_missing(&source_path, err))?;
    Ok(InlinedAsset {
      source_path,
      literal_value,
    })
  }
}

/// Quote `value` as a double-quoted JavaScript string literal.
pub fn js_string(value: &str) -> String {
  // serde_json escapes everything a JS string literal needs except the line separators.
  serde_json::to_string(value)
    .unwrap_or_default()
    .replace('\u{2028}', "\\u2028")
    .replace('\u{2029}', "\\u2029")
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn returns_exact_file_contents() {
    let dir = tempdir().unwrap();
    let content = "<html>\n  <body>\"quoted\" \t tab</body>\r\n</html>";
    fs::write(dir.path().join("page.html"), content).unwrap();

    let asset = AssetInliner::new(dir.path()).inline("page.html").unwrap();
    assert_eq!(asset.literal_value, content);
    assert_eq!(asset.source_path, dir.path().join("page.html"));
  }

  #[test]
  fn missing_file_is_asset_missing() {
    let dir = tempdir().unwrap();
    let err = AssetInliner::new(dir.path())
      .inline(".next/BUILD_ID")
      .unwrap_err();
    match err {
      BuildError::AssetMissing { path, .. } => assert!(path.ends_with(".next/BUILD_ID")),
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn string_literal_escapes_quotes_and_newlines() {
    let asset = InlinedAsset {
      source_path: PathBuf::from("x"),
      literal_value: "a \"b\"\nc\u{2028}".into(),
    };
    assert_eq!(asset.as_string_literal(), r#""a \"b\"\nc\u2028""#);
  }
}
