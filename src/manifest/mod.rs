//! Build-time discovery of route manifests and the page artifacts they reference.

mod discovery;
mod resolver;

pub use discovery::discover_manifest_files;
pub use resolver::{
  APP_PATHS_MANIFEST, ManifestEntry, ManifestKind, PAGES_MANIFEST, ResolvedPages,
  SERVER_OUTPUT_PREFIX, resolve_pages,
};
