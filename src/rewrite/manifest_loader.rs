use log::debug;

use crate::error::BuildError;
use crate::project::BuildContext;
use crate::rewrite::dispatch::PathDispatch;
use crate::rewrite::site::{insert_once, is_identifier, locate_function};
use crate::rewrite::{RewriteRule, Rewritten};

/// Serve every discovered `*-manifest.json` from `loadManifest` as an inlined object.
#[derive(Debug, Default)]
pub struct InlineManifestLoader;

impl RewriteRule for InlineManifestLoader {
  fn name(&self) -> &'static str {
    "manifest-loader"
  }

  fn expected(&self) -> bool {
    true
  }

  fn apply(&self, text: String, context: &BuildContext) -> Result<Rewritten, BuildError> {
    let Some(site) = locate_function(&text, "loadManifest") else {
      return Ok(Rewritten::skipped(text));
    };
    let Some(path_param) = site.first_param().filter(|param| is_identifier(param)) else {
      debug!("loadManifest has no usable path parameter");
      return Ok(Rewritten::skipped(text));
    };

    let inliner = context.inliner();
    let mut dispatch = PathDispatch::new(path_param, "loadManifest");
    for manifest in &context.manifest_files {
      let asset = inliner.inline(manifest)?;
      dispatch.arm(manifest, asset.as_expression().trim_end());
    }

    let (text, inserted) = insert_once(text, site.body_start, &dispatch.render());
    Ok(if inserted {
      Rewritten::applied(text, context.manifest_files.len())
    } else {
      Rewritten::skipped(text)
    })
  }
}
