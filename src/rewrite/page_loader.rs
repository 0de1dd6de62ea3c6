use regex::Regex;

use crate::error::BuildError;
use crate::inline::js_string;
use crate::project::BuildContext;
use crate::rewrite::dispatch::PathDispatch;
use crate::rewrite::site::insert_once;
use crate::rewrite::{RewriteRule, Rewritten};

/// Resolve page paths to inlined HTML or bundled modules right after `getPagePath`.
#[derive(Debug, Default)]
pub struct InlinePageLoader;

fn page_path_pattern() -> Regex {
  Regex::new(r"const pagePath = getPagePath\([^;]+?\);").expect("invalid pagePath regex")
}

impl RewriteRule for InlinePageLoader {
  fn name(&self) -> &'static str {
    "page-loader"
  }

  fn expected(&self) -> bool {
    true
  }

  fn apply(&self, text: String, context: &BuildContext) -> Result<Rewritten, BuildError> {
    let Some(statement_end) = page_path_pattern().find(&text).map(|found| found.end()) else {
      return Ok(Rewritten::skipped(text));
    };

    let inliner = context.inliner();
    let mut dispatch = PathDispatch::new("pagePath", "pagePath");
    for page in &context.pages.markup_files {
      let asset = inliner.inline(page)?;
      dispatch.arm(page, asset.as_string_literal());
    }
    for module in &context.pages.module_files {
      let absolute = context.absolute_module_path(module);
      dispatch.arm(module, format!("require({})", js_string(&absolute)));
    }

    let arms = context.pages.markup_files.len() + context.pages.module_files.len();
    let (text, inserted) = insert_once(text, statement_end, &dispatch.render());
    Ok(if inserted {
      Rewritten::applied(text, arms)
    } else {
      Rewritten::skipped(text)
    })
  }
}
