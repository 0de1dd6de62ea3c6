use regex::Regex;

use crate::error::BuildError;
use crate::project::BuildContext;
use crate::rewrite::{RewriteRule, Rewritten};

/// Point esbuild's renamed `__require` helpers back at the runtime `require`.
#[derive(Debug, Default)]
pub struct RequireAlias;

fn alias_pattern() -> Regex {
  Regex::new(r"\b__require\d*([(.])").expect("invalid __require regex")
}

impl RewriteRule for RequireAlias {
  fn name(&self) -> &'static str {
    "require-alias"
  }

  fn apply(&self, text: String, _context: &BuildContext) -> Result<Rewritten, BuildError> {
    let pattern = alias_pattern();
    let sites = pattern.find_iter(&text).count();
    if sites == 0 {
      return Ok(Rewritten::skipped(text));
    }
    let text = pattern.replace_all(&text, "require$1").into_owned();
    Ok(Rewritten::applied(text, sites))
  }
}
