use regex::Regex;

use crate::error::BuildError;
use crate::inline::js_string;
use crate::project::BuildContext;
use crate::rewrite::{RewriteRule, Rewritten};

/// Route `url.parse`/`url.format` through a Node-compatible polyfill after every `require("url")`.
#[derive(Debug, Default)]
pub struct PatchUrlModule;

fn url_require_pattern() -> Regex {
  Regex::new(r#" ([A-Za-z0-9_$]+) = require\("url"\);"#).expect("invalid url require regex")
}

fn rebinding(binding: &str, polyfill: &str) -> String {
  format!(
    "\n    {{\n      const nodeUrl = require({polyfill});\n      {binding}.parse = nodeUrl.parse.bind(nodeUrl);\n      {binding}.format = nodeUrl.format.bind(nodeUrl);\n      {binding}.pathToFileURL = (path) => new URL(\"file://\" + path);\n    }}",
    polyfill = js_string(polyfill),
  )
}

impl RewriteRule for PatchUrlModule {
  fn name(&self) -> &'static str {
    "url-module"
  }

  fn apply(&self, text: String, context: &BuildContext) -> Result<Rewritten, BuildError> {
    let pattern = url_require_pattern();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut sites = 0;

    for caps in pattern.captures_iter(&text) {
      let (Some(whole), Some(binding)) = (caps.get(0), caps.get(1)) else {
        continue;
      };
      let snippet = rebinding(binding.as_str(), &context.url_polyfill_module);
      out.push_str(&text[last..whole.end()]);
      last = whole.end();
      if text[whole.end()..].starts_with(&snippet) {
        continue;
      }
      out.push_str(&snippet);
      sites += 1;
    }

    if sites == 0 {
      return Ok(Rewritten::skipped(text));
    }
    out.push_str(&text[last..]);
    Ok(Rewritten::applied(out, sites))
  }
}
