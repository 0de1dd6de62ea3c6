use crate::error::BuildError;
use crate::project::BuildContext;
use crate::rewrite::{RewriteRule, Rewritten};

const HTTPS_AGENT_REQUIRE: &str = r#"var _https = require("https");"#;
const HTTP_AGENT_REQUIRE: &str = r#"var _https = require("http");"#;

/// Build the server's keep-alive agent from `http`; the sandbox has no `https` module.
#[derive(Debug, Default)]
pub struct DowngradeHttpsAgent;

impl RewriteRule for DowngradeHttpsAgent {
  fn name(&self) -> &'static str {
    "https-agent"
  }

  fn apply(&self, text: String, _context: &BuildContext) -> Result<Rewritten, BuildError> {
    let sites = text.matches(HTTPS_AGENT_REQUIRE).count();
    if sites == 0 {
      return Ok(Rewritten::skipped(text));
    }
    Ok(Rewritten::applied(
      text.replace(HTTPS_AGENT_REQUIRE, HTTP_AGENT_REQUIRE),
      sites,
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rewrite::{RuleOutcome, test_context};

  #[test]
  fn swaps_only_the_agent_require() {
    let text = "const u = \"https://example.com\";\nvar _https = require(\"https\");\nconst h = require(\"https\");".to_string();
    let out = DowngradeHttpsAgent.apply(text, &test_context()).unwrap();
    assert_eq!(
      out.text,
      "const u = \"https://example.com\";\nvar _https = require(\"http\");\nconst h = require(\"https\");"
    );
    assert_eq!(out.outcome, RuleOutcome::Applied { sites: 1 });
  }
}
