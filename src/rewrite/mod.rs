//! Ordered source rewrites applied to the bundled worker so it no longer touches the disk.
//!
//! Every rule is total: a bundle without the rule's pattern passes through unchanged. The
//! only rule failures are build-time reads of files the generated code must embed.

mod build_id;
mod dispatch;
mod https_agent;
mod manifest_loader;
mod page_loader;
mod require_alias;
pub mod site;
mod url_module;

use log::{debug, warn};

pub use build_id::InlineBuildId;
pub use dispatch::PathDispatch;
pub use https_agent::DowngradeHttpsAgent;
pub use manifest_loader::InlineManifestLoader;
pub use page_loader::InlinePageLoader;
pub use require_alias::RequireAlias;
pub use url_module::PatchUrlModule;

use crate::error::BuildError;
use crate::project::BuildContext;

/// What a rule did to the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
  /// The pattern matched and `sites` generated clauses or replacements were written.
  Applied {
    /// Number of replacements or generated lookup arms.
    sites: usize,
  },
  /// The pattern was absent, or its rewrite was already present.
  Skipped,
}

/// Bundle text returned by a rule together with its outcome.
#[derive(Debug)]
pub struct Rewritten {
  /// The complete bundle after the rule ran.
  pub text: String,
  /// Whether anything changed.
  pub outcome: RuleOutcome,
}

impl Rewritten {
  pub(crate) fn applied(text: String, sites: usize) -> Self {
    Self {
      text,
      outcome: RuleOutcome::Applied { sites },
    }
  }

  pub(crate) fn skipped(text: String) -> Self {
    Self {
      text,
      outcome: RuleOutcome::Skipped,
    }
  }
}

/// A single targeted transformation over the whole bundle.
pub trait RewriteRule {
  /// Stable name used in logs and errors.
  fn name(&self) -> &'static str;

  /// Whether a Next.js server bundle is expected to contain this rule's pattern.
  fn expected(&self) -> bool {
    false
  }

  /// Consume the bundle and return its rewritten form.
  fn apply(&self, text: String, context: &BuildContext) -> Result<Rewritten, BuildError>;
}

/// Rules applied one after another, each on the previous rule's output.
pub struct RuleSet {
  rules: Vec<Box<dyn RewriteRule>>,
  strict: bool,
}

impl std::fmt::Debug for RuleSet {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RuleSet")
      .field("rules", &self.names())
      .field("strict", &self.strict)
      .finish()
  }
}

impl Default for RuleSet {
  fn default() -> Self {
    Self::worker_rules()
  }
}

impl RuleSet {
  /// The rewrites a Next.js standalone server needs, in their historical order.
  pub fn worker_rules() -> Self {
    Self::from_rules(vec![
      Box::new(RequireAlias),
      Box::new(InlineBuildId),
      Box::new(InlineManifestLoader),
      Box::new(DowngradeHttpsAgent),
      Box::new(PatchUrlModule),
      Box::new(InlinePageLoader),
    ])
  }

  /// Build a set from arbitrary rules.
  pub fn from_rules(rules: Vec<Box<dyn RewriteRule>>) -> Self {
    Self {
      rules,
      strict: false,
    }
  }

  /// Fail when an expected rule finds nothing to rewrite.
  pub fn strict(mut self, strict: bool) -> Self {
    self.strict = strict;
    self
  }

  /// Rule names in execution order.
  pub fn names(&self) -> Vec<&'static str> {
    self.rules.iter().map(|rule| rule.name()).collect()
  }

  /// Run every rule in order over `text`.
  pub fn apply(&self, mut text: String, context: &BuildContext) -> Result<String, BuildError> {
    for rule in &self.rules {
      let rewritten = rule.apply(text, context)?;
      text = rewritten.text;
      match rewritten.outcome {
        RuleOutcome::Applied { sites } => debug!("rule {}: {sites} site(s)", rule.name()),
        RuleOutcome::Skipped if rule.expected() => {
          if self.strict {
            return Err(BuildError::PatternNotFound { rule: rule.name() });
          }
          warn!("rule {} found nothing to rewrite", rule.name());
        }
        RuleOutcome::Skipped => debug!("rule {}: pattern absent", rule.name()),
      }
    }
    Ok(text)
  }
}

#[cfg(test)]
pub(crate) fn test_context() -> BuildContext {
  test_context_in(std::path::Path::new("/srv/app/.next/standalone"))
}

#[cfg(test)]
pub(crate) fn test_context_in(dir: &std::path::Path) -> BuildContext {
  BuildContext {
    standalone_app_dir: dir.to_path_buf(),
    build_id: "abc123".into(),
    manifest_files: Vec::new(),
    pages: crate::manifest::ResolvedPages::default(),
    url_polyfill_module: "node-url".into(),
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;
  use crate::manifest::ResolvedPages;
  use pretty_assertions::assert_eq;
  use tempfile::tempdir;

  const BUNDLE: &str = r#"var __require = createRequire(import.meta.url);
var _https = require("https");
var import_url = __require2("url");
var _url = require("url");
function loadManifest(path, shouldCache = true) {
  return JSON.parse(readFileSync(path, "utf8"));
}
function requirePage(page, distDir) {
  const pagePath = getPagePath(page, distDir);
  return require(pagePath);
}
class NextNodeServer {
  getBuildId() {
    return readFileSync(join(this.distDir, "BUILD_ID"), "utf8").trim();
  }
}
const docs = "see https://nextjs.org";
"#;

  fn fixture_context(dir: &std::path::Path) -> BuildContext {
    fs::create_dir_all(dir.join(".next/server/pages")).unwrap();
    fs::write(dir.join(".next/routes-manifest.json"), "{\"version\":3}").unwrap();
    fs::write(dir.join(".next/server/pages/404.html"), "<p>missing</p>").unwrap();
    let mut context = test_context_in(dir);
    context.manifest_files = vec![".next/routes-manifest.json".into()];
    context.pages = ResolvedPages {
      markup_files: vec![".next/server/pages/404.html".into()],
      module_files: vec![".next/server/pages/index.js".into()],
    };
    context
  }

  #[test]
  fn full_rule_set_rewrites_synthetic_bundle() {
    let dir = tempdir().unwrap();
    let context = fixture_context(dir.path());
    let out = RuleSet::worker_rules().apply(BUNDLE.into(), &context).unwrap();

    assert!(out.contains("getBuildId() {\n    return \"abc123\";"));
    assert_eq!(out.matches("pagePath.endsWith(\".next/server/pages/404.html\")").count(), 1);
    assert_eq!(out.matches("pagePath.endsWith(\".next/server/pages/index.js\")").count(), 1);
    assert!(out.contains("path.endsWith(\".next/routes-manifest.json\")"));
    assert!(!out.contains("require(\"https\")"));
    assert!(out.contains("see https://nextjs.org"));
    assert!(!out.contains("__require2("));

    let url_line = out.find("var _url = require(\"url\");").unwrap();
    let rebind = out[url_line..].find("_url.parse = nodeUrl.parse").unwrap();
    assert!(rebind > 0);
    assert!(out.contains("_url.format = nodeUrl.format.bind(nodeUrl);"));
  }

  #[test]
  fn running_the_set_twice_changes_nothing() {
    let dir = tempdir().unwrap();
    let context = fixture_context(dir.path());
    let rules = RuleSet::worker_rules();
    let once = rules.apply(BUNDLE.into(), &context).unwrap();
    let twice = rules.apply(once.clone(), &context).unwrap();
    assert_eq!(twice, once);
  }

  #[test]
  fn rules_commute_pairwise() {
    let dir = tempdir().unwrap();
    let context = fixture_context(dir.path());
    let rules = RuleSet::worker_rules().rules;

    for (i, first) in rules.iter().enumerate() {
      for second in &rules[i + 1..] {
        if (first.name(), second.name()) == ("require-alias", "url-module") {
          continue;
        }
        let forward = second
          .apply(first.apply(BUNDLE.into(), &context).unwrap().text, &context)
          .unwrap()
          .text;
        let backward = first
          .apply(second.apply(BUNDLE.into(), &context).unwrap().text, &context)
          .unwrap()
          .text;
        assert_eq!(forward, backward, "{} vs {}", first.name(), second.name());
      }
    }
  }

  #[test]
  fn require_alias_must_run_before_url_module() {
    let context = test_context();
    let text = "var import_url = __require2(\"url\");".to_string();

    let ordered = PatchUrlModule
      .apply(RequireAlias.apply(text.clone(), &context).unwrap().text, &context)
      .unwrap()
      .text;
    assert!(ordered.contains("import_url.parse = nodeUrl.parse"));

    let reversed = RequireAlias
      .apply(PatchUrlModule.apply(text, &context).unwrap().text, &context)
      .unwrap()
      .text;
    assert!(!reversed.contains("nodeUrl"));
  }

  #[test]
  fn strict_mode_rejects_missing_expected_sites() {
    let dir = tempdir().unwrap();
    let context = test_context_in(dir.path());
    let err = RuleSet::worker_rules()
      .strict(true)
      .apply("console.log(1);".into(), &context)
      .unwrap_err();
    assert!(matches!(err, BuildError::PatternNotFound { rule: "build-id" }));
  }

  #[test]
  fn lenient_mode_passes_unmatched_bundles_through() {
    let dir = tempdir().unwrap();
    let context = test_context_in(dir.path());
    let out = RuleSet::default().apply("console.log(1);".into(), &context).unwrap();
    assert_eq!(out, "console.log(1);");
  }
}
