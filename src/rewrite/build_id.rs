use crate::error::BuildError;
use crate::inline::js_string;
use crate::project::BuildContext;
use crate::rewrite::site::{insert_once, locate_method};
use crate::rewrite::{RewriteRule, Rewritten};

/// Return the build id from `getBuildId()` before it reaches `fs.readFileSync`.
#[derive(Debug, Default)]
pub struct InlineBuildId;

impl RewriteRule for InlineBuildId {
  fn name(&self) -> &'static str {
    "build-id"
  }

  fn expected(&self) -> bool {
    true
  }

  fn apply(&self, text: String, context: &BuildContext) -> Result<Rewritten, BuildError> {
    let Some(site) = locate_method(&text, "getBuildId").filter(|site| site.params.is_empty())
    else {
      return Ok(Rewritten::skipped(text));
    };

    let snippet = format!("\n    return {};", js_string(&context.build_id));
    let (text, inserted) = insert_once(text, site.body_start, &snippet);
    Ok(if inserted {
      Rewritten::applied(text, 1)
    } else {
      Rewritten::skipped(text)
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rewrite::{RuleOutcome, test_context};

  const SERVER: &str = "class NextNodeServer {\n  getBuildId() {\n    const p = join(this.distDir, BUILD_ID_FILE);\n    return fs.readFileSync(p, \"utf8\").trim();\n  }\n}";

  #[test]
  fn returns_build_id_first() {
    let out = InlineBuildId.apply(SERVER.into(), &test_context()).unwrap();
    let body = out.text.split("getBuildId() {").nth(1).unwrap();
    assert_eq!(body.trim_start().lines().next(), Some("return \"abc123\";"));
    assert_eq!(out.outcome, RuleOutcome::Applied { sites: 1 });
  }

  #[test]
  fn applying_twice_inserts_once() {
    let context = test_context();
    let once = InlineBuildId.apply(SERVER.into(), &context).unwrap().text;
    let twice = InlineBuildId.apply(once.clone(), &context).unwrap();
    assert_eq!(twice.text, once);
    assert_eq!(twice.outcome, RuleOutcome::Skipped);
  }

  #[test]
  fn absent_method_is_a_no_op() {
    let out = InlineBuildId
      .apply("const id = server.getBuildId();".into(), &test_context())
      .unwrap();
    assert_eq!(out.text, "const id = server.getBuildId();");
    assert_eq!(out.outcome, RuleOutcome::Skipped);
  }
}
