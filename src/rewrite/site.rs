//! Structural views over the bundled source used as rule preconditions.

use regex::Regex;

/// Location of a function or method body in the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSite {
  /// Parameter names in declaration order, without default values.
  pub params: Vec<String>,
  /// Byte offset just past the opening brace of the body.
  pub body_start: usize,
}

impl FunctionSite {
  /// First declared parameter, if any.
  pub fn first_param(&self) -> Option<&str> {
    self.params.first().map(String::as_str)
  }
}

/// First `function <name>(...) {` declaration whose parameter list fits on one line.
///
/// Default values may contain calls, e.g. `cache = new Map()`.
pub fn locate_function(text: &str, name: &str) -> Option<FunctionSite> {
  let pattern = Regex::new(&format!(
    r"\bfunction\s+{}\s*\((.*?)\)\s*\{{",
    regex::escape(name)
  ))
  .expect("invalid function regex");
  site_from(&pattern, text)
}

/// First `<name>(...) {` method definition (class or object literal shorthand).
pub fn locate_method(text: &str, name: &str) -> Option<FunctionSite> {
  let pattern = Regex::new(&format!(
    r"(?:^|[^.\w$]){}\s*\(([^()]*)\)\s*\{{",
    regex::escape(name)
  ))
  .expect("invalid method regex");
  site_from(&pattern, text)
}

fn site_from(pattern: &Regex, text: &str) -> Option<FunctionSite> {
  let caps = pattern.captures(text)?;
  let whole = caps.get(0)?;
  let params = caps
    .get(1)
    .map(|list| parse_params(list.as_str()))
    .unwrap_or_default();
  Some(FunctionSite {
    params,
    body_start: whole.end(),
  })
}

fn parse_params(list: &str) -> Vec<String> {
  let mut params = Vec::new();
  let mut depth = 0usize;
  let mut start = 0;
  for (index, c) in list.char_indices() {
    match c {
      '(' | '[' | '{' => depth += 1,
      ')' | ']' | '}' => depth = depth.saturating_sub(1),
      ',' if depth == 0 => {
        params.push(&list[start..index]);
        start = index + 1;
      }
      _ => {}
    }
  }
  params.push(&list[start..]);

  params
    .into_iter()
    .map(|param| param.split('=').next().unwrap_or_default().trim())
    .filter(|param| !param.is_empty())
    .map(str::to_string)
    .collect()
}

/// Whether `name` is a plain JavaScript identifier safe to splice into generated code.
pub fn is_identifier(name: &str) -> bool {
  let mut chars = name.chars();
  match chars.next() {
    Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
    _ => return false,
  }
  chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Insert `snippet` at byte offset `at` unless it is already there.
///
/// Returns the new text and whether an insertion happened.
pub fn insert_once(mut text: String, at: usize, snippet: &str) -> (String, bool) {
  if text[at..].starts_with(snippet) {
    return (text, false);
  }
  text.insert_str(at, snippet);
  (text, true)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn locates_function_with_defaulted_params() {
    let text = "x();\nfunction loadManifest(path, shouldCache = true, cache = sharedCache) {\n  return 1;\n}";
    let site = locate_function(text, "loadManifest").unwrap();
    assert_eq!(site.params, vec!["path", "shouldCache", "cache"]);
    assert_eq!(&text[site.body_start..site.body_start + 3], "\n  ");
  }

  #[test]
  fn locates_function_whose_defaults_call_constructors() {
    let text = "function loadManifest(path, shouldCache = true, cache = new Map(), opts = pick(a, b)) {\n  return 1;\n}";
    let site = locate_function(text, "loadManifest").unwrap();
    assert_eq!(site.params, vec!["path", "shouldCache", "cache", "opts"]);
    assert!(text[..site.body_start].ends_with("pick(a, b)) {"));
  }

  #[test]
  fn ignores_calls_and_other_names() {
    assert!(locate_function("loadManifest(path, true);", "loadManifest").is_none());
    assert!(locate_function("function loadManifestSync(p, c) {", "loadManifest").is_none());
  }

  #[test]
  fn locates_method_but_not_member_calls() {
    let text = "const id = this.getBuildId();\nclass S {\n  getBuildId() {\n    return x;\n  }\n}";
    let site = locate_method(text, "getBuildId").unwrap();
    assert!(site.params.is_empty());
    assert!(text[..site.body_start].ends_with("  getBuildId() {"));
  }

  #[test]
  fn identifier_check() {
    assert!(is_identifier("_url"));
    assert!(is_identifier("$a1"));
    assert!(!is_identifier("1a"));
    assert!(!is_identifier("{ a }"));
  }

  #[test]
  fn insert_once_skips_existing_snippet() {
    let (text, inserted) = insert_once("f() {}".into(), 5, "return 1;");
    assert!(inserted);
    assert_eq!(text, "f() {return 1;}");
    let (again, inserted) = insert_once(text, 5, "return 1;");
    assert!(!inserted);
    assert_eq!(again, "f() {return 1;}");
  }
}
