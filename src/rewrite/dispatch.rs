//! Rendering of inlined path lookups that end in a mandatory `throw`.

use crate::inline::js_string;

/// `if (subject.endsWith(path)) return ...` chain closed by an "Unknown" error.
#[derive(Debug, Clone)]
pub struct PathDispatch {
  subject: String,
  label: &'static str,
  arms: Vec<(String, String)>,
}

impl PathDispatch {
  /// Dispatch on the JavaScript expression `subject`; `label` names it in the fallback error.
  pub fn new(subject: impl Into<String>, label: &'static str) -> Self {
    Self {
      subject: subject.into(),
      label,
      arms: Vec::new(),
    }
  }

  /// Return `expression` when the subject ends with `path`.
  pub fn arm(&mut self, path: &str, expression: impl Into<String>) -> &mut Self {
    self.arms.push((path.to_string(), expression.into()));
    self
  }

  /// Generated statements, starting with a newline.
  pub fn render(&self) -> String {
    let mut out = String::new();
    for (path, expression) in &self.arms {
      out.push_str(&format!(
        "\n    if ({subject}.endsWith({path})) {{\n      return {expression};\n    }}",
        subject = self.subject,
        path = js_string(path),
      ));
    }
    out.push_str(&format!(
      "\n    throw new Error({message} + {subject});\n",
      message = js_string(&format!("Unknown {}: ", self.label)),
      subject = self.subject,
    ));
    out
  }
}
