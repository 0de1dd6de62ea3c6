//! The esbuild invocation that produces the raw worker bundle.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;

use crate::error::BuildError;
use crate::inline::js_string;

const EMPTY_SHIM: &str = "export default {};\n";

const OPENTELEMETRY_SHIM: &str = r#"const noopSpan = {
  setAttribute() { return this; },
  setAttributes() { return this; },
  setStatus() { return this; },
  updateName() { return this; },
  recordException() {},
  end() {},
  isRecording() { return false; },
  spanContext() { return {}; },
};
const noopTracer = {
  startSpan: () => noopSpan,
  startActiveSpan: (...args) => args[args.length - 1](noopSpan),
};
export const trace = {
  getTracer: () => noopTracer,
  getSpan: () => undefined,
  getActiveSpan: () => undefined,
  setSpan: (ctx) => ctx,
};
export const context = {
  active: () => ROOT_CONTEXT,
  with: (_ctx, fn, thisArg, ...args) => fn.apply(thisArg, args),
};
export const propagation = { inject() {}, extract: (ctx) => ctx };
export const SpanStatusCode = { UNSET: 0, OK: 1, ERROR: 2 };
export const SpanKind = { INTERNAL: 0, SERVER: 1, CLIENT: 2, PRODUCER: 3, CONSUMER: 4 };
export const ROOT_CONTEXT = {};
"#;

const ENV_SHIM: &str = r#"export function loadEnvConfig() {
  return { combinedEnv: process.env, parsedEnv: undefined, loadedEnvFiles: [] };
}
export function processEnv() {
  return process.env;
}
export function resetEnv() {}
export function updateInitialEnv() {}
"#;

const ESBUILD_SCRIPT_TEMPLATE: &str = r#"import { createRequire } from "node:module";

const { build } = createRequire(__RESOLVE_FROM__)("esbuild");
const request = __REQUEST__;

const requireHookShim = {
  name: "replaceRelative",
  setup(build) {
    build.onResolve({ filter: /^\.\/require-hook$/ }, () => ({ path: request.requireHookShim }));
  },
};

await build({
  entryPoints: [request.entryPoint],
  bundle: true,
  outfile: request.outfile,
  format: request.format,
  target: request.target,
  minify: false,
  plugins: [requireHookShim],
  alias: request.aliases,
  define: request.defines,
  platform: request.platform,
});
"#;

/// Everything the bundler needs to produce the raw worker script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRequest {
  /// Worker entry module.
  pub entry_point: PathBuf,
  /// File the bundler writes.
  pub outfile: PathBuf,
  /// Module specifiers redirected to shim files.
  pub aliases: BTreeMap<String, String>,
  /// Compile-time substitutions, values are JavaScript source.
  pub defines: BTreeMap<String, String>,
  /// Module that replaces relative `./require-hook` imports.
  pub require_hook_shim: PathBuf,
  /// esbuild platform hint.
  pub platform: String,
  /// Output module format.
  pub format: String,
  /// Output language target.
  pub target: String,
}

/// Shim modules written next to the bundle before invoking esbuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimModules {
  /// Module exporting nothing.
  pub empty: PathBuf,
  /// No-op tracing API.
  pub opentelemetry: PathBuf,
  /// Dotenv loader that only exposes `process.env`.
  pub env: PathBuf,
}

impl ShimModules {
  /// Write the shim sources into `dir`.
  pub fn write(dir: &Path) -> Result<Self> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let shims = Self {
      empty: dir.join("empty.js"),
      opentelemetry: dir.join("opentelemetry.js"),
      env: dir.join("env.js"),
    };
    for (path, source) in [
      (&shims.empty, EMPTY_SHIM),
      (&shims.opentelemetry, OPENTELEMETRY_SHIM),
      (&shims.env, ENV_SHIM),
    ] {
      fs::write(path, source).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(shims)
  }
}

impl BundleRequest {
  /// Request for bundling a Next.js standalone server into a worker.
  ///
  /// `next_config` is the serialised config object taken from the standalone `server.js`.
  pub fn for_worker(
    entry_point: impl Into<PathBuf>,
    outfile: impl Into<PathBuf>,
    shims: &ShimModules,
    next_config: &str,
  ) -> Self {
    let shim = |path: &Path| path.to_string_lossy().replace('\\', "/");

    let aliases = BTreeMap::from([
      ("next/dist/compiled/ws".to_string(), shim(&shims.empty)),
      ("next/dist/compiled/edge-runtime".to_string(), shim(&shims.empty)),
      ("critters".to_string(), shim(&shims.empty)),
      ("@opentelemetry/api".to_string(), shim(&shims.opentelemetry)),
      ("@next/env".to_string(), shim(&shims.env)),
    ]);

    let defines = BTreeMap::from([
      (
        "process.env.__NEXT_PRIVATE_STANDALONE_CONFIG".to_string(),
        js_string(next_config),
      ),
      ("__dirname".to_string(), "\"\"".to_string()),
      ("__non_webpack_require__".to_string(), "require".to_string()),
      ("process.env.NEXT_PRIVATE_MINIMAL_MODE".to_string(), "true".to_string()),
      ("process.env.NEXT_RUNTIME".to_string(), "\"nodejs\"".to_string()),
      ("process.env.NODE_ENV".to_string(), "\"production\"".to_string()),
      ("process.env.NEXT_MINIMAL".to_string(), "true".to_string()),
    ]);

    Self {
      entry_point: entry_point.into(),
      outfile: outfile.into(),
      aliases,
      defines,
      require_hook_shim: shims.empty.clone(),
      platform: "node".into(),
      format: "esm".into(),
      target: "esnext".into(),
    }
  }
}

/// Produces `request.outfile` from `request.entry_point`.
pub trait Bundler {
  /// Bundle the entry point; on success the outfile exists.
  fn bundle(&self, request: &BundleRequest) -> Result<()>;
}

/// Runs esbuild's JavaScript API through Node using a generated build script.
#[derive(Debug, Clone)]
pub struct EsbuildScript {
  node_binary: String,
  working_dir: PathBuf,
  script_path: PathBuf,
}

impl EsbuildScript {
  /// `esbuild` is resolved from `working_dir`, wherever `script_path` is written.
  pub fn new(
    node_binary: impl Into<String>,
    working_dir: impl Into<PathBuf>,
    script_path: impl Into<PathBuf>,
  ) -> Self {
    Self {
      node_binary: node_binary.into(),
      working_dir: working_dir.into(),
      script_path: script_path.into(),
    }
  }

  /// Node source of the build script for `request`.
  pub fn render_script(&self, request: &BundleRequest) -> Result<String> {
    let working_dir = absolute(&self.working_dir)?;
    let resolve_from = js_string(&working_dir.join("package.json").to_string_lossy());
    let request_json =
      serde_json::to_string_pretty(request).context("failed to serialise bundle request")?;
    Ok(
      ESBUILD_SCRIPT_TEMPLATE
        .replace("__RESOLVE_FROM__", &resolve_from)
        .replace("__REQUEST__", &request_json),
    )
  }
}

fn absolute(path: &Path) -> Result<PathBuf> {
  std::path::absolute(path).with_context(|| format!("failed to resolve {}", path.display()))
}

impl Bundler for EsbuildScript {
  fn bundle(&self, request: &BundleRequest) -> Result<()> {
    let script = self.render_script(request)?;
    let script_path = absolute(&self.script_path)?;
    if let Some(parent) = script_path.parent() {
      fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&script_path, script)
      .with_context(|| format!("failed to write {}", script_path.display()))?;

    info!("bundling {}", request.entry_point.display());
    debug!("running {} {}", self.node_binary, script_path.display());
    let status = Command::new(&self.node_binary)
      .arg(&script_path)
      .current_dir(&self.working_dir)
      .status()
      .map_err(|err| BuildError::BundlerFailed {
        message: format!("failed to run `{}`: {err}", self.node_binary),
      })?;

    if !status.success() {
      return Err(
        BuildError::BundlerFailed {
          message: format!("esbuild exited with status {status}"),
        }
        .into(),
      );
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  fn shims() -> ShimModules {
    ShimModules {
      empty: PathBuf::from("/out/shims/empty.js"),
      opentelemetry: PathBuf::from("/out/shims/opentelemetry.js"),
      env: PathBuf::from("/out/shims/env.js"),
    }
  }

  #[test]
  fn worker_request_carries_aliases_and_defines() {
    let request = BundleRequest::for_worker(
      "/app/worker.ts",
      "/out/raw.js",
      &shims(),
      r#"{"distDir":"./.next"}"#,
    );

    assert_eq!(request.aliases["next/dist/compiled/ws"], "/out/shims/empty.js");
    assert_eq!(request.aliases["critters"], "/out/shims/empty.js");
    assert_eq!(request.aliases["@opentelemetry/api"], "/out/shims/opentelemetry.js");
    assert_eq!(request.aliases["@next/env"], "/out/shims/env.js");
    assert_eq!(
      request.defines["process.env.__NEXT_PRIVATE_STANDALONE_CONFIG"],
      r#""{\"distDir\":\"./.next\"}""#
    );
    assert_eq!(request.defines["__dirname"], "\"\"");
    assert_eq!(request.defines["__non_webpack_require__"], "require");
    assert_eq!(request.defines["process.env.NEXT_MINIMAL"], "true");
    assert_eq!(request.require_hook_shim, PathBuf::from("/out/shims/empty.js"));
    assert_eq!(request.format, "esm");
  }

  #[test]
  fn script_embeds_request_as_json() {
    let request = BundleRequest::for_worker("/app/worker.ts", "/out/raw.js", &shims(), "{}");
    let script = EsbuildScript::new("node", "/app", "/out/.build/bundle.mjs")
      .render_script(&request)
      .unwrap();
    assert!(script.contains("createRequire(\"/app/package.json\")(\"esbuild\")"));
    assert!(script.contains("\"entryPoint\": \"/app/worker.ts\""));
    assert!(script.contains("\"requireHookShim\": \"/out/shims/empty.js\""));
    assert!(!script.contains("__REQUEST__"));
    assert!(!script.contains("__RESOLVE_FROM__"));
  }

  #[test]
  fn esbuild_resolves_from_working_dir_not_script_location() {
    let request = BundleRequest::for_worker("/app/worker.ts", "/tmp/out/raw.js", &shims(), "{}");
    let script = EsbuildScript::new("node", "/srv/app", "/tmp/out/.build/bundle.mjs")
      .render_script(&request)
      .unwrap();
    assert!(script.contains("createRequire(\"/srv/app/package.json\")"));
    assert!(!script.contains("from \"esbuild\""));
  }

  #[cfg(unix)]
  #[test]
  fn relative_paths_are_not_resolved_twice() {
    let dir = tempfile::tempdir_in(std::env::current_dir().unwrap()).unwrap();
    let relative = Path::new(dir.path().file_name().unwrap());
    // `cat` stands in for node and fails unless the script path still resolves from the app dir.
    let bundler = EsbuildScript::new("cat", relative, relative.join(".build/bundle.mjs"));
    let request = BundleRequest::for_worker("worker.ts", "raw.js", &shims(), "{}");

    bundler.bundle(&request).unwrap();
    assert!(dir.path().join(".build/bundle.mjs").is_file());
    assert!(!dir.path().join(relative).exists());
  }

  #[test]
  fn writes_shim_modules() {
    let dir = tempdir().unwrap();
    let shims = ShimModules::write(&dir.path().join("shims")).unwrap();
    assert_eq!(fs::read_to_string(&shims.empty).unwrap(), EMPTY_SHIM);
    assert!(fs::read_to_string(&shims.env).unwrap().contains("loadEnvConfig"));
    assert!(
      fs::read_to_string(&shims.opentelemetry)
        .unwrap()
        .contains("export const trace")
    );
  }

  #[test]
  fn missing_node_binary_is_bundler_failure() {
    let dir = tempdir().unwrap();
    let bundler = EsbuildScript::new(
      "definitely-not-a-node-binary",
      dir.path(),
      dir.path().join("build.mjs"),
    );
    let request = BundleRequest::for_worker("in.js", "out.js", &shims(), "{}");
    let err = bundler.bundle(&request).unwrap_err();
    assert!(matches!(
      err.downcast_ref::<BuildError>(),
      Some(BuildError::BundlerFailed { .. })
    ));
  }
}
