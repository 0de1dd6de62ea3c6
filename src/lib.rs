#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod assets;
pub mod builder;
pub mod bundler;
pub mod config;
pub mod error;
pub mod inline;
pub mod manifest;
pub mod project;
pub mod rewrite;

pub use builder::{WorkerArtifacts, WorkerBuilder, build_worker};
pub use bundler::{BundleRequest, Bundler, EsbuildScript};
pub use config::BuilderConfig;
pub use error::BuildError;
pub use project::{BuildContext, NextAppLayout};
pub use rewrite::{RewriteRule, RuleSet};
