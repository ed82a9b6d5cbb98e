//! Bzlmod is a library implementing Bazel module dependency resolution:
//! discovery of the transitive module graph from registries, minimal version
//! selection, and an augmented graph for diagnostic inspection.
//!
//! See <https://bazel.build/external/module> for the module system this
//! implements.

#![deny(clippy::dbg_macro)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![warn(rust_2018_idioms)]

pub mod core;
mod internal;
pub mod resolver;

/// Name of the module file located at every module root.
pub const MODULE_FILE_NAME: &str = "MODULE.bazel";
/// Name of the registry configuration file located at an index registry root.
pub const REGISTRY_CONFIG_FILE_NAME: &str = "bazel_registry.json";
/// Name of the per-module metadata file in an index registry.
pub const METADATA_FILE_NAME: &str = "metadata.json";
/// Name of the per-version source recipe file in an index registry.
pub const SOURCE_FILE_NAME: &str = "source.json";
