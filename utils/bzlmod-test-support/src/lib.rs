//! Helpers shared by `bzlmod` integration tests: on-disk index registry
//! fixtures and a minimal module file reader for fixture content.

pub mod module_parser;
pub mod registry;
