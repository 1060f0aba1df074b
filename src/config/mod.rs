//! Configuration types
//!
//! - `LinkConfig` - Configuration for the link manager
//! - `project` - Canonicalisation of link fields in project config

pub mod project;
mod types;

pub use project::{ASSOC_KEY, pack_associative, rebuild_fields, unpack_associative};
pub use types::{DEFAULT_FIELD_TYPE, LinkConfig, LinkConfigBuilder};
