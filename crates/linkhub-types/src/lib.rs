//! Shared domain types for the link hub builder.
//!
//! Canonical links, logo images, project records, configuration, and the
//! error enums shared by every layer.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, base64.

pub mod config;
pub mod error;
pub mod link;
pub mod logo;
pub mod project;
