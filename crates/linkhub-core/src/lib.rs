//! Business logic and port trait definitions for the link hub builder.
//!
//! This crate defines the "ports" (`ProjectStore`, `SiteDeployer`,
//! `MetadataSource`) that the infrastructure layer implements, and the
//! conversation engine that drives them. It depends only on `linkhub-types`
//! -- never on `linkhub-infra` or any HTTP/filesystem crate.

pub mod conversation;
pub mod deploy;
pub mod link;
pub mod metadata;
pub mod publish;
pub mod registry;
pub mod render;

#[cfg(test)]
pub(crate) mod testing;
