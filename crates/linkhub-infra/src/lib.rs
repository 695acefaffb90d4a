//! Infrastructure adapters for the link hub builder.
//!
//! Implements the port traits from `linkhub-core`: `JsonProjectStore`
//! (`ProjectStore`), `VercelDeployer` (`SiteDeployer`), and the two
//! `MetadataSource`s (`OpenGraphSource`, `TelegramProfileSource`). Also
//! home to configuration loading and the legacy registry importer.

pub mod config;
pub mod http;
pub mod legacy;
pub mod opengraph;
pub mod store;
pub mod telegram;
pub mod vercel;
