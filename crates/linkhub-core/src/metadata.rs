//! Metadata resolution.
//!
//! Auto-discovers a display title and logo for a canonical link through a
//! two-step chain: the link's web page (preview meta tags) first, then the
//! messaging platform's own profile data. The first step that yields a
//! non-empty title or logo wins outright; results from different steps are
//! never merged.
//!
//! Lookups never fail from the caller's point of view. Every miss is an
//! explicit [`MetadataOutcome`], so callers fall back to asking the user.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use linkhub_types::link::CanonicalLink;
use linkhub_types::logo::LogoImage;

/// Auto-discovered page metadata. At least one field is set when resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteMetadata {
    pub title: Option<String>,
    pub logo: Option<LogoImage>,
}

impl SiteMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.logo.is_none()
    }

    /// Drop blank titles so "present" always means "usable".
    fn normalized(mut self) -> Self {
        self.title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }
}

/// Result of a metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOutcome {
    Resolved(SiteMetadata),
    /// The source answered, but had nothing usable.
    NotFound,
    /// Network error, timeout, or unexpected response. Safe to retry later.
    TransientFailure(String),
}

impl MetadataOutcome {
    pub fn into_metadata(self) -> Option<SiteMetadata> {
        match self {
            MetadataOutcome::Resolved(meta) => Some(meta),
            _ => None,
        }
    }
}

/// A single step in the resolution chain.
///
/// Implementations live in linkhub-infra (Open Graph page scraping,
/// Telegram profile lookup).
pub trait MetadataSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn lookup(&self, link: &CanonicalLink) -> impl Future<Output = MetadataOutcome> + Send;
}

/// Two-step resolution chain with a per-step time bound.
pub struct MetadataResolver<P: MetadataSource, F: MetadataSource> {
    page: P,
    profile: F,
    step_timeout: Duration,
}

impl<P: MetadataSource, F: MetadataSource> MetadataResolver<P, F> {
    pub fn new(page: P, profile: F, step_timeout: Duration) -> Self {
        Self {
            page,
            profile,
            step_timeout,
        }
    }

    /// Resolve metadata for a link.
    ///
    /// Returns `TransientFailure` only when no step resolved and at least
    /// one failed transiently; otherwise `NotFound`.
    pub async fn resolve(&self, link: &CanonicalLink) -> MetadataOutcome {
        let mut transient = None;

        match self.attempt(&self.page, link).await {
            MetadataOutcome::Resolved(meta) => return MetadataOutcome::Resolved(meta),
            MetadataOutcome::TransientFailure(reason) => transient = Some(reason),
            MetadataOutcome::NotFound => {}
        }

        match self.attempt(&self.profile, link).await {
            MetadataOutcome::Resolved(meta) => return MetadataOutcome::Resolved(meta),
            MetadataOutcome::TransientFailure(reason) => transient = Some(reason),
            MetadataOutcome::NotFound => {}
        }

        match transient {
            Some(reason) => MetadataOutcome::TransientFailure(reason),
            None => MetadataOutcome::NotFound,
        }
    }

    async fn attempt<S: MetadataSource>(&self, source: &S, link: &CanonicalLink) -> MetadataOutcome {
        let outcome = match tokio::time::timeout(self.step_timeout, source.lookup(link)).await {
            Ok(outcome) => outcome,
            Err(_) => MetadataOutcome::TransientFailure(format!(
                "{} lookup timed out after {:?}",
                source.name(),
                self.step_timeout
            )),
        };

        match outcome {
            MetadataOutcome::Resolved(meta) => {
                let meta = meta.normalized();
                if meta.is_empty() {
                    debug!(source = source.name(), link = %link, "Source resolved nothing usable");
                    MetadataOutcome::NotFound
                } else {
                    debug!(
                        source = source.name(),
                        link = %link,
                        has_title = meta.title.is_some(),
                        has_logo = meta.logo.is_some(),
                        "Metadata resolved"
                    );
                    MetadataOutcome::Resolved(meta)
                }
            }
            MetadataOutcome::NotFound => {
                debug!(source = source.name(), link = %link, "No metadata found");
                MetadataOutcome::NotFound
            }
            MetadataOutcome::TransientFailure(reason) => {
                warn!(source = source.name(), link = %link, reason = %reason, "Metadata lookup failed");
                MetadataOutcome::TransientFailure(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StaticSource, png_logo};

    fn link() -> CanonicalLink {
        CanonicalLink::from_handle("news_channel")
    }

    fn resolved(title: Option<&str>, logo: bool) -> MetadataOutcome {
        MetadataOutcome::Resolved(SiteMetadata {
            title: title.map(str::to_string),
            logo: logo.then(png_logo),
        })
    }

    fn resolver(page: StaticSource, profile: StaticSource) -> MetadataResolver<StaticSource, StaticSource> {
        MetadataResolver::new(page, profile, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_page_result_wins_without_profile_lookup() {
        let resolver = resolver(
            StaticSource::new(resolved(Some("Page Title"), false)),
            StaticSource::new(resolved(Some("Profile"), true)),
        );

        let meta = resolver.resolve(&link()).await.into_metadata().unwrap();
        assert_eq!(meta.title.as_deref(), Some("Page Title"));
        assert!(meta.logo.is_none(), "no merging across sources");
        assert_eq!(resolver.profile.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_profile_when_page_empty() {
        let resolver = resolver(
            StaticSource::new(resolved(Some("   "), false)),
            StaticSource::new(resolved(Some("Profile Name"), true)),
        );

        let meta = resolver.resolve(&link()).await.into_metadata().unwrap();
        assert_eq!(meta.title.as_deref(), Some("Profile Name"));
        assert_eq!(meta.logo, Some(png_logo()));
        assert_eq!(resolver.page.calls(), 1);
        assert_eq!(resolver.profile.calls(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_profile_on_page_failure() {
        let resolver = resolver(
            StaticSource::new(MetadataOutcome::TransientFailure("connection reset".into())),
            StaticSource::new(resolved(None, true)),
        );

        let meta = resolver.resolve(&link()).await.into_metadata().unwrap();
        assert!(meta.title.is_none());
        assert!(meta.logo.is_some());
    }

    #[tokio::test]
    async fn test_not_found_when_both_empty() {
        let resolver = resolver(
            StaticSource::new(MetadataOutcome::NotFound),
            StaticSource::new(resolved(None, false)),
        );
        assert_eq!(resolver.resolve(&link()).await, MetadataOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_transient_reported_when_nothing_resolves() {
        let resolver = resolver(
            StaticSource::new(MetadataOutcome::NotFound),
            StaticSource::new(MetadataOutcome::TransientFailure("HTTP 502".into())),
        );
        assert_eq!(
            resolver.resolve(&link()).await,
            MetadataOutcome::TransientFailure("HTTP 502".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_is_bounded_by_timeout() {
        let resolver = resolver(
            StaticSource::new(resolved(Some("Too late"), true)).with_delay(Duration::from_secs(60)),
            StaticSource::new(resolved(Some("Profile"), false)),
        );

        let meta = resolver.resolve(&link()).await.into_metadata().unwrap();
        assert_eq!(meta.title.as_deref(), Some("Profile"));
    }
}
