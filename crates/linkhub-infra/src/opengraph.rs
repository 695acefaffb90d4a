//! Page metadata source: Open Graph preview tags.
//!
//! Fetches the public page behind a canonical link, reads its `og:title`
//! and `og:image` meta tags, and downloads the image. Tags are matched by
//! `property` or `name`, in any attribute order, with either quote style.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Url;
use tracing::{debug, warn};

use linkhub_core::metadata::{MetadataOutcome, MetadataSource, SiteMetadata};
use linkhub_types::config::MetadataConfig;
use linkhub_types::link::{CanonicalLink, LINK_HOST};
use linkhub_types::logo::LogoImage;

use crate::http::{build_client, fetch_bytes, fetch_text};

static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("pattern is valid"));

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#)
        .expect("pattern is valid")
});

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9A-Fa-f]{1,6}|[A-Za-z]{2,6});").expect("pattern is valid")
});

/// Preview tags extracted from a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenGraphTags {
    pub title: Option<String>,
    pub image: Option<String>,
}

/// Extract `og:title` and `og:image` from HTML. The first non-empty
/// occurrence of each tag wins.
pub fn parse_open_graph(html: &str) -> OpenGraphTags {
    let mut tags = OpenGraphTags::default();

    for tag in META_TAG_RE.find_iter(html) {
        let mut property = None;
        let mut content = None;
        for attr in ATTRIBUTE_RE.captures_iter(tag.as_str()) {
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .or_else(|| attr.get(4))
                .map_or("", |m| m.as_str());
            match attr[1].to_ascii_lowercase().as_str() {
                "property" | "name" => property = Some(value.trim().to_ascii_lowercase()),
                "content" => content = Some(decode_entities(value).trim().to_string()),
                _ => {}
            }
        }

        let (Some(property), Some(content)) = (property, content) else {
            continue;
        };
        if content.is_empty() {
            continue;
        }
        match property.as_str() {
            "og:title" if tags.title.is_none() => tags.title = Some(content),
            "og:image" if tags.image.is_none() => tags.image = Some(content),
            _ => {}
        }
        if tags.title.is_some() && tags.image.is_some() {
            break;
        }
    }

    tags
}

/// Decode the HTML character references that appear in attribute values.
/// Unknown named references are left as-is.
pub fn decode_entities(input: &str) -> String {
    ENTITY_RE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// `MetadataSource` backed by the link's public web page.
pub struct OpenGraphSource {
    client: reqwest::Client,
    base_url: String,
}

impl OpenGraphSource {
    pub fn new(config: &MetadataConfig) -> Result<Self, reqwest::Error> {
        let client = build_client(
            Duration::from_secs(config.fetch_timeout_secs),
            &config.user_agent,
        )?;
        Ok(Self {
            client,
            base_url: format!("https://{LINK_HOST}"),
        })
    }

    /// Serve pages from another origin (tests, mirrors).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn page_url(&self, link: &CanonicalLink) -> String {
        format!("{}/{}", self.base_url, link.handle())
    }
}

impl MetadataSource for OpenGraphSource {
    fn name(&self) -> &'static str {
        "opengraph"
    }

    async fn lookup(&self, link: &CanonicalLink) -> MetadataOutcome {
        let page_url = self.page_url(link);

        let html = match fetch_text(&self.client, &page_url).await {
            Ok(html) => html,
            Err(e) if e.is_not_found() => return MetadataOutcome::NotFound,
            Err(e) => return MetadataOutcome::TransientFailure(format!("page fetch: {e}")),
        };

        let tags = parse_open_graph(&html);
        debug!(
            link = %link,
            has_title = tags.title.is_some(),
            has_image = tags.image.is_some(),
            "Parsed preview tags"
        );

        let logo = match tags.image {
            Some(src) => {
                let image_url = match Url::parse(&page_url).and_then(|base| base.join(&src)) {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(link = %link, src = %src, error = %e, "Ignoring unparseable og:image");
                        return resolved(tags.title, None);
                    }
                };
                let bytes = match fetch_bytes(&self.client, image_url.as_str()).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        return MetadataOutcome::TransientFailure(format!("image fetch: {e}"));
                    }
                };
                let logo = LogoImage::from_bytes(bytes);
                if logo.is_none() {
                    warn!(link = %link, url = %image_url, "og:image is not a supported image format");
                }
                logo
            }
            None => None,
        };

        resolved(tags.title, logo)
    }
}

fn resolved(title: Option<String>, logo: Option<LogoImage>) -> MetadataOutcome {
    if title.is_none() && logo.is_none() {
        return MetadataOutcome::NotFound;
    }
    MetadataOutcome::Resolved(SiteMetadata { title, logo })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn source(server: &mockito::Server) -> OpenGraphSource {
        OpenGraphSource::new(&MetadataConfig::default())
            .unwrap()
            .with_base_url(server.url())
    }

    #[test]
    fn test_parse_property_before_content() {
        let tags = parse_open_graph(
            r#"<head><meta property="og:title" content="News Hub">
               <meta property="og:image" content="https://cdn.example/logo.png"></head>"#,
        );
        assert_eq!(tags.title.as_deref(), Some("News Hub"));
        assert_eq!(tags.image.as_deref(), Some("https://cdn.example/logo.png"));
    }

    #[test]
    fn test_parse_content_before_property_single_quotes() {
        let tags = parse_open_graph(r#"<META content='Hub &amp; Co' NAME='og:title' />"#);
        assert_eq!(tags.title.as_deref(), Some("Hub & Co"));
        assert!(tags.image.is_none());
    }

    #[test]
    fn test_parse_ignores_empty_and_other_tags() {
        let tags = parse_open_graph(
            r#"<meta property="og:title" content="  ">
               <meta name="description" content="not a title">
               <meta property="og:title" content="Second">"#,
        );
        assert_eq!(tags.title.as_deref(), Some("Second"));
    }

    #[test]
    fn test_parse_page_without_tags() {
        assert_eq!(parse_open_graph("<html><body>hi</body></html>"), OpenGraphTags::default());
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &#39;c&#x27; &quot;d&quot;"), "a <b> 'c' \"d\"");
        assert_eq!(decode_entities("&unknown; &#xZZ;"), "&unknown; &#xZZ;");
        assert_eq!(decode_entities("&#128512;"), "\u{1F600}");
    }

    #[tokio::test]
    async fn test_lookup_resolves_title_and_relative_image() {
        let mut server = mockito::Server::new_async().await;
        let page = server
            .mock("GET", "/main_bot")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(
                r#"<meta property="og:title" content="Main Bot">
                   <meta property="og:image" content="/img/logo.png">"#,
            )
            .create_async()
            .await;
        let image = server
            .mock("GET", "/img/logo.png")
            .with_status(200)
            .with_body(PNG)
            .create_async()
            .await;

        let outcome = source(&server)
            .lookup(&CanonicalLink::from_handle("main_bot"))
            .await;

        page.assert_async().await;
        image.assert_async().await;
        let meta = outcome.into_metadata().unwrap();
        assert_eq!(meta.title.as_deref(), Some("Main Bot"));
        assert_eq!(meta.logo.unwrap().bytes(), PNG);
    }

    #[tokio::test]
    async fn test_lookup_without_tags_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/main_bot")
            .with_status(200)
            .with_body("<html><head><title>t.me</title></head></html>")
            .create_async()
            .await;

        let outcome = source(&server)
            .lookup(&CanonicalLink::from_handle("main_bot"))
            .await;
        assert_eq!(outcome, MetadataOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_lookup_drops_unsupported_image_keeps_title() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/main_bot")
            .with_status(200)
            .with_body(
                r#"<meta property="og:title" content="Main Bot">
                   <meta property="og:image" content="/img/logo.bmp">"#,
            )
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/img/logo.bmp")
            .with_status(200)
            .with_body(b"BM not supported")
            .create_async()
            .await;

        let meta = source(&server)
            .lookup(&CanonicalLink::from_handle("main_bot"))
            .await
            .into_metadata()
            .unwrap();
        assert_eq!(meta.title.as_deref(), Some("Main Bot"));
        assert!(meta.logo.is_none());
    }

    #[tokio::test]
    async fn test_lookup_server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/main_bot")
            .with_status(503)
            .create_async()
            .await;

        let outcome = source(&server)
            .lookup(&CanonicalLink::from_handle("main_bot"))
            .await;
        assert!(matches!(outcome, MetadataOutcome::TransientFailure(_)));
    }

    #[tokio::test]
    async fn test_lookup_missing_page_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/main_bot")
            .with_status(404)
            .create_async()
            .await;

        let outcome = source(&server)
            .lookup(&CanonicalLink::from_handle("main_bot"))
            .await;
        assert_eq!(outcome, MetadataOutcome::NotFound);
    }
}
