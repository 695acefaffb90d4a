//! Page rendering.
//!
//! Pure placeholder substitution over the page template pair. Placeholders
//! have the form `%%NAME%%`; the known names are `TITLE`, `LOGO` (the
//! slot-1 logo), `LINK1`..`LINK3` and `LOGO1`..`LOGO3`. Unknown placeholders
//! are left as they are. Substitution is a single pass, so substituted
//! values are never themselves expanded.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use linkhub_types::link::CanonicalLink;
use linkhub_types::logo::LogoSlot;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%%([A-Z0-9_]+)%%").expect("placeholder pattern is valid"));

/// Markup and stylesheet templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templates {
    pub markup: String,
    pub stylesheet: String,
}

/// Final page assets ready for packaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSite {
    pub markup: String,
    pub stylesheet: String,
}

/// Values substituted into the templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteFields {
    pub title: String,
    pub links: [String; 3],
    pub logo_filenames: [String; 3],
}

impl SiteFields {
    pub fn new(title: &str, links: &[CanonicalLink; 3], logos: &[LogoSlot; 3]) -> Self {
        Self {
            title: title.to_string(),
            links: links.each_ref().map(|l| l.to_string()),
            logo_filenames: logos.each_ref().map(|l| l.filename.clone()),
        }
    }

    fn value(&self, name: &str) -> Option<&str> {
        let value = match name {
            "TITLE" => &self.title,
            "LOGO" | "LOGO1" => &self.logo_filenames[0],
            "LOGO2" => &self.logo_filenames[1],
            "LOGO3" => &self.logo_filenames[2],
            "LINK1" => &self.links[0],
            "LINK2" => &self.links[1],
            "LINK3" => &self.links[2],
            _ => return None,
        };
        Some(value)
    }
}

/// Render the template pair with the given fields.
///
/// Values are HTML-escaped in the markup and inserted verbatim in the
/// stylesheet.
pub fn render_site(templates: &Templates, fields: &SiteFields) -> RenderedSite {
    RenderedSite {
        markup: substitute(&templates.markup, fields, escape_html),
        stylesheet: substitute(&templates.stylesheet, fields, |s| s.to_string()),
    }
}

fn substitute(template: &str, fields: &SiteFields, encode: impl Fn(&str) -> String) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| match fields.value(&caps[1]) {
            Some(value) => encode(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
