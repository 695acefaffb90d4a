//! Link normalization.
//!
//! Accepts a bare Telegram handle (`news_channel`, `@news_channel`) or a
//! profile URL (`t.me/news_channel`, `https://T.ME/news_channel`) and
//! produces the canonical `https://t.me/<handle>` form. Pure string
//! validation, no network access.

use std::sync::LazyLock;

use regex::Regex;

use linkhub_types::error::LinkError;
use linkhub_types::link::CanonicalLink;

static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@?([A-Za-z0-9_]{5,32})$").expect("handle pattern is valid"));

static PROFILE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Case folding is scoped to scheme and host so the handle class stays ASCII.
    Regex::new(r"^(?i:https?://)?(?i:t\.me)/([A-Za-z0-9_]{5,32})$")
        .expect("profile URL pattern is valid")
});

/// Validate free-form input and return its canonical link.
pub fn normalize_link(input: &str) -> Result<CanonicalLink, LinkError> {
    let trimmed = input.trim();

    let captures = HANDLE_RE
        .captures(trimmed)
        .or_else(|| PROFILE_URL_RE.captures(trimmed));

    match captures.and_then(|c| c.get(1)) {
        Some(handle) => Ok(CanonicalLink::from_handle(handle.as_str())),
        None => Err(LinkError::Invalid {
            input: trimmed.to_string(),
        }),
    }
}
