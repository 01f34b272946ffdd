//! Author handle extraction from profile links inside a post card.

use regex::Regex;

/// Link paths that look like `/<handle>` prefixes but are not profiles.
const NON_PROFILE_SEGMENTS: &[&str] = &["/status/", "/photo/", "/likes", "/retweets"];

/// Matches bare profile links (`/alice`, `/some_user`).
pub struct HandleMatcher {
    pattern: Regex,
}

impl HandleMatcher {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(r"^/[A-Za-z0-9_]+$")?,
        })
    }

    /// The handle of a bare profile link, or `None` for anything else.
    pub fn handle_from_href<'a>(&self, href: &'a str) -> Option<&'a str> {
        if NON_PROFILE_SEGMENTS.iter().any(|s| href.contains(s)) {
            return None;
        }
        if !self.pattern.is_match(href) {
            return None;
        }
        Some(&href[1..])
    }

    /// First profile handle among `hrefs`, in order.
    pub fn first_handle<'a, I>(&self, hrefs: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        hrefs
            .into_iter()
            .find_map(|href| self.handle_from_href(href))
            .map(str::to_string)
    }
}
