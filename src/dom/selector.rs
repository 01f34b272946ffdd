//! Minimal attribute selectors: tag, classes, and attribute equality/prefix.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrMatch {
    Equals(String, String),
    Prefix(String, String),
}

/// A compound selector such as `article[data-testid="tweet"]` or `a[href^="/"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

impl Selector {
    /// Match any element.
    pub fn any() -> Self {
        Self::default()
    }

    /// Match elements with this tag name (case-insensitive).
    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_ascii_lowercase()),
            ..Self::default()
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    /// `[name="value"]`
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs
            .push(AttrMatch::Equals(name.to_string(), value.to_string()));
        self
    }

    /// `[name^="prefix"]`
    pub fn with_attr_prefix(mut self, name: &str, prefix: &str) -> Self {
        self.attrs
            .push(AttrMatch::Prefix(name.to_string(), prefix.to_string()));
        self
    }

    pub(crate) fn matches(&self, tag: &str, attrs: &BTreeMap<String, String>) -> bool {
        if let Some(expected) = &self.tag {
            if expected != tag {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let Some(class_attr) = attrs.get("class") else {
                return false;
            };
            let present: Vec<&str> = class_attr.split_ascii_whitespace().collect();
            if !self.classes.iter().all(|c| present.contains(&c.as_str())) {
                return false;
            }
        }

        self.attrs.iter().all(|m| match m {
            AttrMatch::Equals(name, value) => attrs.get(name) == Some(value),
            AttrMatch::Prefix(name, prefix) => attrs
                .get(name)
                .map_or(false, |v| v.starts_with(prefix.as_str())),
        })
    }
}
