//! Render-ready link output

use crate::link::{CustomAttribute, LinkValue};
use log::warn;
use std::borrow::Cow;
use std::fmt::Write;

const ESCAPE_CHARS: [char; 5] = ['<', '>', '&', '"', '\''];

/// HTML attribute names may not contain whitespace, quotes, `<`, `>`,
/// `/`, `=` or control characters.
fn is_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| {
            c.is_whitespace()
                || c.is_control()
                || matches!(c, '"' | '\'' | '<' | '>' | '/' | '=')
        })
}

fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(ESCAPE_CHARS) {
        return Cow::Borrowed(s);
    }

    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// A resolved link ready for templates.
///
/// An empty link (no destination) renders to nothing: a link to a deleted
/// element is an expected condition, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderableLink {
    pub href: Option<String>,
    pub text: Option<String>,
    pub title: Option<String>,
    pub aria_label: Option<String>,
    pub classes: Option<String>,
    pub attributes: Vec<CustomAttribute>,
    pub new_window: bool,
}

impl RenderableLink {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a link value's decorations and a resolved destination.
    ///
    /// The URL suffix is appended to `href`; `default_text` is used when the
    /// author did not set link text.
    pub(crate) fn from_link(link: &LinkValue, href: String, default_text: Option<String>) -> Self {
        let decorations = &link.decorations;
        let href = match decorations.url_suffix.as_deref() {
            Some(suffix) if !suffix.is_empty() => format!("{href}{suffix}"),
            _ => href,
        };

        Self {
            href: Some(href),
            text: non_empty(decorations.link_text.as_deref()).or(default_text),
            title: non_empty(decorations.link_title.as_deref()),
            aria_label: non_empty(decorations.aria_label.as_deref()),
            classes: non_empty(decorations.classes.as_deref()),
            attributes: decorations
                .custom_attributes
                .iter()
                .filter_map(|attr| {
                    let name = attr.attribute.trim();
                    if name.is_empty() {
                        return None;
                    }
                    if !is_attribute_name(name) {
                        warn!("Skipping custom link attribute with invalid name {name:?}");
                        return None;
                    }
                    Some(CustomAttribute {
                        attribute: name.to_string(),
                        value: attr.value.clone(),
                    })
                })
                .collect(),
            new_window: decorations.new_window.unwrap_or(false),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.href.is_none()
    }

    pub fn url(&self) -> Option<&str> {
        self.href.as_deref()
    }

    /// Anchor tag for this link, or an empty string for empty links.
    pub fn to_html(&self) -> String {
        let Some(href) = &self.href else {
            return String::new();
        };

        let mut html = format!("<a href=\"{}\"", escape(href));
        if self.new_window {
            html.push_str(" target=\"_blank\" rel=\"noopener noreferrer\"");
        }
        if let Some(title) = &self.title {
            let _ = write!(html, " title=\"{}\"", escape(title));
        }
        if let Some(label) = &self.aria_label {
            let _ = write!(html, " aria-label=\"{}\"", escape(label));
        }
        if let Some(classes) = &self.classes {
            let _ = write!(html, " class=\"{}\"", escape(classes));
        }
        for attr in self
            .attributes
            .iter()
            .filter(|attr| is_attribute_name(&attr.attribute))
        {
            let _ = write!(html, " {}=\"{}\"", attr.attribute, escape(&attr.value));
        }

        let text = self.text.as_deref().unwrap_or(href);
        let _ = write!(html, ">{}</a>", escape(text));
        html
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
