//! Title/body extraction from toast XML payloads.

use std::sync::OnceLock;

use regex::Regex;
use toast_core::NOTIFICATION_TITLE_PLACEHOLDER;

const TEXT_ELEMENT_PATTERN: &str = r"(?s)<text[^>]*>(.*?)</text>";

/// How the title and body were recovered from a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextExtraction {
    Xml,
    PatternFallback,
    Nothing,
}

/// Title and body pulled from a toast payload.
///
/// `title` holds the placeholder when the payload carried no usable title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastText {
    pub title: String,
    pub body: String,
    pub extraction: TextExtraction,
}

impl ToastText {
    fn empty() -> Self {
        Self {
            title: NOTIFICATION_TITLE_PLACEHOLDER.to_string(),
            body: String::new(),
            extraction: TextExtraction::Nothing,
        }
    }

    fn has_real_title(&self) -> bool {
        !self.title.is_empty() && self.title != NOTIFICATION_TITLE_PLACEHOLDER
    }

    /// Returns the `(title, body)` to relay, or `None` when there is nothing worth sending.
    ///
    /// A placeholder title with a body is replaced by the first 50 characters of the body.
    pub fn into_relayable(self) -> Option<(String, String)> {
        if self.title.is_empty() {
            return None;
        }
        if self.has_real_title() {
            return Some((self.title, self.body));
        }
        if self.body.is_empty() {
            return None;
        }
        let promoted = toast_core::truncate_chars(&self.body, 50);
        Some((promoted, self.body))
    }
}

/// Extracts title and body from a toast payload.
///
/// `text` elements are matched by local name so namespaced payloads work too. The first
/// is the title, the second the body, and any further text nodes are ignored. Malformed
/// XML, or XML without text elements, falls back to a permissive `<text>` pattern match.
pub fn parse_toast_payload(payload: &str) -> ToastText {
    match roxmltree::Document::parse(payload) {
        Ok(document) => {
            let texts = document
                .descendants()
                .filter(|node| node.is_element() && node.tag_name().name() == "text")
                .take(2)
                .map(|node| node.text().unwrap_or_default().to_string())
                .collect::<Vec<_>>();
            if texts.is_empty() {
                return extract_with_pattern(payload);
            }
            let mut parts = texts.into_iter();
            let title = parts
                .next()
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| NOTIFICATION_TITLE_PLACEHOLDER.to_string());
            let body = parts.next().unwrap_or_default();
            ToastText {
                title,
                body,
                extraction: TextExtraction::Xml,
            }
        }
        Err(_) => extract_with_pattern(payload),
    }
}

fn text_element_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(TEXT_ELEMENT_PATTERN).ok())
        .as_ref()
}

fn extract_with_pattern(payload: &str) -> ToastText {
    let Some(pattern) = text_element_regex() else {
        return ToastText::empty();
    };
    let mut matches = pattern
        .captures_iter(payload)
        .filter_map(|captures| captures.get(1))
        .map(|capture| capture.as_str().trim().to_string());
    let Some(first) = matches.next() else {
        return ToastText::empty();
    };
    let title = if first.is_empty() {
        NOTIFICATION_TITLE_PLACEHOLDER.to_string()
    } else {
        first
    };
    ToastText {
        title,
        body: matches.next().unwrap_or_default(),
        extraction: TextExtraction::PatternFallback,
    }
}
