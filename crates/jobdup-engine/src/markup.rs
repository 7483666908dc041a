//! Text normalization used by the content hash.

use scraper::Html;
use uuid::Uuid;

/// Text content of an HTML fragment with every tag removed.
pub fn strip_markup(text: &str) -> String {
    let fragment = Html::parse_fragment(text);
    fragment.root_element().text().collect()
}

/// Markup-stripped, case-folded text with whitespace runs collapsed to one space.
pub fn normalize_text(text: &str) -> String {
    strip_markup(text)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// UUIDv5 of the normalized text. Distinct from the outer digest.
pub fn text_fingerprint(text: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, normalize_text(text).as_bytes())
        .simple()
        .to_string()
}
