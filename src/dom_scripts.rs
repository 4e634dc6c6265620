//! Page-context scripts run by the loader.
//!
//! The scripts live in `scripts/` so editors can highlight them; they are
//! bundled as strings at compile time.

/// CSS selector for the elements the agent may interact with.
pub const INTERACTIVE_SELECTOR: &str =
    r#"a, button, input[type="submit"], input[type="text"], input[type="search"]"#;

/// Attribute carrying the synthetic element identifier.
pub const AI_ID_ATTRIBUTE: &str = "data-ai-id";

/// Prefix of every synthetic identifier (`ai-id-<index>`).
pub const AI_ID_PREFIX: &str = "ai-id-";

/// Clears any page-authored ids, then tags every interactive element with
/// `data-ai-id="ai-id-<index>"` in document order and returns the serialized
/// document.
pub const TAG_ELEMENTS_SCRIPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/tag_elements.js"
));

/// Scrolls to half the document height to trigger lazy-loaded content.
pub const SCROLL_HALF_SCRIPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/scroll_half.js"
));

/// Synthetic identifier for the element at `index` in document order.
pub fn ai_id(index: usize) -> String {
    format!("{AI_ID_PREFIX}{index}")
}
