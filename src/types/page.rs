use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Title reported when a document has no usable `<title>`.
pub const NO_TITLE: &str = "No Title";

/// One interactive DOM node exposed to the decision oracle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElementDescriptor {
    /// Synthetic `ai-id-<n>` identifier, unique within one snapshot.
    #[serde(rename = "ai_id", alias = "id")]
    pub id: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl ElementDescriptor {
    pub fn new(id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            text: None,
            href: None,
            placeholder: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }
}

/// Extracted state of one rendered page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSnapshot {
    /// URL after redirects.
    pub current_url: String,
    pub title: String,
    /// Interactive elements in document order.
    pub elements: Vec<ElementDescriptor>,
    /// Annotated HTML as returned by the tagging script.
    pub html: String,
}

impl PageSnapshot {
    pub fn element(&self, id: &str) -> Option<&ElementDescriptor> {
        find_element(&self.elements, id)
    }
}

/// Look up an element by its synthetic identifier.
pub fn find_element<'a>(elements: &'a [ElementDescriptor], id: &str) -> Option<&'a ElementDescriptor> {
    elements.iter().find(|element| element.id == id)
}

/// Schema-free JSON produced by the extraction oracle, returned as parsed.
pub type ExtractionResult = Value;
