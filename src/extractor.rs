//! Turns annotated HTML into the element list the decision oracle sees.
//!
//! Extraction is lenient: malformed markup still yields whatever tagged
//! elements the parser recovers, and nothing here returns an error.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::dom_scripts::{AI_ID_ATTRIBUTE, AI_ID_PREFIX, INTERACTIVE_SELECTOR, ai_id};
use crate::types::{ElementDescriptor, NO_TITLE};

/// Elements and page title recovered from one HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub elements: Vec<ElementDescriptor>,
    pub title: String,
}

/// Parse `html` and return every tagged interactive element in document
/// order together with the document title.
///
/// Only elements matching the interactive selector whose `data-ai-id` is a
/// well-formed `ai-id-<n>` count; the first element carrying an id wins.
///
/// Anchor hrefs are resolved against `base_url`; an href that cannot be
/// resolved is kept as written.
pub fn extract(html: &str, base_url: &str) -> ExtractedPage {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    ExtractedPage {
        elements: tagged_elements(&document, base.as_ref()),
        title: document_title(&document),
    }
}

fn tagged_elements(document: &Html, base: Option<&Url>) -> Vec<ElementDescriptor> {
    let Ok(selector) = Selector::parse(INTERACTIVE_SELECTOR) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    document
        .select(&selector)
        .filter_map(|element| describe(element, base))
        .filter(|descriptor| seen.insert(descriptor.id.clone()))
        .collect()
}

/// Accept only canonical synthetic ids such as `ai-id-3`.
fn synthetic_id(raw: &str) -> Option<&str> {
    let id = raw.trim();
    let index = id.strip_prefix(AI_ID_PREFIX)?.parse::<usize>().ok()?;
    (ai_id(index) == id).then_some(id)
}

fn describe(element: ElementRef<'_>, base: Option<&Url>) -> Option<ElementDescriptor> {
    let node = element.value();
    let id = synthetic_id(node.attr(AI_ID_ATTRIBUTE)?)?;
    let tag = node.name().to_ascii_lowercase();
    let mut descriptor = ElementDescriptor::new(id, tag.as_str());

    let text = element.text().collect::<String>();
    let text = text.trim();
    if !text.is_empty() {
        descriptor = descriptor.with_text(text);
    }

    match (tag.as_str(), node.attr("href"), node.attr("placeholder")) {
        ("a", Some(href), _) => descriptor = descriptor.with_href(resolve_href(href, base)),
        ("input", _, Some(placeholder)) => descriptor = descriptor.with_placeholder(placeholder),
        _ => {}
    }

    Some(descriptor)
}

/// Resolve `href` against `base` with standard URL joining, falling back to
/// the raw value.
pub fn resolve_href(href: &str, base: Option<&Url>) -> String {
    let joined = match base {
        Some(base) => base.join(href),
        None => Url::parse(href),
    };
    joined
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_string())
}

fn document_title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return NO_TITLE.to_string();
    };

    document
        .select(&selector)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://shop.example.com/catalog/index.html";

    #[test]
    fn returns_tagged_elements_in_document_order() {
        let html = r#"
            <html><head><title>  Catalog </title></head><body>
              <a data-ai-id="ai-id-0" href="/contact">Contact</a>
              <div><button data-ai-id="ai-id-1">  Buy   now </button></div>
              <input data-ai-id="ai-id-2" type="search" placeholder="Search products">
              <span>untagged</span>
              <input data-ai-id="ai-id-3" type="submit" value="Go">
            </body></html>
        "#;

        let page = extract(html, BASE);
        assert_eq!(page.title, "Catalog");
        let ids: Vec<_> = page.elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["ai-id-0", "ai-id-1", "ai-id-2", "ai-id-3"]);

        let contact = &page.elements[0];
        assert_eq!(contact.tag, "a");
        assert_eq!(contact.text.as_deref(), Some("Contact"));
        assert_eq!(
            contact.href.as_deref(),
            Some("https://shop.example.com/contact")
        );
        assert!(contact.placeholder.is_none());

        let button = &page.elements[1];
        assert_eq!(button.text.as_deref(), Some("Buy   now"));
        assert!(button.href.is_none());

        let search = &page.elements[2];
        assert_eq!(search.tag, "input");
        assert!(search.text.is_none());
        assert_eq!(search.placeholder.as_deref(), Some("Search products"));

        assert!(page.elements[3].placeholder.is_none());
    }

    #[test]
    fn relative_hrefs_follow_url_join_semantics() {
        let html = r#"<body>
            <a data-ai-id="ai-id-0" href="details/42">Item</a>
            <a data-ai-id="ai-id-1" href="../about">About</a>
            <a data-ai-id="ai-id-2" href="https://other.example.org/x?y=1">Other</a>
            <a data-ai-id="ai-id-3">No href</a>
        </body>"#;

        let page = extract(html, BASE);
        let base = Url::parse(BASE).expect("base");
        assert_eq!(
            page.elements[0].href.as_deref(),
            Some(base.join("details/42").expect("join").as_str())
        );
        assert_eq!(
            page.elements[1].href.as_deref(),
            Some("https://shop.example.com/about")
        );
        assert_eq!(
            page.elements[2].href.as_deref(),
            Some("https://other.example.org/x?y=1")
        );
        assert!(page.elements[3].href.is_none());
    }

    #[test]
    fn unresolvable_hrefs_are_kept_verbatim() {
        let html = r#"<a data-ai-id="ai-id-0" href="/relative">x</a>"#;
        let page = extract(html, "not a url");
        assert_eq!(page.elements[0].href.as_deref(), Some("/relative"));
    }

    #[test]
    fn missing_or_blank_title_falls_back() {
        assert_eq!(extract("<p>hi</p>", BASE).title, NO_TITLE);
        assert_eq!(
            extract("<head><title>   </title></head>", BASE).title,
            NO_TITLE
        );
    }

    #[test]
    fn malformed_markup_does_not_fail() {
        let page = extract(r#"<a data-ai-id="ai-id-0" href="/x">open <b>bold"#, BASE);
        assert_eq!(page.elements.len(), 1);
        assert_eq!(page.elements[0].text.as_deref(), Some("open bold"));
        assert!(extract("", BASE).elements.is_empty());
    }

    #[test]
    fn page_authored_ids_do_not_produce_duplicates() {
        let html = r#"<body>
            <div data-ai-id="ai-id-0">page-authored</div>
            <a data-ai-id="ai-id-0" href="/x">X</a>
            <a data-ai-id="ai-id-0" href="/y">Y</a>
            <button data-ai-id="custom">Odd</button>
            <a data-ai-id="ai-id-01" href="/z">Z</a>
            <input data-ai-id="ai-id-1" type="text" placeholder="Name">
        </body>"#;

        let page = extract(html, BASE);
        let pairs: Vec<_> = page
            .elements
            .iter()
            .map(|e| (e.id.as_str(), e.tag.as_str()))
            .collect();
        assert_eq!(pairs, [("ai-id-0", "a"), ("ai-id-1", "input")]);
        assert_eq!(
            page.elements[0].href.as_deref(),
            Some("https://shop.example.com/x")
        );
        assert_eq!(page.elements[1].placeholder.as_deref(), Some("Name"));
    }
}
