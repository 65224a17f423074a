use scraper::{Html, Selector};
use std::sync::LazyLock;

/// Elements whose attributes can point at other pages or assets.
pub const LINK_TAGS: &str = "a, img, script, link, source";

/// Attributes inspected on every [`LINK_TAGS`] element, in order.
pub const LINK_ATTRIBUTES: [&str; 2] = ["href", "src"];

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(LINK_TAGS).expect("link selector is valid"));

/// One `(tag, attribute, value)` triple pulled out of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAttr {
    pub tag: String,
    pub attribute: &'static str,
    pub value: String,
}

/// Extracts link attributes in document order.
///
/// Parsing is best effort: malformed markup yields whatever html5ever
/// recovers. The document is dropped before returning because `Html` is not
/// `Send`.
pub fn extract_link_attrs(body: &str) -> Vec<LinkAttr> {
    let document = Html::parse_document(body);

    let mut attrs = Vec::new();
    for element in document.select(&LINK_SELECTOR) {
        let tag = element.value().name();
        for attribute in LINK_ATTRIBUTES {
            if let Some(value) = element.value().attr(attribute) {
                attrs.push(LinkAttr {
                    tag: tag.to_string(),
                    attribute,
                    value: value.to_string(),
                });
            }
        }
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_href_and_src_in_order() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/s.css">
            <script src="/app.js"></script>
        </head><body>
            <a href="/a">A</a>
            <img src="/logo.png">
            <video><source src="/clip.mp4"></video>
            <form action="/ignored"></form>
        </body></html>"#;

        let attrs = extract_link_attrs(html);
        let values: Vec<&str> = attrs.iter().map(|a| a.value.as_str()).collect();
        assert_eq!(values, vec!["/s.css", "/app.js", "/a", "/logo.png", "/clip.mp4"]);
        assert_eq!(attrs[0].tag, "link");
        assert_eq!(attrs[0].attribute, "href");
        assert_eq!(attrs[3].attribute, "src");
    }

    #[test]
    fn test_anchor_without_href_is_ignored() {
        let attrs = extract_link_attrs(r#"<a name="top">x</a><a href="/b">b</a>"#);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].value, "/b");
    }

    #[test]
    fn test_malformed_markup_is_tolerated() {
        let attrs = extract_link_attrs(r#"<div><a href="/x">unclosed <img src="/y.png"<p>"#);
        assert!(attrs.iter().any(|a| a.value == "/x"));
    }

    #[test]
    fn test_empty_body() {
        assert!(extract_link_attrs("").is_empty());
    }
}
