//! Shared view parser with the offline entity table for `crux-view.dtd`.

use std::sync::OnceLock;

use roxmltree::ParsingOptions;

use crate::document::ViewDocument;
use crate::error::{ViewError, ViewResult};

/// System id fragment identifying the view DTD.
pub const VIEW_DTD: &str = "crux-view.dtd";

/// Entities the view DTD declares. Substituted instead of fetching the DTD.
pub const VIEW_ENTITIES: &[(&str, &str)] = &[
    ("quot", "&#34;"),
    ("amp", "&#38;"),
    ("apos", "&#39;"),
    ("lt", "&#60;"),
    ("gt", "&#62;"),
    ("nbsp", "&#160;"),
];

/// Entities every XML parser already knows; redeclaring them is not allowed
/// by all parsers, so they are left out of the generated internal subset.
const XML_PREDEFINED: &[&str] = &["quot", "amp", "apos", "lt", "gt"];

static SHARED: OnceLock<XmlParserFactory> = OnceLock::new();

/// Parses raw view sources into [`ViewDocument`]s.
///
/// One instance is shared by every `ViewProcessor` in the process; it holds no
/// mutable state once built.
#[derive(Debug)]
pub struct XmlParserFactory {
    entity_subset: String,
}

impl XmlParserFactory {
    /// The process-wide factory, built on first use.
    pub fn shared() -> &'static XmlParserFactory {
        SHARED.get_or_init(|| {
            tracing::debug!("Initializing shared view parser factory");
            XmlParserFactory::new()
        })
    }

    fn new() -> Self {
        let entity_subset = VIEW_ENTITIES
            .iter()
            .filter(|(name, _)| !XML_PREDEFINED.contains(name))
            .map(|(name, value)| format!("<!ENTITY {} \"{}\">", name, value))
            .collect();

        XmlParserFactory { entity_subset }
    }

    /// Parse a view source into an owned document.
    pub fn parse(&self, source: &str) -> ViewResult<ViewDocument> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let resolved = self.resolve_entities(source)?;

        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(&resolved, options)?;
        Ok(ViewDocument::from_xml(&doc))
    }

    /// Replace a doctype that points at the view DTD with an internal subset
    /// declaring the fixed entity table. Other doctypes are left untouched.
    fn resolve_entities<'a>(&self, source: &'a str) -> ViewResult<std::borrow::Cow<'a, str>> {
        let Some(doctype) = find_doctype(source)? else {
            return Ok(source.into());
        };

        let declaration = &source[doctype.start..doctype.end];
        if !declaration.contains(VIEW_DTD) {
            return Ok(source.into());
        }

        let replaced = format!(
            "{}<!DOCTYPE {} [{}]>{}",
            &source[..doctype.start],
            doctype.root_name,
            self.entity_subset,
            &source[doctype.end..]
        );
        Ok(replaced.into())
    }
}

struct DoctypeSpan<'a> {
    start: usize,
    end: usize,
    root_name: &'a str,
}

/// Locate `<!DOCTYPE ...>` honoring quoted literals and an internal subset.
fn find_doctype(source: &str) -> ViewResult<Option<DoctypeSpan<'_>>> {
    let Some(start) = source.find("<!DOCTYPE") else {
        return Ok(None);
    };

    let after = start + "<!DOCTYPE".len();
    let rest = source[after..].trim_start();
    let name_start = source.len() - rest.len();
    let name_len = rest
        .find(|c: char| c.is_whitespace() || c == '[' || c == '>')
        .unwrap_or(rest.len());
    let root_name = &source[name_start..name_start + name_len];
    if root_name.is_empty() {
        return Err(ViewError::XmlError("DOCTYPE declaration without a root name".to_string()));
    }

    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    for (offset, c) in source[name_start..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '>') if depth == 0 => {
                return Ok(Some(DoctypeSpan {
                    start,
                    end: name_start + offset + 1,
                    root_name,
                }));
            }
            _ => {}
        }
    }

    Err(ViewError::XmlError("Unterminated DOCTYPE declaration".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_is_single_instance() {
        let a = XmlParserFactory::shared() as *const XmlParserFactory;
        let b = XmlParserFactory::shared() as *const XmlParserFactory;
        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_initializes_once_across_threads() {
        let addresses: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| XmlParserFactory::shared() as *const XmlParserFactory as usize))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(addresses.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_view_dtd_entities_resolved_offline() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//CRUX//DTD VIEW 1.0//EN" "http://www.cruxframework.org/crux-view.dtd">
<html xmlns="http://www.w3.org/1999/xhtml"><body><p>a&nbsp;b &amp; c</p></body></html>"#;
        let doc = XmlParserFactory::shared().parse(xml).unwrap();
        assert_eq!(doc.root().text_content(), "a\u{a0}b & c");
    }

    #[test]
    fn test_document_without_doctype() {
        let doc = XmlParserFactory::shared().parse("<view><x/></view>").unwrap();
        assert_eq!(doc.root().local_name(), "view");
    }

    #[test]
    fn test_unknown_entity_without_view_dtd_fails() {
        let result = XmlParserFactory::shared().parse("<p>a&nbsp;b</p>");
        assert!(matches!(result, Err(ViewError::XmlError(_))));
    }

    #[test]
    fn test_malformed_xml() {
        let result = XmlParserFactory::shared().parse("<html><body></html>");
        assert!(result.is_err());
    }

    #[test]
    fn test_find_doctype_with_internal_subset() {
        let src = r#"<!DOCTYPE v [<!ENTITY x "a>b">]><v/>"#;
        let span = find_doctype(src).unwrap().unwrap();
        assert_eq!(span.root_name, "v");
        assert_eq!(&src[span.end..], "<v/>");
    }
}
