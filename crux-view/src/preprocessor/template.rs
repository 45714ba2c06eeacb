//! Template inclusion.
//!
//! A template file looks like:
//! ```xml
//! <t:template xmlns:t="http://www.cruxframework.org/templates"
//!             xmlns="http://www.w3.org/1999/xhtml">
//!   <div class="#{styleName}">
//!     <t:section name="content"/>
//!   </div>
//! </t:template>
//! ```
//! and is invoked from a view as
//! ```xml
//! <t:box styleName="framed"><t:content><span>Hi</span></t:content></t:box>
//! ```

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use super::ViewPreprocessor;
use crate::document::{Element, Node, ViewDocument, TEMPLATE_NS};
use crate::error::{ViewError, ViewResult};
use crate::factory::XmlParserFactory;

const SECTION: &str = "section";

/// Source of template documents, looked up by template name.
pub trait TemplateLoader: Send + Sync + fmt::Debug {
    /// `Ok(None)` when no template with that name exists.
    fn load_template(&self, name: &str, device: &str) -> ViewResult<Option<ViewDocument>>;
}

/// Loads `<dir>/<name>.<device>.template.xml`, falling back to `<dir>/<name>.template.xml`.
#[derive(Debug, Clone)]
pub struct DirectoryTemplateLoader {
    dir: PathBuf,
}

impl DirectoryTemplateLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectoryTemplateLoader { dir: dir.into() }
    }
}

impl TemplateLoader for DirectoryTemplateLoader {
    fn load_template(&self, name: &str, device: &str) -> ViewResult<Option<ViewDocument>> {
        let candidates = [
            self.dir.join(format!("{}.{}.template.xml", name, device)),
            self.dir.join(format!("{}.template.xml", name)),
        ];

        for path in candidates {
            if path.is_file() {
                tracing::debug!("Loading template '{}' from {}", name, path.display());
                let source = std::fs::read_to_string(&path)?;
                return XmlParserFactory::shared().parse(&source).map(Some);
            }
        }
        Ok(None)
    }
}

/// Templates kept as source strings, parsed on each load.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateLoader {
    sources: HashMap<String, String>,
}

impl InMemoryTemplateLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, name: &str, source: &str) -> Self {
        self.sources.insert(name.to_string(), source.to_string());
        self
    }
}

impl TemplateLoader for InMemoryTemplateLoader {
    fn load_template(&self, name: &str, _device: &str) -> ViewResult<Option<ViewDocument>> {
        self.sources
            .get(name)
            .map(|source| XmlParserFactory::shared().parse(source))
            .transpose()
    }
}

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| Regex::new(r"#\{([A-Za-z_][\w.-]*)\}").unwrap())
}

/// Replaces template invocations with the invoked template's content.
#[derive(Debug)]
pub struct TemplatePreprocessor {
    loader: Arc<dyn TemplateLoader>,
}

impl TemplatePreprocessor {
    pub const KEY: &'static str = "templates";

    pub fn new(loader: Arc<dyn TemplateLoader>) -> Self {
        TemplatePreprocessor { loader }
    }

    fn expand_children(
        &self,
        element: &mut Element,
        device: &str,
        stack: &mut Vec<String>,
    ) -> ViewResult<()> {
        let children = std::mem::take(&mut element.children);
        for child in children {
            match child {
                Node::Element(e) if e.name.is_in(TEMPLATE_NS) => {
                    let expanded = self.expand_invocation(e, device, stack)?;
                    element.children.extend(expanded);
                }
                Node::Element(mut e) => {
                    self.expand_children(&mut e, device, stack)?;
                    element.children.push(Node::Element(e));
                }
                text => element.children.push(text),
            }
        }
        Ok(())
    }

    fn expand_invocation(
        &self,
        mut invocation: Element,
        device: &str,
        stack: &mut Vec<String>,
    ) -> ViewResult<Vec<Node>> {
        let name = invocation.local_name().to_string();
        if stack.contains(&name) {
            return Err(ViewError::CircularTemplate { name });
        }

        let template = self
            .loader
            .load_template(&name, device)?
            .ok_or_else(|| ViewError::TemplateNotFound { name: name.clone() })?;

        let params: HashMap<String, String> = invocation
            .attributes
            .iter()
            .filter(|a| a.name.namespace.is_none())
            .map(|a| (a.name.local.clone(), a.value.clone()))
            .collect();

        // Section content belongs to the invoking view, so it is expanded in
        // the caller's context before being pasted into the template.
        let mut sections: HashMap<String, Vec<Node>> = HashMap::new();
        for child in std::mem::take(&mut invocation.children) {
            if let Node::Element(mut section) = child {
                if section.name.is_in(TEMPLATE_NS) {
                    self.expand_children(&mut section, device, stack)?;
                    sections.insert(section.name.local.clone(), section.children);
                }
            }
        }

        let mut body = template.into_root();
        fill_template(&mut body, &params, &sections);

        stack.push(name);
        self.expand_children(&mut body, device, stack)?;
        stack.pop();

        Ok(body.children)
    }
}

impl ViewPreprocessor for TemplatePreprocessor {
    fn name(&self) -> &str {
        Self::KEY
    }

    fn preprocess(&self, mut document: ViewDocument, device: &str) -> ViewResult<ViewDocument> {
        if !contains_invocation(document.root()) {
            return Ok(document);
        }
        let mut stack = Vec::new();
        self.expand_children(document.root_mut(), device, &mut stack)?;
        Ok(document)
    }
}

fn contains_invocation(element: &Element) -> bool {
    element
        .element_children()
        .any(|c| c.name.is_in(TEMPLATE_NS) || contains_invocation(c))
}

/// Substitute `#{param}` placeholders and paste section content.
/// Unknown parameters expand to an empty string; unknown sections to nothing.
fn fill_template(
    element: &mut Element,
    params: &HashMap<String, String>,
    sections: &HashMap<String, Vec<Node>>,
) {
    for attr in &mut element.attributes {
        attr.value = substitute(&attr.value, params);
    }

    let children = std::mem::take(&mut element.children);
    for child in children {
        match child {
            Node::Element(e) if e.name.is_in(TEMPLATE_NS) && e.local_name() == SECTION => {
                if let Some(content) = e.attribute("name").and_then(|n| sections.get(n)) {
                    element.children.extend(content.iter().cloned());
                }
            }
            Node::Element(mut e) => {
                fill_template(&mut e, params, sections);
                element.children.push(Node::Element(e));
            }
            Node::Text(t) => element.children.push(Node::Text(substitute(&t, params))),
        }
    }
}

fn substitute(text: &str, params: &HashMap<String, String>) -> String {
    if !text.contains("#{") {
        return text.to_string();
    }
    placeholder()
        .replace_all(text, |caps: &Captures| {
            params.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BOX_TEMPLATE: &str = r##"<t:template xmlns:t="http://www.cruxframework.org/templates" xmlns="http://www.w3.org/1999/xhtml">
  <div class="#{styleName}"><t:section name="content"/></div>
</t:template>"##;

    fn preprocess(loader: InMemoryTemplateLoader, view: &str) -> ViewResult<ViewDocument> {
        let stage = TemplatePreprocessor::new(Arc::new(loader));
        let doc = XmlParserFactory::shared().parse(view)?;
        stage.preprocess(doc, "all")
    }

    #[test]
    fn test_expands_invocation_with_params_and_sections() {
        let loader = InMemoryTemplateLoader::new().with_template("box", BOX_TEMPLATE);
        let view = r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:t="http://www.cruxframework.org/templates">
  <body><t:box styleName="framed"><t:content><span>Hi</span></t:content></t:box></body>
</html>"#;
        let doc = preprocess(loader, view).unwrap();
        let body = doc.root().element_children().next().unwrap();
        let div = body.element_children().next().unwrap();
        assert_eq!(div.local_name(), "div");
        assert_eq!(div.attribute("class"), Some("framed"));
        let span = div.element_children().next().unwrap();
        assert_eq!(span.local_name(), "span");
        assert_eq!(span.text_content(), "Hi");
    }

    #[test]
    fn test_nested_invocation_of_same_template_in_section() {
        let loader = InMemoryTemplateLoader::new().with_template("box", BOX_TEMPLATE);
        let view = r#"<body xmlns:t="http://www.cruxframework.org/templates">
  <t:box styleName="outer"><t:content><t:box styleName="inner"/></t:content></t:box>
</body>"#;
        let doc = preprocess(loader, view).unwrap();
        let outer = doc.root().element_children().next().unwrap();
        let inner = outer.element_children().next().unwrap();
        assert_eq!(outer.attribute("class"), Some("outer"));
        assert_eq!(inner.attribute("class"), Some("inner"));
    }

    #[test]
    fn test_missing_template() {
        let view = r#"<body xmlns:t="http://www.cruxframework.org/templates"><t:nope/></body>"#;
        let result = preprocess(InMemoryTemplateLoader::new(), view);
        assert!(matches!(result, Err(ViewError::TemplateNotFound { name }) if name == "nope"));
    }

    #[test]
    fn test_circular_template() {
        let looping = r#"<t:template xmlns:t="http://www.cruxframework.org/templates"><t:loop/></t:template>"#;
        let loader = InMemoryTemplateLoader::new().with_template("loop", looping);
        let view = r#"<body xmlns:t="http://www.cruxframework.org/templates"><t:loop/></body>"#;
        let result = preprocess(loader, view);
        assert!(matches!(result, Err(ViewError::CircularTemplate { .. })));
    }

    #[test]
    fn test_document_without_invocations_unchanged() {
        let view = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><p>x</p></body></html>"#;
        let original = XmlParserFactory::shared().parse(view).unwrap();
        let doc = preprocess(InMemoryTemplateLoader::new(), view).unwrap();
        assert_eq!(doc, original);
    }

    #[test]
    fn test_substitute_unknown_param_is_empty() {
        let mut params = HashMap::new();
        params.insert("a".to_string(), "1".to_string());
        assert_eq!(substitute("x#{a}y#{b}z", &params), "x1yz");
    }
}
