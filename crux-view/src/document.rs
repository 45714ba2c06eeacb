//! Owned, mutable view document tree.
//!
//! `roxmltree` documents are read-only and borrow their source text, while
//! preprocessors need to rewrite the tree and hand it to the next stage. The
//! parser factory therefore converts every parsed document into this owned
//! form right after parsing.

use roxmltree::Node as XmlNode;

/// XHTML namespace used by the host markup of a view.
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Core namespace: `<c:screen>` and core attributes such as `c:devices`.
pub const CORE_NS: &str = "http://www.cruxframework.org/crux";

/// Widget libraries live under `http://www.cruxframework.org/crux/<library>`.
pub const WIDGET_NS_PREFIX: &str = "http://www.cruxframework.org/crux/";

/// Namespace of template invocations and template files.
pub const TEMPLATE_NS: &str = "http://www.cruxframework.org/templates";

/// Namespace-qualified element or attribute name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: Option<&str>, local: &str) -> Self {
        QName {
            namespace: namespace.map(str::to_string),
            local: local.to_string(),
        }
    }

    /// Unqualified name (no namespace).
    pub fn local(local: &str) -> Self {
        QName::new(None, local)
    }

    pub fn is_in(&self, namespace: &str) -> bool {
        self.namespace.as_deref() == Some(namespace)
    }

    /// Returns the library name when this name belongs to a widget library namespace.
    pub fn widget_library(&self) -> Option<&str> {
        self.namespace
            .as_deref()
            .and_then(|ns| ns.strip_prefix(WIDGET_NS_PREFIX))
            .filter(|lib| !lib.is_empty() && !lib.contains('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(namespace: Option<&str>, local: &str) -> Self {
        Element {
            name: QName::new(namespace, local),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        &self.name.local
    }

    /// Value of an unqualified attribute.
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace.is_none() && a.name.local == local)
            .map(|a| a.value.as_str())
    }

    /// Value of a namespace-qualified attribute.
    pub fn attribute_ns(&self, namespace: &str, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.is_in(namespace) && a.name.local == local)
            .map(|a| a.value.as_str())
    }

    /// Sets an unqualified attribute, replacing any previous value.
    pub fn set_attribute(&mut self, local: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name.namespace.is_none() && a.name.local == local)
        {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute {
                name: QName::local(local),
                value,
            }),
        }
    }

    /// Removes an attribute; `namespace` of `None` targets unqualified attributes.
    pub fn remove_attribute(&mut self, namespace: Option<&str>, local: &str) -> Option<String> {
        let pos = self
            .attributes
            .iter()
            .position(|a| a.name.namespace.as_deref() == namespace && a.name.local == local)?;
        Some(self.attributes.remove(pos).value)
    }

    pub fn push_element(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    /// Iterator over element children (skips text nodes).
    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Depth-first search over this element and its descendants.
    pub fn find(&self, predicate: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if predicate(self) {
            return Some(self);
        }
        self.element_children().find_map(|c| c.find(predicate))
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
        }
    }
}

/// A parsed view file, owned and mutable.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDocument {
    root: Element,
}

impl ViewDocument {
    pub fn new(root: Element) -> Self {
        ViewDocument { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn into_root(self) -> Element {
        self.root
    }

    /// Copies a `roxmltree` document into an owned tree.
    ///
    /// Comments and processing instructions are dropped. Text is kept as
    /// is, whitespace included; the page writer decides what is layout.
    pub fn from_xml(doc: &roxmltree::Document) -> Self {
        ViewDocument {
            root: convert_element(doc.root_element()),
        }
    }
}

fn convert_element(node: XmlNode) -> Element {
    let tag = node.tag_name();
    let mut element = Element::new(tag.namespace(), tag.name());

    element.attributes = node
        .attributes()
        .map(|a| Attribute {
            name: QName::new(a.namespace(), a.name()),
            value: a.value().to_string(),
        })
        .collect();

    for child in node.children() {
        if child.is_element() {
            element.push_element(convert_element(child));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                element.push_text(text);
            }
        }
    }

    element
}
