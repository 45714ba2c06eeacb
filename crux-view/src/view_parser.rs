//! Walks a preprocessed view and produces widget metadata or the host page.

use std::collections::HashSet;
use std::fmt::Write;

use crate::config::DEFAULT_LAZY_WIDGET_TYPES;
use crate::document::{Element, Node, ViewDocument, CORE_NS, TEMPLATE_NS, XHTML_NS};
use crate::error::{ViewError, ViewResult};
use crate::metadata::{is_event_attribute, ScreenDeclaration, ViewMetadata, WidgetDeclaration};

/// Prefix of ids generated for widgets declared without one.
pub const GENERATED_ID_PREFIX: &str = "_crux_";

const INDENT: &str = "  ";

/// Elements that never have content or a closing tag in HTML.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text is not entity-decoded by browsers.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements whose whitespace is significant.
const PRESERVED_ELEMENTS: &[&str] = &["pre", "textarea", "script", "style"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserMode {
    ExtractMetadata,
    GenerateHtml,
}

#[derive(Debug, Clone)]
pub struct ViewParser {
    view_id: String,
    mode: ParserMode,
    indent: bool,
    legacy_markup: bool,
    lazy_widget_types: Vec<String>,
}

impl ViewParser {
    pub fn new(view_id: &str, mode: ParserMode, indent: bool, legacy_markup: bool) -> Self {
        ViewParser {
            view_id: view_id.to_string(),
            mode,
            indent,
            legacy_markup,
            lazy_widget_types: DEFAULT_LAZY_WIDGET_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_lazy_widget_types(mut self, types: &[String]) -> Self {
        self.lazy_widget_types = types.to_vec();
        self
    }

    pub fn mode(&self) -> ParserMode {
        self.mode
    }

    fn expect_mode(&self, mode: ParserMode) -> ViewResult<()> {
        if self.mode != mode {
            return Err(ViewError::InvalidView(format!(
                "parser for view '{}' was created for {:?}",
                self.view_id, self.mode
            )));
        }
        Ok(())
    }

    // ─── Metadata ────────────────────────────────────────────────────────────

    /// Serialize the screen and widget declarations of `document` as JSON text.
    pub fn extract_crux_metadata(&self, document: &ViewDocument) -> ViewResult<String> {
        self.expect_mode(ParserMode::ExtractMetadata)?;

        let mut metadata = ViewMetadata::new(&self.view_id);
        let mut ids = WidgetIds::default();
        self.collect(document.root(), None, None, &mut ids, &mut metadata)?;

        tracing::debug!(
            "Extracted {} widget(s) from view '{}'",
            metadata.widgets.len(),
            self.view_id
        );

        let json = if self.indent {
            serde_json::to_string_pretty(&metadata)?
        } else {
            serde_json::to_string(&metadata)?
        };
        Ok(json)
    }

    fn collect(
        &self,
        element: &Element,
        parent: Option<&str>,
        lazy_ancestor: Option<&str>,
        ids: &mut WidgetIds,
        metadata: &mut ViewMetadata,
    ) -> ViewResult<()> {
        if self.is_screen(element) {
            if metadata.screen.is_some() {
                return Err(ViewError::MultipleScreens {
                    view_id: self.view_id.clone(),
                });
            }
            metadata.screen = Some(self.screen_declaration(element));
            return Ok(());
        }

        let Some(widget_type) = self.widget_type(element) else {
            for child in element.element_children() {
                self.collect(child, parent, lazy_ancestor, ids, metadata)?;
            }
            return Ok(());
        };

        let id = ids.resolve(self.declared_id(element))?;
        let mut declaration = WidgetDeclaration::new(&widget_type);
        for (name, value) in self.widget_attributes(element) {
            if is_event_attribute(&name) {
                declaration.events.insert(name, value.to_string());
            } else {
                declaration.attributes.insert(name, value.to_string());
            }
        }
        declaration.parent = parent.map(str::to_string);
        declaration.lazy_parent = lazy_ancestor.map(str::to_string);

        if let Some(parent_id) = parent {
            if let Some(parent_decl) = metadata.widgets.get_mut(parent_id) {
                parent_decl.children.push(id.clone());
            }
        }
        if let Some(lazy_id) = lazy_ancestor {
            metadata
                .lazy_dependencies
                .insert(id.clone(), lazy_id.to_string());
        }

        let lazy = self.is_lazy(&widget_type, element);
        metadata.widgets.insert(id.clone(), declaration);

        let child_lazy = if lazy { Some(id.as_str()) } else { lazy_ancestor };
        for child in element.element_children() {
            self.collect(child, Some(id.as_str()), child_lazy, ids, metadata)?;
        }
        Ok(())
    }

    fn screen_declaration(&self, element: &Element) -> ScreenDeclaration {
        let mut screen = ScreenDeclaration::default();
        for attr in element.attributes.iter().filter(|a| a.name.namespace.is_none()) {
            let name = self.normalize_attribute(&attr.name.local);
            if name == "type" || name == "id" {
                continue;
            }
            if is_event_attribute(&name) {
                screen.events.insert(name, attr.value.clone());
            } else {
                screen.attributes.insert(name, attr.value.clone());
            }
        }
        screen
    }

    // ─── Model helpers ───────────────────────────────────────────────────────

    fn is_screen(&self, element: &Element) -> bool {
        (element.name.is_in(CORE_NS) && element.local_name() == "screen")
            || (self.legacy_markup && element.attribute("_type") == Some("screen"))
    }

    fn widget_type(&self, element: &Element) -> Option<String> {
        if let Some(library) = element.name.widget_library() {
            return Some(format!("{}:{}", library, element.local_name()));
        }
        if self.legacy_markup {
            return element.attribute("_type").map(str::to_string);
        }
        None
    }

    fn declared_id<'e>(&self, element: &'e Element) -> Option<&'e str> {
        element.attribute("id").filter(|id| !id.is_empty())
    }

    fn normalize_attribute(&self, name: &str) -> String {
        if self.legacy_markup {
            name.strip_prefix('_').unwrap_or(name).to_string()
        } else {
            name.to_string()
        }
    }

    /// Unqualified attributes of a widget, minus `id` and the legacy `_type`.
    fn widget_attributes<'e>(&self, element: &'e Element) -> Vec<(String, &'e str)> {
        element
            .attributes
            .iter()
            .filter(|a| a.name.namespace.is_none())
            .filter(|a| a.name.local != "id" && a.name.local != "_type")
            .map(|a| (self.normalize_attribute(&a.name.local), a.value.as_str()))
            .collect()
    }

    fn is_lazy(&self, widget_type: &str, element: &Element) -> bool {
        let flag = if self.legacy_markup {
            element.attribute("_lazy").or_else(|| element.attribute("lazy"))
        } else {
            element.attribute("lazy")
        };
        self.lazy_widget_types.iter().any(|t| t == widget_type) || flag == Some("true")
    }

    // ─── Host page ───────────────────────────────────────────────────────────

    /// Write the host HTML page for `document`.
    pub fn generate_html_host_page<W: Write>(
        &self,
        document: &ViewDocument,
        out: &mut W,
    ) -> ViewResult<()> {
        self.expect_mode(ParserMode::GenerateHtml)?;

        out.write_str("<!DOCTYPE html>")?;
        let layout = if self.indent {
            out.write_char('\n')?;
            Layout::Indented(0)
        } else {
            Layout::Compact
        };
        let mut ids = WidgetIds::default();
        self.write_element(document.root(), layout, &mut ids, out)?;
        if self.indent {
            out.write_char('\n')?;
        }
        Ok(())
    }

    fn write_element<W: Write>(
        &self,
        element: &Element,
        layout: Layout,
        ids: &mut WidgetIds,
        out: &mut W,
    ) -> ViewResult<()> {
        if self.is_screen(element) {
            return Ok(());
        }
        if element.name.is_in(TEMPLATE_NS) {
            return Err(ViewError::InvalidView(format!(
                "unexpanded template invocation <{}> in view '{}'",
                element.local_name(),
                self.view_id
            )));
        }

        if let Some(widget_type) = self.widget_type(element) {
            let id = ids.resolve(self.declared_id(element))?;
            let attrs = vec![
                ("id".to_string(), id),
                ("class".to_string(), "crux-widget".to_string()),
                ("data-crux-type".to_string(), widget_type),
            ];
            return self.write_tag("div", &attrs, element, layout, ids, out, None);
        }

        let is_html = element.name.namespace.is_none() || element.name.is_in(XHTML_NS);
        if !is_html {
            // Elements of foreign namespaces are transparent.
            for child in element.element_children() {
                self.write_element(child, layout, ids, out)?;
            }
            return Ok(());
        }

        let attrs: Vec<(String, String)> = element
            .attributes
            .iter()
            .filter(|a| a.name.namespace.is_none())
            .map(|a| (a.name.local.clone(), a.value.clone()))
            .collect();

        let trailer = (element.local_name() == "head").then(|| {
            format!(
                "<meta name=\"crux-view\" content=\"{}\">",
                escape_html(&self.view_id)
            )
        });
        self.write_tag(element.local_name(), &attrs, element, layout, ids, out, trailer)
    }

    #[allow(clippy::too_many_arguments)]
    fn write_tag<W: Write>(
        &self,
        tag: &str,
        attrs: &[(String, String)],
        element: &Element,
        layout: Layout,
        ids: &mut WidgetIds,
        out: &mut W,
        trailer: Option<String>,
    ) -> ViewResult<()> {
        if matches!(layout, Layout::Indented(depth) if depth > 0) {
            newline(layout, out)?;
        }
        write!(out, "<{}", tag)?;
        for (name, value) in attrs {
            write!(out, " {}=\"{}\"", name, escape_html(value))?;
        }
        out.write_char('>')?;

        if VOID_ELEMENTS.contains(&tag) {
            return Ok(());
        }

        let inner = layout.enter(tag);
        let raw = RAW_TEXT_ELEMENTS.contains(&tag);
        let mixed = element.element_children().next().is_some() || trailer.is_some();
        for child in &element.children {
            match child {
                Node::Element(e) => self.write_element(e, inner, ids, out)?,
                Node::Text(text) => write_text(text, raw, inner, mixed, out)?,
            }
        }
        if let Some(trailer) = trailer {
            newline(inner, out)?;
            out.write_str(&trailer)?;
        }
        if mixed && matches!(inner, Layout::Indented(_)) {
            newline(layout, out)?;
        }
        write!(out, "</{}>", tag)?;
        Ok(())
    }
}

/// Whitespace layout of the host page at some point of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// One element per line, indented by depth.
    Indented(usize),
    /// No layout whitespace between elements.
    Compact,
    /// Content of `pre`, `textarea`, `script` and `style`, copied as is.
    Preserved,
}

impl Layout {
    /// Layout of the content of a `tag` element laid out with `self`.
    fn enter(self, tag: &str) -> Layout {
        match self {
            _ if PRESERVED_ELEMENTS.contains(&tag) => Layout::Preserved,
            Layout::Indented(depth) => Layout::Indented(depth + 1),
            other => other,
        }
    }
}

fn newline<W: Write>(layout: Layout, out: &mut W) -> ViewResult<()> {
    if let Layout::Indented(depth) = layout {
        out.write_char('\n')?;
        for _ in 0..depth {
            out.write_str(INDENT)?;
        }
    }
    Ok(())
}

/// Writes a text child. `mixed` tells whether it sits next to element siblings.
fn write_text<W: Write>(
    text: &str,
    raw: bool,
    layout: Layout,
    mixed: bool,
    out: &mut W,
) -> ViewResult<()> {
    match layout {
        Layout::Preserved if raw => out.write_str(text)?,
        Layout::Preserved => out.write_str(&escape_html(text))?,
        Layout::Indented(_) if mixed => {
            let trimmed = text.trim_matches(|c: char| c.is_ascii_whitespace());
            if !trimmed.is_empty() {
                newline(layout, out)?;
                out.write_str(&escape_html(trimmed))?;
            }
        }
        _ if is_layout_whitespace(text) => {}
        _ => out.write_str(&escape_html(text))?,
    }
    Ok(())
}

/// Line breaks and indentation of the view source, as opposed to spaces
/// separating inline content. `&nbsp;` is content.
fn is_layout_whitespace(text: &str) -> bool {
    text.contains('\n') && text.chars().all(|c| c.is_ascii_whitespace())
}

/// Hands out widget ids in document order, generating missing ones.
#[derive(Debug, Default)]
struct WidgetIds {
    seen: HashSet<String>,
    generated: usize,
}

impl WidgetIds {
    fn resolve(&mut self, declared: Option<&str>) -> ViewResult<String> {
        match declared {
            Some(id) => {
                if !self.seen.insert(id.to_string()) {
                    return Err(ViewError::DuplicateWidgetId { id: id.to_string() });
                }
                Ok(id.to_string())
            }
            None => loop {
                let id = format!("{}{}", GENERATED_ID_PREFIX, self.generated);
                self.generated += 1;
                if self.seen.insert(id.clone()) {
                    return Ok(id);
                }
            },
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
