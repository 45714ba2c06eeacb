//! In-memory model of the host page the screen runtime works on.
//!
//! Elements are shared handles: cloning a [`HostElement`] yields another
//! handle to the same node, and equality is node identity.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

#[derive(Default)]
struct ElementData {
    tag: String,
    attributes: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    class_name: String,
    children: Vec<HostElement>,
    parent: Weak<RefCell<ElementData>>,
    client_width: u32,
    client_height: u32,
    scroll_width: u32,
    scroll_height: u32,
}

#[derive(Clone)]
pub struct HostElement(Rc<RefCell<ElementData>>);

impl HostElement {
    pub fn new(tag: &str) -> Self {
        HostElement(Rc::new(RefCell::new(ElementData {
            tag: tag.to_ascii_lowercase(),
            ..ElementData::default()
        })))
    }

    pub fn tag(&self) -> String {
        self.0.borrow().tag.clone()
    }

    pub fn id(&self) -> Option<String> {
        self.attribute("id")
    }

    pub fn set_id(&self, id: &str) {
        self.set_attribute("id", id);
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.borrow().attributes.get(name).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .borrow_mut()
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    pub fn class_name(&self) -> String {
        self.0.borrow().class_name.clone()
    }

    pub fn set_class_name(&self, class_name: &str) {
        self.0.borrow_mut().class_name = class_name.to_string();
    }

    /// Inline style property; an empty value reads as unset.
    pub fn style(&self, property: &str) -> Option<String> {
        self.0
            .borrow()
            .style
            .get(property)
            .filter(|v| !v.is_empty())
            .cloned()
    }

    /// Sets an inline style property. An empty value clears it.
    pub fn set_style(&self, property: &str, value: &str) {
        let mut data = self.0.borrow_mut();
        if value.is_empty() {
            data.style.remove(property);
        } else {
            data.style.insert(property.to_string(), value.to_string());
        }
    }

    pub fn set_style_px(&self, property: &str, value: u32) {
        self.set_style(property, &format!("{}px", value));
    }

    pub fn set_visible(&self, visible: bool) {
        self.set_style("display", if visible { "block" } else { "none" });
    }

    pub fn is_visible(&self) -> bool {
        self.style("display").as_deref() != Some("none")
    }

    pub fn client_size(&self) -> (u32, u32) {
        let data = self.0.borrow();
        (data.client_width, data.client_height)
    }

    pub fn set_client_size(&self, width: u32, height: u32) {
        let mut data = self.0.borrow_mut();
        data.client_width = width;
        data.client_height = height;
    }

    pub fn scroll_size(&self) -> (u32, u32) {
        let data = self.0.borrow();
        (data.scroll_width, data.scroll_height)
    }

    pub fn set_scroll_size(&self, width: u32, height: u32) {
        let mut data = self.0.borrow_mut();
        data.scroll_width = width;
        data.scroll_height = height;
    }

    /// Appends `child`, detaching it from its current parent first.
    pub fn append_child(&self, child: &HostElement) {
        child.remove_from_parent();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
    }

    /// Returns false when `child` is not a child of this element.
    pub fn remove_child(&self, child: &HostElement) -> bool {
        let removed = {
            let mut data = self.0.borrow_mut();
            let before = data.children.len();
            data.children.retain(|c| c != child);
            data.children.len() != before
        };
        if removed {
            child.0.borrow_mut().parent = Weak::new();
        }
        removed
    }

    pub fn remove_from_parent(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    pub fn parent(&self) -> Option<HostElement> {
        self.0.borrow().parent.upgrade().map(HostElement)
    }

    pub fn children(&self) -> Vec<HostElement> {
        self.0.borrow().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    /// Depth-first search of this subtree.
    pub fn find_by_id(&self, id: &str) -> Option<HostElement> {
        if self.id().as_deref() == Some(id) {
            return Some(self.clone());
        }
        self.children().iter().find_map(|c| c.find_by_id(id))
    }
}

impl PartialEq for HostElement {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for HostElement {}

impl fmt::Debug for HostElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("HostElement")
            .field("tag", &data.tag)
            .field("id", &data.attributes.get("id"))
            .field("children", &data.children.len())
            .finish()
    }
}

/// The document of one window: a `<body>` plus its subtree.
#[derive(Debug, Clone)]
pub struct HostDocument {
    body: HostElement,
}

impl HostDocument {
    pub fn new() -> Self {
        HostDocument {
            body: HostElement::new("body"),
        }
    }

    pub fn body(&self) -> &HostElement {
        &self.body
    }

    pub fn create_element(&self, tag: &str) -> HostElement {
        HostElement::new(tag)
    }

    pub fn element_by_id(&self, id: &str) -> Option<HostElement> {
        self.body.find_by_id(id)
    }
}

impl Default for HostDocument {
    fn default() -> Self {
        Self::new()
    }
}
