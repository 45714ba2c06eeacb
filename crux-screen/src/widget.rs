use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crux_view::WidgetDeclaration;

use crate::dom::HostElement;
use crate::error::{ScreenError, ScreenResult};

/// Converts a shared widget handle into `Rc<dyn Any>` for typed lookups.
pub trait AsAnyRc {
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAnyRc for T {
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// A widget living in a screen's registry.
pub trait Widget: AsAnyRc {
    /// Root element of the widget in the host document.
    fn element(&self) -> HostElement;

    /// Removes the widget from its visual parent.
    fn remove_from_parent(&self) {
        self.element().remove_from_parent();
    }
}

/// Result of a typed widget lookup.
pub enum WidgetLookup<T> {
    Found(Rc<T>),
    Missing,
    /// A widget is registered under the id but has another type.
    TypeMismatch,
}

impl<T> WidgetLookup<T> {
    pub fn found(self) -> Option<Rc<T>> {
        match self {
            WidgetLookup::Found(widget) => Some(widget),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, WidgetLookup::Found(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, WidgetLookup::Missing)
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, WidgetLookup::TypeMismatch)
    }
}

impl<T> fmt::Debug for WidgetLookup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetLookup::Found(_) => f.write_str("Found"),
            WidgetLookup::Missing => f.write_str("Missing"),
            WidgetLookup::TypeMismatch => f.write_str("TypeMismatch"),
        }
    }
}

/// Downcast a registry entry to a concrete widget type.
pub fn downcast_widget<T: Widget + 'static>(widget: Rc<dyn Widget>) -> WidgetLookup<T> {
    match widget.into_any_rc().downcast::<T>() {
        Ok(widget) => WidgetLookup::Found(widget),
        Err(_) => WidgetLookup::TypeMismatch,
    }
}

/// Widget of a type the factory has no creator for: keeps its declaration.
#[derive(Debug)]
pub struct GenericWidget {
    widget_type: String,
    element: HostElement,
    attributes: BTreeMap<String, String>,
}

impl GenericWidget {
    pub fn new(widget_type: &str, element: HostElement) -> Self {
        GenericWidget {
            widget_type: widget_type.to_string(),
            element,
            attributes: BTreeMap::new(),
        }
    }

    pub fn from_declaration(declaration: &WidgetDeclaration, element: HostElement) -> Self {
        GenericWidget {
            widget_type: declaration.widget_type.clone(),
            element,
            attributes: declaration.attributes.clone(),
        }
    }

    pub fn widget_type(&self) -> &str {
        &self.widget_type
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

impl Widget for GenericWidget {
    fn element(&self) -> HostElement {
        self.element.clone()
    }
}

pub type WidgetCreator =
    Box<dyn Fn(&str, &WidgetDeclaration, HostElement) -> Result<Rc<dyn Widget>, String>>;

/// Creates widgets from metadata, keyed by widget type (`gwt:button`).
#[derive(Default)]
pub struct WidgetFactory {
    creators: HashMap<String, WidgetCreator>,
}

impl WidgetFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, widget_type: &str, creator: F)
    where
        F: Fn(&str, &WidgetDeclaration, HostElement) -> Result<Rc<dyn Widget>, String> + 'static,
    {
        self.creators.insert(widget_type.to_string(), Box::new(creator));
    }

    pub fn contains(&self, widget_type: &str) -> bool {
        self.creators.contains_key(widget_type)
    }

    /// Types without a creator become [`GenericWidget`]s.
    pub fn create(
        &self,
        id: &str,
        declaration: &WidgetDeclaration,
        element: HostElement,
    ) -> ScreenResult<Rc<dyn Widget>> {
        match self.creators.get(&declaration.widget_type) {
            Some(creator) => {
                creator(id, declaration, element).map_err(|reason| ScreenError::WidgetCreation {
                    id: id.to_string(),
                    widget_type: declaration.widget_type.clone(),
                    reason,
                })
            }
            None => {
                tracing::debug!(
                    "No creator for widget type '{}', using a generic widget for '{}'",
                    declaration.widget_type,
                    id
                );
                Ok(Rc::new(GenericWidget::from_declaration(declaration, element)))
            }
        }
    }
}

impl fmt::Debug for WidgetFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.creators.keys().collect();
        types.sort();
        f.debug_struct("WidgetFactory").field("types", &types).finish()
    }
}
