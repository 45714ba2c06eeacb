use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Widget and screen metadata extracted from one view.
///
/// Serialized as a JSON object; maps are ordered so the output is stable
/// between builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewMetadata {
    pub view_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<ScreenDeclaration>,
    /// Widgets keyed by widget id.
    #[serde(default)]
    pub widgets: BTreeMap<String, WidgetDeclaration>,
    /// Widget id → id of the nearest lazy ancestor that creates it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lazy_dependencies: BTreeMap<String, String>,
}

impl ViewMetadata {
    pub fn new(view_id: &str) -> Self {
        ViewMetadata {
            view_id: view_id.to_string(),
            screen: None,
            widgets: BTreeMap::new(),
            lazy_dependencies: BTreeMap::new(),
        }
    }

    pub fn widget(&self, id: &str) -> Option<&WidgetDeclaration> {
        self.widgets.get(id)
    }

    /// Widgets without a parent widget, in id order.
    pub fn root_widgets(&self) -> impl Iterator<Item = (&String, &WidgetDeclaration)> {
        self.widgets.iter().filter(|(_, w)| w.parent.is_none())
    }
}

/// Attributes of the `<c:screen>` element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenDeclaration {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Event name (`onLoad`, `onClose`, ...) → controller call.
    #[serde(default)]
    pub events: BTreeMap<String, String>,
}

impl ScreenDeclaration {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn event(&self, name: &str) -> Option<&str> {
        self.events.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDeclaration {
    /// `<library>:<name>`, e.g. `gwt:button`.
    #[serde(rename = "type")]
    pub widget_type: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub events: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lazy_parent: Option<String>,
}

impl WidgetDeclaration {
    pub fn new(widget_type: &str) -> Self {
        WidgetDeclaration {
            widget_type: widget_type.to_string(),
            attributes: BTreeMap::new(),
            events: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
            lazy_parent: None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// `onClick`, `onLoad`, ...: `on` followed by an uppercase letter.
pub fn is_event_attribute(name: &str) -> bool {
    name.strip_prefix("on")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_event_attribute_names() {
        assert!(is_event_attribute("onClick"));
        assert!(is_event_attribute("onLoad"));
        assert!(!is_event_attribute("onion"));
        assert!(!is_event_attribute("on"));
        assert!(!is_event_attribute("text"));
    }

    #[test]
    fn test_json_shape() {
        let mut meta = ViewMetadata::new("main");
        let mut button = WidgetDeclaration::new("gwt:button");
        button.events.insert("onClick".to_string(), "main.save".to_string());
        meta.widgets.insert("save".to_string(), button);

        let json: serde_json::Value = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "viewId": "main",
                "widgets": {
                    "save": {
                        "type": "gwt:button",
                        "attributes": {},
                        "events": {"onClick": "main.save"}
                    }
                }
            })
        );

        let back: ViewMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }
}
