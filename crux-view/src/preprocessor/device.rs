use super::ViewPreprocessor;
use crate::document::{Element, Node, ViewDocument, CORE_NS};
use crate::error::ViewResult;

/// Device profile matching every `c:devices` list.
pub const ALL_DEVICES: &str = "all";

/// Drops elements whose core `devices` attribute does not list the current
/// device profile, e.g. `<div c:devices="smallDisplayTouch">`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceAdaptivePreprocessor;

impl DeviceAdaptivePreprocessor {
    pub const KEY: &'static str = "deviceAdaptive";
}

impl ViewPreprocessor for DeviceAdaptivePreprocessor {
    fn name(&self) -> &str {
        Self::KEY
    }

    fn preprocess(&self, mut document: ViewDocument, device: &str) -> ViewResult<ViewDocument> {
        document.root_mut().remove_attribute(Some(CORE_NS), "devices");
        prune(document.root_mut(), device);
        Ok(document)
    }
}

fn prune(element: &mut Element, device: &str) {
    element.children.retain_mut(|child| match child {
        Node::Element(e) => match e.remove_attribute(Some(CORE_NS), "devices") {
            Some(list) if !targets(&list, device) => false,
            _ => {
                prune(e, device);
                true
            }
        },
        Node::Text(_) => true,
    });
}

fn targets(list: &str, device: &str) -> bool {
    device == ALL_DEVICES
        || list
            .split_whitespace()
            .any(|d| d == device || d == ALL_DEVICES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::XmlParserFactory;

    const VIEW: &str = r#"<body xmlns:c="http://www.cruxframework.org/crux">
  <div id="desktop" c:devices="largeDisplayMouse largeDisplayTouch"/>
  <div id="phone" c:devices="smallDisplayTouch"><span/></div>
  <div id="shared"/>
</body>"#;

    fn ids(doc: &ViewDocument) -> Vec<&str> {
        doc.root()
            .element_children()
            .filter_map(|e| e.attribute("id"))
            .collect()
    }

    #[test]
    fn test_prunes_other_devices() {
        let doc = XmlParserFactory::shared().parse(VIEW).unwrap();
        let doc = DeviceAdaptivePreprocessor.preprocess(doc, "smallDisplayTouch").unwrap();
        assert_eq!(ids(&doc), vec!["phone", "shared"]);
        let phone = doc.root().element_children().next().unwrap();
        assert!(phone.attribute_ns(CORE_NS, "devices").is_none());
    }

    #[test]
    fn test_all_keeps_everything() {
        let doc = XmlParserFactory::shared().parse(VIEW).unwrap();
        let doc = DeviceAdaptivePreprocessor.preprocess(doc, ALL_DEVICES).unwrap();
        assert_eq!(ids(&doc), vec!["desktop", "phone", "shared"]);
    }
}
