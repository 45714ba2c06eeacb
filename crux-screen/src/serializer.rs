use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ScreenResult;

/// JSON codec for payloads crossing window boundaries.
///
/// An absent value travels as an absent string, never as `"null"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleCommunicationSerializer;

impl ModuleCommunicationSerializer {
    pub fn new() -> Self {
        ModuleCommunicationSerializer
    }

    pub fn serialize<T: Serialize + ?Sized>(&self, value: Option<&T>) -> ScreenResult<Option<String>> {
        value
            .map(|v| serde_json::to_string(v))
            .transpose()
            .map_err(Into::into)
    }

    pub fn deserialize<T: DeserializeOwned>(&self, text: Option<&str>) -> ScreenResult<Option<T>> {
        text.map(|t| serde_json::from_str(t))
            .transpose()
            .map_err(Into::into)
    }

    pub fn to_value<T: Serialize + ?Sized>(&self, value: Option<&T>) -> ScreenResult<Option<Value>> {
        value
            .map(|v| serde_json::to_value(v))
            .transpose()
            .map_err(Into::into)
    }

    pub fn from_value<T: DeserializeOwned>(&self, value: Option<Value>) -> ScreenResult<Option<T>> {
        value
            .map(|v| serde_json::from_value(v))
            .transpose()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u32,
        items: Vec<String>,
    }

    #[test]
    fn test_absent_values() {
        let serializer = ModuleCommunicationSerializer::new();
        assert_eq!(serializer.serialize::<Order>(None).unwrap(), None);
        assert_eq!(serializer.deserialize::<Order>(None).unwrap(), None);
    }

    #[test]
    fn test_structured_payload() {
        let serializer = ModuleCommunicationSerializer::new();
        let order = Order {
            id: 7,
            items: vec!["pen".to_string()],
        };
        let text = serializer.serialize(Some(&order)).unwrap().unwrap();
        assert_eq!(text, r#"{"id":7,"items":["pen"]}"#);
        assert_eq!(serializer.deserialize::<Order>(Some(&text)).unwrap(), Some(order));
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let serializer = ModuleCommunicationSerializer::new();
        assert!(serializer.deserialize::<u32>(Some("\"text\"")).is_err());
    }
}
