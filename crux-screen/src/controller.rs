//! Named controller handlers and their dispatch.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ScreenError, ScreenResult};

/// One controller invocation, as seen by the handler.
#[derive(Debug, Clone)]
pub struct InvokeControllerEvent {
    pub call: String,
    pub parameter: Option<Value>,
}

impl InvokeControllerEvent {
    pub fn new(call: &str, parameter: Option<Value>) -> Self {
        InvokeControllerEvent {
            call: call.to_string(),
            parameter,
        }
    }

    /// `orders.save` → `orders`.
    pub fn controller(&self) -> &str {
        self.call.split_once('.').map(|(c, _)| c).unwrap_or(&self.call)
    }

    /// `orders.save` → `save`.
    pub fn method(&self) -> Option<&str> {
        self.call.split_once('.').map(|(_, m)| m)
    }

    pub fn parameter_as<P: DeserializeOwned>(&self) -> Result<Option<P>, String> {
        self.parameter
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| e.to_string())
    }
}

pub type ControllerHandler = Rc<dyn Fn(&InvokeControllerEvent) -> Result<Option<Value>, String>>;

/// Handlers keyed by call name (`controller.method`).
#[derive(Default)]
pub struct ControllerRegistry {
    handlers: RefCell<HashMap<String, ControllerHandler>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, call: &str, handler: F)
    where
        F: Fn(&InvokeControllerEvent) -> Result<Option<Value>, String> + 'static,
    {
        self.handlers
            .borrow_mut()
            .insert(call.to_string(), Rc::new(handler));
    }

    /// Registers a handler with typed parameter and result.
    pub fn register_fn<P, R, F>(&self, call: &str, handler: F)
    where
        P: DeserializeOwned,
        R: Serialize,
        F: Fn(Option<P>) -> Result<Option<R>, String> + 'static,
    {
        self.register(call, move |event| {
            let parameter = event.parameter_as::<P>()?;
            handler(parameter)?
                .map(|result| serde_json::to_value(result).map_err(|e| e.to_string()))
                .transpose()
        });
    }

    pub fn contains(&self, call: &str) -> bool {
        self.handlers.borrow().contains_key(call)
    }

    /// Runs the handler for `call`. The registry is not borrowed while the
    /// handler runs, so handlers may register or invoke other controllers.
    pub fn dispatch(&self, call: &str, parameter: Option<Value>) -> ScreenResult<Option<Value>> {
        let handler = self
            .handlers
            .borrow()
            .get(call)
            .cloned()
            .ok_or_else(|| ScreenError::UnknownController {
                call: call.to_string(),
            })?;

        let event = InvokeControllerEvent::new(call, parameter);
        handler(&event).map_err(|reason| ScreenError::ControllerFailed {
            call: call.to_string(),
            reason,
        })
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.borrow();
        let mut calls: Vec<&String> = handlers.keys().collect();
        calls.sort();
        f.debug_struct("ControllerRegistry").field("calls", &calls).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_parts() {
        let event = InvokeControllerEvent::new("orders.save", None);
        assert_eq!(event.controller(), "orders");
        assert_eq!(event.method(), Some("save"));

        let bare = InvokeControllerEvent::new("refresh", None);
        assert_eq!(bare.controller(), "refresh");
        assert_eq!(bare.method(), None);
    }

    #[test]
    fn test_typed_dispatch() {
        let registry = ControllerRegistry::new();
        registry.register_fn("math.double", |n: Option<i64>| Ok(n.map(|n| n * 2)));

        let result = registry.dispatch("math.double", Some(json!(21))).unwrap();
        assert_eq!(result, Some(json!(42)));
    }

    #[test]
    fn test_unknown_call() {
        let registry = ControllerRegistry::new();
        let result = registry.dispatch("nope.nothing", None);
        assert!(matches!(result, Err(ScreenError::UnknownController { .. })));
    }

    #[test]
    fn test_bad_parameter_type() {
        let registry = ControllerRegistry::new();
        registry.register_fn("math.double", |n: Option<i64>| Ok(n.map(|n| n * 2)));
        let result = registry.dispatch("math.double", Some(json!("two")));
        assert!(matches!(result, Err(ScreenError::ControllerFailed { .. })));
    }

    #[test]
    fn test_handler_can_register_while_dispatching() {
        let registry = Rc::new(ControllerRegistry::new());
        let inner = Rc::clone(&registry);
        registry.register("setup.run", move |_| {
            inner.register("setup.done", |_| Ok(None));
            Ok(None)
        });

        registry.dispatch("setup.run", None).unwrap();
        assert!(registry.contains("setup.done"));
    }
}
