use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;

use crate::scheduler::{LocalTaskScheduler, Scheduler};
use crate::screen::Screen;
use crate::window::WindowContext;

thread_local! {
    static INSTANCE: Rc<ScreenFactory> = Rc::new(ScreenFactory::new());
}

static MESSAGE_KEY: OnceLock<Regex> = OnceLock::new();

fn message_key() -> &'static Regex {
    MESSAGE_KEY.get_or_init(|| Regex::new(r"^\$\{([A-Za-z_][\w-]*)\.([\w.-]+)\}$").unwrap())
}

/// Holds the page's screen and its declared message bundles.
///
/// The runtime is single threaded: there is one factory per thread, standing
/// for the page that thread drives.
pub struct ScreenFactory {
    screen: RefCell<Option<Rc<Screen>>>,
    scheduler: RefCell<Rc<dyn Scheduler>>,
    messages: RefCell<HashMap<String, HashMap<String, String>>>,
}

impl ScreenFactory {
    fn new() -> Self {
        ScreenFactory {
            screen: RefCell::new(None),
            scheduler: RefCell::new(Rc::new(LocalTaskScheduler::new())),
            messages: RefCell::new(HashMap::new()),
        }
    }

    pub fn instance() -> Rc<ScreenFactory> {
        INSTANCE.with(Rc::clone)
    }

    /// Scheduler handed to screens created from now on.
    pub fn set_scheduler(&self, scheduler: Rc<dyn Scheduler>) {
        *self.scheduler.borrow_mut() = scheduler;
    }

    /// Creates the page's screen, replacing the current one.
    pub fn create_screen(&self, id: &str, window: WindowContext) -> Rc<Screen> {
        let scheduler = Rc::clone(&*self.scheduler.borrow());
        let screen = Screen::new(id, window, scheduler);
        if let Some(previous) = self.screen.borrow_mut().replace(Rc::clone(&screen)) {
            tracing::warn!("Screen '{}' replaced by '{}'", previous.id(), id);
        }
        screen
    }

    pub fn screen(&self) -> Option<Rc<Screen>> {
        self.screen.borrow().clone()
    }

    /// Drops the current screen, as navigating away from the page does.
    pub fn clear_screen(&self) -> Option<Rc<Screen>> {
        self.screen.borrow_mut().take()
    }

    pub fn set_declared_messages(&self, bundle: &str, messages: HashMap<String, String>) {
        self.messages.borrow_mut().insert(bundle.to_string(), messages);
    }

    /// Resolves `${bundle.key}` references. Other text, and references to
    /// unknown bundles or keys, are returned unchanged.
    pub fn declared_message(&self, text: &str) -> String {
        let Some(caps) = message_key().captures(text) else {
            return text.to_string();
        };
        let messages = self.messages.borrow();
        match messages.get(&caps[1]).and_then(|bundle| bundle.get(&caps[2])) {
            Some(message) => message.clone(),
            None => {
                tracing::warn!("Declared message '{}' not found", text);
                text.to_string()
            }
        }
    }
}

impl fmt::Debug for ScreenFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenFactory")
            .field("screen", &self.screen.borrow().as_ref().map(|s| s.id().to_string()))
            .field("bundles", &self.messages.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_message() {
        let factory = ScreenFactory::new();
        let mut bundle = HashMap::new();
        bundle.insert("title".to_string(), "Orders".to_string());
        bundle.insert("form.save".to_string(), "Save order".to_string());
        factory.set_declared_messages("messages", bundle);

        assert_eq!(factory.declared_message("${messages.title}"), "Orders");
        assert_eq!(factory.declared_message("${messages.form.save}"), "Save order");
        assert_eq!(factory.declared_message("${messages.missing}"), "${messages.missing}");
        assert_eq!(factory.declared_message("${other.title}"), "${other.title}");
        assert_eq!(factory.declared_message("Plain title"), "Plain title");
    }

    #[test]
    fn test_instance_is_per_thread_singleton() {
        let a = ScreenFactory::instance();
        let b = ScreenFactory::instance();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_create_screen_replaces_current() {
        let factory = ScreenFactory::new();
        let first = factory.create_screen("first", WindowContext::new("w1"));
        assert!(Rc::ptr_eq(&factory.screen().unwrap(), &first));

        let second = factory.create_screen("second", WindowContext::new("w2"));
        assert!(Rc::ptr_eq(&factory.screen().unwrap(), &second));
        assert!(factory.clear_screen().is_some());
        assert!(factory.screen().is_none());
    }
}
