//! Browser windows and frames hosting screens, and the transport used to
//! invoke controllers across them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::dom::HostDocument;
use crate::error::{ScreenError, ScreenResult};
use crate::screen::ControllerAccessor;

/// Raised before a window closes; handlers may ask the user to confirm.
#[derive(Debug, Default)]
pub struct WindowClosingEvent {
    message: Option<String>,
}

impl WindowClosingEvent {
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn set_message(&mut self, message: &str) {
        self.message = Some(message.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeEvent {
    pub width: u32,
    pub height: u32,
}

type ClosingHandler = Rc<dyn Fn(&mut WindowClosingEvent)>;
type CloseHandler = Rc<dyn Fn()>;
type ResizeHandler = Rc<dyn Fn(&ResizeEvent)>;

struct WindowData {
    name: String,
    document: HostDocument,
    parent: Option<WindowContext>,
    opener: Option<WindowContext>,
    title: RefCell<String>,
    alerts: RefCell<Vec<String>>,
    accessor: RefCell<Option<Rc<ControllerAccessor>>>,
    closing_handlers: RefCell<Vec<ClosingHandler>>,
    close_handlers: RefCell<Vec<CloseHandler>>,
    resize_handlers: RefCell<Vec<ResizeHandler>>,
}

/// A window or frame. Clones are handles to the same window.
#[derive(Clone)]
pub struct WindowContext(Rc<WindowData>);

impl WindowContext {
    fn build(name: &str, parent: Option<WindowContext>, opener: Option<WindowContext>) -> Self {
        WindowContext(Rc::new(WindowData {
            name: name.to_string(),
            document: HostDocument::new(),
            parent,
            opener,
            title: RefCell::new(String::new()),
            alerts: RefCell::new(Vec::new()),
            accessor: RefCell::new(None),
            closing_handlers: RefCell::new(Vec::new()),
            close_handlers: RefCell::new(Vec::new()),
            resize_handlers: RefCell::new(Vec::new()),
        }))
    }

    /// A top-level window.
    pub fn new(name: &str) -> Self {
        Self::build(name, None, None)
    }

    /// A frame embedded in `parent`.
    pub fn child_of(parent: &WindowContext, name: &str) -> Self {
        Self::build(name, Some(parent.clone()), None)
    }

    /// A top-level window opened from `opener`.
    pub fn opened_by(opener: &WindowContext, name: &str) -> Self {
        Self::build(name, None, Some(opener.clone()))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn document(&self) -> &HostDocument {
        &self.0.document
    }

    /// The enclosing window; a top-level window is its own parent.
    pub fn parent(&self) -> WindowContext {
        self.0.parent.clone().unwrap_or_else(|| self.clone())
    }

    pub fn top(&self) -> WindowContext {
        let mut window = self.clone();
        while let Some(parent) = window.0.parent.clone() {
            window = parent;
        }
        window
    }

    /// The window that opened this window's top-level window.
    pub fn opener(&self) -> Option<WindowContext> {
        self.top().0.opener.clone()
    }

    pub fn is_top(&self) -> bool {
        self.0.parent.is_none()
    }

    pub fn ptr_eq(&self, other: &WindowContext) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn title(&self) -> String {
        self.0.title.borrow().clone()
    }

    pub fn set_title(&self, title: &str) {
        *self.0.title.borrow_mut() = title.to_string();
    }

    pub fn alert(&self, message: &str) {
        tracing::debug!("Alert on window '{}': {}", self.name(), message);
        self.0.alerts.borrow_mut().push(message.to_string());
    }

    /// Messages alerted on this window so far.
    pub fn alerts(&self) -> Vec<String> {
        self.0.alerts.borrow().clone()
    }

    // ─── Controller entry point ──────────────────────────────────────────────

    pub fn set_controller_accessor(&self, accessor: Rc<ControllerAccessor>) {
        *self.0.accessor.borrow_mut() = Some(accessor);
    }

    pub fn controller_accessor(&self) -> Option<Rc<ControllerAccessor>> {
        self.0.accessor.borrow().clone()
    }

    // ─── Window events ───────────────────────────────────────────────────────

    pub fn add_closing_handler<F: Fn(&mut WindowClosingEvent) + 'static>(&self, handler: F) {
        self.0.closing_handlers.borrow_mut().push(Rc::new(handler));
    }

    pub fn add_close_handler<F: Fn() + 'static>(&self, handler: F) {
        self.0.close_handlers.borrow_mut().push(Rc::new(handler));
    }

    pub fn add_resize_handler<F: Fn(&ResizeEvent) + 'static>(&self, handler: F) {
        self.0.resize_handlers.borrow_mut().push(Rc::new(handler));
    }

    /// Fires the closing event; returns the confirmation message a handler set.
    pub fn fire_closing(&self) -> Option<String> {
        let handlers = self.0.closing_handlers.borrow().clone();
        let mut event = WindowClosingEvent::default();
        for handler in handlers {
            handler(&mut event);
        }
        event.message
    }

    pub fn fire_close(&self) {
        let handlers = self.0.close_handlers.borrow().clone();
        for handler in handlers {
            handler();
        }
    }

    /// Resizes the window body and fires the resize event.
    pub fn resize(&self, width: u32, height: u32) {
        self.0.document.body().set_client_size(width, height);
        let handlers = self.0.resize_handlers.borrow().clone();
        let event = ResizeEvent { width, height };
        for handler in handlers {
            handler(&event);
        }
    }
}

impl fmt::Debug for WindowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowContext")
            .field("name", &self.0.name)
            .field("top", &self.is_top())
            .finish()
    }
}

// ─── Transport ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationTarget {
    Top,
    Opener,
    Parent,
    SelfContext,
}

/// Carries a serialized controller call to the entry point of another window.
pub trait ControllerTransport {
    fn invoke(
        &self,
        target: InvocationTarget,
        call: &str,
        payload: Option<&str>,
    ) -> ScreenResult<Option<String>>;
}

/// Resolves targets in the window tree of the invoking window.
#[derive(Debug, Clone)]
pub struct WindowTransport {
    window: WindowContext,
}

impl WindowTransport {
    pub fn new(window: WindowContext) -> Self {
        WindowTransport { window }
    }

    pub fn resolve(&self, target: InvocationTarget) -> ScreenResult<WindowContext> {
        match target {
            InvocationTarget::Top => Ok(self.window.top()),
            InvocationTarget::Parent => Ok(self.window.parent()),
            InvocationTarget::SelfContext => Ok(self.window.clone()),
            InvocationTarget::Opener => self.window.opener().ok_or_else(|| ScreenError::NoOpener {
                window: self.window.name().to_string(),
            }),
        }
    }
}

impl ControllerTransport for WindowTransport {
    fn invoke(
        &self,
        target: InvocationTarget,
        call: &str,
        payload: Option<&str>,
    ) -> ScreenResult<Option<String>> {
        let window = self.resolve(target)?;
        let accessor = window
            .controller_accessor()
            .ok_or_else(|| ScreenError::NoControllerAccessor {
                window: window.name().to_string(),
            })?;

        tracing::debug!(
            "Invoking '{}' on window '{}' ({:?})",
            call,
            window.name(),
            target
        );
        accessor.invoke(call, payload)
    }
}
