//! The runtime object behind one loaded page.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crux_view::{ScreenDeclaration, ViewMetadata};

use crate::controller::{ControllerRegistry, InvokeControllerEvent};
use crate::dom::HostElement;
use crate::error::{ScreenError, ScreenResult};
use crate::factory::ScreenFactory;
use crate::scheduler::Scheduler;
use crate::serializer::ModuleCommunicationSerializer;
use crate::widget::{downcast_widget, Widget, WidgetFactory, WidgetLookup};
use crate::window::{ControllerTransport, InvocationTarget, WindowContext, WindowTransport};

/// Id of the hidden frame used for history tracking.
pub const HISTORY_FRAME_ID: &str = "__gwt_historyFrame";

/// Delay before the load event is deferred to the event loop.
const LOAD_TIMER_DELAY: Duration = Duration::from_millis(1);

/// Fired once, after the page has been rendered.
#[derive(Debug, Clone)]
pub struct ScreenLoadEvent {
    pub screen_id: String,
}

type LoadHandler = Rc<dyn Fn(&ScreenLoadEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Idle,
    Scheduled,
    Fired,
}

pub struct Screen {
    id: String,
    window: WindowContext,
    widgets: RefCell<HashMap<String, Rc<dyn Widget>>>,
    overlays: RefCell<Vec<HostElement>>,
    history_managed: Cell<bool>,
    history_frame: RefCell<Option<HostElement>>,
    controllers: ControllerRegistry,
    load_handlers: RefCell<Vec<LoadHandler>>,
    load_state: Cell<LoadState>,
    scheduler: Rc<dyn Scheduler>,
    transport: RefCell<Rc<dyn ControllerTransport>>,
    serializer: ModuleCommunicationSerializer,
}

impl Screen {
    /// Builds the screen and registers its controller entry point on `window`.
    pub(crate) fn new(id: &str, window: WindowContext, scheduler: Rc<dyn Scheduler>) -> Rc<Self> {
        let transport: Rc<dyn ControllerTransport> = Rc::new(WindowTransport::new(window.clone()));
        let screen = Rc::new(Screen {
            id: id.to_string(),
            window,
            widgets: RefCell::new(HashMap::new()),
            overlays: RefCell::new(Vec::new()),
            history_managed: Cell::new(false),
            history_frame: RefCell::new(None),
            controllers: ControllerRegistry::new(),
            load_handlers: RefCell::new(Vec::new()),
            load_state: Cell::new(LoadState::Idle),
            scheduler,
            transport: RefCell::new(transport),
            serializer: ModuleCommunicationSerializer::new(),
        });

        let accessor = ControllerAccessor {
            screen_id: screen.id.clone(),
            screen: Rc::downgrade(&screen),
        };
        screen.window.set_controller_accessor(Rc::new(accessor));
        tracing::debug!("Screen '{}' created on window '{}'", id, screen.window.name());
        screen
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn window(&self) -> &WindowContext {
        &self.window
    }

    pub fn serializer(&self) -> &ModuleCommunicationSerializer {
        &self.serializer
    }

    /// Replace the transport used by the cross-window invocation family.
    pub fn set_transport(&self, transport: Rc<dyn ControllerTransport>) {
        *self.transport.borrow_mut() = transport;
    }

    // ─── Widgets ─────────────────────────────────────────────────────────────

    pub fn widget(&self, id: &str) -> Option<Rc<dyn Widget>> {
        self.widgets.borrow().get(id).cloned()
    }

    pub fn widget_as<T: Widget + 'static>(&self, id: &str) -> WidgetLookup<T> {
        match self.widget(id) {
            Some(widget) => downcast_widget(widget),
            None => WidgetLookup::Missing,
        }
    }

    /// Registers `widget` under `id`, replacing any previous entry.
    pub fn add_widget(&self, id: &str, widget: Rc<dyn Widget>) {
        self.widgets.borrow_mut().insert(id.to_string(), widget);
    }

    /// Unregisters the widget and removes it from its visual parent.
    pub fn remove_widget(&self, id: &str) -> Option<Rc<dyn Widget>> {
        self.remove_widget_with(id, true)
    }

    pub fn remove_widget_with(&self, id: &str, detach_from_display: bool) -> Option<Rc<dyn Widget>> {
        let widget = self.widgets.borrow_mut().remove(id)?;
        if detach_from_display {
            widget.remove_from_parent();
        }
        Some(widget)
    }

    pub fn widget_ids(&self) -> impl Iterator<Item = String> {
        self.widgets.borrow().keys().cloned().collect::<Vec<_>>().into_iter()
    }

    pub fn widgets(&self) -> impl Iterator<Item = Rc<dyn Widget>> {
        self.widgets.borrow().values().cloned().collect::<Vec<_>>().into_iter()
    }

    /// Creates and registers a widget for every declared widget whose
    /// placeholder exists in the host document. Returns the number created.
    pub fn load_widgets(&self, metadata: &ViewMetadata, factory: &WidgetFactory) -> ScreenResult<usize> {
        let document = self.window.document();
        let mut created = 0;
        for (id, declaration) in &metadata.widgets {
            let Some(element) = document.element_by_id(id) else {
                tracing::debug!("No placeholder for widget '{}' in screen '{}'", id, self.id);
                continue;
            };
            let widget = factory.create(id, declaration, element)?;
            self.add_widget(id, widget);
            created += 1;
        }
        tracing::debug!("Loaded {} widget(s) into screen '{}'", created, self.id);
        Ok(created)
    }

    // ─── Blocking overlays ───────────────────────────────────────────────────

    /// Covers the page with a new overlay, hiding the previous one.
    /// Without a style name the overlay gets a translucent wait style.
    pub fn show_blocking_overlay(&self, style_name: Option<&str>) {
        let body = self.window.document().body().clone();
        if let Some(previous) = self.overlays.borrow().last() {
            previous.set_visible(false);
        }

        let overlay = self.create_blocking_overlay(style_name, &body);
        body.append_child(&overlay);
        self.overlays.borrow_mut().push(overlay);
    }

    fn create_blocking_overlay(&self, style_name: Option<&str>, body: &HostElement) -> HostElement {
        let overlay = self.window.document().create_element("div");
        let (client_width, client_height) = body.client_size();
        let (scroll_width, scroll_height) = body.scroll_size();

        overlay.set_style("position", "absolute");
        overlay.set_style_px("top", 0);
        overlay.set_style_px("left", 0);
        overlay.set_style_px("width", client_width.max(scroll_width));
        overlay.set_style_px("height", client_height.max(scroll_height));

        match style_name {
            Some(name) => overlay.set_class_name(name),
            None => {
                overlay.set_style("cursor", "wait");
                overlay.set_style("backgroundColor", "white");
                overlay.set_style("opacity", ".01");
                overlay.set_style("filter", "alpha(opacity=1)");
                body.set_style("cursor", "wait");
            }
        }
        overlay
    }

    /// Removes the top overlay and shows the one below it. No-op when none is shown.
    pub fn hide_blocking_overlay(&self) {
        let body = self.window.document().body().clone();
        let mut overlays = self.overlays.borrow_mut();
        if let Some(top) = overlays.pop() {
            body.remove_child(&top);
            body.set_style("cursor", "");
        }
        if let Some(next) = overlays.last() {
            next.set_visible(true);
        }
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.borrow().len()
    }

    pub fn top_overlay(&self) -> Option<HostElement> {
        self.overlays.borrow().last().cloned()
    }

    pub fn overlays(&self) -> Vec<HostElement> {
        self.overlays.borrow().clone()
    }

    // ─── History ─────────────────────────────────────────────────────────────

    pub fn is_history_managed(&self) -> bool {
        self.history_managed.get()
    }

    pub fn history_frame(&self) -> Option<HostElement> {
        self.history_frame.borrow().clone()
    }

    pub fn set_history_managed(&self, managed: bool) {
        if self.history_managed.get() == managed {
            return;
        }
        self.history_managed.set(managed);

        let body = self.window.document().body().clone();
        if managed {
            let frame = self.window.document().create_element("iframe");
            let (width, height) = body.client_size();
            frame.set_id(HISTORY_FRAME_ID);
            frame.set_attribute("src", "javascript:''");
            frame.set_style_px("width", width);
            frame.set_style_px("height", height);
            frame.set_style("border", "0");
            body.append_child(&frame);
            *self.history_frame.borrow_mut() = Some(frame);
        } else if let Some(frame) = self.history_frame.borrow_mut().take() {
            body.remove_child(&frame);
        }
    }

    // ─── Load event ──────────────────────────────────────────────────────────

    pub fn add_load_handler<F: Fn(&ScreenLoadEvent) + 'static>(&self, handler: F) {
        self.load_handlers.borrow_mut().push(Rc::new(handler));
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state.get() == LoadState::Fired
    }

    /// Schedules the load event: a short timer whose task defers the firing
    /// to the event loop. Does nothing without handlers or once scheduled.
    pub fn load(self: &Rc<Self>) {
        if self.load_state.get() != LoadState::Idle || self.load_handlers.borrow().is_empty() {
            return;
        }
        self.load_state.set(LoadState::Scheduled);

        let screen = Rc::downgrade(self);
        self.scheduler.schedule(
            LOAD_TIMER_DELAY,
            Box::new(move || {
                let Some(current) = screen.upgrade() else {
                    return;
                };
                let deferred = screen.clone();
                current.scheduler.schedule(
                    Duration::ZERO,
                    Box::new(move || {
                        if let Some(screen) = deferred.upgrade() {
                            screen.fire_load();
                        }
                    }),
                );
            }),
        );
    }

    fn fire_load(&self) {
        if self.load_state.get() == LoadState::Fired {
            return;
        }
        self.load_state.set(LoadState::Fired);

        let handlers = self.load_handlers.borrow().clone();
        let event = ScreenLoadEvent {
            screen_id: self.id.clone(),
        };
        tracing::debug!("Firing load event of screen '{}'", self.id);
        for handler in handlers {
            handler(&event);
        }
    }

    // ─── Declaration ─────────────────────────────────────────────────────────

    /// Applies the `<c:screen>` declaration of the view.
    pub fn parse(self: &Rc<Self>, declaration: &ScreenDeclaration) {
        if let Some(manage) = declaration.attribute("manageHistory") {
            self.set_history_managed(manage == "true");
        }

        if let Some(title) = declaration.attribute("title").filter(|t| !t.is_empty()) {
            let title = ScreenFactory::instance().declared_message(title);
            self.window.set_title(&title);
        }

        if let Some(call) = declaration.event("onClosing") {
            let (screen, call) = (Rc::downgrade(self), call.to_string());
            self.window.add_closing_handler(move |event| {
                if let Some(screen) = screen.upgrade() {
                    let message: Option<String> = screen.invoke_controller_on_self(&call, None::<&()>);
                    if let Some(message) = message {
                        event.set_message(&message);
                    }
                }
            });
        }

        if let Some(call) = declaration.event("onClose") {
            let (screen, call) = (Rc::downgrade(self), call.to_string());
            self.window.add_close_handler(move || {
                if let Some(screen) = screen.upgrade() {
                    let _: Option<Value> = screen.invoke_controller_on_self(&call, None::<&()>);
                }
            });
        }

        if let Some(call) = declaration.event("onResized") {
            let (screen, call) = (Rc::downgrade(self), call.to_string());
            self.window.add_resize_handler(move |event| {
                if let Some(screen) = screen.upgrade() {
                    let size = (event.width, event.height);
                    let _: Option<Value> = screen.invoke_controller_on_self(&call, Some(&size));
                }
            });
        }

        if let Some(call) = declaration.event("onLoad") {
            let (screen, call) = (Rc::downgrade(self), call.to_string());
            self.add_load_handler(move |_| {
                if let Some(screen) = screen.upgrade() {
                    let _: Option<Value> = screen.invoke_controller_on_self(&call, None::<&()>);
                }
            });
        }
    }

    // ─── Controllers ─────────────────────────────────────────────────────────

    pub fn register_controller<F>(&self, call: &str, handler: F)
    where
        F: Fn(&InvokeControllerEvent) -> Result<Option<Value>, String> + 'static,
    {
        self.controllers.register(call, handler);
    }

    pub fn register_controller_fn<P, R, F>(&self, call: &str, handler: F)
    where
        P: DeserializeOwned,
        R: Serialize,
        F: Fn(Option<P>) -> Result<Option<R>, String> + 'static,
    {
        self.controllers.register_fn(call, handler);
    }

    /// Entry point for serialized calls from other windows.
    ///
    /// An absent payload yields `None` without dispatching. Failures are
    /// logged, alerted on this screen's window and yield `None`.
    pub fn invoke_controller(&self, call: &str, payload: Option<&str>) -> Option<String> {
        let payload = payload?;
        let result = (|| -> ScreenResult<Option<String>> {
            let parameter: Option<Value> = self.serializer.deserialize(Some(payload))?;
            let result = self.controllers.dispatch(call, parameter)?;
            self.serializer.serialize(result.as_ref())
        })();

        match result {
            Ok(result) => result,
            Err(e) => {
                self.report_failure(call, &e);
                None
            }
        }
    }

    /// Invokes `call` on this screen without crossing a window boundary.
    pub fn invoke_controller_on_self<P, R>(&self, call: &str, param: Option<&P>) -> Option<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let result = (|| -> ScreenResult<Option<R>> {
            let parameter = self.serializer.to_value(param)?;
            let result = self.controllers.dispatch(call, parameter)?;
            self.serializer.from_value(result)
        })();

        match result {
            Ok(result) => result,
            Err(e) => {
                self.report_failure(call, &e);
                None
            }
        }
    }

    pub fn invoke_controller_on_top<P, R>(&self, call: &str, param: Option<&P>) -> ScreenResult<Option<R>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.invoke_on(InvocationTarget::Top, call, param)
    }

    pub fn invoke_controller_on_opener<P, R>(&self, call: &str, param: Option<&P>) -> ScreenResult<Option<R>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.invoke_on(InvocationTarget::Opener, call, param)
    }

    pub fn invoke_controller_on_parent<P, R>(&self, call: &str, param: Option<&P>) -> ScreenResult<Option<R>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.invoke_on(InvocationTarget::Parent, call, param)
    }

    fn invoke_on<P, R>(&self, target: InvocationTarget, call: &str, param: Option<&P>) -> ScreenResult<Option<R>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = self.serializer.serialize(param)?;
        // Clone the transport out so a reentrant call can replace it.
        let transport = Rc::clone(&*self.transport.borrow());
        let result = transport.invoke(target, call, payload.as_deref())?;
        self.serializer.deserialize(result.as_deref())
    }

    fn report_failure(&self, call: &str, error: &ScreenError) {
        tracing::error!("Error invoking controller '{}' on screen '{}': {}", call, self.id, error);
        self.window.alert(&error.to_string());
    }
}

impl fmt::Debug for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screen")
            .field("id", &self.id)
            .field("window", &self.window)
            .field("widgets", &self.widgets.borrow().len())
            .field("overlays", &self.overlays.borrow().len())
            .field("history_managed", &self.history_managed.get())
            .field("load_state", &self.load_state.get())
            .finish()
    }
}

/// The controller entry point a screen registers on its window.
///
/// Holds the screen weakly: once the page's screen is dropped, calls fail
/// with [`ScreenError::ScreenGone`].
#[derive(Debug)]
pub struct ControllerAccessor {
    screen_id: String,
    screen: Weak<Screen>,
}

impl ControllerAccessor {
    pub fn screen_id(&self) -> &str {
        &self.screen_id
    }

    pub fn invoke(&self, call: &str, payload: Option<&str>) -> ScreenResult<Option<String>> {
        let screen = self.screen.upgrade().ok_or_else(|| ScreenError::ScreenGone {
            id: self.screen_id.clone(),
        })?;
        Ok(screen.invoke_controller(call, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use crate::widget::GenericWidget;

    fn screen() -> (Rc<Screen>, Rc<ManualScheduler>) {
        let scheduler = Rc::new(ManualScheduler::new());
        let window = WindowContext::new("main");
        window.document().body().set_client_size(1024, 600);
        window.document().body().set_scroll_size(800, 2000);
        let screen = Screen::new("main", window, scheduler.clone());
        (screen, scheduler)
    }

    #[test]
    fn test_overlay_covers_largest_extent() {
        let (screen, _) = screen();
        screen.show_blocking_overlay(None);

        let overlay = screen.top_overlay().unwrap();
        assert_eq!(overlay.style("width").as_deref(), Some("1024px"));
        assert_eq!(overlay.style("height").as_deref(), Some("2000px"));
        assert_eq!(overlay.style("cursor").as_deref(), Some("wait"));
        assert_eq!(overlay.style("opacity").as_deref(), Some(".01"));
        assert_eq!(overlay.style("filter").as_deref(), Some("alpha(opacity=1)"));
        assert_eq!(screen.window().document().body().style("cursor").as_deref(), Some("wait"));

        screen.hide_blocking_overlay();
        assert_eq!(screen.window().document().body().style("cursor"), None);
    }

    #[test]
    fn test_styled_overlay_keeps_body_cursor() {
        let (screen, _) = screen();
        screen.show_blocking_overlay(Some("modal-mask"));
        let overlay = screen.top_overlay().unwrap();
        assert_eq!(overlay.class_name(), "modal-mask");
        assert_eq!(overlay.style("cursor"), None);
        assert_eq!(screen.window().document().body().style("cursor"), None);
    }

    #[test]
    fn test_remove_widget_without_detaching() {
        let (screen, _) = screen();
        let element = HostElement::new("div");
        screen.window().document().body().append_child(&element);
        screen.add_widget("w", Rc::new(GenericWidget::new("gwt:label", element.clone())));

        screen.remove_widget_with("w", false).unwrap();
        assert!(element.parent().is_some());
        assert!(screen.widget("w").is_none());
    }

    #[test]
    fn test_accessor_outlives_screen() {
        let (screen, _) = screen();
        let window = screen.window().clone();
        drop(screen);

        let accessor = window.controller_accessor().unwrap();
        let result = accessor.invoke("a.b", Some("1"));
        assert!(matches!(result, Err(ScreenError::ScreenGone { .. })));
    }

    #[test]
    fn test_load_is_deferred_after_timer() {
        let (screen, scheduler) = screen();
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        screen.add_load_handler(move |_| counter.set(counter.get() + 1));

        screen.load();
        assert_eq!(scheduler.advance(Duration::ZERO), 0);
        assert_eq!(scheduler.advance(LOAD_TIMER_DELAY), 2);
        assert_eq!(fired.get(), 1);
        assert!(screen.is_loaded());
    }
}
