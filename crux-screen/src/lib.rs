//! # Crux screen runtime
//!
//! Runtime half of Crux: the [`Screen`] behind a loaded page keeps the widget
//! registry, stacks blocking overlays, toggles the history frame, fires the
//! load event once and dispatches controller calls, locally or across
//! windows through a [`ControllerTransport`].
//!
//! The runtime is single threaded. Shared state lives in `Rc`/`RefCell` and
//! no borrow is held while user handlers run.
//!
//! ## Example
//! ```ignore
//! use crux_screen::{ScreenFactory, WindowContext};
//!
//! let screen = ScreenFactory::instance().create_screen("orders", WindowContext::new("main"));
//! screen.register_controller_fn("orders.total", |items: Option<Vec<u32>>| {
//!     Ok(items.map(|items| items.iter().sum::<u32>()))
//! });
//! let total: Option<u32> = screen.invoke_controller_on_self("orders.total", Some(&vec![1, 2]));
//! ```

pub mod controller;
pub mod current;
pub mod dom;
pub mod error;
pub mod factory;
pub mod scheduler;
pub mod screen;
pub mod serializer;
pub mod widget;
pub mod window;

pub use controller::{ControllerRegistry, InvokeControllerEvent};
pub use dom::{HostDocument, HostElement};
pub use error::{ScreenError, ScreenResult};
pub use factory::ScreenFactory;
pub use scheduler::{LocalTaskScheduler, ManualScheduler, Scheduler};
pub use screen::{ControllerAccessor, Screen, ScreenLoadEvent, HISTORY_FRAME_ID};
pub use serializer::ModuleCommunicationSerializer;
pub use widget::{GenericWidget, Widget, WidgetFactory, WidgetLookup};
pub use window::{ControllerTransport, InvocationTarget, WindowContext, WindowTransport};
