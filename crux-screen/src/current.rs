//! Shortcuts acting on the page's current screen.

use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ScreenError, ScreenResult};
use crate::factory::ScreenFactory;
use crate::screen::Screen;
use crate::widget::Widget;

pub fn screen() -> ScreenResult<Rc<Screen>> {
    ScreenFactory::instance().screen().ok_or(ScreenError::NoScreen)
}

pub fn id() -> ScreenResult<String> {
    Ok(screen()?.id().to_string())
}

pub fn widget(id: &str) -> ScreenResult<Option<Rc<dyn Widget>>> {
    Ok(screen()?.widget(id))
}

pub fn add(id: &str, widget: Rc<dyn Widget>) -> ScreenResult<()> {
    screen()?.add_widget(id, widget);
    Ok(())
}

pub fn remove(id: &str) -> ScreenResult<Option<Rc<dyn Widget>>> {
    Ok(screen()?.remove_widget(id))
}

pub fn block_to_user(style_name: Option<&str>) -> ScreenResult<()> {
    screen()?.show_blocking_overlay(style_name);
    Ok(())
}

pub fn unblock_to_user() -> ScreenResult<()> {
    screen()?.hide_blocking_overlay();
    Ok(())
}

pub fn is_history_managed() -> ScreenResult<bool> {
    Ok(screen()?.is_history_managed())
}

pub fn set_history_managed(managed: bool) -> ScreenResult<()> {
    screen()?.set_history_managed(managed);
    Ok(())
}

pub fn invoke_controller_on_top<P, R>(call: &str, param: Option<&P>) -> ScreenResult<Option<R>>
where
    P: Serialize + ?Sized,
    R: DeserializeOwned,
{
    screen()?.invoke_controller_on_top(call, param)
}

pub fn invoke_controller_on_opener<P, R>(call: &str, param: Option<&P>) -> ScreenResult<Option<R>>
where
    P: Serialize + ?Sized,
    R: DeserializeOwned,
{
    screen()?.invoke_controller_on_opener(call, param)
}

pub fn invoke_controller_on_parent<P, R>(call: &str, param: Option<&P>) -> ScreenResult<Option<R>>
where
    P: Serialize + ?Sized,
    R: DeserializeOwned,
{
    screen()?.invoke_controller_on_parent(call, param)
}

/// Local invocation; failures are alerted by the screen and yield `Ok(None)`.
pub fn invoke_controller_on_self<P, R>(call: &str, param: Option<&P>) -> ScreenResult<Option<R>>
where
    P: Serialize + ?Sized,
    R: DeserializeOwned,
{
    Ok(screen()?.invoke_controller_on_self(call, param))
}
