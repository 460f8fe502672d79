//! Project model: users, dashboards, devices and widgets
//!
//! Dashboards are shared between every connection of an account and carry
//! their own lock, see [`SharedDashboard`].

mod dashboard;
mod user;
mod widget;

pub use dashboard::{Dashboard, Device, PinPropertyKey, SharedDashboard};
pub use user::User;
pub use widget::{PinBinding, PropertyError, PropertyUpdatable, Widget, WidgetKind, WidgetProperty};
