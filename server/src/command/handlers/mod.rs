//! Command handlers for hardware and app connections

mod dashboard;
mod login;
mod set_widget_property;

pub use dashboard::handle_dashboard_activation;
pub use login::{handle_app_login, handle_hardware_login, replay_pin_properties};
pub use set_widget_property::{SetPropertyError, SetWidgetPropertyLogic};

use crate::model::{SharedDashboard, User};
use crate::session::UserKey;
use std::sync::Arc;

/// Context of a logged-in hardware connection
#[derive(Debug, Clone)]
pub struct HardwareState {
    pub user_key: UserKey,
    pub dash: SharedDashboard,
    pub device_id: i32,
}

/// Context of a logged-in app connection
#[derive(Debug, Clone)]
pub struct AppState {
    pub user: Arc<User>,
}
