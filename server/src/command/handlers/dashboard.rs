//! App requests to activate or deactivate a dashboard

use super::AppState;
use tracing::{debug, info};
use widgetlink_shared::{Message, Response};

/// Handle ACTIVATE_DASHBOARD / DEACTIVATE_DASHBOARD; the body is the dashboard id
pub fn handle_dashboard_activation(app: &AppState, message: &Message, active: bool) -> Response {
    let Ok(dash_id) = message.body.parse::<i32>() else {
        debug!("Dashboard id {:?} is not a number", message.body);
        return Response::illegal_command_body(message.id);
    };

    let Some(dash) = app.user.dashboard(dash_id) else {
        debug!("User {} has no dashboard {}", app.user.key, dash_id);
        return Response::illegal_command_body(message.id);
    };

    dash.write().is_active = active;
    info!(
        "Dashboard {} of {} {}",
        dash_id,
        app.user.key,
        if active { "activated" } else { "deactivated" }
    );
    Response::ok(message.id)
}
