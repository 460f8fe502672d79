//! Routes incoming messages to handlers by connection role and login state

use super::handlers::{self, AppState, HardwareState, SetWidgetPropertyLogic};
use crate::session::{ChannelHandle, ConnectionId, SessionRegistry};
use crate::state::ServerState;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use widgetlink_shared::{Command, Message, Response, ResponseCode};

/// Which listener a connection came in on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Hardware,
    App,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Hardware => write!(f, "hardware"),
            Role::App => write!(f, "app"),
        }
    }
}

/// Login state of one connection
#[derive(Debug, Clone, Default)]
pub enum ConnectionState {
    #[default]
    Unauthenticated,
    Hardware(HardwareState),
    App(AppState),
}

/// Dispatches messages to handlers and queues their replies
pub struct CommandDispatcher {
    server: Arc<ServerState>,
    set_widget_property: SetWidgetPropertyLogic,
}

impl CommandDispatcher {
    pub fn new(server: Arc<ServerState>) -> Self {
        let registry: Arc<dyn SessionRegistry> = server.sessions.clone();
        Self {
            set_widget_property: SetWidgetPropertyLogic::new(registry),
            server,
        }
    }

    /// Handle one message; any reply is queued on `handle`
    pub fn dispatch(&self, role: Role, conn: &mut ConnectionState, handle: &ChannelHandle, message: &Message) {
        debug!("{} {} <- {} id={}", role, handle.id, message.command, message.id);

        if message.command == Command::Ping {
            handle.try_send(Response::ok(message.id));
            return;
        }

        if matches!(conn, ConnectionState::Unauthenticated) && message.command == Command::Login {
            self.login(role, conn, handle, message);
            return;
        }

        let reply = match (&*conn, message.command) {
            (ConnectionState::Unauthenticated, _) => Some(Response::new(message.id, ResponseCode::UserNotAuthenticated)),
            (_, Command::Login) => Some(Response::new(message.id, ResponseCode::NotAllowed)),
            (ConnectionState::Hardware(hardware), Command::SetWidgetProperty) => {
                self.set_widget_property.message_received(hardware, message)
            }
            (ConnectionState::App(app), Command::ActivateDashboard) => {
                Some(handlers::handle_dashboard_activation(app, message, true))
            }
            (ConnectionState::App(app), Command::DeactivateDashboard) => {
                Some(handlers::handle_dashboard_activation(app, message, false))
            }
            _ => Some(Response::new(message.id, ResponseCode::IllegalCommand)),
        };

        if let Some(reply) = reply {
            handle.try_send(reply);
        }
    }

    fn login(&self, role: Role, conn: &mut ConnectionState, handle: &ChannelHandle, message: &Message) {
        let result = match role {
            Role::Hardware => handlers::handle_hardware_login(&self.server, handle, message).map(ConnectionState::Hardware),
            Role::App => handlers::handle_app_login(&self.server, handle, message).map(ConnectionState::App),
        };

        match result {
            Ok(state) => {
                handle.try_send(Response::ok(message.id));
                if let ConnectionState::App(app) = &state {
                    handlers::replay_pin_properties(&app.user, handle);
                }
                *conn = state;
            }
            Err(code) => {
                handle.try_send(Response::new(message.id, code));
            }
        }
    }

    /// Forget a closed connection
    pub fn disconnected(&self, conn: &ConnectionState, id: ConnectionId) {
        let user_key = match conn {
            ConnectionState::Unauthenticated => return,
            ConnectionState::Hardware(hardware) => &hardware.user_key,
            ConnectionState::App(app) => &app.user.key,
        };
        self.server.sessions.remove_channel(user_key, id);
    }
}
