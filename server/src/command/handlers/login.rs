//! Login for hardware (device token) and app (email and password) connections

use super::{AppState, HardwareState};
use crate::model::User;
use crate::session::{app_body, ChannelHandle, HardwareChannel};
use crate::state::ServerState;
use std::sync::Arc;
use tracing::{debug, info};
use widgetlink_shared::{split2, Command, Message, ResponseCode, BODY_SEPARATOR};

/// Message id used for frames the server pushes on its own
const SERVER_PUSH_ID: u16 = 1;

/// Handle LOGIN from a hardware connection; the body is the device token
pub fn handle_hardware_login(
    server: &ServerState,
    handle: &ChannelHandle,
    message: &Message,
) -> Result<HardwareState, ResponseCode> {
    let token = message.body.trim();
    let Some(entry) = server.resolve_token(token) else {
        debug!("Invalid token from {} ({})", handle.id, handle.addr);
        return Err(ResponseCode::InvalidToken);
    };

    let session = server.sessions.with_session(&entry.user.key, |session| {
        if session.is_hardware_online(entry.dash_id, entry.device_id) {
            info!(
                "Device {} of dashboard {} is already connected, adding {}",
                entry.device_id, entry.dash_id, handle.addr
            );
        }
        session.add_hardware_channel(HardwareChannel {
            handle: handle.clone(),
            dash_id: entry.dash_id,
            device_id: entry.device_id,
        });
        Arc::clone(session)
    });
    session.notify_apps(Message::new(
        Command::HardwareConnected,
        message.id,
        format!("{}-{}", entry.dash_id, entry.device_id),
    ));

    info!(
        "Device {} of dashboard {} ({}) logged in from {}",
        entry.device_id, entry.dash_id, entry.user.key, handle.addr
    );

    Ok(HardwareState {
        user_key: entry.user.key.clone(),
        dash: Arc::clone(&entry.dash),
        device_id: entry.device_id,
    })
}

/// Handle LOGIN from an app connection; the body is `email\0password`
pub fn handle_app_login(
    server: &ServerState,
    handle: &ChannelHandle,
    message: &Message,
) -> Result<AppState, ResponseCode> {
    let parts = split2(&message.body);
    let [email, password] = parts.as_slice() else {
        return Err(ResponseCode::IllegalCommandBody);
    };

    let user = match server.user(email) {
        Some(user) if user.password == *password => Arc::clone(user),
        _ => {
            debug!("App login failed for {:?} from {}", email, handle.addr);
            return Err(ResponseCode::UserNotAuthenticated);
        }
    };

    server
        .sessions
        .with_session(&user.key, |session| session.add_app_channel(handle.clone()));

    info!("App {} logged in as {}", handle.addr, user.key);
    Ok(AppState { user })
}

/// Push every cached pin property of the user's dashboards to one app connection.
/// Returns how many frames were queued.
pub fn replay_pin_properties(user: &User, handle: &ChannelHandle) -> usize {
    let mut queued = 0;
    for dash in &user.dashboards {
        let dash = dash.read();
        for (key, value) in dash.pin_properties() {
            let body = format!(
                "{}{sep}{}{sep}{}",
                key.pin,
                key.property,
                value,
                sep = BODY_SEPARATOR
            );
            let message = Message::new(
                Command::SetWidgetProperty,
                SERVER_PUSH_ID,
                app_body(dash.id, key.device_id, &body),
            );
            if handle.try_send(message) {
                queued += 1;
            }
        }
    }
    queued
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dashboard, Device, WidgetProperty};
    use crate::session::{ConnectionId, SessionRegistry};
    use tokio::sync::mpsc;
    use widgetlink_shared::{Frame, PinType};

    fn server() -> ServerState {
        let mut dash = Dashboard::new(3, "Lab");
        dash.devices.push(Device {
            id: 1,
            name: "board".into(),
            token: "tok".into(),
        });
        ServerState::new(vec![User::new("a@b.c", "pw", vec![dash])])
    }

    fn handle(id: u64) -> (ChannelHandle, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(16);
        let addr = "127.0.0.1:7000".parse().expect("addr");
        (ChannelHandle::new(ConnectionId(id), addr, tx), rx)
    }

    #[test]
    fn test_hardware_login_registers_channel() {
        let server = server();
        let (hw, _rx) = handle(1);

        let state = handle_hardware_login(&server, &hw, &Message::login(1, "tok")).expect("login");
        assert_eq!(state.device_id, 1);
        assert_eq!(state.dash.read().id, 3);

        let session = server.sessions.lookup(&state.user_key).expect("session");
        assert!(session.is_hardware_online(3, 1));
    }

    #[test]
    fn test_hardware_login_bad_token() {
        let server = server();
        let (hw, _rx) = handle(1);
        let result = handle_hardware_login(&server, &hw, &Message::login(1, "wrong"));
        assert!(matches!(result, Err(ResponseCode::InvalidToken)));
        assert_eq!(server.sessions.count(), 0);
    }

    #[test]
    fn test_hardware_login_notifies_apps() {
        let server = server();
        let (app, mut app_rx) = handle(1);
        handle_app_login(&server, &app, &Message::login(1, "a@b.c\0pw")).expect("app login");

        let (hw, _hw_rx) = handle(2);
        handle_hardware_login(&server, &hw, &Message::login(9, "tok")).expect("hw login");

        assert_eq!(
            app_rx.try_recv().ok(),
            Some(Frame::Message(Message::new(Command::HardwareConnected, 9, "3-1")))
        );
    }

    #[test]
    fn test_app_login_checks_password() {
        let server = server();
        let (app, _rx) = handle(1);
        assert!(matches!(
            handle_app_login(&server, &app, &Message::login(1, "a@b.c\0nope")),
            Err(ResponseCode::UserNotAuthenticated)
        ));
        assert!(matches!(
            handle_app_login(&server, &app, &Message::login(1, "a@b.c")),
            Err(ResponseCode::IllegalCommandBody)
        ));
        assert!(handle_app_login(&server, &app, &Message::login(1, "a@b.c\0pw")).is_ok());
    }

    #[test]
    fn test_replay_pin_properties() {
        let server = server();
        let user = server.user("a@b.c").expect("user");
        user.dashboards[0]
            .write()
            .put_pin_property(1, PinType::Virtual, 8, WidgetProperty::Color, "#00FF00");

        let (app, mut rx) = handle(1);
        assert_eq!(replay_pin_properties(user, &app), 1);
        assert_eq!(
            rx.try_recv().ok(),
            Some(Frame::Message(Message::new(
                Command::SetWidgetProperty,
                SERVER_PUSH_ID,
                "3-1\u{0}8\0color\0#00FF00"
            )))
        );
    }
}
