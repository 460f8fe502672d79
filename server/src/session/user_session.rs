//! All live connections of one account

use super::connection::{ChannelHandle, ConnectionId};
use parking_lot::RwLock;
use std::fmt;
use tracing::debug;
use widgetlink_shared::{Command, Message, BODY_SEPARATOR};

/// Identity of an account
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserKey {
    pub email: String,
}

impl UserKey {
    pub fn new(email: impl Into<String>) -> Self {
        Self { email: email.into() }
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.email)
    }
}

/// Hardware connection together with the device it logged in as
#[derive(Debug, Clone)]
pub struct HardwareChannel {
    pub handle: ChannelHandle,
    pub dash_id: i32,
    pub device_id: i32,
}

/// Body of a frame relayed to apps: `"{dash_id}-{device_id}\0{body}"`
pub fn app_body(dash_id: i32, device_id: i32, body: &str) -> String {
    format!("{dash_id}-{device_id}{BODY_SEPARATOR}{body}")
}

/// Live app and hardware connections of one account
#[derive(Debug)]
pub struct Session {
    pub user_key: UserKey,
    app_channels: RwLock<Vec<ChannelHandle>>,
    hardware_channels: RwLock<Vec<HardwareChannel>>,
}

impl Session {
    pub fn new(user_key: UserKey) -> Self {
        Self {
            user_key,
            app_channels: RwLock::new(Vec::new()),
            hardware_channels: RwLock::new(Vec::new()),
        }
    }

    pub fn add_app_channel(&self, handle: ChannelHandle) {
        self.app_channels.write().push(handle);
    }

    pub fn add_hardware_channel(&self, channel: HardwareChannel) {
        self.hardware_channels.write().push(channel);
    }

    /// Forget a connection, whichever side it was on
    pub fn remove_channel(&self, id: ConnectionId) {
        self.app_channels.write().retain(|h| h.id != id);
        self.hardware_channels.write().retain(|c| c.handle.id != id);
    }

    /// Relay a device event to every app connection of this account.
    ///
    /// Delivery is fire-and-forget: a slow or closed app never holds up or fails
    /// the caller. Returns how many app connections accepted the frame.
    pub fn send_to_apps(&self, command: Command, msg_id: u16, dash_id: i32, device_id: i32, body: &str) -> usize {
        self.notify_apps(Message::new(command, msg_id, app_body(dash_id, device_id, body)))
    }

    /// Queue a ready-made message on every app connection
    pub fn notify_apps(&self, message: Message) -> usize {
        let channels = self.app_channels.read();
        let delivered = channels
            .iter()
            .filter(|handle| handle.try_send(message.clone()))
            .count();

        if delivered < channels.len() {
            debug!(
                "{} delivered to {}/{} app connections of {}",
                message.command,
                delivered,
                channels.len(),
                self.user_key
            );
        }
        delivered
    }

    pub fn app_count(&self) -> usize {
        self.app_channels.read().len()
    }

    pub fn hardware_count(&self) -> usize {
        self.hardware_channels.read().len()
    }

    /// Whether the device is currently online
    pub fn is_hardware_online(&self, dash_id: i32, device_id: i32) -> bool {
        self.hardware_channels
            .read()
            .iter()
            .any(|c| c.dash_id == dash_id && c.device_id == device_id && !c.handle.is_closed())
    }

    pub fn is_empty(&self) -> bool {
        self.app_count() == 0 && self.hardware_count() == 0
    }
}
