//! Accounts, device tokens and sessions shared by every connection

use crate::config::ServerConfig;
use crate::model::{SharedDashboard, User};
use crate::session::SessionManager;
use std::collections::HashMap;
use std::sync::Arc;

/// What a device token resolves to
#[derive(Debug, Clone)]
pub struct DeviceToken {
    pub user: Arc<User>,
    pub dash: SharedDashboard,
    pub dash_id: i32,
    pub device_id: i32,
}

#[derive(Debug)]
pub struct ServerState {
    users: HashMap<String, Arc<User>>,
    tokens: HashMap<String, DeviceToken>,
    pub sessions: Arc<SessionManager>,
}

impl ServerState {
    pub fn new(users: Vec<User>) -> Self {
        let mut tokens = HashMap::new();
        let users: HashMap<String, Arc<User>> = users
            .into_iter()
            .map(|user| (user.key.email.clone(), Arc::new(user)))
            .collect();

        for user in users.values() {
            for dash in &user.dashboards {
                let guard = dash.read();
                for device in &guard.devices {
                    tokens.insert(
                        device.token.clone(),
                        DeviceToken {
                            user: Arc::clone(user),
                            dash: Arc::clone(dash),
                            dash_id: guard.id,
                            device_id: device.id,
                        },
                    );
                }
            }
        }

        Self {
            users,
            tokens,
            sessions: Arc::new(SessionManager::new()),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config
                .users
                .iter()
                .map(|u| User::new(u.email.clone(), u.password.clone(), u.dashboards.clone()))
                .collect(),
        )
    }

    pub fn user(&self, email: &str) -> Option<&Arc<User>> {
        self.users.get(email)
    }

    pub fn resolve_token(&self, token: &str) -> Option<&DeviceToken> {
        self.tokens.get(token)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}
