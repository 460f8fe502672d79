use super::dashboard::{Dashboard, SharedDashboard};
use crate::session::UserKey;

/// Account owning dashboards
#[derive(Debug)]
pub struct User {
    pub key: UserKey,
    pub password: String,
    pub dashboards: Vec<SharedDashboard>,
}

impl User {
    pub fn new(email: impl Into<String>, password: impl Into<String>, dashboards: Vec<Dashboard>) -> Self {
        Self {
            key: UserKey::new(email),
            password: password.into(),
            dashboards: dashboards.into_iter().map(Dashboard::into_shared).collect(),
        }
    }

    pub fn dashboard(&self, dash_id: i32) -> Option<&SharedDashboard> {
        self.dashboards.iter().find(|d| d.read().id == dash_id)
    }
}
