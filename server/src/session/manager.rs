//! Session registry keyed by account

use super::connection::ConnectionId;
use super::user_session::{Session, UserKey};
use dashmap::DashMap;
use std::sync::Arc;

/// Lookup of the live session of an account
pub trait SessionRegistry: Send + Sync {
    fn lookup(&self, user_key: &UserKey) -> Option<Arc<Session>>;
}

/// Manages the sessions of all connected accounts
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: DashMap<UserKey, Arc<Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the account's session, created on first use, while holding its map entry.
    /// `remove_channel` cannot drop the session until `f` returns.
    pub fn with_session<R>(&self, user_key: &UserKey, f: impl FnOnce(&Arc<Session>) -> R) -> R {
        let entry = self
            .sessions
            .entry(user_key.clone())
            .or_insert_with(|| Arc::new(Session::new(user_key.clone())));
        f(entry.value())
    }

    /// Drop a closed connection; the session goes away with its last connection
    pub fn remove_channel(&self, user_key: &UserKey, id: ConnectionId) {
        if let Some(session) = self.sessions.get(user_key) {
            session.remove_channel(id);
        }
        self.sessions.remove_if(user_key, |_, session| session.is_empty());
    }

    /// Number of accounts with at least one live connection
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

impl SessionRegistry for SessionManager {
    fn lookup(&self, user_key: &UserKey) -> Option<Arc<Session>> {
        self.sessions.get(user_key).map(|s| Arc::clone(s.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChannelHandle;
    use tokio::sync::mpsc;
    use widgetlink_shared::{Frame, Message};

    fn handle(id: u64) -> (ChannelHandle, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(1);
        let addr = "127.0.0.1:1".parse().expect("addr");
        (ChannelHandle::new(ConnectionId(id), addr, tx), rx)
    }

    #[test]
    fn test_with_session_reuses_session() {
        let manager = SessionManager::new();
        let key = UserKey::new("a@b.c");
        let first = manager.with_session(&key, Arc::clone);
        let second = manager.with_session(&key, Arc::clone);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.count(), 1);
        assert!(manager.lookup(&UserKey::new("x@y.z")).is_none());
    }

    #[test]
    fn test_session_removed_with_last_connection() {
        let manager = SessionManager::new();
        let key = UserKey::new("a@b.c");
        let (app, _rx) = handle(5);
        manager.with_session(&key, |session| session.add_app_channel(app));

        manager.remove_channel(&key, ConnectionId(5));
        assert!(manager.lookup(&key).is_none());
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn test_login_after_last_disconnect_stays_registered() {
        let manager = SessionManager::new();
        let key = UserKey::new("a@b.c");
        let (old, _old_rx) = handle(1);
        manager.with_session(&key, |session| session.add_app_channel(old));

        let (new, mut new_rx) = handle(2);
        manager.remove_channel(&key, ConnectionId(1));
        manager.with_session(&key, |session| session.add_app_channel(new));

        let session = manager.lookup(&key).expect("session");
        assert_eq!(session.app_count(), 1);
        assert_eq!(session.notify_apps(Message::ping(7)), 1);
        assert!(new_rx.try_recv().is_ok());
    }

    #[test]
    fn test_remove_waits_for_channel_being_added() {
        let manager = Arc::new(SessionManager::new());
        let key = UserKey::new("a@b.c");
        let (old, _old_rx) = handle(1);
        manager.with_session(&key, |session| session.add_app_channel(old));

        let (new, _new_rx) = handle(2);
        let remover = manager.with_session(&key, |session| {
            let manager = Arc::clone(&manager);
            let key = key.clone();
            let remover = std::thread::spawn(move || manager.remove_channel(&key, ConnectionId(1)));
            std::thread::sleep(std::time::Duration::from_millis(20));
            session.add_app_channel(new);
            remover
        });
        remover.join().expect("remover");

        let session = manager.lookup(&key).expect("session");
        assert_eq!(session.app_count(), 1);
    }
}
