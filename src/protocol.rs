//! Message id allocation and tracking of requests awaiting a response

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use widgetlink_shared::Response;

/// Allocates message ids 1..=65535, wrapping and never handing out 0
#[derive(Debug, Default)]
pub struct MessageIds {
    last: AtomicU16,
}

impl MessageIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u16 {
        loop {
            let id = self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if id != 0 {
                return id;
            }
        }
    }
}

/// A request sent to the server and not yet answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: u16,
    pub description: String,
    pub sent_at_ms: u64,
}

/// Matches responses to the requests that caused them
#[derive(Debug)]
pub struct RequestTracker {
    pending: HashMap<u16, PendingRequest>,
    timeout_ms: u64,
}

impl RequestTracker {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            timeout_ms,
        }
    }

    /// Remember a sent request; an older entry with the same id is replaced
    pub fn track(&mut self, id: u16, description: impl Into<String>, now_ms: u64) {
        self.pending.insert(
            id,
            PendingRequest {
                id,
                description: description.into(),
                sent_at_ms: now_ms,
            },
        );
    }

    /// The request a response answers, if it is still pending
    pub fn resolve(&mut self, response: &Response) -> Option<PendingRequest> {
        self.pending.remove(&response.id)
    }

    /// Drop and return requests that waited longer than the timeout
    pub fn expire(&mut self, now_ms: u64) -> Vec<PendingRequest> {
        let expired: Vec<u16> = self
            .pending
            .values()
            .filter(|r| now_ms.saturating_sub(r.sent_at_ms) > self.timeout_ms)
            .map(|r| r.id)
            .collect();

        let mut requests: Vec<PendingRequest> = expired
            .iter()
            .filter_map(|id| self.pending.remove(id))
            .collect();
        requests.sort_by_key(|r| r.id);
        requests
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
