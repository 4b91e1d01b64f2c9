use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use uuid::Uuid;

use crate::chat::{ChatMessage, Dispatcher};

// One dispatcher per chat session; the async mutex queues overlapping submissions
pub type Session = Arc<tokio::sync::Mutex<Dispatcher>>;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

struct SessionEntry {
    session: Session,
    last_used: Instant,
}

/// Server-issued chat sessions, evicted when idle past the TTL or when the cap is reached.
pub struct SessionStore {
    sessions: HashMap<Uuid, SessionEntry>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
            max_sessions,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn get(&mut self, id: &Uuid) -> Option<Session> {
        self.get_at(id, Instant::now())
    }

    pub fn insert(&mut self, dispatcher: Dispatcher) -> (Uuid, Session) {
        self.insert_at(dispatcher, Instant::now())
    }

    fn get_at(&mut self, id: &Uuid, now: Instant) -> Option<Session> {
        self.evict_expired(now);
        self.sessions.get_mut(id).map(|entry| {
            entry.last_used = now;
            entry.session.clone()
        })
    }

    fn insert_at(&mut self, dispatcher: Dispatcher, now: Instant) -> (Uuid, Session) {
        self.evict_expired(now);
        while self.sessions.len() >= self.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    info!("Session cap of {} reached, evicting {}", self.max_sessions, id);
                    self.sessions.remove(&id);
                }
                None => break,
            }
        }

        let id = Uuid::new_v4();
        let session = Arc::new(tokio::sync::Mutex::new(dispatcher));
        self.sessions.insert(
            id,
            SessionEntry {
                session: session.clone(),
                last_used: now,
            },
        );
        (id, session)
    }

    fn evict_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| now.saturating_duration_since(entry.last_used) < ttl);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            debug!("Evicted {} idle chat sessions", evicted);
        }
    }
}

/// Submits one message to a session, waiting behind any submission already in flight.
pub async fn submit(session: &Session, message: &str) -> (ChatMessage, usize) {
    let mut dispatcher = session.lock().await;
    let reply = dispatcher.submit(message).await.clone();
    (reply, dispatcher.transcript().len())
}
