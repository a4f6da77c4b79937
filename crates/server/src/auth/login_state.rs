use oauth2::PkceCodeVerifier;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// TTL for pending logins.
const STATE_TTL: Duration = Duration::from_secs(600);

/// A login that was sent to the identity provider and has not come back yet.
pub struct PendingLogin {
    pub verifier: PkceCodeVerifier,
    /// Local path to land on once signed in.
    pub return_url: String,
}

struct Entry {
    login: PendingLogin,
    created_at: Instant,
}

/// In-memory CSRF state store keyed by the OAuth `state` parameter.
pub struct LoginStateStore {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl Default for LoginStateStore {
    fn default() -> Self {
        Self::with_ttl(STATE_TTL)
    }
}

impl LoginStateStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn insert(&self, state: String, login: PendingLogin) {
        let mut entries = self.entries.lock().await;

        // Prune expired entries while we hold the lock
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.created_at.elapsed() <= ttl);

        entries.insert(
            state,
            Entry {
                login,
                created_at: Instant::now(),
            },
        );
    }

    /// Remove and return the pending login for `state`.
    /// Unknown and expired states return `None`; a state is usable once.
    pub async fn take(&self, state: &str) -> Option<PendingLogin> {
        let entry = self.entries.lock().await.remove(state)?;
        if entry.created_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.login)
    }

    pub async fn pending_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}
