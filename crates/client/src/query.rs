use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::ClientError;
use crate::fetch::Fetched;
use crate::navigator::LoginRedirect;

/// Default time a cached result is served without refetching.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

/// Hierarchical cache key, e.g. `["users", "me"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self.0.iter().map(|p| format!("\"{p}\"")).collect();
        write!(f, "[{}]", quoted.join(","))
    }
}

struct CachedValue {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
}

/// Last non-data outcome, handed to callers that waited on the fetch.
#[derive(Clone)]
enum Settled {
    NoContent,
    Redirected(LoginRedirect),
}

#[derive(Default)]
struct SlotState {
    cached: Option<CachedValue>,
    settled: Option<Settled>,
}

#[derive(Default)]
struct Slot {
    state: tokio::sync::Mutex<SlotState>,
    completed_fetches: AtomicU64,
}

/// Keyed cache of query results.
///
/// Fetches for one key are serialized: a caller that arrives while a fetch
/// is in flight waits for it and reuses its result instead of issuing a
/// second request. Errors are not cached.
pub struct QueryClient {
    slots: Mutex<HashMap<QueryKey, Arc<Slot>>>,
    stale_time: Duration,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryClient {
    pub fn new() -> Self {
        Self::with_stale_time(DEFAULT_STALE_TIME)
    }

    pub fn with_stale_time(stale_time: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            stale_time,
        }
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    fn slot(&self, key: &QueryKey) -> Arc<Slot> {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Return the cached value for `key` when it is fresh, otherwise run
    /// `fetch` and cache its data.
    pub async fn ensure_query_data<T, F, Fut>(
        &self,
        key: &QueryKey,
        fetch: F,
    ) -> Result<Fetched<T>, ClientError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Fetched<T>, ClientError>>,
    {
        let slot = self.slot(key);
        let seen = slot.completed_fetches.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        if let Some(cached) = &state.cached {
            if cached.fetched_at.elapsed() < self.stale_time {
                if let Some(value) = cached.value.downcast_ref::<T>() {
                    tracing::trace!(key = %key, "Query cache hit");
                    return Ok(Fetched::Data(value.clone()));
                }
            }
        }

        // A fetch finished while this caller waited and produced no data.
        if slot.completed_fetches.load(Ordering::Acquire) != seen {
            match &state.settled {
                Some(Settled::Redirected(redirect)) => {
                    return Ok(Fetched::Redirected(redirect.clone()))
                }
                Some(Settled::NoContent) => return Ok(Fetched::NoContent),
                None => {}
            }
        }

        tracing::debug!(key = %key, "Fetching query");
        let fetched = fetch().await?;
        match &fetched {
            Fetched::Data(value) => {
                state.cached = Some(CachedValue {
                    value: Arc::new(value.clone()),
                    fetched_at: Instant::now(),
                });
                state.settled = None;
            }
            Fetched::NoContent => state.settled = Some(Settled::NoContent),
            Fetched::Redirected(redirect) => {
                state.settled = Some(Settled::Redirected(redirect.clone()))
            }
        }
        slot.completed_fetches.fetch_add(1, Ordering::Release);
        Ok(fetched)
    }

    /// Cached value for `key` regardless of age. `None` while a fetch for
    /// the key is in flight.
    pub fn get_query_data<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        let slot = self.slot(key);
        let state = slot.state.try_lock().ok()?;
        state
            .cached
            .as_ref()
            .and_then(|c| c.value.downcast_ref::<T>())
            .cloned()
    }

    pub async fn set_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) {
        let slot = self.slot(key);
        let mut state = slot.state.lock().await;
        state.cached = Some(CachedValue {
            value: Arc::new(value),
            fetched_at: Instant::now(),
        });
        state.settled = None;
    }

    /// Drop the cached value so the next `ensure_query_data` refetches.
    pub async fn invalidate(&self, key: &QueryKey) {
        let slot = self.slot(key);
        let mut state = slot.state.lock().await;
        *state = SlotState::default();
    }

    /// Forget every key, e.g. after sign-out.
    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
