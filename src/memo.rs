//! Compute-once memo cells with a time-to-live
//!
//! Concurrent callers of an empty cell race on a single initialization; the
//! losers await the winner's value. A failed initialization leaves the cell
//! empty so the next caller retries. Once the TTL passes the cell is swapped
//! for a fresh one and the value is recomputed.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

struct Stamped<T> {
    value: Arc<T>,
    computed_at: Instant,
}

type Slot<T> = Arc<OnceCell<Stamped<T>>>;

fn is_stale<T>(slot: &Slot<T>, ttl: Duration) -> bool {
    slot.get()
        .map(|stamped| stamped.computed_at.elapsed() >= ttl)
        .unwrap_or(false)
}

async fn init_slot<T, E, F, Fut>(slot: Slot<T>, init: F) -> Result<Arc<T>, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let stamped = slot
        .get_or_try_init(|| async move {
            let value = init().await?;
            Ok::<_, E>(Stamped {
                value: Arc::new(value),
                computed_at: Instant::now(),
            })
        })
        .await?;
    Ok(Arc::clone(&stamped.value))
}

/// A single memoized value
pub struct TtlMemo<T> {
    ttl: Duration,
    slot: RwLock<Slot<T>>,
}

impl<T> TtlMemo<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(Arc::new(OnceCell::new())),
        }
    }

    /// The current value, computing it with `init` if empty or expired
    pub async fn get_or_try_init<E, F, Fut>(&self, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        init_slot(self.current(), init).await
    }

    /// Value if computed and still fresh
    pub fn peek(&self) -> Option<Arc<T>> {
        let slot = self.current();
        slot.get().map(|stamped| Arc::clone(&stamped.value))
    }

    /// Forget the value; the next read recomputes
    pub fn invalidate(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Arc::new(OnceCell::new());
    }

    fn current(&self) -> Slot<T> {
        {
            let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
            if !is_stale(&slot, self.ttl) {
                return Arc::clone(&slot);
            }
        }

        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        // Another caller may have swapped it already
        if is_stale(&slot, self.ttl) {
            *slot = Arc::new(OnceCell::new());
        }
        Arc::clone(&slot)
    }
}

/// Memoized values addressed by key, each with its own TTL window
pub struct KeyedMemo<K, T> {
    ttl: Duration,
    slots: Mutex<HashMap<K, Slot<T>>>,
}

impl<K: Eq + Hash + Clone, T> KeyedMemo<K, T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_try_init<E, F, Fut>(&self, key: &K, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        init_slot(self.slot(key), init).await
    }

    pub fn invalidate(&self, key: &K) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.remove(key);
    }

    pub fn clear(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.clear();
    }

    fn slot(&self, key: &K) -> Slot<T> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let slot = slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()));
        if is_stale(slot, self.ttl) {
            *slot = Arc::new(OnceCell::new());
        }
        Arc::clone(slot)
    }
}
