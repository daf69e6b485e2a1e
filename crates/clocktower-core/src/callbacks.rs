//! Time-based callbacks with at most one pending timer per key.
//!
//! Scheduling a key that already has a pending timer replaces it: the old
//! timer never fires. The pending entry is removed before the callback runs,
//! so the callback may reschedule its own key.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{
    Arc, Mutex, Weak,
    atomic::{AtomicU64, Ordering},
};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

type Callback<K> = Arc<dyn Fn(K) -> BoxFuture<'static, ()> + Send + Sync>;

/// One timer slot per key. Clones share the same timers.
pub struct CallbackScheduler<K> {
    inner: Arc<SchedulerInner<K>>,
}

impl<K> Clone for CallbackScheduler<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SchedulerInner<K> {
    callback: Callback<K>,
    pending: Mutex<HashMap<K, PendingCallback>>,
    next_id: AtomicU64,
}

struct PendingCallback {
    id: u64,
    fire_at: Instant,
    handle: JoinHandle<()>,
}

impl<K> CallbackScheduler<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: Callback<K> = Arc::new(move |key| callback(key).boxed());
        Self {
            inner: Arc::new(SchedulerInner {
                callback,
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Arm the timer for `key` to fire at or after `at`, replacing any timer
    /// already pending for it.
    pub fn schedule_callback(&self, key: K, at: Instant) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let weak = Arc::downgrade(&self.inner);
        let task_key = key.clone();

        let mut pending = self.inner.pending.lock().unwrap();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(at).await;
            fire(weak, task_key, id).await;
        });
        if let Some(replaced) = pending.insert(key, PendingCallback { id, fire_at: at, handle }) {
            replaced.handle.abort();
            debug!(replaced_id = replaced.id, id, "Replaced pending callback");
        }
    }

    /// Disarm the timer for `key`. No-op when nothing is pending.
    pub fn cancel_callback(&self, key: &K) {
        if let Some(cancelled) = self.inner.pending.lock().unwrap().remove(key) {
            cancelled.handle.abort();
        }
    }

    pub fn is_scheduled(&self, key: &K) -> bool {
        self.inner.pending.lock().unwrap().contains_key(key)
    }

    /// When the pending timer for `key` is due, if any.
    pub fn scheduled_at(&self, key: &K) -> Option<Instant> {
        self.inner.pending.lock().unwrap().get(key).map(|p| p.fire_at)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().unwrap().len()
    }
}

async fn fire<K>(weak: Weak<SchedulerInner<K>>, key: K, id: u64)
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let callback = {
        let mut pending = inner.pending.lock().unwrap();
        match pending.get(&key) {
            Some(p) if p.id == id => {
                pending.remove(&key);
            }
            // Replaced or cancelled after the deadline passed.
            _ => return,
        }
        Arc::clone(&inner.callback)
    };
    drop(inner);
    callback(key).await;
}

impl<K> Drop for SchedulerInner<K> {
    fn drop(&mut self) {
        if let Ok(pending) = self.pending.get_mut() {
            for (_, p) in pending.drain() {
                p.handle.abort();
            }
        }
    }
}

/// Scheduler that only ever tracks one pending callback.
#[derive(Clone)]
pub struct SingleCallbackScheduler {
    inner: CallbackScheduler<()>,
}

impl SingleCallbackScheduler {
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            inner: CallbackScheduler::new(move |()| callback()),
        }
    }

    pub fn schedule_callback(&self, at: Instant) {
        self.inner.schedule_callback((), at);
    }

    pub fn cancel_callback(&self) {
        self.inner.cancel_callback(&());
    }

    pub fn is_scheduled(&self) -> bool {
        self.inner.is_scheduled(&())
    }

    pub fn scheduled_at(&self) -> Option<Instant> {
        self.inner.scheduled_at(&())
    }
}
