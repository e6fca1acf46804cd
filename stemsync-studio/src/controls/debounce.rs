//! Keyed trailing-edge debouncer
//!
//! Each call restarts the quiet period for its key; when the period elapses
//! without another call the last value is delivered. Keys are independent.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

type FireFn<K, V> = dyn Fn(&K, V) + Send + Sync;

struct Pending<V> {
    value: V,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

struct DebounceInner<K, V> {
    delay: Duration,
    pending: Mutex<HashMap<K, Pending<V>>>,
    next_generation: AtomicU64,
    fire: Box<FireFn<K, V>>,
}

impl<K, V> DebounceInner<K, V> {
    fn pending(&self) -> MutexGuard<'_, HashMap<K, Pending<V>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Debouncer<K, V> {
    inner: Arc<DebounceInner<K, V>>,
}

impl<K, V> Debouncer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + 'static,
{
    pub fn new(delay: Duration, fire: impl Fn(&K, V) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(DebounceInner {
                delay,
                pending: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                fire: Box::new(fire),
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Schedule `value` for `key`, replacing any pending value
    ///
    /// Outside an async runtime the value is delivered immediately.
    pub fn call(&self, key: K, value: V) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            (self.inner.fire)(&key, value);
            return;
        };

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut pending = self.inner.pending();
        let previous = pending.insert(
            key.clone(),
            Pending {
                value,
                generation,
                task: None,
            },
        );
        if let Some(task) = previous.and_then(|p| p.task) {
            task.abort();
        }

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(inner.delay).await;
            let ready = {
                let mut pending = inner.pending();
                match pending.get(&task_key) {
                    Some(entry) if entry.generation == generation => {
                        pending.remove(&task_key).map(|entry| entry.value)
                    }
                    _ => None,
                }
            };
            if let Some(value) = ready {
                (inner.fire)(&task_key, value);
            }
        });

        if let Some(entry) = pending.get_mut(&key) {
            entry.task = Some(task);
        }
    }

    /// Deliver every pending value now
    pub fn flush(&self) {
        let drained: Vec<(K, Pending<V>)> = self.inner.pending().drain().collect();
        for (key, entry) in drained {
            if let Some(task) = entry.task {
                task.abort();
            }
            (self.inner.fire)(&key, entry.value);
        }
    }

    /// Drop every pending value without delivering it
    pub fn cancel(&self) {
        let drained: Vec<(K, Pending<V>)> = self.inner.pending().drain().collect();
        for (_, entry) in drained {
            if let Some(task) = entry.task {
                task.abort();
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending().len()
    }
}
