//! Leading + trailing edge throttler
//!
//! The first call in a window is delivered immediately. Calls arriving
//! during the window replace a single trailing value, delivered when the
//! window closes; delivering it opens a new window.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

struct ThrottleState<V> {
    window_open: bool,
    trailing: Option<V>,
    task: Option<JoinHandle<()>>,
}

struct ThrottleInner<V> {
    window: Duration,
    state: Mutex<ThrottleState<V>>,
    fire: Box<dyn Fn(V) + Send + Sync>,
}

impl<V> ThrottleInner<V> {
    fn state(&self) -> MutexGuard<'_, ThrottleState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Throttler<V> {
    inner: Arc<ThrottleInner<V>>,
}

impl<V: Send + 'static> Throttler<V> {
    pub fn new(window: Duration, fire: impl Fn(V) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(ThrottleInner {
                window,
                state: Mutex::new(ThrottleState {
                    window_open: false,
                    trailing: None,
                    task: None,
                }),
                fire: Box::new(fire),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    pub fn call(&self, value: V) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            (self.inner.fire)(value);
            return;
        };

        {
            let mut state = self.inner.state();
            if state.window_open {
                state.trailing = Some(value);
                return;
            }
            state.window_open = true;
        }

        (self.inner.fire)(value);

        let inner = Arc::clone(&self.inner);
        let task = runtime.spawn(async move {
            loop {
                tokio::time::sleep(inner.window).await;
                let next = {
                    let mut state = inner.state();
                    let next = state.trailing.take();
                    if next.is_none() {
                        state.window_open = false;
                        state.task = None;
                    }
                    next
                };
                match next {
                    Some(value) => (inner.fire)(value),
                    None => break,
                }
            }
        });

        let mut state = self.inner.state();
        if state.window_open {
            state.task = Some(task);
        }
    }

    /// Close the window and drop any trailing value
    pub fn cancel(&self) {
        let task = {
            let mut state = self.inner.state();
            state.window_open = false;
            state.trailing = None;
            state.task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<f64>>>, impl Fn(f64) + Send + Sync + 'static) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        (log, move |v: f64| sink.lock().unwrap().push(v))
    }

    #[tokio::test(start_paused = true)]
    async fn test_leading_and_trailing() {
        let (log, fire) = recorder();
        let throttler = Throttler::new(Duration::from_millis(16), fire);

        throttler.call(1.0);
        assert_eq!(*log.lock().unwrap(), vec![1.0]);

        throttler.call(2.0);
        throttler.call(3.0);
        assert_eq!(*log.lock().unwrap(), vec![1.0]);

        tokio::time::sleep(Duration::from_millis(17)).await;
        assert_eq!(*log.lock().unwrap(), vec![1.0, 3.0]);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(*log.lock().unwrap(), vec![1.0, 3.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_call_has_no_trailing() {
        let (log, fire) = recorder();
        let throttler = Throttler::new(Duration::from_millis(16), fire);

        throttler.call(5.0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        throttler.call(6.0);

        assert_eq!(*log.lock().unwrap(), vec![5.0, 6.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_trailing() {
        let (log, fire) = recorder();
        let throttler = Throttler::new(Duration::from_millis(16), fire);

        throttler.call(1.0);
        throttler.call(2.0);
        throttler.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*log.lock().unwrap(), vec![1.0]);
    }
}
