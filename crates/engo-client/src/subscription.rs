//! Live views over store subscriptions.
//!
//! A view owns one store subscription and one tokio task. The task turns each
//! snapshot into a typed list and hands the whole list to the caller's
//! callback. [`Subscription::unsubscribe`] waits for that task to finish, so
//! once it returns the callback will not run again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use engo_store::{MessageStore, Snapshot, StoreSubscription, SubscriptionId};

use crate::error::SubscriptionError;

/// Handle to a running view. Dropping it also stops delivery.
pub struct Subscription {
    id: SubscriptionId,
    store: Arc<dyn MessageStore>,
    active: Arc<AtomicBool>,
    task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop the view. Safe to call more than once, including concurrently:
    /// every call returns only after the delivery task has finished.
    pub async fn unsubscribe(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.store.unsubscribe(self.id);

        // Held across the await so a concurrent caller waits for the same task.
        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            handle.abort();
            // Waits out a callback that is running right now.
            let _ = handle.await;
            debug!(sub = %self.id, "view stopped");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.store.unsubscribe(self.id);
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

/// Spawn the task that feeds `on_update` from `sub`.
///
/// `decode` maps a snapshot to the list the caller sees. The first store
/// error, or the stream ending while the view is still active, is reported
/// through `on_error` and ends the view.
pub(crate) fn spawn_view<T, D, U, E>(
    store: Arc<dyn MessageStore>,
    sub: StoreSubscription,
    decode: D,
    mut on_update: U,
    on_error: E,
) -> Subscription
where
    T: Send + 'static,
    D: Fn(&Snapshot) -> Vec<T> + Send + 'static,
    U: FnMut(Vec<T>) + Send + 'static,
    E: FnOnce(SubscriptionError) + Send + 'static,
{
    let StoreSubscription {
        id,
        path,
        mut events,
    } = sub;
    let active = Arc::new(AtomicBool::new(true));
    let flag = active.clone();

    let task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if !flag.load(Ordering::SeqCst) {
                return;
            }
            match event {
                Ok(snapshot) => on_update(decode(&snapshot)),
                Err(e) => {
                    warn!(path = %path, error = %e, "subscription failed");
                    flag.store(false, Ordering::SeqCst);
                    on_error(SubscriptionError::Store { path, source: e });
                    return;
                }
            }
        }

        if flag.swap(false, Ordering::SeqCst) {
            warn!(path = %path, "subscription closed by store");
            on_error(SubscriptionError::Closed(path));
        }
    });

    Subscription {
        id,
        store,
        active,
        task: AsyncMutex::new(Some(task)),
    }
}

/// Every view opened on behalf of one screen.
///
/// Closing the scope stops all of them before it returns, so nothing calls
/// back into a screen that is being torn down.
#[derive(Default)]
pub struct SurfaceScope {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SurfaceScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, sub: Subscription) {
        self.lock().push(sub);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stop every tracked view. Returns how many were stopped.
    pub async fn close(&self) -> usize {
        let subs = std::mem::take(&mut *self.lock());
        let count = subs.len();
        for sub in &subs {
            sub.unsubscribe().await;
        }
        debug!(count, "surface closed");
        count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use engo_store::{MemoryStore, StorePath};
    use tokio::sync::mpsc;

    fn view<U>(store: &Arc<MemoryStore>, sub: StoreSubscription, on_update: U) -> Subscription
    where
        U: FnMut(Vec<usize>) + Send + 'static,
    {
        spawn_view(store.clone(), sub, |s: &Snapshot| vec![s.len()], on_update, |_| {})
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_unsubscribe_waits_for_running_callback() {
        let store = Arc::new(MemoryStore::new());
        let sub = store
            .subscribe_children(&StorePath::parse("messages/alice/bob").unwrap())
            .await
            .unwrap();

        let running = Arc::new(AtomicBool::new(false));
        let flag = running.clone();
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let sub = Arc::new(view(&store, sub, move |_| {
            flag.store(true, Ordering::SeqCst);
            let _ = started_tx.send(());
            std::thread::sleep(Duration::from_millis(300));
            flag.store(false, Ordering::SeqCst);
        }));

        started_rx.recv().await.unwrap();
        assert!(running.load(Ordering::SeqCst));

        let first = {
            let sub = sub.clone();
            tokio::spawn(async move { sub.unsubscribe().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        sub.unsubscribe().await;
        assert!(!running.load(Ordering::SeqCst));

        first.await.unwrap();
        assert!(!running.load(Ordering::SeqCst));
        assert!(!sub.is_active());
    }

    #[tokio::test]
    async fn test_drop_stops_delivery() {
        let store = Arc::new(MemoryStore::new());
        let conv = StorePath::parse("messages/alice/bob").unwrap();
        let sub = store.subscribe_children(&conv).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = view(&store, sub, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(handle);
        let before = calls.load(Ordering::SeqCst);

        store
            .write(&conv.child("k1").unwrap(), serde_json::json!(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(calls.load(Ordering::SeqCst), before);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_scope_close_stops_every_view() {
        let store = Arc::new(MemoryStore::new());
        let scope = SurfaceScope::new();
        for peer in ["bob", "carol"] {
            let path = StorePath::parse("messages/alice").unwrap().child(peer).unwrap();
            let sub = store.subscribe_children(&path).await.unwrap();
            scope.track(view(&store, sub, |_| {}));
        }
        assert_eq!(scope.len(), 2);
        assert_eq!(store.subscriber_count(), 2);

        assert_eq!(scope.close().await, 2);
        assert!(scope.is_empty());
        assert_eq!(store.subscriber_count(), 0);
    }
}
