// ── Handler registries ──
//
// String-keyed maps of stored callbacks, one per consumer. Handlers are
// cloned out of the map before they run, so a handler may register or
// unregister entries (its own included) without deadlocking on a shard lock.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use homeconnect_api::{ApiClient, Error, Event};
use tracing::trace;

// ── HandlerRegistry ──────────────────────────────────────────────────

/// Keyed storage for shared handlers of contract `H`. Last registration wins.
pub struct HandlerRegistry<H: ?Sized> {
    handlers: DashMap<String, Arc<H>>,
}

impl<H: ?Sized> HandlerRegistry<H> {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Store `handler` under `key`, returning the one it replaced.
    pub fn register(&self, key: impl Into<String>, handler: Arc<H>) -> Option<Arc<H>> {
        self.handlers.insert(key.into(), handler)
    }

    pub fn unregister(&self, key: &str) -> Option<Arc<H>> {
        self.handlers.remove(key).map(|(_, handler)| handler)
    }

    pub fn get(&self, key: &str) -> Option<Arc<H>> {
        self.handlers.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.handlers.iter().map(|entry| entry.key().clone()).collect()
    }

    /// All entries, cloned out of the map.
    pub fn entries(&self) -> Vec<(String, Arc<H>)> {
        self.handlers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&self) {
        self.handlers.clear();
    }
}

impl<H: ?Sized> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

// ── EventDispatcher ──────────────────────────────────────────────────

/// Contract for event handlers: one call per event with a matching key.
pub type EventHandler = dyn Fn(&Event) + Send + Sync;

/// Routes events to the handler registered for their exact key.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HandlerRegistry<EventHandler>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_event_handler<F>(&self, key: impl Into<String>, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.handlers.register(key, Arc::new(handler));
    }

    /// Returns `false` if no handler was registered for `key`.
    pub fn unregister_event_handler(&self, key: &str) -> bool {
        self.handlers.unregister(key).is_some()
    }

    /// Deliver `event` to its handler. Returns `false` (and drops the
    /// event) when nothing is registered for its key.
    pub fn dispatch(&self, event: &Event) -> bool {
        match self.handlers.get(&event.key) {
            Some(handler) => {
                handler(event);
                true
            }
            None => {
                trace!(key = %event.key, "no handler for event, dropped");
                false
            }
        }
    }

    pub fn handled_keys(&self) -> Vec<String> {
        self.handlers.keys()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// ── RefreshRegistry ──────────────────────────────────────────────────

pub type RefreshFuture<T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send>>;

/// Contract for property refreshers: read the current value(s) through the
/// API on demand.
pub type RefreshFn<T> = dyn Fn(ApiClient) -> RefreshFuture<T> + Send + Sync;

/// On-demand refreshers keyed by property id.
pub struct RefreshRegistry<T> {
    handlers: HandlerRegistry<RefreshFn<T>>,
}

impl<T> Default for RefreshRegistry<T> {
    fn default() -> Self {
        Self {
            handlers: HandlerRegistry::new(),
        }
    }
}

impl<T: Send + 'static> RefreshRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_property_refresh<F, Fut>(&self, id: impl Into<String>, refresh: F)
    where
        F: Fn(ApiClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let handler: Arc<RefreshFn<T>> =
            Arc::new(move |api: ApiClient| -> RefreshFuture<T> { Box::pin(refresh(api)) });
        self.handlers.register(id, handler);
    }

    pub fn unregister_property_refresh(&self, id: &str) -> bool {
        self.handlers.unregister(id).is_some()
    }

    /// Run the refresher registered under `id`, if any.
    pub async fn refresh(&self, id: &str, api: &ApiClient) -> Option<Result<T, Error>> {
        let handler = self.handlers.get(id)?;
        Some(handler(api.clone()).await)
    }

    /// Run every registered refresher concurrently.
    pub async fn refresh_all(&self, api: &ApiClient) -> Vec<(String, Result<T, Error>)> {
        let pending = self.handlers.entries().into_iter().map(|(id, handler)| {
            let fut = handler(api.clone());
            async move { (id, fut.await) }
        });
        join_all(pending).await
    }

    pub fn ids(&self) -> Vec<String> {
        self.handlers.keys()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use homeconnect_api::Data;

    use super::*;

    fn event(key: &str, value: &str) -> Event {
        Data::new(key, Some(value.into()), None)
    }

    #[test]
    fn dispatch_routes_by_exact_key() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        dispatcher.register_event_handler("BSH.Common.Status.DoorState", move |e| {
            sink.lock().unwrap().push(e.value.clone());
        });

        assert!(dispatcher.dispatch(&event("BSH.Common.Status.DoorState", "Open")));
        assert!(!dispatcher.dispatch(&event("BSH.Common.Status.DoorStateX", "Open")));
        assert!(!dispatcher.dispatch(&event("BSH.Common.Status", "Open")));

        assert_eq!(*seen.lock().unwrap(), vec![Some("Open".to_string())]);
    }

    #[test]
    fn last_registration_wins() {
        let dispatcher = EventDispatcher::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&first);
        dispatcher.register_event_handler("k", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(&second);
        dispatcher.register_event_handler("k", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.dispatch(&event("k", "v"));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn unregister_stops_delivery() {
        let dispatcher = EventDispatcher::new();
        dispatcher.register_event_handler("k", |_| {});

        assert!(dispatcher.unregister_event_handler("k"));
        assert!(!dispatcher.unregister_event_handler("k"));
        assert!(!dispatcher.dispatch(&event("k", "v")));
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn handler_may_mutate_registry_while_dispatching() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let d = Arc::clone(&dispatcher);
        let c = Arc::clone(&calls);
        dispatcher.register_event_handler("once", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            d.unregister_event_handler("once");
            d.register_event_handler("next", |_| {});
        });

        assert!(dispatcher.dispatch(&event("once", "v")));
        assert!(!dispatcher.dispatch(&event("once", "v")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.handled_keys(), vec!["next".to_string()]);
    }

    #[test]
    fn registries_are_independent() {
        let a = EventDispatcher::new();
        let b = EventDispatcher::new();
        a.register_event_handler("k", |_| {});

        assert!(a.dispatch(&event("k", "v")));
        assert!(!b.dispatch(&event("k", "v")));
    }

    #[test]
    fn generic_registry_returns_replaced_handler() {
        let registry: HandlerRegistry<dyn Fn() -> u32 + Send + Sync> = HandlerRegistry::new();
        assert!(registry.register("a", Arc::new(|| 1)).is_none());
        let old = registry.register("a", Arc::new(|| 2)).unwrap();

        assert_eq!(old(), 1);
        assert_eq!(registry.get("a").unwrap()(), 2);
        assert!(registry.contains("a"));
        assert_eq!(registry.entries().len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }
}
