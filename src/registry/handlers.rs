//! Named handlers the remote side may invoke.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::endpoint::Responder;

/// A locally registered function callable by the remote side.
///
/// Receives the request payload (`null` when absent) and a [`Responder`]
/// when the caller asked for a result.
pub type Handler = Arc<dyn Fn(Value, Option<Responder>) + Send + Sync>;

/// Concurrent name-to-handler map.
///
/// Uses `DashMap` so registration may race with lookups from delivery
/// threads. `lookup` clones the `Arc` out, so no shard lock is held while
/// a handler runs.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler.
    ///
    /// Returns `true` when an existing registration was replaced.
    pub fn register(&self, name: impl Into<String>, handler: Handler) -> bool {
        self.handlers.insert(name.into(), handler).is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn counting_handler(counter: Arc<AtomicUsize>, step: usize) -> Handler {
        Arc::new(move |_, _| {
            counter.fetch_add(step, Ordering::SeqCst);
        })
    }

    #[test]
    fn lookup_unknown_name_returns_none() {
        let registry = HandlerRegistry::new();
        assert!(registry.lookup("missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn last_registration_wins() {
        let registry = HandlerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        assert!(!registry.register("h", counting_handler(Arc::clone(&counter), 1)));
        assert!(registry.register("h", counting_handler(Arc::clone(&counter), 100)));

        let handler = registry.lookup("h").expect("handler should be registered");
        handler(Value::Null, None);

        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn names_are_sorted() {
        let registry = HandlerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register("b", counting_handler(Arc::clone(&counter), 1));
        registry.register("a", counting_handler(Arc::clone(&counter), 1));

        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn concurrent_register_and_lookup_do_not_lose_entries() {
        let registry = Arc::new(HandlerRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for i in 0..50 {
                        let name = format!("h{worker}-{i}");
                        registry.register(name.clone(), counting_handler(Arc::clone(&counter), 1));
                        assert!(registry.lookup(&name).is_some());
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(registry.len(), 400);
    }
}
