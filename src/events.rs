//! Event manager (spec.md §4.8) — the prioritized, conditional, one-shot
//! handler registry every updater's lifecycle events fan out through.
//!
//! Built directly from the spec's operation list; the teacher has no single
//! analogous component, but its typed-event style in
//! `src/backtest_v2/events.rs` (plain enums, `Serialize`/`Deserialize`,
//! `#[inline]` helper methods) sets the idiom for the event payload enums
//! each updater defines (`AccountEvent`, `PositionEvent`, `OrderEvent`).
//!
//! Rust mapping of "throw"/"exception" in the spec text: handlers return
//! `Result<(), String>` rather than being invoked inside a `catch_unwind` —
//! idiomatic Rust uses `Result` for expected failure, not panics, and a
//! `Fn(&T) -> Result<(), String>` handler can't "throw" without aborting the
//! whole process, which would contradict §7's "errors are opt-in via the
//! event-manager emission result."

use crate::error::{CacheError, CacheResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// spec.md §4.8 cap: at most 100 handlers may be registered per event name.
pub const MAX_HANDLERS_PER_EVENT: usize = 100;

pub type Handler<T> = Arc<dyn Fn(&T) -> Result<(), String> + Send + Sync>;
pub type Condition<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
pub type Expression<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

/// A handler registration, built with [`HandlerBuilder`].
pub struct HandlerRegistration<T> {
    pub id: String,
    pub event: &'static str,
    pub handler: Handler<T>,
    pub condition: Option<Condition<T>>,
    pub expression: Option<Expression<T>>,
    pub once: bool,
    pub priority: i32,
    pub stop_on_error: bool,
}

impl<T> HandlerRegistration<T> {
    pub fn new(id: impl Into<String>, event: &'static str, handler: Handler<T>) -> Self {
        Self {
            id: id.into(),
            event,
            handler,
            condition: None,
            expression: None,
            once: false,
            priority: 0,
            stop_on_error: false,
        }
    }

    pub fn with_condition(mut self, condition: Condition<T>) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_expression(mut self, expression: Expression<T>) -> Self {
        self.expression = Some(expression);
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn stop_on_error(mut self) -> Self {
        self.stop_on_error = true;
        self
    }
}

/// Result of one `emit` call (spec.md §4.8).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitResult {
    pub handlers_invoked: u32,
    pub handlers_skipped: u32,
    pub errors: Vec<String>,
    pub execution_time_ms: f64,
}

/// A prioritized, conditional, one-shot handler registry for event payloads
/// of type `T`. Each updater owns one, keyed internally by event name.
pub struct EventManager<T> {
    handlers: Mutex<HashMap<&'static str, Vec<HandlerRegistration<T>>>>,
}

impl<T> Default for EventManager<T> {
    fn default() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> EventManager<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler. Rejects a duplicate `id` (unique across the
    /// whole manager, not just the one event) or a registration that would
    /// push an event past [`MAX_HANDLERS_PER_EVENT`].
    pub fn register(&self, registration: HandlerRegistration<T>) -> CacheResult<()> {
        let mut handlers = self.handlers.lock();
        if handlers.values().flatten().any(|h| h.id == registration.id) {
            return Err(CacheError::DuplicateHandlerId(registration.id.into()));
        }
        let list = handlers.entry(registration.event).or_default();
        if list.len() >= MAX_HANDLERS_PER_EVENT {
            return Err(CacheError::EventHandlerCapacityExceeded {
                event: registration.event.into(),
                max: MAX_HANDLERS_PER_EVENT,
            });
        }
        list.push(registration);
        Ok(())
    }

    /// Convenience subscription for the common case: an always-on,
    /// unconditional, infallible listener (§2 "strategy code ... subscribes
    /// to updater event streams").
    pub fn on(
        &self,
        id: impl Into<String>,
        event: &'static str,
        handler: impl Fn(&T) + Send + Sync + 'static,
    ) -> CacheResult<()> {
        self.register(HandlerRegistration::new(
            id,
            event,
            Arc::new(move |data: &T| {
                handler(data);
                Ok(())
            }),
        ))
    }

    pub fn unregister(&self, id: &str) -> bool {
        let mut handlers = self.handlers.lock();
        let mut removed = false;
        for list in handlers.values_mut() {
            let before = list.len();
            list.retain(|h| h.id != id);
            removed |= list.len() != before;
        }
        removed
    }

    /// Removes every registered handler (§3: "listeners are removed on
    /// dispose").
    pub fn clear(&self) {
        self.handlers.lock().clear();
    }

    /// Fans `data` out to every handler registered for `event`, in ascending
    /// priority order. Per handler: evaluate `condition` (skip if `false`),
    /// apply `expression` to transform the payload, invoke `handler`; on
    /// `Err`, record it and either continue or (if `stop_on_error`) abort
    /// the remaining handlers for this emission. One-shot handlers are
    /// removed after a *successful* invocation only.
    pub fn emit(&self, event: &'static str, data: T) -> EmitResult {
        let start = Instant::now();
        let mut invoked = 0u32;
        let mut skipped = 0u32;
        let mut errors = Vec::new();

        let mut handlers = self.handlers.lock();
        if let Some(list) = handlers.get_mut(event) {
            list.sort_by_key(|h| h.priority);
            let mut fired_once_ids = Vec::new();

            for h in list.iter() {
                if let Some(condition) = &h.condition {
                    if !condition(&data) {
                        skipped += 1;
                        continue;
                    }
                }
                let payload = match &h.expression {
                    Some(expression) => expression(data.clone()),
                    None => data.clone(),
                };
                match (h.handler)(&payload) {
                    Ok(()) => {
                        invoked += 1;
                        if h.once {
                            fired_once_ids.push(h.id.clone());
                        }
                    }
                    Err(message) => {
                        errors.push(format!("{}: {}", h.id, message));
                        if h.stop_on_error {
                            break;
                        }
                    }
                }
            }

            if !fired_once_ids.is_empty() {
                list.retain(|h| !fired_once_ids.contains(&h.id));
            }
        }

        EmitResult {
            handlers_invoked: invoked,
            handlers_skipped: skipped,
            errors,
            execution_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn emits_in_priority_order_and_reports_counts() {
        let manager: EventManager<i32> = EventManager::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = order.clone();
        manager
            .register(
                HandlerRegistration::new(
                    "a",
                    "tick",
                    Arc::new(move |v: &i32| {
                        order_a.lock().push((*v, "a"));
                        Ok(())
                    }),
                )
                .with_priority(10),
            )
            .unwrap();

        let order_b = order.clone();
        manager
            .register(
                HandlerRegistration::new(
                    "b",
                    "tick",
                    Arc::new(move |v: &i32| {
                        order_b.lock().push((*v, "b"));
                        Ok(())
                    }),
                )
                .with_priority(1),
            )
            .unwrap();

        let result = manager.emit("tick", 7);
        assert_eq!(result.handlers_invoked, 2);
        assert_eq!(*order.lock(), vec![(7, "b"), (7, "a")]);
    }

    #[test]
    fn duplicate_handler_id_rejected() {
        let manager: EventManager<i32> = EventManager::new();
        let noop: Handler<i32> = Arc::new(|_| Ok(()));
        manager
            .register(HandlerRegistration::new("x", "e", noop.clone()))
            .unwrap();
        let err = manager
            .register(HandlerRegistration::new("x", "e", noop))
            .unwrap_err();
        assert!(matches!(err, CacheError::DuplicateHandlerId(_)));
    }

    #[test]
    fn once_handler_fires_a_single_time() {
        let manager: EventManager<i32> = EventManager::new();
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();
        manager
            .register(
                HandlerRegistration::new(
                    "once",
                    "e",
                    Arc::new(move |_: &i32| {
                        count_clone.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                )
                .once(),
            )
            .unwrap();

        manager.emit("e", 1);
        manager.emit("e", 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_on_error_halts_remaining_handlers() {
        let manager: EventManager<i32> = EventManager::new();
        let second_called = Arc::new(AtomicU32::new(0));
        manager
            .register(
                HandlerRegistration::new(
                    "first",
                    "e",
                    Arc::new(|_: &i32| Err("boom".to_string())),
                )
                .with_priority(0)
                .stop_on_error(),
            )
            .unwrap();
        let second_clone = second_called.clone();
        manager
            .register(
                HandlerRegistration::new(
                    "second",
                    "e",
                    Arc::new(move |_: &i32| {
                        second_clone.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                )
                .with_priority(1),
            )
            .unwrap();

        let result = manager.emit("e", 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(second_called.load(Ordering::SeqCst), 0);
    }
}
