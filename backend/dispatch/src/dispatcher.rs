//! The dispatcher façade: registration, generic triggering, introspection.
//!
//! A `Dispatcher` is a cheap, cloneable handle; the bot core creates one and
//! hands clones to the plugins that subscribe or publish.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chatterbus_config::{BusConfig, DispatchConfig};
use chatterbus_core::Channel;
use tracing::debug;

use crate::error::DispatchError;
use crate::listener::Listener;
use crate::queue::TriggerQueue;
use crate::registry::Registry;
use crate::types::{Callback, Deliver, EventKey, validate_event_name};

/// State shared by every clone of a dispatcher.
///
/// The two locks are never held together, and neither is held while a
/// listener runs.
pub(crate) struct Shared {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) queue: Mutex<TriggerQueue>,
    pub(crate) drain_limit: usize,
    pub(crate) queue_warn_depth: usize,
    /// Scrub credentials from chat text before it reaches the logs.
    pub(crate) redact_chat: bool,
}

/// Callbacks never run under a lock, so a poisoned lock still holds consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

/// Non-owning dispatcher reference for listeners that publish.
///
/// A listener capturing a full `Dispatcher` would keep the registry that owns
/// it alive.
#[derive(Clone, Debug)]
pub struct WeakDispatcher {
    shared: Weak<Shared>,
}

impl WeakDispatcher {
    pub fn upgrade(&self) -> Option<Dispatcher> {
        self.shared.upgrade().map(|shared| Dispatcher { shared })
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_config(&DispatchConfig::default())
    }

    /// Dispatcher with the given queue limits; chat text is redacted in logs.
    pub fn with_config(config: &DispatchConfig) -> Self {
        Self::build(config, true)
    }

    /// Dispatcher configured from a loaded `BusConfig`, missing sections defaulted.
    pub fn from_bus_config(config: &BusConfig) -> Self {
        let redact_chat = config
            .logging
            .as_ref()
            .is_none_or(|logging| logging.redact_sensitive());
        Self::build(&config.dispatch.clone().unwrap_or_default(), redact_chat)
    }

    fn build(config: &DispatchConfig, redact_chat: bool) -> Self {
        let shared = Shared {
            registry: Mutex::new(Registry::default()),
            queue: Mutex::new(TriggerQueue::default()),
            drain_limit: config.drain_limit(),
            queue_warn_depth: config.queue_warn_depth(),
            redact_chat,
        };
        debug!(
            drain_limit = shared.drain_limit,
            queue_warn_depth = shared.queue_warn_depth,
            redact_chat,
            "[Dispatch] Dispatcher created"
        );
        Self {
            shared: Arc::new(shared),
        }
    }

    pub fn downgrade(&self) -> WeakDispatcher {
        WeakDispatcher {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Subscribe `callback` to `event`, globally or for one channel.
    ///
    /// Each call creates a new listener; registering the same callback twice
    /// delivers to it twice.
    pub fn add_listener(
        &self,
        event: &str,
        channel: Option<&Channel>,
        callback: Callback,
    ) -> Result<Listener, DispatchError> {
        validate_event_name(event)?;
        Ok(self.register(EventKey::new(event, channel), callback))
    }

    pub(crate) fn register(&self, key: EventKey, callback: Callback) -> Listener {
        let shape = callback.shape();
        let id = lock(&self.shared.registry).add(key.clone(), callback);
        debug!(key = %key, listener = %id, %shape, "[Dispatch] Listener added");
        Listener::new(id, key, Arc::downgrade(&self.shared))
    }

    /// Publish one occurrence of `event`.
    ///
    /// Called from inside a listener this only enqueues and returns `Ok(())`;
    /// the outermost call delivers it and reports any listener failure.
    pub fn trigger_event(
        &self,
        event: &str,
        channel: Option<&Channel>,
        deliver: Deliver,
    ) -> Result<(), DispatchError> {
        validate_event_name(event)?;
        self.shared.trigger(event, channel, deliver)
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Listeners stored under exactly this key (global and scoped are counted apart).
    pub fn listener_count(&self, event: &str, channel: Option<&Channel>) -> usize {
        lock(&self.shared.registry).len(&EventKey::new(event, channel))
    }

    /// True while some call frame is draining the trigger queue.
    pub fn is_draining(&self) -> bool {
        lock(&self.shared.queue).is_busy()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("drain_limit", &self.shared.drain_limit)
            .field("draining", &self.is_draining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use crate::types::{HandlerShape, JOIN};
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    type Log = Arc<Mutex<Vec<String>>>;

    fn channel(name: &str) -> Channel {
        Channel::new(name).unwrap()
    }

    fn recorder() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    /// Listener that records `label` for a custom event.
    fn record(dispatcher: &Dispatcher, event: &str, log: &Log, label: &str) -> Listener {
        let log = log.clone();
        let label = label.to_string();
        dispatcher
            .on_event(
                event,
                move |_| {
                    log.lock().unwrap().push(label.clone());
                    Ok(())
                },
                None,
            )
            .unwrap()
    }

    fn join_deliver(channel: Option<Channel>) -> Deliver {
        Box::new(move |callback: &Callback| match callback {
            Callback::Membership(handler) => {
                let fallback = Channel::new("none").unwrap();
                Ok(handler(channel.as_ref().unwrap_or(&fallback))?)
            }
            other => Err(DeliveryError::ShapeMismatch {
                expected: HandlerShape::Membership,
                found: other.shape(),
            }),
        })
    }

    #[test]
    fn test_end_to_end_add_trigger_remove() {
        let dispatcher = Dispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let mut listener = dispatcher
            .add_listener(
                JOIN,
                None,
                Callback::membership(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();

        dispatcher.trigger_event(JOIN, None, join_deliver(None)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        listener.remove();
        dispatcher.trigger_event(JOIN, None, join_deliver(None)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_trigger_without_listeners_is_noop() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .trigger_event("NOBODY", Some(&channel("foo")), join_deliver(None))
            .unwrap();
        assert!(!dispatcher.is_draining());
    }

    #[test]
    fn test_registration_order_is_delivery_order() {
        let dispatcher = Dispatcher::new();
        let log = recorder();
        record(&dispatcher, "TICK", &log, "first");
        record(&dispatcher, "TICK", &log, "second");

        dispatcher.emit("TICK", None, serde_json::Value::Null).unwrap();
        assert_eq!(entries(&log), vec!["first", "second"]);
    }

    #[test]
    fn test_global_and_scoped_listeners() {
        let dispatcher = Dispatcher::new();
        let log = recorder();
        let foo = channel("foo");

        let g = log.clone();
        dispatcher.on_join(
            move |_| {
                g.lock().unwrap().push("G".into());
                Ok(())
            },
            None,
        );
        let s = log.clone();
        dispatcher.on_join(
            move |_| {
                s.lock().unwrap().push("S".into());
                Ok(())
            },
            Some(&foo),
        );

        dispatcher.trigger_event(JOIN, None, join_deliver(None)).unwrap();
        assert_eq!(entries(&log), vec!["G"]);

        log.lock().unwrap().clear();
        dispatcher
            .trigger_event(JOIN, Some(&foo), join_deliver(Some(foo.clone())))
            .unwrap();
        assert_eq!(entries(&log), vec!["G", "S"]);

        log.lock().unwrap().clear();
        let bar = channel("bar");
        dispatcher
            .trigger_event(JOIN, Some(&bar), join_deliver(Some(bar.clone())))
            .unwrap();
        assert_eq!(entries(&log), vec!["G"]);
    }

    #[test]
    fn test_ids_strictly_increasing_across_events() {
        let dispatcher = Dispatcher::new();
        let foo = channel("foo");
        let ids: Vec<u64> = vec![
            dispatcher.on_join(|_| Ok(()), None).id().value(),
            dispatcher.on_part(|_| Ok(()), Some(&foo)).id().value(),
            dispatcher.on_text_message(|_| Ok(()), None).id().value(),
            dispatcher.on_protocol_message(|_| Ok(()), Some(&foo)).id().value(),
            dispatcher.on_event("X", |_| Ok(()), None).unwrap().id().value(),
        ];
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]), "{ids:?}");
        assert_eq!(ids[0], 0);
    }

    #[test]
    fn test_nested_triggers_are_breadth_first() {
        let dispatcher = Dispatcher::new();
        let log = recorder();
        let weak = dispatcher.downgrade();

        let l = log.clone();
        let w = weak.clone();
        dispatcher
            .on_event(
                "A",
                move |_| {
                    l.lock().unwrap().push("A1".into());
                    let dispatcher = w.upgrade().expect("dispatcher alive");
                    assert!(dispatcher.is_draining());
                    dispatcher.emit("B", None, serde_json::Value::Null)?;
                    dispatcher.emit("C", None, serde_json::Value::Null)?;
                    Ok(())
                },
                None,
            )
            .unwrap();
        record(&dispatcher, "A", &log, "A2");

        let l = log.clone();
        dispatcher
            .on_event(
                "B",
                move |_| {
                    l.lock().unwrap().push("B".into());
                    let dispatcher = weak.upgrade().expect("dispatcher alive");
                    dispatcher.emit("D", None, serde_json::Value::Null)?;
                    Ok(())
                },
                None,
            )
            .unwrap();
        record(&dispatcher, "C", &log, "C");
        record(&dispatcher, "D", &log, "D");

        dispatcher.emit("A", None, serde_json::Value::Null).unwrap();
        assert_eq!(entries(&log), vec!["A1", "A2", "B", "C", "D"]);
        assert!(!dispatcher.is_draining());
    }

    #[test]
    fn test_long_chain_runs_at_constant_depth() {
        const CHAIN: u64 = 1000;
        let dispatcher = Dispatcher::new();
        let weak = dispatcher.downgrade();
        let depth = Arc::new(AtomicUsize::new(0));
        let max_depth = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));

        let (d, m, l) = (depth.clone(), max_depth.clone(), last.clone());
        dispatcher
            .on_event(
                "CHAIN",
                move |payload| {
                    let current = d.fetch_add(1, Ordering::SeqCst) + 1;
                    m.fetch_max(current, Ordering::SeqCst);

                    let n = payload.as_u64().unwrap_or(0);
                    l.store(n as usize, Ordering::SeqCst);
                    if n < CHAIN {
                        if let Some(dispatcher) = weak.upgrade() {
                            dispatcher.emit("CHAIN", None, serde_json::json!(n + 1))?;
                        }
                    }

                    d.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                },
                None,
            )
            .unwrap();

        dispatcher.emit("CHAIN", None, serde_json::json!(1)).unwrap();
        assert_eq!(last.load(Ordering::SeqCst), CHAIN as usize);
        assert_eq!(max_depth.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_aborts_drain_and_releases_busy() {
        let dispatcher = Dispatcher::new();
        let log = recorder();
        let weak = dispatcher.downgrade();

        dispatcher
            .on_event(
                "A",
                move |_| {
                    if let Some(dispatcher) = weak.upgrade() {
                        dispatcher.emit("B", None, serde_json::Value::Null)?;
                    }
                    anyhow::bail!("boom")
                },
                None,
            )
            .unwrap();
        record(&dispatcher, "A", &log, "A-after");
        record(&dispatcher, "B", &log, "B");

        let err = dispatcher
            .emit("A", None, serde_json::Value::Null)
            .unwrap_err();
        assert!(matches!(
            &err,
            DispatchError::Delivery { key, listener, .. }
                if key.as_str() == "A" && listener.value() == 0
        ));
        assert!(err.to_string().contains("boom"));
        assert!(entries(&log).is_empty());
        assert!(!dispatcher.is_draining());

        dispatcher.emit("B", None, serde_json::Value::Null).unwrap();
        assert_eq!(entries(&log), vec!["B"]);
    }

    #[test]
    fn test_panicking_listener_releases_busy() {
        let dispatcher = Dispatcher::new();
        let log = recorder();
        dispatcher
            .on_event("PANIC", |_| panic!("listener exploded"), None)
            .unwrap();
        record(&dispatcher, "OK", &log, "ok");

        let result = catch_unwind(AssertUnwindSafe(|| {
            dispatcher.emit("PANIC", None, serde_json::Value::Null)
        }));
        assert!(result.is_err());
        assert!(!dispatcher.is_draining());

        dispatcher.emit("OK", None, serde_json::Value::Null).unwrap();
        assert_eq!(entries(&log), vec!["ok"]);
    }

    #[test]
    fn test_drain_limit_stops_runaway_loop() {
        let dispatcher = Dispatcher::with_config(&DispatchConfig {
            drain_limit: Some(10),
            queue_warn_depth: Some(5),
        });
        let weak = dispatcher.downgrade();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        dispatcher
            .on_event(
                "LOOP",
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if let Some(dispatcher) = weak.upgrade() {
                        dispatcher.emit("LOOP", None, serde_json::Value::Null)?;
                    }
                    Ok(())
                },
                None,
            )
            .unwrap();

        let err = dispatcher
            .emit("LOOP", None, serde_json::Value::Null)
            .unwrap_err();
        assert!(matches!(err, DispatchError::DrainLimitExceeded { limit: 10 }));
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert!(!dispatcher.is_draining());
    }

    #[test]
    fn test_removal_during_delivery_uses_snapshot() {
        let dispatcher = Dispatcher::new();
        let log = recorder();
        let victim: Arc<Mutex<Option<Listener>>> = Arc::new(Mutex::new(None));

        let (l, v) = (log.clone(), victim.clone());
        dispatcher.on_join(
            move |_| {
                l.lock().unwrap().push("remover".into());
                if let Some(listener) = v.lock().unwrap().as_mut() {
                    listener.remove();
                }
                Ok(())
            },
            None,
        );
        let l = log.clone();
        let target = dispatcher.on_join(
            move |_| {
                l.lock().unwrap().push("victim".into());
                Ok(())
            },
            None,
        );
        *victim.lock().unwrap() = Some(target);

        let foo = channel("foo");
        dispatcher.handle_join(&foo).unwrap();
        assert_eq!(entries(&log), vec!["remover", "victim"]);

        log.lock().unwrap().clear();
        dispatcher.handle_join(&foo).unwrap();
        assert_eq!(entries(&log), vec!["remover"]);
        assert_eq!(dispatcher.listener_count(JOIN, None), 1);
    }

    #[test]
    fn test_listener_added_during_delivery_fires_next_time() {
        let dispatcher = Dispatcher::new();
        let log = recorder();
        let weak = dispatcher.downgrade();
        let added = Arc::new(AtomicUsize::new(0));

        let (l, a) = (log.clone(), added.clone());
        dispatcher.on_part(
            move |_| {
                if a.fetch_add(1, Ordering::SeqCst) == 0 {
                    if let Some(dispatcher) = weak.upgrade() {
                        let inner = l.clone();
                        dispatcher.on_part(
                            move |_| {
                                inner.lock().unwrap().push("late".into());
                                Ok(())
                            },
                            None,
                        );
                    }
                }
                Ok(())
            },
            None,
        );

        let foo = channel("foo");
        dispatcher.handle_part(&foo).unwrap();
        assert!(entries(&log).is_empty());
        dispatcher.handle_part(&foo).unwrap();
        assert_eq!(entries(&log), vec!["late"]);
    }

    #[test]
    fn test_scoped_snapshot_taken_before_global_listeners_run() {
        let dispatcher = Dispatcher::new();
        let log = recorder();
        let foo = channel("foo");
        let weak = dispatcher.downgrade();
        let scoped: Arc<Mutex<Option<Listener>>> = Arc::new(Mutex::new(None));

        let (l, s, ch) = (log.clone(), scoped.clone(), foo.clone());
        dispatcher.on_join(
            move |_| {
                l.lock().unwrap().push("global".into());
                if let Some(listener) = s.lock().unwrap().as_mut() {
                    listener.remove();
                }
                if let Some(dispatcher) = weak.upgrade() {
                    let inner = l.clone();
                    dispatcher.on_join(
                        move |_| {
                            inner.lock().unwrap().push("late-scoped".into());
                            Ok(())
                        },
                        Some(&ch),
                    );
                }
                Ok(())
            },
            None,
        );
        let l = log.clone();
        let original = dispatcher.on_join(
            move |_| {
                l.lock().unwrap().push("scoped".into());
                Ok(())
            },
            Some(&foo),
        );
        *scoped.lock().unwrap() = Some(original);

        dispatcher.handle_join(&foo).unwrap();
        assert_eq!(entries(&log), vec!["global", "scoped"]);
        assert_eq!(dispatcher.listener_count(JOIN, Some(&foo)), 1);
    }

    #[test]
    fn test_zero_drain_limit_keeps_default() {
        let dispatcher = Dispatcher::with_config(&DispatchConfig {
            drain_limit: Some(0),
            queue_warn_depth: None,
        });
        dispatcher
            .trigger_event("NOBODY", None, join_deliver(None))
            .unwrap();

        let log = recorder();
        record(&dispatcher, "TICK", &log, "tick");
        dispatcher.emit("TICK", None, serde_json::Value::Null).unwrap();
        assert_eq!(entries(&log), vec!["tick"]);
    }

    #[test]
    #[traced_test]
    fn test_backlog_warning_logged_once_per_drain() {
        let dispatcher = Dispatcher::with_config(&DispatchConfig {
            drain_limit: None,
            queue_warn_depth: Some(2),
        });
        let weak = dispatcher.downgrade();
        dispatcher
            .on_event(
                "FAN",
                move |_| {
                    if let Some(dispatcher) = weak.upgrade() {
                        for _ in 0..3 {
                            dispatcher.emit("LEAF", None, serde_json::Value::Null)?;
                        }
                    }
                    Ok(())
                },
                None,
            )
            .unwrap();

        dispatcher.emit("FAN", None, serde_json::Value::Null).unwrap();
        dispatcher.emit("FAN", None, serde_json::Value::Null).unwrap();

        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| line.contains("Trigger queue is backing up"))
                .count()
            {
                2 => Ok(()),
                n => Err(format!("expected one warning per drain, saw {n}")),
            }
        });
    }

    #[test]
    fn test_invalid_event_names_rejected() {
        let dispatcher = Dispatcher::new();
        assert!(matches!(
            dispatcher.add_listener("JOIN#foo", None, Callback::membership(|_| Ok(()))),
            Err(DispatchError::InvalidEventName(_))
        ));
        assert!(matches!(
            dispatcher.trigger_event("", None, join_deliver(None)),
            Err(DispatchError::InvalidEventName(_))
        ));
    }

    #[test]
    fn test_clones_share_state() {
        let dispatcher = Dispatcher::new();
        let other = dispatcher.clone();
        let log = recorder();
        record(&dispatcher, "SHARED", &log, "hit");

        other.emit("SHARED", None, serde_json::Value::Null).unwrap();
        assert_eq!(entries(&log), vec!["hit"]);
        assert_eq!(other.listener_count("SHARED", None), 1);
    }
}
