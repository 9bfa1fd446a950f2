//! Integration tests for the full save pipeline.
//!
//! Tests: TrackingContext → Snapshot → Hooks → PersistenceEngine → EventBus
//!
//! Verifies:
//! - Phase ordering (before-hooks, write, after-hooks, publication)
//! - Fail-fast hook semantics abort the write
//! - Suspension disables hook phases without disabling extraction
//! - Event queues are drained exactly once per unit-of-work

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::{Value as JsonValue, json};

    use savekit_core::{
        EntityKey, EntityState, EventSource, InMemoryTrackingContext, SaveSnapshot, TrackedObject,
    };
    use savekit_events::{EventBus, EventObject, InMemoryEventBus};
    use savekit_hooks::{AfterSaveHook, BeforeSaveHook, HookRegistry};

    use crate::save_pipeline::{
        PersistenceEngine, SaveError, SavePipeline, WriteError,
    };

    struct Order {
        id: u64,
        events: Mutex<Vec<JsonValue>>,
    }

    impl Order {
        fn new(id: u64, events: Vec<JsonValue>) -> Self {
            Self {
                id,
                events: Mutex::new(events),
            }
        }
    }

    impl TrackedObject for Order {
        fn entity_type_name(&self) -> &str {
            "orders.order"
        }

        fn entity_key(&self) -> EntityKey {
            EntityKey::new().with("Id", json!(self.id))
        }

        fn as_event_source(&self) -> Option<&dyn EventSource> {
            Some(self)
        }
    }

    impl EventSource for Order {
        fn take_events(&self) -> Vec<JsonValue> {
            let mut events = self.events.lock().unwrap();
            std::mem::take(&mut *events)
        }
    }

    struct CountingEngine {
        calls: AtomicU64,
        fail: bool,
    }

    impl CountingEngine {
        fn new() -> Self {
            Self {
                calls: AtomicU64::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicU64::new(0),
                fail: true,
            }
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PersistenceEngine for Arc<CountingEngine> {
        async fn execute_write(&self) -> Result<u64, WriteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(WriteError("storage rejected the batch".to_string()));
            }
            Ok(1)
        }
    }

    struct PhaseHook {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl BeforeSaveHook for PhaseHook {
        fn name(&self) -> &str {
            self.name
        }

        async fn before_save(&self, snapshot: &SaveSnapshot) -> anyhow::Result<()> {
            let entries = snapshot.entries()?;
            self.log
                .lock()
                .unwrap()
                .push(format!("before:{}:{}", self.name, entries.len()));
            if self.fail {
                return Err(anyhow!("before hook rejected the save"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AfterSaveHook for PhaseHook {
        fn name(&self) -> &str {
            self.name
        }

        async fn after_save(&self, _snapshot: &SaveSnapshot) -> anyhow::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("after:{}", self.name));
            Ok(())
        }
    }

    fn registry(log: &Arc<Mutex<Vec<String>>>) -> HookRegistry {
        let mut registry = HookRegistry::new();
        registry.register_before(Arc::new(PhaseHook {
            name: "audit",
            log: Arc::clone(log),
            fail: false,
        }));
        registry.register_before(Arc::new(PhaseHook {
            name: "stamp",
            log: Arc::clone(log),
            fail: false,
        }));
        registry.register_after(Arc::new(PhaseHook {
            name: "notify",
            log: Arc::clone(log),
            fail: false,
        }));
        registry
    }

    fn context_with_order() -> Arc<InMemoryTrackingContext> {
        let ctx = Arc::new(InMemoryTrackingContext::new());
        ctx.track(
            Arc::new(Order::new(42, vec![json!({"kind": "order.created"})])),
            EntityState::Added,
        );
        ctx
    }

    type TestPipeline =
        SavePipeline<Arc<CountingEngine>, Arc<InMemoryEventBus<EventObject>>>;

    fn pipeline(
        engine: Arc<CountingEngine>,
        bus: Arc<InMemoryEventBus<EventObject>>,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> TestPipeline {
        SavePipeline::new(engine, bus, registry(log))
    }

    #[tokio::test]
    async fn save_runs_all_phases_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = Arc::new(CountingEngine::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let subscription = bus.subscribe();
        let pipeline = pipeline(Arc::clone(&engine), Arc::clone(&bus), &log);

        let outcome = pipeline.save(context_with_order()).await.unwrap();

        assert_eq!(outcome.rows_affected, 1);
        assert_eq!(outcome.events_published, 1);
        assert_eq!(engine.calls(), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before:audit:1", "before:stamp:1", "after:notify"]
        );

        let published = subscription.try_recv().unwrap();
        assert_eq!(published.entity_type_name(), "orders.order");
        assert_eq!(published.entity_key().get("id"), Some(&json!(42)));
        assert_eq!(published.events(), &[json!({"kind": "order.created"})]);
    }

    #[tokio::test]
    async fn failing_before_hook_aborts_the_write() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = Arc::new(CountingEngine::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let subscription = bus.subscribe();

        let mut registry = HookRegistry::new();
        registry.register_before(Arc::new(PhaseHook {
            name: "validate",
            log: Arc::clone(&log),
            fail: true,
        }));
        registry.register_before(Arc::new(PhaseHook {
            name: "never",
            log: Arc::clone(&log),
            fail: false,
        }));
        let pipeline = SavePipeline::new(Arc::clone(&engine), Arc::clone(&bus), registry);

        let err = pipeline.save(context_with_order()).await.unwrap_err();

        match err {
            SaveError::Hook(hook_err) => assert_eq!(hook_err.hook(), "validate"),
            other => panic!("expected hook error, got {other:?}"),
        }
        // The write never ran, nothing was published, the later hook never ran.
        assert_eq!(engine.calls(), 0);
        assert!(subscription.try_recv().is_err());
        assert_eq!(*log.lock().unwrap(), vec!["before:validate:1"]);
    }

    #[tokio::test]
    async fn failing_write_skips_after_hooks_and_publication() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = Arc::new(CountingEngine::failing());
        let bus = Arc::new(InMemoryEventBus::new());
        let subscription = bus.subscribe();
        let pipeline = pipeline(Arc::clone(&engine), Arc::clone(&bus), &log);

        let err = pipeline.save(context_with_order()).await.unwrap_err();

        assert!(matches!(err, SaveError::Write(_)));
        assert_eq!(engine.calls(), 1);
        assert!(subscription.try_recv().is_err());
        // Before-hooks ran; after-hooks did not.
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before:audit:1", "before:stamp:1"]
        );
    }

    #[tokio::test]
    async fn suspension_skips_hooks_but_not_extraction() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = Arc::new(CountingEngine::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let subscription = bus.subscribe();
        let pipeline = pipeline(Arc::clone(&engine), Arc::clone(&bus), &log);

        let suspension = pipeline.suspension();
        let outcome = {
            let _guard = suspension.suspend();
            pipeline.save(context_with_order()).await.unwrap()
        };

        assert_eq!(outcome.events_published, 1);
        assert!(log.lock().unwrap().is_empty());
        assert!(subscription.try_recv().is_ok());

        // Guard dropped: the next save runs hooks again.
        pipeline.save(context_with_order()).await.unwrap();
        assert!(!log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_save_reruns_hooks_but_publishes_nothing_new() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = Arc::new(CountingEngine::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let pipeline = pipeline(Arc::clone(&engine), Arc::clone(&bus), &log);

        let ctx = context_with_order();
        let first = pipeline.save(ctx.clone()).await.unwrap();
        assert_eq!(first.events_published, 1);

        // Same context saved again: hooks run for the fresh snapshot, but the
        // entity's event queue was already drained.
        let second = pipeline.save(ctx).await.unwrap();
        assert_eq!(second.events_published, 0);
        assert_eq!(engine.calls(), 2);
        assert_eq!(log.lock().unwrap().len(), 6);
    }
}
