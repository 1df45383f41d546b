//! Lifecycle gate and manager bundle tests
//!
//! The three managers are replaced by doubles that record construction and
//! destruction on a per-thread event log, so ordering and exactly-once
//! release can be asserted without real worker threads.

use std::{
    cell::{Cell, RefCell},
    thread,
};

use rosrt::{
    Component, FromOptions, GateState, InitOptions, LifecycleGate, Managers, Reinit, Result,
    RosrtError, Standalone,
};

thread_local! {
    static EVENTS: RefCell<Vec<String>> = RefCell::new(Vec::new());
    static FAIL_AT: Cell<Option<&'static str>> = Cell::new(None);
}

fn record(event: String) {
    EVENTS.with(|events| events.borrow_mut().push(event));
}

fn take_events() -> Vec<String> {
    EVENTS.with(|events| std::mem::take(&mut *events.borrow_mut()))
}

fn fail_at(component: Option<&'static str>) {
    FAIL_AT.with(|fail| fail.set(component));
}

fn construct(name: &'static str) -> Result<()> {
    record(format!("construct {}", name));
    if FAIL_AT.with(Cell::get) == Some(name) {
        return Err(RosrtError::platform(format!("{} refused to start", name)));
    }
    Ok(())
}

#[derive(Debug)]
struct FakePublisher {
    queue_size: usize,
}

impl Component for FakePublisher {
    const NAME: &'static str = "FakePublisher";
}

impl FromOptions for FakePublisher {
    fn from_options(options: &InitOptions) -> Result<Self> {
        construct(Self::NAME)?;
        Ok(Self {
            queue_size: options.pubmanager_queue_size,
        })
    }
}

impl Drop for FakePublisher {
    fn drop(&mut self) {
        record(format!("drop {}", Self::NAME));
    }
}

#[derive(Debug)]
struct FakeSubscriber;

impl Component for FakeSubscriber {
    const NAME: &'static str = "FakeSubscriber";
}

impl Standalone for FakeSubscriber {
    fn standalone() -> Result<Self> {
        construct(Self::NAME)?;
        Ok(Self)
    }
}

impl Drop for FakeSubscriber {
    fn drop(&mut self) {
        record(format!("drop {}", Self::NAME));
    }
}

#[derive(Debug)]
struct FakeGc {
    queue_size: usize,
}

impl Component for FakeGc {
    const NAME: &'static str = "FakeGc";
}

impl FromOptions for FakeGc {
    fn from_options(options: &InitOptions) -> Result<Self> {
        construct(Self::NAME)?;
        Ok(Self {
            queue_size: options.gc_queue_size,
        })
    }
}

impl Drop for FakeGc {
    fn drop(&mut self) {
        record(format!("drop {}", Self::NAME));
    }
}

type FakeGate = LifecycleGate<FakePublisher, FakeSubscriber, FakeGc>;

fn fresh() -> FakeGate {
    take_events();
    fail_at(None);
    FakeGate::new()
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    /// Test: Managers are built publisher, then subscriber, then reclamation
    #[test]
    fn test_construction_order() {
        let mut gate = fresh();
        assert!(gate.init(InitOptions::default()).unwrap());

        assert_eq!(
            take_events(),
            vec!["construct FakePublisher", "construct FakeSubscriber", "construct FakeGc"]
        );
    }

    /// Test: Shutdown releases each manager exactly once in declaration order
    #[test]
    fn test_destruction_order_and_exactly_once() {
        let mut gate = fresh();
        gate.init(InitOptions::default()).unwrap();
        take_events();

        gate.shutdown();
        assert_eq!(
            take_events(),
            vec!["drop FakePublisher", "drop FakeSubscriber", "drop FakeGc"]
        );

        gate.shutdown();
        drop(gate);
        assert!(take_events().is_empty());
    }

    /// Test: Repeated init keeps the first bundle and ignores new options
    #[test]
    fn test_init_is_idempotent() {
        let mut gate = fresh();
        let first = InitOptions::default()
            .with_pubmanager_queue_size(16)
            .with_gc_queue_size(8);
        let second = InitOptions::default()
            .with_pubmanager_queue_size(4096)
            .with_gc_queue_size(4096);

        assert!(gate.init(first).unwrap());
        take_events();

        assert!(!gate.init(second.clone()).unwrap());
        assert!(!gate.init(second).unwrap());
        assert!(take_events().is_empty());

        assert_eq!(gate.publisher_manager().unwrap().queue_size, 16);
        assert_eq!(gate.gc().unwrap().queue_size, 8);
    }

    /// Test: Shutdown with nothing initialized is a no-op, any number of times
    #[test]
    fn test_shutdown_without_init_is_safe() {
        let mut gate = fresh();
        for _ in 0..3 {
            gate.shutdown();
        }
        assert_eq!(gate.state(), GateState::Uninitialized);
        assert!(take_events().is_empty());
    }

    /// Test: Accessors succeed exactly while a bundle is live
    #[test]
    fn test_accessors_track_bundle_presence() {
        let mut gate = fresh();
        assert!(gate.publisher_manager().unwrap_err().is_not_initialized());
        assert!(gate.subscriber_manager().unwrap_err().is_not_initialized());
        assert!(gate.gc().unwrap_err().is_not_initialized());

        gate.init(InitOptions::default()).unwrap();
        assert!(gate.publisher_manager().is_ok());
        assert!(gate.subscriber_manager().is_ok());
        assert!(gate.gc().is_ok());
        assert!(gate.managers().is_ok());

        gate.shutdown();
        assert!(matches!(
            gate.publisher_manager(),
            Err(RosrtError::NotInitialized { accessor: "publisher_manager" })
        ));
        assert!(matches!(
            gate.subscriber_manager(),
            Err(RosrtError::NotInitialized { accessor: "subscriber_manager" })
        ));
        assert!(matches!(
            gate.gc(),
            Err(RosrtError::NotInitialized { accessor: "gc" })
        ));
    }

    /// Test: init, use, shutdown, then a second init builds nothing
    #[test]
    fn test_no_reinit_after_shutdown() {
        let mut gate = fresh();
        gate.init(InitOptions::default()).unwrap();
        assert!(gate.publisher_manager().is_ok());
        gate.shutdown();
        take_events();

        assert!(!gate.init(InitOptions::default()).unwrap());
        assert!(take_events().is_empty());
        assert_eq!(gate.state(), GateState::ShutDown);
        assert!(gate.publisher_manager().is_err());
    }

    /// Test: The after-shutdown policy builds a fresh bundle per cycle
    #[test]
    fn test_reinit_after_shutdown_policy() {
        take_events();
        fail_at(None);
        let mut gate = FakeGate::with_reinit(Reinit::AfterShutdown);

        for _ in 0..2 {
            assert!(gate.init(InitOptions::default()).unwrap());
            assert!(!gate.init(InitOptions::default()).unwrap());
            gate.shutdown();
        }

        let events = take_events();
        assert_eq!(events.iter().filter(|e| e.starts_with("construct")).count(), 6);
        assert_eq!(events.iter().filter(|e| e.starts_with("drop")).count(), 6);
    }

    /// Test: A failing subscriber releases the already-built publisher
    #[test]
    fn test_subscriber_failure_releases_publisher() {
        let mut gate = fresh();
        fail_at(Some("FakeSubscriber"));

        let err = gate.init(InitOptions::default()).unwrap_err();
        assert!(matches!(err, RosrtError::Construction { component: "FakeSubscriber", .. }));
        assert_eq!(
            take_events(),
            vec!["construct FakePublisher", "construct FakeSubscriber", "drop FakePublisher"]
        );
        assert_eq!(gate.state(), GateState::Uninitialized);
        assert!(gate.publisher_manager().is_err());
    }

    /// Test: A failing collector releases both earlier managers
    #[test]
    fn test_gc_failure_releases_everything() {
        let mut gate = fresh();
        fail_at(Some("FakeGc"));

        assert!(gate.init(InitOptions::default()).is_err());
        let events = take_events();
        assert_eq!(events.len(), 5);
        assert_eq!(events.iter().filter(|e| *e == "drop FakePublisher").count(), 1);
        assert_eq!(events.iter().filter(|e| *e == "drop FakeSubscriber").count(), 1);
        assert!(!events.contains(&"drop FakeGc".to_string()));
    }

    /// Test: After a failed init the caller can retry from scratch
    #[test]
    fn test_retry_after_construction_failure() {
        let mut gate = fresh();
        fail_at(Some("FakePublisher"));
        assert!(gate.init(InitOptions::default()).is_err());
        assert_eq!(take_events(), vec!["construct FakePublisher"]);

        fail_at(None);
        assert!(gate.init(InitOptions::default()).unwrap());
        assert_eq!(gate.state(), GateState::Live);
    }

    /// Test: Dropping the gate releases the live bundle
    #[test]
    fn test_gate_drop_releases_bundle() {
        let mut gate = fresh();
        gate.init(InitOptions::default()).unwrap();
        take_events();

        drop(gate);
        assert_eq!(
            take_events(),
            vec!["drop FakePublisher", "drop FakeSubscriber", "drop FakeGc"]
        );
    }

    /// Test: A bare bundle follows the same ordering rules
    #[test]
    fn test_bundle_without_gate() {
        take_events();
        fail_at(None);

        let managers =
            Managers::<FakePublisher, FakeSubscriber, FakeGc>::new(&InitOptions::default())
                .unwrap();
        assert_eq!(managers.publisher_manager().queue_size, 1000);
        drop(managers);

        assert_eq!(
            take_events(),
            vec![
                "construct FakePublisher",
                "construct FakeSubscriber",
                "construct FakeGc",
                "drop FakePublisher",
                "drop FakeSubscriber",
                "drop FakeGc",
            ]
        );
    }

    /// Test: Many threads may borrow managers out of a live gate at once
    #[test]
    fn test_concurrent_accessors() {
        let mut gate = fresh();
        gate.init(InitOptions::default().with_pubmanager_queue_size(32))
            .unwrap();

        let gate = &gate;
        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(move || {
                    for _ in 0..1000 {
                        assert_eq!(gate.publisher_manager().unwrap().queue_size, 32);
                        assert!(gate.subscriber_manager().is_ok());
                        assert!(gate.gc().is_ok());
                    }
                });
            }
        });
    }
}
