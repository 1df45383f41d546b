//! Caller-owned lifecycle gate for the manager bundle
//!
//! The gate owns at most one [`Managers`] bundle and a flag recording whether
//! `init` has ever succeeded. It is deliberately not `Clone`: the code that
//! creates it decides who may borrow managers out of it, and the borrow
//! checker keeps `shutdown` from running while any manager reference is
//! alive.

use log::{debug, info};

use crate::{
    bundle::Managers,
    error::{Result, RosrtError},
    managers::{FromOptions, PublisherManager, SimpleGc, Standalone, SubscriberManager},
    options::InitOptions,
};

/// What `init` does once the gate has been initialized before
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reinit {
    /// The first successful `init` is the only one; later calls are ignored
    /// even after `shutdown`
    #[default]
    Once,
    /// `init` after `shutdown` builds a fresh bundle
    AfterShutdown,
}

/// Observable gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// `init` has never succeeded
    Uninitialized,
    /// A bundle is live and accessors succeed
    Live,
    /// `init` succeeded earlier and the bundle has since been released
    ShutDown,
}

/// Owner of the manager bundle and its initialization state
pub struct LifecycleGate<P = PublisherManager, S = SubscriberManager, G = SimpleGc>
where
    P: FromOptions,
    S: Standalone,
    G: FromOptions,
{
    managers: Option<Managers<P, S, G>>,
    initialized: bool,
    reinit: Reinit,
}

impl<P, S, G> LifecycleGate<P, S, G>
where
    P: FromOptions,
    S: Standalone,
    G: FromOptions,
{
    /// Create an uninitialized gate with [`Reinit::Once`]
    pub fn new() -> Self {
        Self::with_reinit(Reinit::Once)
    }

    /// Create an uninitialized gate with the given re-initialization policy
    pub fn with_reinit(reinit: Reinit) -> Self {
        Self {
            managers: None,
            initialized: false,
            reinit,
        }
    }

    /// Build the manager bundle from `options` unless the gate is already
    /// initialized
    ///
    /// Returns `Ok(true)` when a bundle was built and `Ok(false)` when the
    /// call was ignored. Ignored calls do not look at `options`. A failed
    /// construction leaves the gate exactly as it was.
    pub fn init(&mut self, options: InitOptions) -> Result<bool> {
        if !self.accepts_init() {
            debug!("Ignoring init: manager bundle already initialized");
            return Ok(false);
        }

        debug_assert!(
            self.managers.is_none(),
            "manager bundle present on an uninitialized gate"
        );

        let managers = Managers::<P, S, G>::new(&options)?;
        self.managers = Some(managers);
        self.initialized = true;
        Ok(true)
    }

    fn accepts_init(&self) -> bool {
        match self.reinit {
            Reinit::Once => !self.initialized,
            Reinit::AfterShutdown => self.managers.is_none(),
        }
    }

    /// Release the manager bundle, if any
    ///
    /// Safe to call any number of times, including before `init`. The
    /// initialized flag is left alone.
    pub fn shutdown(&mut self) {
        match self.managers.take() {
            Some(managers) => {
                info!("Shutting down manager bundle");
                drop(managers);
            }
            None => debug!("Shutdown with no live manager bundle"),
        }
    }

    /// Current state
    pub fn state(&self) -> GateState {
        match (self.initialized, self.managers.is_some()) {
            (_, true) => GateState::Live,
            (true, false) => GateState::ShutDown,
            (false, false) => GateState::Uninitialized,
        }
    }

    /// Whether `init` has ever succeeded
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether a bundle is live
    pub fn is_live(&self) -> bool {
        self.managers.is_some()
    }

    /// Re-initialization policy
    pub fn reinit(&self) -> Reinit {
        self.reinit
    }

    /// The live bundle
    pub fn managers(&self) -> Result<&Managers<P, S, G>> {
        self.live("managers")
    }

    /// The publisher manager of the live bundle
    pub fn publisher_manager(&self) -> Result<&P> {
        self.live("publisher_manager").map(Managers::publisher_manager)
    }

    /// The subscriber manager of the live bundle
    pub fn subscriber_manager(&self) -> Result<&S> {
        self.live("subscriber_manager").map(Managers::subscriber_manager)
    }

    /// The reclamation manager of the live bundle
    pub fn gc(&self) -> Result<&G> {
        self.live("gc").map(Managers::gc)
    }

    #[inline]
    fn live(&self, accessor: &'static str) -> Result<&Managers<P, S, G>> {
        self.managers
            .as_ref()
            .ok_or(RosrtError::NotInitialized { accessor })
    }
}

impl<P, S, G> Default for LifecycleGate<P, S, G>
where
    P: FromOptions,
    S: Standalone,
    G: FromOptions,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, S, G> std::fmt::Debug for LifecycleGate<P, S, G>
where
    P: FromOptions,
    S: Standalone,
    G: FromOptions,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleGate")
            .field("state", &self.state())
            .field("reinit", &self.reinit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn options() -> InitOptions {
        InitOptions::default().with_gc_period(Duration::from_millis(10))
    }

    #[test]
    fn test_state_machine() {
        let mut gate: LifecycleGate = LifecycleGate::new();
        assert_eq!(gate.state(), GateState::Uninitialized);
        assert!(gate.publisher_manager().unwrap_err().is_not_initialized());

        assert!(gate.init(options()).unwrap());
        assert_eq!(gate.state(), GateState::Live);
        assert!(gate.publisher_manager().is_ok());
        assert!(gate.subscriber_manager().is_ok());
        assert!(gate.gc().is_ok());

        gate.shutdown();
        assert_eq!(gate.state(), GateState::ShutDown);
        assert!(gate.is_initialized());
        assert!(matches!(
            gate.gc(),
            Err(RosrtError::NotInitialized { accessor: "gc" })
        ));

        // Once policy: no second bundle
        assert!(!gate.init(options()).unwrap());
        assert_eq!(gate.state(), GateState::ShutDown);
    }

    #[test]
    fn test_reinit_after_shutdown_policy() {
        let mut gate: LifecycleGate = LifecycleGate::with_reinit(Reinit::AfterShutdown);
        assert!(gate.init(options()).unwrap());
        assert!(!gate.init(options()).unwrap());

        gate.shutdown();
        assert!(gate.init(options()).unwrap());
        assert_eq!(gate.state(), GateState::Live);
    }

    #[test]
    fn test_shutdown_without_init() {
        let mut gate: LifecycleGate = LifecycleGate::default();
        gate.shutdown();
        gate.shutdown();
        assert_eq!(gate.state(), GateState::Uninitialized);
    }

    #[test]
    fn test_failed_init_leaves_gate_uninitialized() {
        let mut gate: LifecycleGate = LifecycleGate::new();
        let bad = InitOptions::default().with_pubmanager_queue_size(0);
        assert!(gate.init(bad).is_err());
        assert_eq!(gate.state(), GateState::Uninitialized);

        assert!(gate.init(options()).unwrap());
    }
}
