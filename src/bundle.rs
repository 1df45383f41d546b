//! The manager bundle: one publisher manager, one subscriber manager and one
//! reclamation manager, built and released as a unit

use std::{fmt, mem::ManuallyDrop};

use log::{debug, error, info};

use crate::{
    error::{Result, RosrtError},
    managers::{FromOptions, PublisherManager, SimpleGc, Standalone, SubscriberManager},
    options::InitOptions,
};

/// Exclusive owner of the three managers
///
/// Either all three managers exist or the bundle does not: construction
/// releases whatever it already built before reporting a failure, and
/// accessors therefore never observe a missing manager.
///
/// Teardown releases the publisher manager, then the subscriber manager,
/// then the reclamation manager.
pub struct Managers<P = PublisherManager, S = SubscriberManager, G = SimpleGc>
where
    P: FromOptions,
    S: Standalone,
    G: FromOptions,
{
    publisher: ManuallyDrop<P>,
    subscriber: ManuallyDrop<S>,
    gc: ManuallyDrop<G>,
}

impl<P, S, G> Managers<P, S, G>
where
    P: FromOptions,
    S: Standalone,
    G: FromOptions,
{
    /// Build the publisher manager, then the subscriber manager, then the
    /// reclamation manager
    pub fn new(options: &InitOptions) -> Result<Self> {
        debug!("Constructing {}", P::NAME);
        let publisher = P::from_options(options).map_err(|e| fail(P::NAME, e))?;

        debug!("Constructing {}", S::NAME);
        // On failure `publisher` is dropped here before the error propagates
        let subscriber = S::standalone().map_err(|e| fail(S::NAME, e))?;

        debug!("Constructing {}", G::NAME);
        let gc = G::from_options(options).map_err(|e| fail(G::NAME, e))?;

        info!("Manager bundle constructed");

        Ok(Self {
            publisher: ManuallyDrop::new(publisher),
            subscriber: ManuallyDrop::new(subscriber),
            gc: ManuallyDrop::new(gc),
        })
    }

    /// The publisher manager
    pub fn publisher_manager(&self) -> &P {
        &self.publisher
    }

    /// The subscriber manager
    pub fn subscriber_manager(&self) -> &S {
        &self.subscriber
    }

    /// The reclamation manager
    pub fn gc(&self) -> &G {
        &self.gc
    }
}

fn fail(component: &'static str, source: RosrtError) -> RosrtError {
    error!("Failed to construct {}: {}", component, source);
    RosrtError::construction(component, source)
}

impl<P, S, G> Drop for Managers<P, S, G>
where
    P: FromOptions,
    S: Standalone,
    G: FromOptions,
{
    fn drop(&mut self) {
        debug!("Releasing {}", P::NAME);
        // SAFETY: each field is dropped exactly once, here, and never touched again
        unsafe { ManuallyDrop::drop(&mut self.publisher) };

        debug!("Releasing {}", S::NAME);
        unsafe { ManuallyDrop::drop(&mut self.subscriber) };

        debug!("Releasing {}", G::NAME);
        unsafe { ManuallyDrop::drop(&mut self.gc) };

        info!("Manager bundle released");
    }
}

impl<P, S, G> fmt::Debug for Managers<P, S, G>
where
    P: FromOptions,
    S: Standalone,
    G: FromOptions,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Managers")
            .field("publisher", &P::NAME)
            .field("subscriber", &S::NAME)
            .field("gc", &G::NAME)
            .finish()
    }
}
