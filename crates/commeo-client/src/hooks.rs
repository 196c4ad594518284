//! Callbacks into the layer that owns the actors
//!
//! Hooks run synchronously on the task that drives the [`Gateway`](crate::Gateway),
//! right after the frame that caused them has been applied to the tables.
//! They must not block.

use std::collections::BTreeSet;

use commeo_core::ActorId;

/// Observer of gateway activity. Every method defaults to a no-op.
pub trait GatewayHooks: Send + Sync {
    /// A fresh set of available actors arrived
    fn on_actors_received(&self) {}

    /// An active shutter's identity was stored
    fn on_actor_initialized(&self, _actor_id: ActorId) {}

    /// A status snapshot was stored. `is_new` is true for the actor's first one.
    fn on_actor_updated(&self, _actor_id: ActorId, _is_new: bool) {}

    /// One receive attempt finished, after its frame (if any) was dispatched
    fn on_receive_done(&self, _timed_out: bool) {}

    /// Every known actor is fully initialized. Called exactly once.
    fn on_setup_finished(&self, _actors: &BTreeSet<ActorId>) {}

    /// Steady-state status change of an actor after setup finished
    fn on_actor_refreshed(&self, _actor_id: ActorId) {}
}

/// Hooks that ignore everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl GatewayHooks for NoopHooks {}
