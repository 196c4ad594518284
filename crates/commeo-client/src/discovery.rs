//! Discovery state machine
//!
//! Brings every actor the gateway reports from unknown to fully initialized:
//! identity first, then status. The machine is pure. It consumes
//! [`GatewayEvent`]s and returns the [`Action`]s the caller must carry out,
//! so it can be driven and tested without a connection.
//!
//! Per-actor state only ever moves forward:
//!
//! ```text
//! Uninitialized -> PartiallyInitialized -> FullyInitialized
//!       |
//!       +-> Excluded   (identity says: not an active shutter)
//! ```
//!
//! A status can arrive before the identity and move an actor straight to
//! `FullyInitialized`. Such an actor is not ready until its identity is in,
//! and a later rejection still excludes it. A status for an actor never seen
//! before also triggers an identity request.

use std::collections::{BTreeMap, BTreeSet};

use commeo_core::ActorId;
use tracing::{debug, info};

use crate::dispatcher::GatewayEvent;

/// Bring-up stage of one actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActorState {
    /// Known to exist, identity not fetched
    Uninitialized,
    /// Identity stored, status not fetched
    PartiallyInitialized,
    /// Identity and status stored
    FullyInitialized,
    /// Identity fetched but the actor is not an active shutter
    Excluded,
}

/// Work requested by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    RequestInfo(ActorId),
    RequestStatus(ActorId),
    /// Re-arm the read loop
    Receive,
    /// Every tracked actor is ready; fired once
    SetupFinished(BTreeSet<ActorId>),
    /// Forward a steady-state status change
    Refresh(ActorId),
}

#[derive(Debug, Default)]
pub struct Discovery {
    actors: BTreeMap<ActorId, ActorState>,
    /// Actors whose identity was accepted
    identified: BTreeSet<ActorId>,
    completed: bool,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event. `available` is the gateway's current actor set.
    pub fn handle(&mut self, event: GatewayEvent, available: &BTreeSet<ActorId>) -> Vec<Action> {
        match event {
            GatewayEvent::ActorsReceived => {
                let fresh: Vec<ActorId> = available
                    .iter()
                    .copied()
                    .filter(|id| !self.actors.contains_key(id))
                    .collect();
                info!("New available actors {:?}", fresh);
                fresh
                    .into_iter()
                    .map(|id| {
                        self.actors.insert(id, ActorState::Uninitialized);
                        Action::RequestInfo(id)
                    })
                    .collect()
            }

            GatewayEvent::ActorInitialized(id) => {
                self.identified.insert(id);
                if self.state(id) == Some(ActorState::FullyInitialized) {
                    // Status already in
                    return self.check_finished().into_iter().collect();
                }
                self.advance(id, ActorState::PartiallyInitialized);
                info!("Partially initialized: {}", id);
                vec![Action::RequestStatus(id)]
            }

            GatewayEvent::ActorRejected(id) => {
                let excluded = match self.actors.get(&id) {
                    None | Some(ActorState::Uninitialized) => true,
                    Some(ActorState::FullyInitialized) => !self.identified.contains(&id),
                    Some(_) => false,
                };
                if excluded {
                    debug!("Excluding actor {}", id);
                    self.actors.insert(id, ActorState::Excluded);
                }
                self.check_finished().into_iter().collect()
            }

            GatewayEvent::ActorUpdated { actor_id, is_new } => {
                let untracked = match self.actors.get(&actor_id) {
                    Some(ActorState::Excluded) => return Vec::new(),
                    Some(_) => false,
                    None => true,
                };
                self.advance(actor_id, ActorState::FullyInitialized);

                if untracked {
                    debug!("Status for unknown actor {}, requesting identity", actor_id);
                    return vec![Action::RequestInfo(actor_id)];
                }
                if is_new {
                    info!("Fully initialized: {}", actor_id);
                    if !self.completed {
                        return self.check_finished().into_iter().collect();
                    }
                } else if self.completed {
                    return vec![Action::Refresh(actor_id)];
                }
                Vec::new()
            }

            GatewayEvent::ReceiveDone { timed_out } => {
                if timed_out {
                    Vec::new()
                } else {
                    vec![Action::Receive]
                }
            }
        }
    }

    fn advance(&mut self, id: ActorId, to: ActorState) {
        let state = self.actors.entry(id).or_insert(to);
        if *state < to {
            *state = to;
        }
    }

    fn check_finished(&mut self) -> Option<Action> {
        if self.completed {
            return None;
        }
        let ready = self.fully_initialized();
        let pending = self.actors.iter().any(|(id, s)| match s {
            ActorState::Uninitialized | ActorState::PartiallyInitialized => true,
            ActorState::FullyInitialized => !self.identified.contains(id),
            ActorState::Excluded => false,
        });
        if ready.is_empty() || pending {
            return None;
        }
        self.completed = true;
        info!("Setup finished with actors {:?}", ready);
        Some(Action::SetupFinished(ready))
    }

    pub fn state(&self, id: ActorId) -> Option<ActorState> {
        self.actors.get(&id).copied()
    }

    /// Every actor observed so far, in any state
    pub fn all_actors(&self) -> BTreeSet<ActorId> {
        self.actors.keys().copied().collect()
    }

    pub fn actors_in(&self, state: ActorState) -> BTreeSet<ActorId> {
        self.actors
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn fully_initialized(&self) -> BTreeSet<ActorId> {
        self.actors_in(ActorState::FullyInitialized)
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }
}
