//! Hooks that record every call

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use commeo_client::GatewayHooks;
use commeo_core::ActorId;
use parking_lot::Mutex;

use crate::{wait_for, wait_for_count, DEFAULT_CHECK_INTERVAL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCall {
    ActorsReceived,
    ActorInitialized(ActorId),
    ActorUpdated(ActorId, bool),
    ReceiveDone(bool),
    SetupFinished(BTreeSet<ActorId>),
    ActorRefreshed(ActorId),
}

/// Records hook calls in order. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingHooks {
    calls: Arc<Mutex<Vec<HookCall>>>,
    count: Arc<AtomicU32>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: HookCall) {
        self.calls.lock().push(call);
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<HookCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn has(&self, call: &HookCall) -> bool {
        self.calls.lock().contains(call)
    }

    /// Actor sets passed to `on_setup_finished`, one entry per call
    pub fn setup_finished(&self) -> Vec<BTreeSet<ActorId>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                HookCall::SetupFinished(actors) => Some(actors.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn refreshed(&self) -> Vec<ActorId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                HookCall::ActorRefreshed(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub async fn wait_for_count(&self, n: u32, max_wait: Duration) -> bool {
        wait_for_count(&self.count, n, max_wait).await
    }

    pub async fn wait_for_call(&self, call: HookCall, max_wait: Duration) -> bool {
        let call = &call;
        wait_for(
            || async move { self.has(call) },
            DEFAULT_CHECK_INTERVAL,
            max_wait,
        )
        .await
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
        self.count.store(0, Ordering::SeqCst);
    }
}

impl GatewayHooks for RecordingHooks {
    fn on_actors_received(&self) {
        self.record(HookCall::ActorsReceived);
    }

    fn on_actor_initialized(&self, actor_id: ActorId) {
        self.record(HookCall::ActorInitialized(actor_id));
    }

    fn on_actor_updated(&self, actor_id: ActorId, is_new: bool) {
        self.record(HookCall::ActorUpdated(actor_id, is_new));
    }

    fn on_receive_done(&self, timed_out: bool) {
        self.record(HookCall::ReceiveDone(timed_out));
    }

    fn on_setup_finished(&self, actors: &BTreeSet<ActorId>) {
        self.record(HookCall::SetupFinished(actors.clone()));
    }

    fn on_actor_refreshed(&self, actor_id: ActorId) {
        self.record(HookCall::ActorRefreshed(actor_id));
    }
}
