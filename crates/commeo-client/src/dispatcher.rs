//! Frame dispatcher
//!
//! Routes each decoded frame by its method, keeps the actor tables current and
//! reports what changed as a [`GatewayEvent`]. A frame that fails to decode,
//! carries a fault, or names an unknown method is logged and dropped; the
//! tables are only written after a frame has been fully read.
//!
//! The tables only grow. Readers get clones, so a snapshot stays valid while
//! later frames update the live copy.

use std::collections::{BTreeMap, BTreeSet};

use commeo_core::{
    decode, ActorId, CommandOutcome, DeviceIdentity, DutyCycle, Error, Frame, LogEvent,
    LogSeverity, Method, StatusSnapshot,
};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn, Level};

/// What a dispatched frame changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEvent {
    /// The available actor set was replaced
    ActorsReceived,
    /// An active shutter's identity was stored
    ActorInitialized(ActorId),
    /// Identity arrived for an actor that is not an active shutter; nothing stored
    ActorRejected(ActorId),
    /// A status snapshot was stored
    ActorUpdated { actor_id: ActorId, is_new: bool },
    /// A receive attempt finished
    ReceiveDone { timed_out: bool },
}

/// Actor tables plus the routing that fills them
#[derive(Default)]
pub struct Dispatcher {
    available: RwLock<BTreeSet<ActorId>>,
    identities: RwLock<BTreeMap<ActorId, DeviceIdentity>>,
    statuses: RwLock<BTreeMap<ActorId, StatusSnapshot>>,
    duty_cycle: RwLock<Option<DutyCycle>>,
    last_outcome: RwLock<Option<CommandOutcome>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and dispatch one frame of wire text
    pub fn on_frame(&self, text: &str) -> Option<GatewayEvent> {
        match decode(text) {
            Ok(frame) => self.on_decoded(&frame),
            Err(Error::Fault(strings)) => {
                error!("Received FAULT: {}", strings.join("; "));
                None
            }
            Err(e) => {
                warn!("Dropping undecodable frame: {}", e);
                debug!("Undecodable frame: {}", text);
                None
            }
        }
    }

    /// Dispatch an already decoded frame
    pub fn on_decoded(&self, frame: &Frame) -> Option<GatewayEvent> {
        let method = match frame.method() {
            Ok(method) => method,
            Err(e) => {
                warn!("Dropping frame without method name: {}", e);
                return None;
            }
        };

        match self.route(&method, frame) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping malformed {} frame: {}", method, e);
                None
            }
        }
    }

    fn route(&self, method: &Method, frame: &Frame) -> commeo_core::Result<Option<GatewayEvent>> {
        match method {
            Method::DeviceGetIds => {
                let ids = frame.int_set(0)?;
                info!("Available actors: {:?}", ids);
                *self.available.write() = ids;
                Ok(Some(GatewayEvent::ActorsReceived))
            }

            Method::DeviceGetInfo => {
                let identity = DeviceIdentity::from_frame(frame)?;
                let actor_id = identity.actor_id;
                if !identity.is_active_shutter() {
                    debug!(
                        "Ignoring actor {} (type {}, status {})",
                        actor_id, identity.device_type, identity.device_status
                    );
                    return Ok(Some(GatewayEvent::ActorRejected(actor_id)));
                }
                debug!("Actor {} is '{}'", actor_id, identity.label);
                self.identities.write().insert(actor_id, identity);
                Ok(Some(GatewayEvent::ActorInitialized(actor_id)))
            }

            Method::DeviceGetValues | Method::EventDevice => {
                let status = StatusSnapshot::from_frame(frame)?;
                let actor_id = status.actor_id;
                debug!(
                    "Actor {}: {:?} at {}% -> {}%",
                    actor_id,
                    status.motion,
                    status.position(),
                    status.target_position()
                );
                let is_new = self.statuses.write().insert(actor_id, status).is_none();
                Ok(Some(GatewayEvent::ActorUpdated { actor_id, is_new }))
            }

            Method::CommandDevice => {
                debug!("Command acknowledged");
                Ok(None)
            }

            Method::CommandResult => {
                let outcome = CommandOutcome::from_frame(frame)?;
                match outcome.level() {
                    Level::ERROR => error!("{}", outcome),
                    Level::WARN => warn!("{}", outcome),
                    _ => info!("{}", outcome),
                }
                *self.last_outcome.write() = Some(outcome);
                Ok(None)
            }

            Method::EventDutyCycle => {
                let duty = DutyCycle::from_frame(frame)?;
                if duty.blocked {
                    warn!(
                        "Duty cycle exhausted, gateway blocked (allowed usage {})",
                        duty.allowed_usage
                    );
                } else {
                    info!("Duty cycle: allowed usage {}", duty.allowed_usage);
                }
                *self.duty_cycle.write() = Some(duty);
                Ok(None)
            }

            Method::EventLog => {
                let log = LogEvent::from_frame(frame)?;
                match log.severity {
                    LogSeverity::Info => info!(
                        "Gateway {} [{}] {}: {} ({})",
                        log.severity, log.stamp, log.code, log.message, log.description
                    ),
                    LogSeverity::Warning => warn!(
                        "Gateway {} [{}] {}: {} ({})",
                        log.severity, log.stamp, log.code, log.message, log.description
                    ),
                    LogSeverity::Error => error!(
                        "Gateway {} [{}] {}: {} ({})",
                        log.severity, log.stamp, log.code, log.message, log.description
                    ),
                }
                Ok(None)
            }

            Method::Unknown(name) => {
                info!("Unknown method name: {}", name);
                Ok(None)
            }
        }
    }

    pub fn available_actors(&self) -> BTreeSet<ActorId> {
        self.available.read().clone()
    }

    pub fn identity(&self, actor_id: ActorId) -> Option<DeviceIdentity> {
        self.identities.read().get(&actor_id).cloned()
    }

    pub fn identities(&self) -> Vec<DeviceIdentity> {
        self.identities.read().values().cloned().collect()
    }

    pub fn status(&self, actor_id: ActorId) -> Option<StatusSnapshot> {
        self.statuses.read().get(&actor_id).copied()
    }

    pub fn statuses(&self) -> Vec<StatusSnapshot> {
        self.statuses.read().values().copied().collect()
    }

    pub fn duty_cycle(&self) -> Option<DutyCycle> {
        *self.duty_cycle.read()
    }

    pub fn last_command_outcome(&self) -> Option<CommandOutcome> {
        self.last_outcome.read().clone()
    }
}
