//! Gateway facade
//!
//! Owns one [`Connection`], the [`Dispatcher`] tables and the [`Discovery`]
//! state machine, and runs the actions discovery asks for. Everything a host
//! needs goes through here: bring-up, the read loop, table reads and drive
//! commands.
//!
//! The protocol has no request IDs. Do not keep two requests of the same
//! method in flight at once; their responses cannot be told apart.

use std::collections::BTreeSet;
use std::sync::Arc;

use commeo_core::{
    encode_call, ActorId, Command, CommandOutcome, DeviceIdentity, DutyCycle, Method,
    StatusSnapshot,
};
use commeo_transport::{
    Connection, ReceiveOutcome, SerialConfig, SerialTransport, TransportError,
};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::discovery::{Action, ActorState, Discovery};
use crate::dispatcher::{Dispatcher, GatewayEvent};
use crate::error::Result;
use crate::hooks::GatewayHooks;

/// A connected Commeo gateway
pub struct Gateway {
    connection: Connection,
    dispatcher: Dispatcher,
    discovery: Mutex<Discovery>,
    hooks: Arc<dyn GatewayHooks>,
}

impl Gateway {
    /// Open the serial port named in `config`. Failure to open is returned,
    /// never retried.
    pub async fn open(config: &GatewayConfig, hooks: Arc<dyn GatewayHooks>) -> Result<Self> {
        let connection = SerialTransport::open_with_config(&config.port, &config.transport)
            .await
            .map_err(|e| {
                warn!("Could not open gateway on {}: {}", config.port, e);
                e
            })?;
        Ok(Self::with_connection(connection, hooks))
    }

    /// Run over any byte stream, such as one end of a `tokio::io::duplex`
    pub fn with_stream<S>(stream: S, config: &SerialConfig, hooks: Arc<dyn GatewayHooks>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::with_connection(Connection::from_stream(stream, config), hooks)
    }

    pub fn with_connection(connection: Connection, hooks: Arc<dyn GatewayHooks>) -> Self {
        Self {
            connection,
            dispatcher: Dispatcher::new(),
            discovery: Mutex::new(Discovery::new()),
            hooks,
        }
    }

    // ------------------------------------------------------------------------
    // Read loop
    // ------------------------------------------------------------------------

    /// Ask for the actor list and keep receiving until the gateway goes quiet
    pub async fn start_discovery(&self) -> Result<()> {
        info!("Starting actor discovery");
        self.request_actor_ids()?;
        self.pump().await
    }

    /// Receive while discovery keeps re-arming the read, i.e. until a receive
    /// times out
    pub async fn pump(&self) -> Result<()> {
        while self.receive_one().await? {}
        Ok(())
    }

    /// Receive and dispatch at most one frame.
    ///
    /// Returns true when the read loop should go on. A call made while
    /// another receive is pending does nothing and returns false. Fails once
    /// the connection is gone.
    pub async fn receive_one(&self) -> Result<bool> {
        let timed_out = match self.connection.receive_frame().await {
            ReceiveOutcome::Busy => return Ok(false),
            ReceiveOutcome::Frame(text) => {
                if let Some(event) = self.dispatcher.on_frame(&text) {
                    self.process(event)?;
                }
                false
            }
            ReceiveOutcome::TimedOut => true,
            ReceiveOutcome::Failed => {
                if !self.connection.is_connected() {
                    return Err(TransportError::ConnectionClosed.into());
                }
                false
            }
        };

        self.process(GatewayEvent::ReceiveDone { timed_out })
    }

    /// Report the event to the hooks, then run whatever discovery asks for.
    /// Returns true if a further receive was requested.
    fn process(&self, event: GatewayEvent) -> Result<bool> {
        match event {
            GatewayEvent::ActorsReceived => self.hooks.on_actors_received(),
            GatewayEvent::ActorInitialized(id) => self.hooks.on_actor_initialized(id),
            GatewayEvent::ActorRejected(_) => {}
            GatewayEvent::ActorUpdated { actor_id, is_new } => {
                self.hooks.on_actor_updated(actor_id, is_new)
            }
            GatewayEvent::ReceiveDone { timed_out } => self.hooks.on_receive_done(timed_out),
        }

        let available = self.dispatcher.available_actors();
        let actions = self.discovery.lock().handle(event, &available);

        let mut rearm = false;
        for action in actions {
            match action {
                Action::RequestInfo(id) => self.request_actor_info(id)?,
                Action::RequestStatus(id) => self.request_actor_status(id)?,
                Action::Receive => rearm = true,
                Action::SetupFinished(actors) => self.hooks.on_setup_finished(&actors),
                Action::Refresh(id) => self.hooks.on_actor_refreshed(id),
            }
        }
        Ok(rearm)
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    fn send(&self, text: &str) -> Result<()> {
        Ok(self.connection.send(text)?)
    }

    pub fn request_actor_ids(&self) -> Result<()> {
        self.send(&encode_call(Method::DEVICE_GET_IDS, &[]))
    }

    pub fn request_actor_info(&self, actor_id: ActorId) -> Result<()> {
        debug!("Requesting info for actor {}", actor_id);
        self.send(&encode_call(Method::DEVICE_GET_INFO, &[actor_id as i64]))
    }

    pub fn request_actor_status(&self, actor_id: ActorId) -> Result<()> {
        debug!("Requesting status for actor {}", actor_id);
        self.send(&encode_call(Method::DEVICE_GET_VALUES, &[actor_id as i64]))
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Send a drive command. Fire and forget: the outcome arrives later as a
    /// `selve.GW.command.result` frame, see [`Gateway::last_command_outcome`].
    pub fn command(&self, command: &Command) -> Result<()> {
        info!("{} actor {}", command.kind, command.actor_id);
        self.send(&command.encode())
    }

    pub fn stop(&self, actor_id: ActorId) -> Result<()> {
        self.command(&Command::stop(actor_id))
    }

    pub fn drive_up(&self, actor_id: ActorId) -> Result<()> {
        self.command(&Command::drive_up(actor_id))
    }

    pub fn drive_down(&self, actor_id: ActorId) -> Result<()> {
        self.command(&Command::drive_down(actor_id))
    }

    /// Drive to `percent`, 0 = open and 100 = closed
    pub fn drive_to_position(&self, actor_id: ActorId, percent: u8) -> Result<()> {
        let command = Command::drive_to_position(actor_id, percent)?;
        self.command(&command)
    }

    // ------------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------------

    pub fn actor(&self, actor_id: ActorId) -> Option<DeviceIdentity> {
        self.dispatcher.identity(actor_id)
    }

    /// Identities of all admitted actors
    pub fn actors(&self) -> Vec<DeviceIdentity> {
        self.dispatcher.identities()
    }

    pub fn status(&self, actor_id: ActorId) -> Option<StatusSnapshot> {
        self.dispatcher.status(actor_id)
    }

    pub fn statuses(&self) -> Vec<StatusSnapshot> {
        self.dispatcher.statuses()
    }

    pub fn available_actors(&self) -> BTreeSet<ActorId> {
        self.dispatcher.available_actors()
    }

    pub fn duty_cycle(&self) -> Option<DutyCycle> {
        self.dispatcher.duty_cycle()
    }

    pub fn last_command_outcome(&self) -> Option<CommandOutcome> {
        self.dispatcher.last_command_outcome()
    }

    pub fn actor_state(&self, actor_id: ActorId) -> Option<ActorState> {
        self.discovery.lock().state(actor_id)
    }

    pub fn is_setup_complete(&self) -> bool {
        self.discovery.lock().is_complete()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Close the connection. Pending reads fail, queued frames are dropped.
    pub fn close(&self) {
        self.connection.close();
    }
}
