//! Commeo Client Library
//!
//! Runs a Selve Commeo gateway: dispatches inbound frames into actor tables,
//! brings newly seen actors up through discovery, and sends drive commands.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use commeo_client::{Gateway, GatewayConfig, NoopHooks};
//!
//! #[tokio::main]
//! async fn main() -> commeo_client::Result<()> {
//!     let config = GatewayConfig::new("/dev/ttyUSB0");
//!     let gateway = Gateway::open(&config, Arc::new(NoopHooks)).await?;
//!
//!     gateway.start_discovery().await?;
//!     for actor in gateway.actors() {
//!         println!("{} {}", actor.actor_id, actor.label);
//!     }
//!
//!     gateway.drive_to_position(5, 50)?;
//!     gateway.pump().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod hooks;

pub use config::GatewayConfig;
pub use discovery::{Action, ActorState, Discovery};
pub use dispatcher::{Dispatcher, GatewayEvent};
pub use error::{ClientError, Result};
pub use gateway::Gateway;
pub use hooks::{GatewayHooks, NoopHooks};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::GatewayConfig;
    pub use crate::error::{ClientError, Result};
    pub use crate::gateway::Gateway;
    pub use crate::hooks::GatewayHooks;
    pub use commeo_core::{ActorId, Command, DeviceIdentity, StatusSnapshot};
}
