//! Gateway method names

use std::fmt;

/// Method names understood by the engine. Anything else decodes to
/// [`Method::Unknown`] so newer gateway firmware never breaks dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// Bitmask of all actor IDs known to the gateway
    DeviceGetIds,
    /// Identity of one actor
    DeviceGetInfo,
    /// Status of one actor, as a response
    DeviceGetValues,
    /// Acknowledgement of a drive command
    CommandDevice,
    /// Per-actor outcome of the last drive command
    CommandResult,
    /// Unsolicited status change of one actor
    EventDevice,
    /// Radio duty-cycle budget report
    EventDutyCycle,
    /// Gateway log message
    EventLog,
    Unknown(String),
}

impl Method {
    pub const DEVICE_GET_IDS: &'static str = "selve.GW.device.getIDs";
    pub const DEVICE_GET_INFO: &'static str = "selve.GW.device.getInfo";
    pub const DEVICE_GET_VALUES: &'static str = "selve.GW.device.getValues";
    pub const COMMAND_DEVICE: &'static str = "selve.GW.command.device";
    pub const COMMAND_RESULT: &'static str = "selve.GW.command.result";
    pub const EVENT_DEVICE: &'static str = "selve.GW.event.device";
    pub const EVENT_DUTY_CYCLE: &'static str = "selve.GW.event.dutyCycle";
    pub const EVENT_LOG: &'static str = "selve.GW.event.log";

    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            Self::DEVICE_GET_IDS => Method::DeviceGetIds,
            Self::DEVICE_GET_INFO => Method::DeviceGetInfo,
            Self::DEVICE_GET_VALUES => Method::DeviceGetValues,
            Self::COMMAND_DEVICE => Method::CommandDevice,
            Self::COMMAND_RESULT => Method::CommandResult,
            Self::EVENT_DEVICE => Method::EventDevice,
            Self::EVENT_DUTY_CYCLE => Method::EventDutyCycle,
            Self::EVENT_LOG => Method::EventLog,
            other => Method::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::DeviceGetIds => Self::DEVICE_GET_IDS,
            Method::DeviceGetInfo => Self::DEVICE_GET_INFO,
            Method::DeviceGetValues => Self::DEVICE_GET_VALUES,
            Method::CommandDevice => Self::COMMAND_DEVICE,
            Method::CommandResult => Self::COMMAND_RESULT,
            Method::EventDevice => Self::EVENT_DEVICE,
            Method::EventDutyCycle => Self::EVENT_DUTY_CYCLE,
            Method::EventLog => Self::EVENT_LOG,
            Method::Unknown(name) => name,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
