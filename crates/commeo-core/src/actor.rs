//! Actor identity

use serde::{Deserialize, Serialize};

use crate::{ActorId, Frame, Result};

/// Device type code of a shutter actor
pub const DEVICE_TYPE_SHUTTER: i64 = 1;

/// Device status code of an actor that is in use
pub const DEVICE_STATUS_ACTIVE: i64 = 1;

/// Identity of one actor, read from a `selve.GW.device.getInfo` response.
///
/// Field layout: `int(0)` actor ID, `string(1)` label, `int(1)` radio
/// address, `int(2)` device type, `int(3)` device status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub actor_id: ActorId,
    /// Human-readable name configured on the gateway
    pub label: String,
    /// Stable radio address, suitable as an external unique ID
    pub radio_address: u32,
    pub device_type: i64,
    pub device_status: i64,
}

impl DeviceIdentity {
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        Ok(Self {
            actor_id: frame.int_as(0)?,
            label: frame.string(1)?.to_string(),
            radio_address: frame.int_as(1)?,
            device_type: frame.int(2)?,
            device_status: frame.int(3)?,
        })
    }

    /// Only active shutters are admitted as controllable devices
    pub fn is_active_shutter(&self) -> bool {
        self.device_type == DEVICE_TYPE_SHUTTER && self.device_status == DEVICE_STATUS_ACTIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;

    fn info(device_type: i64, status: i64) -> Frame {
        decode(&format!(
            "<methodResponse><array><string>selve.GW.device.getInfo</string>\
             <int>5</int><string>Living room</string><int>1193046</int>\
             <int>{}</int><int>{}</int></array></methodResponse>",
            device_type, status
        ))
        .unwrap()
    }

    #[test]
    fn test_identity_fields() {
        let identity = DeviceIdentity::from_frame(&info(1, 1)).unwrap();
        assert_eq!(identity.actor_id, 5);
        assert_eq!(identity.label, "Living room");
        assert_eq!(identity.radio_address, 1193046);
        assert!(identity.is_active_shutter());
    }

    #[test]
    fn test_inactive_or_other_types_rejected() {
        assert!(!DeviceIdentity::from_frame(&info(1, 0)).unwrap().is_active_shutter());
        assert!(!DeviceIdentity::from_frame(&info(2, 1)).unwrap().is_active_shutter());
    }

    #[test]
    fn test_truncated_info_is_error() {
        let frame = decode(
            "<methodResponse><array><string>selve.GW.device.getInfo</string>\
             <int>5</int></array></methodResponse>",
        )
        .unwrap();
        assert!(DeviceIdentity::from_frame(&frame).is_err());
    }
}
