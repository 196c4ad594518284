//! Actor status snapshots

use serde::{Deserialize, Serialize};

use crate::{ActorId, Frame, Result, MAX_RAW_POSITION};

/// Raw positions this close to an extreme count as fully open/closed (5%)
pub const POSITION_TOLERANCE: u16 = (MAX_RAW_POSITION as u32 * 5 / 100) as u16;

/// Motion state reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionState {
    Still,
    Opening,
    Closing,
    /// Any other code
    Reserved(i64),
}

impl MotionState {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => MotionState::Still,
            2 => MotionState::Opening,
            3 => MotionState::Closing,
            other => MotionState::Reserved(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            MotionState::Still => 1,
            MotionState::Opening => 2,
            MotionState::Closing => 3,
            MotionState::Reserved(code) => *code,
        }
    }
}

/// Latest status of one actor, read from `selve.GW.device.getValues` or
/// `selve.GW.event.device`.
///
/// Field layout: `int(0)` actor ID, `int(1)` motion state, `int(2)` current
/// raw position, `int(3)` target raw position. Raw positions run from 0
/// (fully open) to 65535 (fully closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub actor_id: ActorId,
    pub motion: MotionState,
    pub current_raw: u16,
    pub target_raw: u16,
}

impl StatusSnapshot {
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        Ok(Self {
            actor_id: frame.int_as(0)?,
            motion: MotionState::from_code(frame.int(1)?),
            current_raw: frame.int_as(2)?,
            target_raw: frame.int_as(3)?,
        })
    }

    pub fn is_still(&self) -> bool {
        self.motion == MotionState::Still
    }

    pub fn is_opening(&self) -> bool {
        self.motion == MotionState::Opening
    }

    pub fn is_closing(&self) -> bool {
        self.motion == MotionState::Closing
    }

    /// Standing still within the tolerance band of the closed end
    pub fn is_closed(&self) -> bool {
        self.is_still() && self.current_raw > MAX_RAW_POSITION - POSITION_TOLERANCE
    }

    /// Standing still within the tolerance band of the open end
    pub fn is_fully_open(&self) -> bool {
        self.is_still() && self.current_raw < POSITION_TOLERANCE
    }

    /// Current position in percent, 100 = closed
    pub fn position(&self) -> u8 {
        if self.is_closed() {
            100
        } else if self.is_fully_open() {
            0
        } else {
            raw_to_percent(self.current_raw)
        }
    }

    /// Target position in percent, 100 = closed
    pub fn target_position(&self) -> u8 {
        raw_to_percent(self.target_raw)
    }
}

/// Scale a raw position to percent, rounding up
pub fn raw_to_percent(raw: u16) -> u8 {
    let max = MAX_RAW_POSITION as u32;
    ((raw as u32 * 100 + max - 1) / max) as u8
}
