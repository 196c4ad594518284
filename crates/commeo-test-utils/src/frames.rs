//! Builders for gateway frames, as wire text without the terminator

use std::collections::BTreeSet;

use commeo_core::codec::encode;
use commeo_core::{encode_int_set, ActorId, Field, FieldKind, Frame, Method};

fn int(value: impl ToString) -> Field {
    Field::new(FieldKind::Int, value.to_string())
}

fn string(value: &str) -> Field {
    Field::new(FieldKind::String, value)
}

fn int_set(ids: &[ActorId]) -> Field {
    let set: BTreeSet<ActorId> = ids.iter().copied().collect();
    Field::new(FieldKind::Base64, encode_int_set(&set))
}

fn response(method: &str, mut fields: Vec<Field>) -> String {
    fields.insert(0, string(method));
    encode(&Frame::response(fields))
}

fn call(method: &str, fields: Vec<Field>) -> String {
    encode(&Frame::call(method, fields))
}

pub fn ids_response(ids: &[ActorId]) -> String {
    response(Method::DEVICE_GET_IDS, vec![int_set(ids)])
}

pub fn info_response(
    actor_id: ActorId,
    label: &str,
    radio_address: u32,
    device_type: i64,
    device_status: i64,
) -> String {
    response(
        Method::DEVICE_GET_INFO,
        vec![
            int(actor_id),
            string(label),
            int(radio_address),
            int(device_type),
            int(device_status),
        ],
    )
}

pub fn values_response(actor_id: ActorId, motion: i64, current_raw: u16, target_raw: u16) -> String {
    response(
        Method::DEVICE_GET_VALUES,
        vec![int(actor_id), int(motion), int(current_raw), int(target_raw)],
    )
}

/// Unsolicited status change
pub fn status_event(actor_id: ActorId, motion: i64, current_raw: u16, target_raw: u16) -> String {
    call(
        Method::EVENT_DEVICE,
        vec![int(actor_id), int(motion), int(current_raw), int(target_raw)],
    )
}

pub fn command_ack() -> String {
    response(Method::COMMAND_DEVICE, vec![int(1)])
}

/// Command result in wire order: code, type (manual), flag, bitmasks
pub fn command_result(
    command_code: i64,
    succeeded: &[ActorId],
    failed: &[ActorId],
    executed: bool,
) -> String {
    call(
        Method::COMMAND_RESULT,
        vec![
            int(command_code),
            int(1),
            int(executed as i64),
            int_set(succeeded),
            int_set(failed),
        ],
    )
}

pub fn duty_cycle_event(blocked: bool, allowed_usage: i64) -> String {
    call(
        Method::EVENT_DUTY_CYCLE,
        vec![int(blocked as i64), int(allowed_usage)],
    )
}

pub fn log_event(severity: i64, code: &str, stamp: &str, message: &str, description: &str) -> String {
    call(
        Method::EVENT_LOG,
        vec![
            int(severity),
            string(code),
            string(stamp),
            string(message),
            string(description),
        ],
    )
}

pub fn fault_response(strings: &[&str]) -> String {
    let inner: String = strings
        .iter()
        .map(|s| format!("<string>{}</string>", s))
        .collect();
    format!(
        "<methodResponse><fault><array>{}</array></fault></methodResponse>",
        inner
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use commeo_core::{decode, CommandOutcome};

    #[test]
    fn test_command_result_decodes_as_outcome() {
        let frame = decode(&command_result(7, &[5], &[9], true)).unwrap();
        let outcome = CommandOutcome::from_frame(&frame).unwrap();
        assert_eq!(outcome.command_code, 7);
        assert_eq!(outcome.succeeded, BTreeSet::from([5]));
        assert_eq!(outcome.failed, BTreeSet::from([9]));
        assert!(outcome.executed);

        let frame = decode(&command_result(2, &[], &[4], false)).unwrap();
        let outcome = CommandOutcome::from_frame(&frame).unwrap();
        assert!(!outcome.executed);
        assert!(outcome.has_error());
    }
}
