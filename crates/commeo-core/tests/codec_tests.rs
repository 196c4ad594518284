//! Codec tests for Commeo core

use std::collections::BTreeSet;

use base64::{engine::general_purpose, Engine as _};
use commeo_core::{
    codec, Command, DeviceIdentity, Envelope, Error, FieldKind, Method, MotionState,
    StatusSnapshot,
};

#[test]
fn test_decode_ids_response_with_pretty_printing() {
    let raw = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
        <methodResponse>\n\
        \t<array>\n\
        \t\t<string>selve.GW.device.getIDs</string>\n\
        \t\t<base64>IAIAAAAAAAA=</base64>\n\
        \t</array>\n\
        </methodResponse>\n";

    let frame = codec::decode(raw).expect("decode failed");
    assert_eq!(frame.method().unwrap(), Method::DeviceGetIds);
    assert_eq!(frame.int_set(0).unwrap(), BTreeSet::from([5, 9]));
}

#[test]
fn test_bitmask_patterns() {
    let cases: &[(&[u8], &[u32])] = &[
        (&[0x05], &[0, 2]),
        (&[0x01], &[0]),
        (&[0x80], &[7]),
        (&[0x00, 0x01], &[8]),
        (&[0x03, 0x00, 0x10], &[0, 1, 20]),
        (&[0xff], &[0, 1, 2, 3, 4, 5, 6, 7]),
        (&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80], &[63]),
        (&[0x00; 8], &[]),
    ];

    for (bytes, expected) in cases {
        let encoded = general_purpose::STANDARD.encode(bytes);
        let set = codec::decode_int_set(&encoded).unwrap();
        let expected: BTreeSet<u32> = expected.iter().copied().collect();
        assert_eq!(set, expected, "bytes {:02x?}", bytes);
    }
}

#[test]
fn test_status_event_is_a_call() {
    let frame = codec::decode(
        "<methodCall><methodName>selve.GW.event.device</methodName>\
         <array><int>5</int><int>3</int><int>40000</int><int>65535</int></array></methodCall>",
    )
    .unwrap();

    assert_eq!(frame.envelope(), Envelope::Call);
    assert_eq!(frame.method().unwrap(), Method::EventDevice);

    let status = StatusSnapshot::from_frame(&frame).unwrap();
    assert_eq!(status.actor_id, 5);
    assert_eq!(status.motion, MotionState::Closing);
    assert!(status.is_closing());
    assert_eq!(status.target_position(), 100);
}

#[test]
fn test_values_response_indexes_past_method_name() {
    let frame = codec::decode(
        "<methodResponse><array><string>selve.GW.device.getValues</string>\
         <int>9</int><int>1</int><int>0</int><int>0</int></array></methodResponse>",
    )
    .unwrap();

    let status = StatusSnapshot::from_frame(&frame).unwrap();
    assert_eq!(status.actor_id, 9);
    assert!(status.is_fully_open());
    assert_eq!(status.position(), 0);
}

#[test]
fn test_fault_carries_strings() {
    let err = codec::decode(
        "<methodResponse><fault><array><string>selve.GW.command.device</string>\
         <string>actor not found</string></array></fault></methodResponse>",
    )
    .unwrap_err();

    assert!(err.is_fault());
    assert_eq!(
        err.to_string(),
        "gateway fault: selve.GW.command.device; actor not found"
    );
}

#[test]
fn test_missing_field_reports_kind_and_index() {
    let frame = codec::decode(
        "<methodResponse><array><string>selve.GW.device.getInfo</string>\
         <int>5</int></array></methodResponse>",
    )
    .unwrap();

    let err = DeviceIdentity::from_frame(&frame).unwrap_err();
    assert_eq!(
        err,
        Error::MissingField {
            kind: FieldKind::String,
            index: 1
        }
    );
}

#[test]
fn test_command_decodes_back() {
    let cmd = Command::drive_to_position(12, 100).unwrap();
    let frame = codec::decode(&cmd.encode()).unwrap();

    assert_eq!(frame.method().unwrap(), Method::CommandDevice);
    assert_eq!(frame.int(0).unwrap(), 12);
    assert_eq!(frame.int(1).unwrap(), 7);
    assert_eq!(frame.int(2).unwrap(), 1);
    assert_eq!(frame.int(3).unwrap(), 65535);
}
