//! Codec benchmarks

use commeo_core::{codec, Command, StatusSnapshot};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const VALUES_RESPONSE: &str = "<methodResponse><array>\
    <string>selve.GW.device.getValues</string><int>5</int><int>1</int>\
    <int>32768</int><int>65535</int></array></methodResponse>";

const IDS_RESPONSE: &str = "<?xml version=\"1.0\"?>\n<methodResponse>\n<array>\n\
    <string>selve.GW.device.getIDs</string>\n<base64>IAIAAAAAAAA=</base64>\n\
    </array>\n</methodResponse>";

fn decode_benchmark(c: &mut Criterion) {
    c.bench_function("decode_values_response", |b| {
        b.iter(|| {
            let frame = codec::decode(black_box(VALUES_RESPONSE)).unwrap();
            black_box(StatusSnapshot::from_frame(&frame).unwrap())
        })
    });

    c.bench_function("decode_ids_response", |b| {
        b.iter(|| {
            let frame = codec::decode(black_box(IDS_RESPONSE)).unwrap();
            black_box(frame.int_set(0).unwrap())
        })
    });
}

fn encode_benchmark(c: &mut Criterion) {
    let cmd = Command::drive_to_position(5, 50).unwrap();

    c.bench_function("encode_drive_command", |b| {
        b.iter(|| black_box(black_box(&cmd).encode()))
    });
}

criterion_group!(benches, decode_benchmark, encode_benchmark);
criterion_main!(benches);
