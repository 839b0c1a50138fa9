//! 프레임 코덱 벤치마크

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use plugline::{DeviceAddr, Frame};

fn bench_encode(c: &mut Criterion) {
    let src = DeviceAddr::new([0x02, 0, 0, 0, 0, 1]);
    let dst = DeviceAddr::new([0x00, 0xB0, 0x52, 0, 0, 9]);

    let command = Frame::command_request(src, dst, 7, Bytes::from_static(&[0x08, 0x01, 0x01]));
    c.bench_function("encode_command_request", |b| {
        b.iter(|| black_box(&command).encode().unwrap())
    });

    let meter = Frame::command_reply(
        dst,
        src,
        7,
        Bytes::from_static(b"\x01\x1b2;A1B2C3;1.0.3;1;42.5;7;9;2"),
    );
    c.bench_function("encode_meter_reply", |b| {
        b.iter(|| black_box(&meter).encode().unwrap())
    });
}

fn bench_decode(c: &mut Criterion) {
    let src = DeviceAddr::new([0x02, 0, 0, 0, 0, 1]);
    let dst = DeviceAddr::new([0x00, 0xB0, 0x52, 0, 0, 9]);

    let command = Frame::command_request(src, dst, 7, Bytes::from_static(&[0x08, 0x01, 0x01]))
        .encode()
        .unwrap();
    c.bench_function("decode_command_request", |b| {
        b.iter(|| Frame::decode(black_box(&command)).unwrap())
    });

    // 60바이트 미만 프레임은 링크 계층이 0으로 패딩한다
    let mut padded = Frame::discover_request(src, 7).encode().unwrap();
    padded.resize(60, 0);
    c.bench_function("decode_padded_probe", |b| {
        b.iter(|| Frame::decode(black_box(&padded)).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
