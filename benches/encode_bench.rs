//! pcmogg 编码性能基准测试.
//!
//! 覆盖整段编码 (不同质量与声道数) 以及 Ogg 页面解析.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use pcmogg::{EncodeRequest, EncodeSettings, encode_with_settings};
use pcmogg_format::parse_pages;

/// 生成交错的双音正弦
fn make_pcm(frames: usize, channels: usize, rate: u32) -> Vec<f32> {
    let mut out = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        let t = i as f32 / rate as f32;
        let v = (t * 440.0 * std::f32::consts::TAU).sin() * 0.4
            + (t * 3520.0 * std::f32::consts::TAU).sin() * 0.1;
        out.extend(std::iter::repeat_n(v, channels));
    }
    out
}

fn settings() -> EncodeSettings {
    EncodeSettings {
        serial: Some(1),
        ..EncodeSettings::default()
    }
}

fn bench_encode_quality(c: &mut Criterion) {
    let rate = 44100;
    let pcm = make_pcm(rate as usize, 2, rate);
    let settings = settings();
    let mut group = c.benchmark_group("encode_1s_stereo_44100");
    group.throughput(Throughput::Elements(rate as u64));
    for quality in [-0.1f32, 0.5, 1.0] {
        group.bench_with_input(BenchmarkId::from_parameter(quality), &quality, |b, &q| {
            let req = EncodeRequest::new(&pcm, 2, rate as i64, q);
            b.iter(|| black_box(encode_with_settings(black_box(&req), &settings).unwrap()));
        });
    }
    group.finish();
}

fn bench_encode_channels(c: &mut Criterion) {
    let rate = 48000;
    let settings = settings();
    let mut group = c.benchmark_group("encode_500ms_48000");
    for channels in [1usize, 2, 6] {
        let pcm = make_pcm(rate as usize / 2, channels, rate);
        group.bench_with_input(BenchmarkId::from_parameter(channels), &pcm, |b, pcm| {
            let req = EncodeRequest::new(pcm, channels as i32, rate as i64, 0.4);
            b.iter(|| black_box(encode_with_settings(black_box(&req), &settings).unwrap()));
        });
    }
    group.finish();
}

fn bench_parse_pages(c: &mut Criterion) {
    let pcm = make_pcm(5 * 44100, 2, 44100);
    let req = EncodeRequest::new(&pcm, 2, 44100, 0.5);
    let output = encode_with_settings(&req, &settings()).unwrap();
    c.bench_function("parse_pages_5s_stereo", |b| {
        b.iter(|| black_box(parse_pages(black_box(output.as_bytes())).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_encode_quality,
    bench_encode_channels,
    bench_parse_pages,
);
criterion_main!(benches);
