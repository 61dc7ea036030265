//! Benchmarks for ffprobe and ffmpeg progress output parsing

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rf_av::{parse_ffprobe_json, ProgressParser};

/// Sample ffprobe JSON output for a typical upload
const FFPROBE_SIMPLE: &str = r#"{
    "format": {
        "filename": "/uploads/video-1700000000000-42.mp4",
        "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
        "duration": "125.400000",
        "size": "52428800",
        "bit_rate": "3344567"
    },
    "streams": [
        {
            "index": 0,
            "codec_type": "video",
            "codec_name": "h264",
            "width": 1920,
            "height": 1080,
            "r_frame_rate": "30000/1001",
            "disposition": {"default": 1, "forced": 0},
            "tags": {}
        },
        {
            "index": 1,
            "codec_type": "audio",
            "codec_name": "aac",
            "channels": 2,
            "sample_rate": "48000",
            "disposition": {"default": 1, "forced": 0},
            "tags": {"language": "eng"}
        }
    ]
}"#;

/// ffprobe output for a file with many secondary streams
fn ffprobe_many_streams(n: usize) -> String {
    let mut streams = vec![
        r#"{"index": 0, "codec_type": "video", "codec_name": "hevc", "width": 3840, "height": 2160, "r_frame_rate": "24000/1001"}"#
            .to_string(),
    ];
    for i in 1..=n {
        streams.push(format!(
            r#"{{"index": {i}, "codec_type": "audio", "codec_name": "eac3", "channels": 6, "sample_rate": "48000", "tags": {{"language": "eng", "title": "Track {i}"}}}}"#
        ));
    }
    format!(
        r#"{{"format": {{"format_name": "matroska,webm", "duration": "7200.0", "size": "15000000000", "bit_rate": "16666666"}}, "streams": [{}]}}"#,
        streams.join(",")
    )
}

/// A 10 minute encode's worth of `-progress` blocks
fn progress_output(blocks: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(blocks * 12);
    for i in 0..blocks {
        let us = i as u64 * 500_000;
        lines.push(format!("frame={}", i * 15));
        lines.push("fps=29.97".to_string());
        lines.push("stream_0_0_q=23.0".to_string());
        lines.push("bitrate=1450.3kbits/s".to_string());
        lines.push(format!("total_size={}", i * 90_000));
        lines.push(format!("out_time_us={us}"));
        lines.push(format!("out_time_ms={us}"));
        lines.push("out_time=00:00:00.500000".to_string());
        lines.push("dup_frames=0".to_string());
        lines.push("drop_frames=0".to_string());
        lines.push("speed=2.5x".to_string());
        lines.push(if i + 1 == blocks { "progress=end" } else { "progress=continue" }.to_string());
    }
    lines
}

fn bench_ffprobe(c: &mut Criterion) {
    let mut group = c.benchmark_group("ffprobe_json");

    group.throughput(Throughput::Bytes(FFPROBE_SIMPLE.len() as u64));
    group.bench_function("simple", |b| {
        b.iter(|| parse_ffprobe_json(black_box(FFPROBE_SIMPLE)).unwrap())
    });

    for n in [4, 16, 64] {
        let json = ffprobe_many_streams(n);
        group.throughput(Throughput::Bytes(json.len() as u64));
        group.bench_with_input(BenchmarkId::new("streams", n), &json, |b, json| {
            b.iter(|| parse_ffprobe_json(black_box(json)).unwrap())
        });
    }

    group.finish();
}

fn bench_progress(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_progress");
    let lines = progress_output(1200);
    group.throughput(Throughput::Elements(lines.len() as u64));

    group.bench_function("parse_blocks", |b| {
        b.iter(|| {
            let mut parser = ProgressParser::new(Some(600.0));
            let mut last = None;
            for line in &lines {
                if let Some(p) = parser.feed(black_box(line)) {
                    last = Some(p);
                }
            }
            last
        })
    });

    group.finish();
}

criterion_group!(benches, bench_ffprobe, bench_progress);
criterion_main!(benches);
