use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use sax_http::{MessageParser, MessageSink};

struct Null;

impl MessageSink for Null {
    fn on_first_line(&mut self, _line: &str) {}
    fn on_header_line(&mut self, _key: &str, _value: &str) {}
    fn on_headers_finished(&mut self) {}
    fn on_body_data(&mut self, _data: &[u8]) {}
    fn on_body_finished(&mut self) {}
}

// ============================================================================
// Inputs
// ============================================================================

fn simple_get() -> Vec<u8> {
    b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n".to_vec()
}

fn get_with_headers() -> Vec<u8> {
    b"GET /api/v1/items/42?format=json HTTP/1.1\r\n\
      Host: api.example.com\r\n\
      Accept: application/json\r\n\
      Accept-Encoding: identity\r\n\
      Authorization: Basic dXNlcjpwYXNz\r\n\
      Connection: keep-alive\r\n\
      \r\n"
        .to_vec()
}

fn identity_post(body_len: usize) -> Vec<u8> {
    let body = vec![b'x'; body_len];
    let mut out = format!(
        "POST /upload HTTP/1.1\r\nHost: example.com\r\nContent-Length: {body_len}\r\n\r\n"
    )
    .into_bytes();
    out.extend_from_slice(&body);
    out
}

fn chunked_post(chunk_size: usize, total: usize) -> Vec<u8> {
    let mut out =
        b"POST /upload HTTP/1.1\r\nHost: example.com\r\nTransfer-Encoding: chunked\r\n\r\n"
            .to_vec();
    let mut remaining = total;
    while remaining > 0 {
        let take = chunk_size.min(remaining);
        out.extend_from_slice(format!("{take:x}\r\n").as_bytes());
        out.extend_from_slice(&vec![b'x'; take]);
        out.extend_from_slice(b"\r\n");
        remaining -= take;
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_message_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_parse");
    let inputs = [
        ("simple_get", simple_get()),
        ("get_with_headers", get_with_headers()),
        ("identity_post_16k", identity_post(16 * 1024)),
    ];
    for (name, input) in &inputs {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, input| {
            b.iter(|| {
                let mut parser = MessageParser::new();
                let mut sink = Null;
                parser.parse(black_box(input), &mut sink).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_chunked_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunked_decode");
    for chunk_size in [64usize, 1024, 8192] {
        let input = chunked_post(chunk_size, 64 * 1024);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &input,
            |b, input| {
                b.iter(|| {
                    let mut parser = MessageParser::new();
                    let mut sink = Null;
                    parser.parse(black_box(input), &mut sink).unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_split_pushes(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_pushes");
    let input = identity_post(16 * 1024);
    for push_size in [256usize, 4096] {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(push_size),
            &push_size,
            |b, &push_size| {
                b.iter(|| {
                    let mut parser = MessageParser::new();
                    let mut sink = Null;
                    let mut total = 0;
                    for piece in input.chunks(push_size) {
                        total += parser.parse(black_box(piece), &mut sink).unwrap();
                    }
                    total
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_message_parse,
    bench_chunked_decode,
    bench_split_pushes
);
criterion_main!(benches);
