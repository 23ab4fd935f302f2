//! Benchmarks for line framing and parsing.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use slirc_client::{Line, LineFramer};

/// Simple PING line
const SIMPLE_LINE: &str = "PING :irc.example.com";

/// Line with a full prefix
const PREFIX_LINE: &str = ":nick!user@host PRIVMSG #channel :Hello, world!";

/// Numeric with many arguments
const NUMERIC_LINE: &str =
    ":irc.server.net 005 nickname NETWORK=ExampleNet NICKLEN=30 CHANTYPES=# CHANMODES=eIbq,k,flj,CFLMPQScgimnprstuz :are supported by this server";

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Line Parsing");

    group.bench_function("simple_ping", |b| {
        b.iter(|| {
            let line = Line::parse(black_box(SIMPLE_LINE)).unwrap();
            black_box(line)
        })
    });

    group.bench_function("with_prefix", |b| {
        b.iter(|| {
            let line = Line::parse(black_box(PREFIX_LINE)).unwrap();
            black_box(line)
        })
    });

    group.bench_function("isupport_numeric", |b| {
        b.iter(|| {
            let line = Line::parse(black_box(NUMERIC_LINE)).unwrap();
            black_box(line)
        })
    });

    group.finish();
}

fn benchmark_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Line Framing");

    // a realistic burst of server traffic in one read
    let mut burst = Vec::new();
    for i in 0..64 {
        burst.extend_from_slice(
            format!(":nick{}!user@host PRIVMSG #channel :message number {}\r\n", i, i).as_bytes(),
        );
    }
    group.throughput(Throughput::Bytes(burst.len() as u64));

    group.bench_function("burst_64_lines", |b| {
        b.iter(|| {
            let mut framer = LineFramer::utf8();
            let lines = framer.feed(black_box(&burst)).unwrap();
            black_box(lines)
        })
    });

    // the same burst cut into 256-byte reads
    group.bench_function("burst_64_lines_chunked", |b| {
        b.iter(|| {
            let mut framer = LineFramer::utf8();
            let mut count = 0;
            for chunk in burst.chunks(256) {
                count += framer.feed(black_box(chunk)).unwrap().len();
            }
            black_box(count)
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_parsing, benchmark_framing);
criterion_main!(benches);
