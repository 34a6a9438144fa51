//! Input pipeline performance benchmarks.

#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use termwire::ansi::AnsiParser;
use termwire::input::keys;
use termwire::mainloop::system_clock;
use termwire::mouse::decoder;
use termwire::{InputProcessor, LoopOptions};

fn processor() -> InputProcessor<char> {
    let options = LoopOptions {
        enable_mouse: true,
        ..LoopOptions::default()
    };
    InputProcessor::new(system_clock(), &options)
}

/// Benchmark single key decoding.
fn bench_key_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_decoding");

    let key_sequences: &[(&str, &str)] = &[
        ("a", "single_char"),
        ("\x1b[A", "arrow_up"),
        ("\x1b[1;5C", "ctrl_right"),
        ("\x1bOP", "f1"),
        ("\x1b[15~", "f5"),
        ("\x1b[3~", "delete"),
        ("\r", "enter"),
        ("\x1bx", "alt_x"),
    ];

    for (seq, name) in key_sequences {
        let chars: Vec<char> = seq.chars().collect();
        group.bench_function(*name, |b| {
            b.iter(|| keys::parse(black_box(&chars)));
        });
    }

    group.finish();
}

/// Benchmark SGR mouse report decoding.
fn bench_mouse_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("mouse_decoding");

    let reports: &[(&str, &str)] = &[
        ("\x1b[<0;10;20M", "button_press"),
        ("\x1b[<0;10;20m", "button_release"),
        ("\x1b[<35;50;30M", "mouse_move"),
        ("\x1b[<64;10;20M", "wheel_up"),
        ("\x1b[<81;10;20M", "ctrl_wheel_down"),
    ];

    for (report, name) in reports {
        group.bench_function(*name, |b| {
            b.iter(|| decoder::parse_sgr(black_box(report)));
        });
    }

    group.finish();
}

/// Benchmark response separation in the ANSI parser.
fn bench_response_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_parsing");

    let plain: String = (0..1000usize)
        .map(|i| char::from(b'a' + u8::try_from(i % 26).unwrap_or(0)))
        .collect();

    group.bench_function("plain_1000_chars", |b| {
        let mut parser: AnsiParser = AnsiParser::default();
        parser.expect_persistent("R", |_| {});
        b.iter(|| parser.process_str(black_box(&plain)));
    });

    let replies = "typed\x1b[12;40Rtext\x1b[1;1R".repeat(50);

    group.bench_function("interleaved_replies", |b| {
        let mut parser: AnsiParser = AnsiParser::default();
        parser.expect_persistent("R", |_| {});
        b.iter(|| parser.process_str(black_box(&replies)));
    });

    group.finish();
}

/// Benchmark the full processor on realistic streams.
fn bench_processor_streams(c: &mut Criterion) {
    let mut group = c.benchmark_group("processor");

    let typing = "Hello, World!\x1b[C\x1b[D\r";
    group.bench_function("typing_with_navigation", |b| {
        let mut processor = processor();
        b.iter(|| processor.process(black_box(typing).chars()));
    });

    let moves =
        "\x1b[<35;10;10M\x1b[<35;11;10M\x1b[<35;12;10M\x1b[<35;13;10M\x1b[<35;14;10M";
    group.bench_function("rapid_mouse_moves", |b| {
        let mut processor = processor();
        b.iter(|| processor.process(black_box(moves).chars()));
    });

    let clicks = "\x1b[<0;10;5M\x1b[<0;10;5m".repeat(20);
    group.bench_function("click_bursts", |b| {
        let mut processor = processor();
        b.iter(|| processor.process(black_box(&clicks).chars()));
    });

    let arrows = "\x1b[A\x1b[B\x1b[C\x1b[D".repeat(100);
    group.bench_function("400_arrows", |b| {
        let mut processor = processor();
        b.iter(|| processor.process(black_box(&arrows).chars()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_key_decoding,
    bench_mouse_decoding,
    bench_response_parsing,
    bench_processor_streams
);
criterion_main!(benches);
