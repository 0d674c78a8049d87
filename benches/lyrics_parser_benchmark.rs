use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use lyrics_sync_rs::{LyricsEngine, LyricsParser, LyricsSource, ParseOptions};
use lyrics_sync_rs::converter::parsers::{lrc_parser::LrcParser, ttml_parser::TtmlParser};

const LINE_COUNT: u64 = 400;

fn build_enhanced_lrc() -> String {
    let mut content = String::from("[ti:Benchmark]\n[ar:Criterion]\n[length:30:00]\n");
    for i in 0..LINE_COUNT {
        let start = i * 4_000;
        content.push_str(&format!(
            "[{}]v{}: <{}>The <{}>quick <{}>brown <{}>fox\n",
            lrc_time(start),
            i % 2 + 1,
            lrc_time(start),
            lrc_time(start + 500),
            lrc_time(start + 1_000),
            lrc_time(start + 1_500),
        ));
    }
    content
}

fn build_ttml() -> String {
    let mut content = String::from(
        r#"<tt xmlns="http://www.w3.org/ns/ttml" xmlns:ttm="http://www.w3.org/ns/ttml#metadata"><body dur="1800s"><div>"#,
    );
    for i in 0..LINE_COUNT {
        let start = i * 4;
        content.push_str(&format!(
            r#"<p begin="{start}s" end="{end}s" ttm:agent="v1"><span begin="{start}s">The</span> <span begin="{start}.5s">quick</span> <span ttm:role="x-bg" begin="{start}.8s"><span>(brown</span> <span begin="{mid}s">fox)</span></span></p>"#,
            end = start + 3,
            mid = start + 1,
        ));
    }
    content.push_str("</div></body></tt>");
    content
}

fn lrc_time(ms: u64) -> String {
    format!("{:02}:{:02}.{:02}", ms / 60_000, (ms % 60_000) / 1000, (ms % 1000) / 10)
}

fn bench_parsers(c: &mut Criterion) {
    let lrc = build_enhanced_lrc();
    let ttml = build_ttml();
    let options = ParseOptions::default();
    let engine = LyricsEngine::new();

    c.bench_function("parse_enhanced_lrc", |b| {
        b.iter(|| LrcParser.parse(LyricsSource::from_text(black_box(&lrc)), &options))
    });

    c.bench_function("parse_ttml", |b| {
        b.iter(|| TtmlParser.parse(LyricsSource::from_text(black_box(&ttml)), &options))
    });

    c.bench_function("engine_detect_and_parse_lrc", |b| {
        b.iter(|| engine.parse_str(black_box(&lrc)))
    });
}

criterion_group!(benches, bench_parsers);
criterion_main!(benches);
