use lyrics_sync_rs::converter::{
    parsers::{
        LyricsParser, LyricsSource,
        ttml_parser::{TtmlParser, parse_ttml},
    },
    types::{Line, Lyrics},
};
use lyrics_sync_rs::ParseOptions;

use std::path::Path;

fn load_test_data(filename: &str) -> String {
    let path = Path::new("tests/test_data").join(filename);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("读取测试文件 '{:?}' 失败: {}", path, e))
}

fn parse(content: &str) -> Option<Lyrics> {
    TtmlParser.parse(LyricsSource::from_text(content), &ParseOptions::default())
}

fn word_triples(line: &Line) -> Vec<(&str, u64, bool)> {
    line.words
        .iter()
        .map(|w| (w.content.as_str(), w.start_at, w.is_background))
        .collect()
}

#[test_log::test]
fn test_parse_duet_word_timed() {
    let content = load_test_data("duet.ttml");
    let lyrics = parse(&content).expect("TTML 解析失败");

    assert_eq!(lyrics.duration_millis, Some(20_000));
    assert_eq!(lyrics.title, None, "TTML 不提供标题等元数据");
    assert_eq!(lyrics.lines.len(), 3, "缺少 begin 的段落应被丢弃");

    let first = &lyrics.lines[0];
    assert_eq!(first.start_at, 1_000);
    assert_eq!(first.end, Some(4_000));
    assert_eq!(first.duration_millis, Some(3_000));
    assert_eq!(first.actor.as_deref(), Some("v1"));
    assert_eq!(first.content, "Take my hand");
    assert_eq!(
        word_triples(first),
        vec![
            ("Take ", 1_000, false),
            ("my ", 1_600, false),
            ("hand", 2_300, false),
        ]
    );
    assert_eq!(first.words[0].end, Some(1_600));
    assert_eq!(first.words[2].end, Some(3_800));

    let second = &lyrics.lines[1];
    assert_eq!(second.actor.as_deref(), Some("v2"));
    assert!(second.is_opposite_turn());
    assert_eq!(second.content, "Hold on(hold on)");
    assert_eq!(
        word_triples(second),
        vec![
            ("Hold ", 4_500, false),
            ("on", 5_200, false),
            ("(hold ", 6_000, true),
            ("on)", 6_600, true),
        ]
    );
    assert_eq!(second.background_content().as_deref(), Some("(hold on)"));
    assert_eq!(second.words.last().and_then(|w| w.end), Some(8_000));

    let third = &lyrics.lines[2];
    assert_eq!(third.content, "Rock & roll");
    assert_eq!(third.start_at, 9_000);
    assert_eq!(third.duration_millis, Some(2_500));
}

#[test]
fn test_parse_line_timed() {
    let content = load_test_data("line_timed.ttml");
    let lyrics = parse(&content).expect("TTML 解析失败");

    assert_eq!(lyrics.lines.len(), 2);
    assert_eq!(lyrics.lines[0].content, "A line without words");
    assert!(lyrics.lines[0].words.is_empty());
    assert_eq!(lyrics.lines[0].start_at, 10_500);
    assert_eq!(lyrics.lines[0].duration_millis, Some(2_500));

    assert_eq!(lyrics.lines[1].start_at, 14_000);
    assert_eq!(lyrics.lines[1].end, None);
    assert_eq!(lyrics.duration_millis, None);
}

#[test]
fn test_drop_rule_removes_exactly_one_line() {
    let content = load_test_data("duet.ttml");
    let repaired = content.replace(
        r#"<p end="00:00:10.000">"#,
        r#"<p begin="00:00:08.500" end="00:00:10.000">"#,
    );

    let dropped = parse(&content).expect("TTML 解析失败");
    let kept = parse(&repaired).expect("TTML 解析失败");

    assert_eq!(kept.lines.len(), dropped.lines.len() + 1);
    assert!(kept.lines.iter().any(|l| l.content == "No begin here"));
}

#[test_log::test]
fn test_structural_break_is_fatal() {
    let content = load_test_data("broken.ttml");

    assert!(parse(&content).is_none(), "结构错误应导致整个文档解析失败");
    assert!(parse_ttml(LyricsSource::from_text(&content), &ParseOptions::default()).is_err());
}

#[test]
fn test_parsing_is_deterministic() {
    let content = load_test_data("duet.ttml");
    assert_eq!(parse(&content), parse(&content));
}

#[test]
fn test_handles() {
    assert!(TtmlParser.handles(LyricsSource::from_text(&load_test_data("duet.ttml"))));
    assert!(TtmlParser.handles(LyricsSource::from_text(&load_test_data("line_timed.ttml"))));
    assert!(!TtmlParser.handles(LyricsSource::from_text(&load_test_data("simple.lrc"))));
    assert!(!TtmlParser.handles(LyricsSource::from_text(
        "Yesterday, all my troubles seemed so far away.\nNow they're here to stay."
    )));
}

#[test_log::test]
fn test_parse_translations() {
    let content = load_test_data("translated.ttml");
    let lyrics = parse(&content).expect("TTML 解析失败");

    let translations: Vec<Option<&str>> = lyrics
        .lines
        .iter()
        .map(|l| l.translation.as_deref())
        .collect();
    assert_eq!(translations, vec![Some("Guten Morgen"), Some("Gute Nacht"), Some("Schlaf")]);
    assert_eq!(lyrics.lines[2].content, "Sleep");

    let second = &lyrics.lines[1];
    assert_eq!(second.start_at, 5_400);
    assert_eq!(second.duration_millis, Some(3_000), "段落的 dur 在行开始时间后移时保持不变");
}
