use lyrics_sync_rs::converter::{
    parsers::{
        LyricsParser, LyricsSource,
        lrc_parser::{LrcParser, parse_lrc},
    },
    types::Lyrics,
};
use lyrics_sync_rs::ParseOptions;

use std::path::Path;

fn load_test_data(filename: &str) -> String {
    let path = Path::new("tests/test_data").join(filename);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("读取测试文件 '{:?}' 失败: {}", path, e))
}

fn parse(content: &str) -> Lyrics {
    parse_lrc(LyricsSource::from_text(content), &ParseOptions::default())
        .expect("LRC 解析失败")
}

fn line_summary(lyrics: &Lyrics) -> Vec<(u64, Option<u64>, &str)> {
    lyrics
        .lines
        .iter()
        .map(|l| (l.start_at, l.end, l.content.as_str()))
        .collect()
}

#[test_log::test]
fn test_parse_simple_lrc() {
    let content = load_test_data("simple.lrc");
    let lyrics = parse(&content);

    assert_eq!(lyrics.title.as_deref(), Some("fixture song"));
    assert_eq!(lyrics.artist.as_deref(), Some("the test band"));
    assert_eq!(lyrics.album.as_deref(), Some("integration"));
    assert_eq!(lyrics.duration_millis, Some(90_000));

    assert_eq!(
        line_summary(&lyrics),
        vec![
            (5_000, Some(10_000), "First line"),
            (10_000, Some(20_000), "Chorus line"),
            (20_000, Some(30_000), "Second singer"),
            (30_000, Some(40_000), ""),
            (40_000, Some(90_000), "Chorus line"),
        ],
        "格式错误的行应被跳过，其余行按开始时间排序"
    );

    assert_eq!(lyrics.lines[2].actor.as_deref(), Some("v2"));
    assert_eq!(lyrics.lines[2].raw_content, "[00:20.00]v2: Second singer");
    assert_eq!(lyrics.lines[0].duration_millis, Some(5_000));
}

#[test_log::test]
fn test_parse_enhanced_lrc() {
    let content = load_test_data("enhanced.lrc");
    let lyrics = parse(&content);

    assert_eq!(lyrics.lines.len(), 3);

    let first = &lyrics.lines[0];
    assert_eq!(first.start_at, 1_000);
    assert_eq!(first.content, "Hello bright world");
    let first_words: Vec<(&str, u64, Option<u64>)> = first
        .words
        .iter()
        .map(|w| (w.content.as_str(), w.start_at, w.end))
        .collect();
    assert_eq!(
        first_words,
        vec![
            ("Hello ", 1_000, Some(1_500)),
            ("bright ", 1_500, Some(2_000)),
            ("world", 2_000, Some(2_800)),
        ]
    );

    let duet = &lyrics.lines[1];
    assert_eq!(duet.actor.as_deref(), Some("v2"));
    assert_eq!(duet.start_at, 3_000);
    assert_eq!(duet.content, "Ooh yeah(echo)");
    assert_eq!(duet.main_words().count(), 2);
    assert_eq!(duet.background_content().as_deref(), Some("(echo)"));
    assert_eq!(duet.words.last().and_then(|w| w.end), Some(5_000));

    let last = &lyrics.lines[2];
    assert_eq!(last.end, None, "没有 length 且没有外部时长时最后一行的结束时间未知");
    assert_eq!(last.duration_millis, None);
}

#[test]
fn test_word_invariant_holds_for_every_line() {
    let content = load_test_data("enhanced.lrc");
    let lyrics = parse(&content);

    for line in lyrics.lines.iter().filter(|l| l.is_word_by_word()) {
        let min_start = line.words.iter().map(|w| w.start_at).min();
        assert_eq!(Some(line.start_at), min_start);

        let joined: String = line.words.iter().map(|w| w.content.as_str()).collect();
        assert_eq!(line.content, joined.trim());
    }
}

#[test]
fn test_parsing_is_deterministic() {
    let content = load_test_data("simple.lrc");
    assert_eq!(parse(&content), parse(&content));
}

#[test]
fn test_fallback_track_length() {
    let content = load_test_data("enhanced.lrc");
    let options = ParseOptions::default().with_track_length(8_000);
    let lyrics = LrcParser
        .parse(LyricsSource::from_text(&content), &options)
        .expect("LRC 解析失败");

    assert_eq!(lyrics.duration_millis, Some(8_000));
    assert_eq!(lyrics.lines[2].end, Some(8_000));
    assert_eq!(lyrics.lines[2].words[1].end, Some(8_000));
}

#[test]
fn test_parse_from_file_reader() {
    let source = LyricsSource::open("tests/test_data/simple.lrc").expect("打开测试文件失败");
    let lyrics = LrcParser
        .parse(source, &ParseOptions::default())
        .expect("LRC 解析失败");

    assert_eq!(lyrics.lines.len(), 5);
}

#[test]
fn test_handles() {
    assert!(LrcParser.handles(LyricsSource::from_text(&load_test_data("simple.lrc"))));
    assert!(LrcParser.handles(LyricsSource::from_text(&load_test_data("enhanced.lrc"))));
    assert!(!LrcParser.handles(LyricsSource::from_text(&load_test_data("duet.ttml"))));
    assert!(!LrcParser.handles(LyricsSource::from_text(
        "Yesterday, all my troubles seemed so far away.\nNow they're here to stay."
    )));
}

#[test]
fn test_same_timestamp_lines_become_translations() {
    let content = load_test_data("translated.lrc");
    let lyrics = parse(&content);

    let summary: Vec<(u64, &str, Option<&str>)> = lyrics
        .lines
        .iter()
        .map(|l| (l.start_at, l.content.as_str(), l.translation.as_deref()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (2_000, "Good morning", Some("早上好")),
            (6_000, "Sing it again", Some("再唱一遍")),
            (10_000, "No translation here", None),
            (12_000, "Different time", None),
            (16_000, "Sing it again", Some("再唱一遍")),
        ]
    );
    assert_eq!(lyrics.lines[0].words.len(), 2);
    assert_eq!(lyrics.lines[0].end, Some(6_000));
}
