//! 歌词解析核心模块

pub mod parsers;
pub mod timing;
pub mod types;
pub mod utils;

pub use types::{ConvertError, Line, LyricFormat, Lyrics, Word};

use tracing::debug;

use crate::converter::parsers::{
    LyricsParser, LyricsSource, lrc_parser::LrcParser, ttml_parser::TtmlParser,
};

/// 默认的探测顺序。TTML 的探测条件更严格，因此排在前面。
pub const DEFAULT_PRIORITY: [LyricFormat; 2] = [LyricFormat::Ttml, LyricFormat::Lrc];

/// 返回处理指定格式的解析器。
#[must_use]
pub fn parser_for(format: LyricFormat) -> Box<dyn LyricsParser> {
    match format {
        LyricFormat::Lrc => Box::new(LrcParser),
        LyricFormat::Ttml => Box::new(TtmlParser),
    }
}

/// 按给定顺序创建解析器列表，重复的格式只保留第一次出现。
///
/// 顺序为空时回退到 [`DEFAULT_PRIORITY`]。
#[must_use]
pub fn parsers_in_order(priority: &[LyricFormat]) -> Vec<Box<dyn LyricsParser>> {
    let priority = if priority.is_empty() {
        &DEFAULT_PRIORITY[..]
    } else {
        priority
    };

    let mut formats: Vec<LyricFormat> = Vec::with_capacity(priority.len());
    for &format in priority {
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    formats.into_iter().map(parser_for).collect()
}

/// 依次用每个解析器探测内容，返回第一个认领它的解析器。
///
/// 每次探测都使用一个新的输入源。
pub fn find_parser<'p>(
    parsers: &'p [Box<dyn LyricsParser>],
    content: &str,
) -> Option<&'p dyn LyricsParser> {
    let found = parsers
        .iter()
        .map(|parser| &**parser)
        .find(|parser| parser.handles(LyricsSource::from_text(content)));

    match found {
        Some(parser) => debug!("探测到歌词格式: {}", parser.format()),
        None => debug!("没有解析器能识别该内容。"),
    }
    found
}

/// 使用默认顺序探测内容的歌词格式。
#[must_use]
pub fn detect_format(content: &str) -> Option<LyricFormat> {
    find_parser(&parsers_in_order(&DEFAULT_PRIORITY), content).map(|parser| parser.format())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("[00:01.00]Hello"), Some(LyricFormat::Lrc));
        assert_eq!(
            detect_format(r#"<tt><body><div><p begin="1s">Hi</p></div></body></tt>"#),
            Some(LyricFormat::Ttml)
        );
        assert_eq!(detect_format("Once upon a time, there was a song."), None);
    }

    #[test]
    fn test_parsers_in_order_dedups_and_falls_back() {
        let names: Vec<&str> = parsers_in_order(&[LyricFormat::Lrc, LyricFormat::Lrc])
            .iter()
            .map(|p| p.name())
            .collect();
        assert_eq!(names, vec!["lrc"]);

        let defaults: Vec<&str> = parsers_in_order(&[]).iter().map(|p| p.name()).collect();
        assert_eq!(defaults, vec!["ttml", "lrc"]);
    }
}
