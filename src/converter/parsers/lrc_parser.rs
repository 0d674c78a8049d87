//! # LRC 格式解析器
//!
//! 支持标准 LRC 与增强型 LRC：
//!
//! - 头部属性 `[ti:]`、`[ar:]`、`[al:]`、`[length:]`、`[offset:]`、`[by:]`
//! - 一行多个时间戳 `[00:10.00][01:20.00]副歌`
//! - 对唱前缀 `v1:`、`v2:`
//! - 逐字标签 `<mm:ss.xx>词`，以及行尾的背景人声 `[bg:<mm:ss.xx>词]`
//! - 翻译行：紧跟在某行之后、时间标签完全相同的行作为该行的翻译
//!
//! 单行格式错误只会导致该行被跳过，只有读取失败才会让整个解析失败。

use std::collections::{HashMap, HashSet};
use std::{io::BufRead, sync::LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::{
    config::ParseOptions,
    converter::{
        parsers::{LyricsParser, LyricsSource},
        timing::parse_timestamp,
        types::{ConvertError, Line, LyricFormat, Lyrics, Word},
        utils::{adjust_lines, apply_offset},
    },
};

/// 用于匹配一个带时间标签的歌词行，捕获开头的标签组和剩余文本
static LRC_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*((?:\[[^\]]*\])+)(.*)$").expect("未能编译 LRC_LINE_REGEX")
});

/// 用于从标签组中提取出单个时间戳
static LRC_TIME_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d+:\d{2}(?:\.\d+)?)\]").expect("未能编译 LRC_TIME_TAG_REGEX")
});

/// 用于匹配 `v1:` 形式的演唱者前缀
static LRC_ACTOR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(v\d+):\s*(.*)$").expect("未能编译 LRC_ACTOR_REGEX")
});

/// 用于匹配逐字标签及其后的文本
static LRC_WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(\d+:\d{2}(?:\.\d+)?)>([^<]*)").expect("未能编译 LRC_WORD_REGEX")
});

/// 用于匹配行尾的背景人声段
static LRC_BACKGROUND_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[bg:([^\]]*)\]\s*$").expect("未能编译 LRC_BACKGROUND_REGEX")
});

/// 用于匹配受支持的头部属性
static LRC_ATTRIBUTE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\[(offset|ti|ar|al|length|by):(.+)\]\s*$")
        .expect("未能编译 LRC_ATTRIBUTE_REGEX")
});

/// LRC 格式解析器。
#[derive(Debug, Default, Clone, Copy)]
pub struct LrcParser;

impl LyricsParser for LrcParser {
    fn name(&self) -> &'static str {
        "lrc"
    }

    fn format(&self) -> LyricFormat {
        LyricFormat::Lrc
    }

    fn handles(&self, source: LyricsSource<'_>) -> bool {
        is_lrc(source)
    }

    fn try_parse(
        &self,
        source: LyricsSource<'_>,
        options: &ParseOptions,
    ) -> Result<Lyrics, ConvertError> {
        parse_lrc(source, options)
    }
}

/// 探测输入是否为 LRC。
///
/// 只要存在一行非属性行，同时带有开头的时间标签和非空文本，即认为是 LRC。
/// 读取出错时视为不匹配。
pub fn is_lrc(source: LyricsSource<'_>) -> bool {
    source
        .into_reader()
        .lines()
        .map_while(Result::ok)
        .any(|line| is_timed_text_line(&line))
}

fn is_timed_text_line(line: &str) -> bool {
    let line = strip_bom(line).trim();
    if line.is_empty() || LRC_ATTRIBUTE_REGEX.is_match(line) {
        return false;
    }

    LRC_LINE_REGEX.captures(line).is_some_and(|caps| {
        let has_time = caps
            .get(1)
            .is_some_and(|tags| LRC_TIME_TAG_REGEX.is_match(tags.as_str()));
        let has_text = caps
            .get(2)
            .is_some_and(|text| !text.as_str().trim().is_empty());
        has_time && has_text
    })
}

/// 解析 LRC 格式内容到 `Lyrics` 结构。
///
/// # 参数
/// * `source` - 一次性输入源。
/// * `options` - 解析选项。`[length:]` 缺失时使用 `track_length_ms` 作为总时长。
///
/// # 返回
/// * `Err(ConvertError::Io)` - 读取失败（包括非 UTF-8 内容），此时不会返回部分结果。
pub fn parse_lrc(
    source: LyricsSource<'_>,
    options: &ParseOptions,
) -> Result<Lyrics, ConvertError> {
    let mut attributes: HashMap<String, String> = HashMap::new();
    let mut entries: Vec<TimedEntry> = Vec::new();

    for (line_num_zero_based, line_result) in source.into_reader().lines().enumerate() {
        let raw_line = line_result?;
        let line_num = line_num_zero_based + 1;
        let line_str = strip_bom(&raw_line);

        if line_str.trim().is_empty() {
            continue;
        }

        if let Some(attr_caps) = LRC_ATTRIBUTE_REGEX.captures(line_str) {
            let key = attr_caps[1].trim().to_lowercase();
            let value = attr_caps[2].trim().to_lowercase();
            if value.is_empty() {
                debug!("[LRC] 第 {line_num} 行的属性 '{key}' 值为空，已忽略。");
            } else {
                attributes.insert(key, value);
            }
            continue;
        }

        let Some(entry) = parse_timed_line(line_str, line_num) else {
            continue;
        };
        match entries.last_mut() {
            Some(previous) if previous.accepts_translation(&entry) => {
                debug!("[LRC] 第 {line_num} 行作为上一行的翻译。");
                previous.translation = Some(entry.content);
            }
            _ => entries.push(entry),
        }
    }

    let mut lines: Vec<Line> = entries.into_iter().flat_map(TimedEntry::into_lines).collect();

    let length = attributes
        .get("length")
        .and_then(|value| match parse_timestamp(value) {
            Ok(ms) => Some(ms),
            Err(e) => {
                warn!("[LRC] 无法解析 length 属性 '{value}': {e}");
                None
            }
        });
    let total_duration = length.or(options.track_length_ms);

    if options.apply_lrc_offset
        && let Some(offset) = attributes.get("offset")
    {
        match offset.parse::<i64>() {
            // 正的 offset 表示歌词提前出现
            Ok(offset_ms) => apply_offset(&mut lines, offset_ms.saturating_neg()),
            Err(_) => warn!("[LRC] 无法解析 offset 属性 '{offset}'，已忽略。"),
        }
    }

    adjust_lines(&mut lines, total_duration);

    debug!("[LRC] 解析完成，共 {} 行。", lines.len());

    Ok(Lyrics {
        title: attributes.remove("ti"),
        artist: attributes.remove("ar"),
        album: attributes.remove("al"),
        duration_millis: total_duration,
        lines,
    })
}

fn strip_bom(line: &str) -> &str {
    line.strip_prefix('\u{feff}').unwrap_or(line)
}

/// 一行源文本解析出的歌词，尚未按开头的时间标签展开。
#[derive(Debug)]
struct TimedEntry {
    /// 有效的开头时间标签：毫秒值与标签原文。
    tags: Vec<(u64, String)>,
    source: String,
    remainder: String,
    content: String,
    words: Vec<Word>,
    actor: Option<String>,
    translation: Option<String>,
}

impl TimedEntry {
    /// 下一行与本行的时间标签完全相同且两行都有文本时，下一行是本行的翻译。
    fn accepts_translation(&self, next: &TimedEntry) -> bool {
        self.translation.is_none()
            && !self.content.is_empty()
            && !next.content.is_empty()
            && self
                .tags
                .iter()
                .map(|(ms, _)| ms)
                .eq(next.tags.iter().map(|(ms, _)| ms))
    }

    /// 每个不同的开始时间产生一个 `Line`，它们共享文本、逐字数据、演唱者与翻译。
    ///
    /// 展开为多行时，每行的 `raw_content` 只包含它自己的时间标签和行文本。
    fn into_lines(self) -> Vec<Line> {
        let words_start = self.words.iter().map(|w| w.start_at).min();
        let fan_out = self.tags.len() > 1;

        let mut seen_starts = HashSet::new();
        let mut lines = Vec::new();
        for (tag_ms, tag) in &self.tags {
            let start_at = words_start.unwrap_or(*tag_ms);
            if !seen_starts.insert(start_at) {
                continue;
            }

            let raw_content = if fan_out {
                format!("{tag}{}", self.remainder)
            } else {
                self.source.clone()
            };
            lines.push(Line {
                start_at,
                content: self.content.clone(),
                raw_content,
                words: self.words.clone(),
                actor: self.actor.clone(),
                translation: self.translation.clone(),
                ..Default::default()
            });
        }
        lines
    }
}

/// 解析一个带时间标签的行。没有任何有效的开头时间标签时返回 `None`。
fn parse_timed_line(line_str: &str, line_num: usize) -> Option<TimedEntry> {
    let Some(line_caps) = LRC_LINE_REGEX.captures(line_str) else {
        debug!("[LRC] 第 {line_num} 行无法识别，已跳过: '{line_str}'");
        return None;
    };

    let all_tags = line_caps.get(1).map_or("", |m| m.as_str());
    let remainder = line_caps.get(2).map_or("", |m| m.as_str());

    let tags: Vec<(u64, String)> = LRC_TIME_TAG_REGEX
        .captures_iter(all_tags)
        .filter_map(|ts_caps| {
            let time_str = ts_caps.get(1)?.as_str();
            match parse_timestamp(time_str) {
                Ok(ms) => Some((ms, ts_caps.get(0)?.as_str().to_string())),
                Err(e) => {
                    debug!("[LRC] 第 {line_num} 行的时间标签无效: {e}");
                    None
                }
            }
        })
        .collect();

    if tags.is_empty() {
        debug!("[LRC] 第 {line_num} 行没有有效的时间标签，已跳过: '{line_str}'");
        return None;
    }

    let (main_text, background_text) = split_background(remainder);
    let main_text = main_text.trim();
    let (actor, text) = match LRC_ACTOR_REGEX.captures(main_text) {
        Some(actor_caps) => (
            actor_caps.get(1).map(|m| m.as_str().to_string()),
            actor_caps.get(2).map_or("", |m| m.as_str()),
        ),
        None => (None, main_text),
    };

    let mut words = parse_words(text, false);
    if let Some(background) = background_text {
        words.extend(parse_words(background, true));
    }

    let content = if words.is_empty() {
        text.trim().to_string()
    } else {
        let joined: String = words.iter().map(|w| w.content.as_str()).collect();
        joined.trim().to_string()
    };

    Some(TimedEntry {
        tags,
        source: line_str.to_string(),
        remainder: remainder.to_string(),
        content,
        words,
        actor,
        translation: None,
    })
}

/// 拆分出行尾的背景人声段。只有其中包含逐字标签时才视为背景人声。
fn split_background(remainder: &str) -> (&str, Option<&str>) {
    if let Some(bg_caps) = LRC_BACKGROUND_REGEX.captures(remainder)
        && let (Some(whole), Some(inner)) = (bg_caps.get(0), bg_caps.get(1))
        && LRC_WORD_REGEX.is_match(inner.as_str())
    {
        return (&remainder[..whole.start()], Some(inner.as_str()));
    }
    (remainder, None)
}

/// 从文本中提取逐字数据。
///
/// 文本为空的标签是前一个词的结束时间；只含空白的标签把空白追加到前一个词。
/// 结果按开始时间排序，没有结束时间的词以下一个词的开始时间作为结束。
fn parse_words(text: &str, is_background: bool) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();

    for word_caps in LRC_WORD_REGEX.captures_iter(text) {
        let Some(time_match) = word_caps.get(1) else {
            continue;
        };
        let start_at = match parse_timestamp(time_match.as_str()) {
            Ok(ms) => ms,
            Err(e) => {
                debug!("[LRC] 逐字标签无效，已跳过: {e}");
                continue;
            }
        };
        let content = word_caps.get(2).map_or("", |m| m.as_str());

        if !content.trim().is_empty() {
            words.push(Word {
                content: content.to_string(),
                start_at,
                end: None,
                is_background,
            });
            continue;
        }

        let Some(previous) = words.last_mut() else {
            continue;
        };
        if content.is_empty() {
            previous.end.get_or_insert(start_at);
        } else {
            previous.content.push_str(content);
        }
    }

    words.sort_by_key(|w| w.start_at);

    let next_starts: Vec<u64> = words.iter().skip(1).map(|w| w.start_at).collect();
    for (word, next_start) in words.iter_mut().zip(next_starts) {
        word.end.get_or_insert(next_start);
    }

    words
}
