//! 定义了歌词解析中使用的核心数据类型。

use std::{fmt, io};

use quick_xml::{
    Error as QuickXmlErrorMain, encoding::EncodingError,
    events::attributes::AttrError as QuickXmlAttrError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::converter::timing::format_timestamp;

//=============================================================================
// 1. 错误枚举
//=============================================================================

/// 定义歌词解析过程中可能发生的各种错误。
///
/// 这些错误只在解析器内部流转，`LyricsParser::parse` 会在边界处把它们
/// 记录到日志并转换为 `None`。
#[derive(Error, Debug)]
pub enum ConvertError {
    /// XML 读取错误，通常来自 `quick-xml` 库。
    #[error("解析 XML 错误: {0}")]
    Xml(#[from] QuickXmlErrorMain),
    /// XML 属性解析错误，通常来自 `quick-xml` 库。
    #[error("XML 属性错误: {0}")]
    Attribute(#[from] QuickXmlAttrError),
    /// XML 文本编码或解码错误。
    #[error("文本编码或解码错误: {0}")]
    Encoding(#[from] EncodingError),
    /// 整数解析错误。
    #[error("解析错误: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
    /// 无效的时间格式字符串。
    #[error("无效的时间格式: {0}")]
    InvalidTime(String),
    /// 读取输入源时发生的 IO 错误。
    #[error("IO 错误: {0}")]
    Io(#[from] io::Error),
    /// 文档结构不符合预期的歌词格式。
    #[error("无效的歌词格式: {0}")]
    InvalidLyricFormat(String),
    /// 内部逻辑错误或未明确分类的错误。
    #[error("错误: {0}")]
    Internal(String),
}

//=============================================================================
// 2. 歌词格式枚举
//=============================================================================

/// 枚举：表示支持的歌词格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LyricFormat {
    /// 标准 LRC (`LyRiCs`) 格式，可带逐字 `<mm:ss.xx>` 标签。
    #[default]
    Lrc,
    /// `Timed Text Markup Language` 格式。
    Ttml,
}

impl LyricFormat {
    /// 将歌词格式枚举转换为对应的文件扩展名字符串。
    #[must_use]
    pub fn to_extension_str(self) -> &'static str {
        match self {
            LyricFormat::Lrc => "lrc",
            LyricFormat::Ttml => "ttml",
        }
    }

    /// 从字符串（通常是文件扩展名或用户输入）解析歌词格式枚举。
    /// 此方法不区分大小写，并会移除输入字符串中的空格和点。
    pub fn from_string(s: &str) -> Option<Self> {
        let normalized_s = s.to_uppercase().replace([' ', '.'], "");
        match normalized_s.as_str() {
            "LRC" | "ENHANCEDLRC" | "ELRC" => Some(LyricFormat::Lrc),
            "TTML" | "XML" => Some(LyricFormat::Ttml),
            _ => {
                warn!("[LyricFormat] 未知的格式字符串: {}", s);
                None
            }
        }
    }
}

impl fmt::Display for LyricFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LyricFormat::Lrc => write!(f, "LRC"),
            LyricFormat::Ttml => write!(f, "TTML"),
        }
    }
}

//=============================================================================
// 3. 歌词内部表示结构
//=============================================================================

/// 一次解析的最终结果：与具体格式无关、带时间轴的歌词。
///
/// 只有在解析没有发生致命错误时才会构造。`lines` 可以为空，
/// 表示“没有同步内容”。经过行规范化后，`lines` 按 `start_at` 升序排列。
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lyrics {
    /// 歌曲标题。
    pub title: Option<String>,
    /// 艺术家。
    pub artist: Option<String>,
    /// 专辑名。
    pub album: Option<String>,
    /// 歌曲总时长（毫秒），`None` 表示未知。
    pub duration_millis: Option<u64>,
    /// 歌词行列表。
    pub lines: Vec<Line>,
}

impl Lyrics {
    /// 是否包含任何歌词行。
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.lines.is_empty()
    }

    /// 所有行的显示文本，以换行符连接。
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 所有行的原始文本，以换行符连接。
    #[must_use]
    pub fn raw_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.raw_content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 用于播放界面的时长：优先使用声明的总时长，其次是最后结束的行。
    #[must_use]
    pub fn optimal_duration_millis(&self) -> u64 {
        self.duration_millis
            .or_else(|| self.lines.iter().filter_map(|line| line.end).max())
            .unwrap_or(0)
    }

    /// 查找在给定播放位置处于激活状态的行。
    ///
    /// 行的激活区间为 `[start_at, end)`；结束时间未知的行从开始时间起一直有效，
    /// 直到被后面的行取代。若多行同时激活，返回最后开始的那一行。
    #[must_use]
    pub fn line_at(&self, position_ms: u64) -> Option<&Line> {
        self.lines
            .iter()
            .filter(|line| line.start_at <= position_ms)
            .filter(|line| line.end.is_none_or(|end| position_ms < end))
            .next_back()
    }
}

/// 一行带时间的歌词。
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// 行的开始时间（毫秒）。
    pub start_at: u64,
    /// 行的结束时间（毫秒），由行规范化步骤填充。
    pub end: Option<u64>,
    /// `end - start_at`，结束时间未知时为 `None`。
    pub duration_millis: Option<u64>,
    /// 去除首尾空白后的显示文本。
    ///
    /// 有逐字数据时是所有词文本的拼接，否则是行的原始文本。
    pub content: String,
    /// 该行在源文件中的原始文本，用于诊断。
    pub raw_content: String,
    /// 逐字数据，源行没有逐字时间时为空。
    pub words: Vec<Word>,
    /// 演唱者标识，例如对唱中的 "v1"、"v2"。
    pub actor: Option<String>,
    /// 该行的翻译文本。
    pub translation: Option<String>,
}

impl Line {
    /// 是否为逐字歌词行。
    #[must_use]
    pub fn is_word_by_word(&self) -> bool {
        !self.words.is_empty()
    }

    /// 是否由另一位演唱者（非 "v1"）演唱，用于对唱歌词的左右分布。
    #[must_use]
    pub fn is_opposite_turn(&self) -> bool {
        self.actor
            .as_deref()
            .is_some_and(|actor| !actor.eq_ignore_ascii_case("v1"))
    }

    /// 返回所有主歌词的词。
    pub fn main_words(&self) -> impl Iterator<Item = &Word> {
        self.words.iter().filter(|w| !w.is_background)
    }

    /// 返回所有背景人声的词。
    pub fn background_words(&self) -> impl Iterator<Item = &Word> {
        self.words.iter().filter(|w| w.is_background)
    }

    /// 背景人声部分的文本（如果存在）。
    #[must_use]
    pub fn background_content(&self) -> Option<String> {
        let text = self
            .background_words()
            .map(|w| w.content.as_str())
            .collect::<String>();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", format_timestamp(self.start_at), self.content)
    }
}

/// 一行中带时间的词（或音节）。
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    /// 词的文本，可能带有用于还原词间空格的尾随空白。
    pub content: String,
    /// 词的开始时间（毫秒）。
    pub start_at: u64,
    /// 词的结束时间（毫秒），只有在能推断出来时才存在。
    pub end: Option<u64>,
    /// 是否为背景人声。
    pub is_background: bool,
}

impl Word {
    /// 创建一个只有开始时间的主歌词词。
    #[must_use]
    pub fn new(content: impl Into<String>, start_at: u64) -> Self {
        Self {
            content: content.into(),
            start_at,
            ..Default::default()
        }
    }
}
