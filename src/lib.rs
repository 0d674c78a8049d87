#![warn(missing_docs)]

//! # Lyrics Sync RS
//!
//! 一个同步歌词解析引擎，将两种常见的带时间轴歌词格式解析为统一的、
//! 与格式无关的歌词模型，供播放界面逐行、逐字高亮使用。
//!
//! ## 主要功能
//!
//! - **LRC**: 头部属性、一行多时间戳、对唱前缀、逐字标签与背景人声。
//! - **TTML**: `body → div → p → span` 流式解析，支持时间与角色的逐层继承。
//! - **格式探测**: 按固定优先级依次探测，无需预先知道输入格式。
//! - **行规范化**: 自动推导每一行的结束时间与时长。
//!
//! ## 解析歌词
//!
//! ```rust
//! use lyrics_sync_rs::LyricsEngine;
//!
//! let engine = LyricsEngine::new();
//! let lyrics = engine
//!     .parse_str("[ar:Queen]\n[00:10.00][01:20.00]Chorus text")
//!     .expect("应当解析成功");
//!
//! assert_eq!(lyrics.artist.as_deref(), Some("queen"));
//! assert_eq!(lyrics.lines.len(), 2);
//! assert_eq!(lyrics.lines[0].end, Some(80_000));
//!
//! for line in &lyrics.lines {
//!     println!("{line}");
//! }
//! ```
//!
//! ## 指定格式与歌曲时长
//!
//! ```rust
//! use lyrics_sync_rs::{LyricsEngine, LyricsSource, ParseOptions};
//! use lyrics_sync_rs::converter::types::LyricFormat;
//!
//! let engine = LyricsEngine::with_options(ParseOptions::default().with_track_length(200_000));
//! let ttml = r#"<tt><body><div><p begin="00:00:01.000">Hello</p></div></body></tt>"#;
//!
//! let lyrics = engine
//!     .parse_with_format(LyricsSource::from_text(ttml), LyricFormat::Ttml)
//!     .expect("应当解析成功");
//!
//! assert_eq!(lyrics.lines[0].content, "Hello");
//! assert_eq!(lyrics.lines[0].end, Some(200_000));
//! ```
pub mod config;
pub mod converter;
pub mod error;

use std::path::Path;

use tracing::{debug, error, warn};

pub use crate::{
    config::{ParseOptions, load_parse_options, save_parse_options},
    converter::parsers::{LyricsParser, LyricsSource},
    converter::types::{Line, LyricFormat, Lyrics, Word},
    error::{LyricsSyncError, Result},
};

use crate::converter::{find_parser, parsers_in_order};

// ==========================================================
//  顶层 API
// ==========================================================

/// 顶层歌词解析引擎，按优先级封装了所有格式解析器。
///
/// 这是与本库交互的主要入口点。引擎本身不保存任何跨调用的状态，
/// 可以在多个线程之间共享。
pub struct LyricsEngine {
    parsers: Vec<Box<dyn LyricsParser>>,
    options: ParseOptions,
}

impl Default for LyricsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LyricsEngine {
    /// 使用默认选项创建引擎，探测顺序为 TTML、LRC。
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ParseOptions::default())
    }

    /// 使用给定的解析选项创建引擎，解析器顺序取自 `options.parser_priority`。
    #[must_use]
    pub fn with_options(options: ParseOptions) -> Self {
        let parsers = parsers_in_order(&options.parser_priority);
        Self { parsers, options }
    }

    /// 当前使用的解析选项。
    #[must_use]
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// 按探测顺序返回已注册解析器的名称。
    pub fn parser_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.parsers.iter().map(|parser| parser.name())
    }

    /// 探测内容的歌词格式，不进行完整解析。
    #[must_use]
    pub fn detect_format(&self, content: &str) -> Option<LyricFormat> {
        find_parser(&self.parsers, content).map(|parser| parser.format())
    }

    /// 解析内存中的歌词文本，格式自动探测。
    ///
    /// # 返回
    /// 没有解析器认领该内容，或者认领的解析器解析失败时返回 `None`。
    pub fn parse_str(&self, content: &str) -> Option<Lyrics> {
        let parser = find_parser(&self.parsers, content)?;
        debug!("使用 {} 解析器解析歌词。", parser.name());
        parser.parse(LyricsSource::from_text(content), &self.options)
    }

    /// 解析一个一次性输入源，格式自动探测。
    ///
    /// 输入源只能读取一次，因此会先被完整读入内存，
    /// 随后每次探测与最终解析都使用由这份内容创建的新输入源。
    pub fn parse_source(&self, source: LyricsSource<'_>) -> Option<Lyrics> {
        match source.read_to_string() {
            Ok(content) => self.parse_str(&content),
            Err(e) => {
                error!("读取歌词输入失败: {}", e);
                None
            }
        }
    }

    /// 使用调用方声明的格式解析，不进行探测。
    pub fn parse_with_format(
        &self,
        source: LyricsSource<'_>,
        format: LyricFormat,
    ) -> Option<Lyrics> {
        match self.try_parse_with_format(source, format) {
            Ok(lyrics) => Some(lyrics),
            Err(e) => {
                error!("以 {} 格式解析歌词失败: {}", format, e);
                None
            }
        }
    }

    /// 使用调用方声明的格式解析，失败时返回具体错误，便于诊断。
    ///
    /// # 返回
    /// * `Err(LyricsSyncError::UnsupportedFormat)` - 引擎中没有处理该格式的解析器。
    /// * `Err(LyricsSyncError::Convert)` - 解析器返回的错误。
    pub fn try_parse_with_format(
        &self,
        source: LyricsSource<'_>,
        format: LyricFormat,
    ) -> Result<Lyrics> {
        let parser = self
            .parsers
            .iter()
            .find(|parser| parser.handles_format(format))
            .ok_or_else(|| LyricsSyncError::UnsupportedFormat(format.to_string()))?;

        Ok(parser.try_parse(source, &self.options)?)
    }

    /// 解析一个本地歌词文件。
    ///
    /// 优先根据扩展名（`.lrc`、`.ttml`、`.xml`）确定格式，
    /// 扩展名无法识别时回退到内容探测。
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Option<Lyrics> {
        let path = path.as_ref();
        let source = match LyricsSource::open(path) {
            Ok(source) => source,
            Err(e) => {
                error!("无法打开歌词文件 {}: {}", path.display(), e);
                return None;
            }
        };

        let declared_format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(LyricFormat::from_string)
            .filter(|&format| self.parsers.iter().any(|p| p.handles_format(format)));

        match declared_format {
            Some(format) => {
                debug!("根据扩展名使用 {} 格式解析 {}", format, path.display());
                self.parse_with_format(source, format)
            }
            None => {
                warn!(
                    "无法根据扩展名确定 {} 的格式，将尝试自动探测。",
                    path.display()
                );
                self.parse_source(source)
            }
        }
    }
}
