//! 歌词解析器模块
//!
//! 该模块定义了所有格式解析器需要实现的通用接口 [`LyricsParser`]，
//! 以及解析器消费的一次性输入源 [`LyricsSource`]。

pub mod lrc_parser;
pub mod ttml_parser;

use std::{
    fmt,
    fs::File,
    io::{self, BufRead, BufReader, Read},
    path::Path,
};

use tracing::error;

use crate::{
    config::ParseOptions,
    converter::types::{ConvertError, LyricFormat, Lyrics},
};

/// 一个只能向前读取、只能使用一次的歌词输入源。
///
/// `handles` 与 `parse` 都按值接收 `LyricsSource`，读取器在调用后即被消费，
/// 因此“探测后再用同一个读取器解析”这种误用会在编译期被拒绝。
/// 需要多次探测时，请为每次调用创建新的输入源。
pub struct LyricsSource<'a> {
    reader: Box<dyn BufRead + Send + 'a>,
}

impl<'a> LyricsSource<'a> {
    /// 从内存中的字符串创建输入源。
    #[must_use]
    pub fn from_text(content: &'a str) -> Self {
        Self {
            reader: Box::new(content.as_bytes()),
        }
    }

    /// 从任意可读取的字节流创建输入源。
    pub fn from_reader<R: Read + Send + 'a>(reader: R) -> Self {
        Self {
            reader: Box::new(BufReader::new(reader)),
        }
    }

    /// 将输入源完整读取为 UTF-8 字符串。
    pub fn read_to_string(mut self) -> io::Result<String> {
        let mut content = String::new();
        self.reader.read_to_string(&mut content)?;
        Ok(content)
    }

    /// 取出底层的缓冲读取器。
    #[must_use]
    pub fn into_reader(self) -> Box<dyn BufRead + Send + 'a> {
        self.reader
    }
}

impl LyricsSource<'static> {
    /// 打开一个本地歌词文件作为输入源。
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(file))
    }
}

impl fmt::Debug for LyricsSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LyricsSource").finish_non_exhaustive()
    }
}

/// 定义了所有歌词格式解析器需要实现的通用接口。
///
/// 解析器本身不保存任何跨调用的状态，可以在多个线程间共享，
/// 前提是每次调用都提供自己的 [`LyricsSource`]。
pub trait LyricsParser: Send + Sync {
    /// 返回解析器的唯一名称，例如 `"lrc"`、`"ttml"`。
    fn name(&self) -> &'static str;

    /// 该解析器处理的歌词格式。
    fn format(&self) -> LyricFormat;

    /// 调用方已经声明了格式（例如来自文件扩展名）时使用的快速判断。
    fn handles_format(&self, format: LyricFormat) -> bool {
        format == self.format()
    }

    /// 廉价、无副作用地探测输入是否可能属于本格式。
    ///
    /// 探测是宽松的：误判会在随后的 `parse` 中自行校验。
    fn handles(&self, source: LyricsSource<'_>) -> bool;

    /// 完整解析，失败时返回具体错误。
    ///
    /// # 参数
    /// * `source` - 一次性输入源。
    /// * `options` - 解析选项，主要提供回退用的歌曲时长。
    fn try_parse(
        &self,
        source: LyricsSource<'_>,
        options: &ParseOptions,
    ) -> Result<Lyrics, ConvertError>;

    /// 完整解析。任何不可恢复的错误都会被记录到日志并转换为 `None`，
    /// 不会向调用方传播。
    fn parse(&self, source: LyricsSource<'_>, options: &ParseOptions) -> Option<Lyrics> {
        match self.try_parse(source, options) {
            Ok(lyrics) => Some(lyrics),
            Err(e) => {
                error!("[{}] 解析歌词失败: {}", self.name(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("设备已断开"))
        }
    }

    #[test]
    fn test_source_from_text_reads_everything() {
        let source = LyricsSource::from_text("[00:01.00]Hi\n");
        assert_eq!(source.read_to_string().unwrap(), "[00:01.00]Hi\n");
    }

    #[test]
    fn test_source_propagates_read_errors() {
        let source = LyricsSource::from_reader(FailingReader);
        assert!(source.read_to_string().is_err());
    }

    #[test]
    fn test_open_missing_file_fails() {
        assert!(LyricsSource::open("/definitely/not/here.lrc").is_err());
    }
}
