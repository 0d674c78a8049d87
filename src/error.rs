//! 定义了整个 `lyrics-sync` 库的错误类型 `LyricsSyncError`。

use std::io;
use thiserror::Error;

use crate::converter::types::ConvertError;

/// `lyrics-sync` 库的通用错误枚举。
///
/// 解析器本身从不向外抛出错误；这些错误只出现在文件读取、
/// 配置读写以及显式指定格式却无法处理等库层面的操作中。
#[derive(Error, Debug)]
pub enum LyricsSyncError {
    /// I/O 错误 (源自 `io::Error`)
    #[error("I/O 错误: {0}")]
    Io(#[from] io::Error),

    /// JSON 解析失败 (源自 `serde_json::Error`)
    #[error("JSON 解析失败: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// 歌词解析失败
    #[error("歌词解析失败: {0}")]
    Convert(#[from] ConvertError),

    /// 没有可以处理指定格式的解析器
    #[error("没有可处理格式 '{0}' 的解析器")]
    UnsupportedFormat(String),

    /// 无法定位用户配置目录
    #[error("无法找到用户配置目录")]
    ConfigDirNotFound,
}

/// `LyricsSyncError` 的 `Result` 类型别名，方便在函数签名中使用。
pub type Result<T> = std::result::Result<T, LyricsSyncError>;
