//! 负责处理解析选项的持久化配置。

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::info;

use crate::converter::types::LyricFormat;
use crate::error::{LyricsSyncError, Result};

const PARSE_OPTIONS_FILE: &str = "parse_options.json";

/// 解析歌词时使用的选项。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ParseOptions {
    /// 外部提供的歌曲总时长（毫秒）。
    ///
    /// 当文件本身没有声明时长时，用于确定最后一行的结束时间。
    pub track_length_ms: Option<u64>,
    /// 是否应用 LRC 文件中的 `[offset:]` 标签。
    pub apply_lrc_offset: bool,
    /// 自动探测格式时，依次尝试的解析器顺序。
    pub parser_priority: Vec<LyricFormat>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            track_length_ms: None,
            apply_lrc_offset: false,
            parser_priority: vec![LyricFormat::Ttml, LyricFormat::Lrc],
        }
    }
}

impl ParseOptions {
    /// 返回带有外部歌曲时长的选项副本。
    #[must_use]
    pub fn with_track_length(mut self, track_length_ms: u64) -> Self {
        self.track_length_ms = Some(track_length_ms);
        self
    }
}

/// 获取应用配置目录下指定文件的完整路径。
///
/// # 参数
/// * `filename` - 目标配置文件的名称，例如 "parse_options.json"。
pub(crate) fn get_config_file_path(filename: &str) -> Result<PathBuf> {
    let mut config_dir = dirs::config_dir().ok_or(LyricsSyncError::ConfigDirNotFound)?;
    config_dir.push("lyrics-sync");
    fs::create_dir_all(&config_dir)?;
    config_dir.push(filename);
    Ok(config_dir)
}

/// 从配置目录加载解析选项。
///
/// 配置文件不存在时返回默认选项。
pub fn load_parse_options() -> Result<ParseOptions> {
    let config_path = get_config_file_path(PARSE_OPTIONS_FILE)?;

    match fs::read_to_string(&config_path) {
        Ok(content) => {
            let options: ParseOptions = serde_json::from_str(&content)?;
            info!("已从 {} 加载解析选项。", config_path.display());
            Ok(options)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("解析选项配置文件不存在，将使用默认选项。");
            Ok(ParseOptions::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// 将解析选项序列化为 JSON 并保存到配置目录。
pub fn save_parse_options(options: &ParseOptions) -> Result<()> {
    let config_path = get_config_file_path(PARSE_OPTIONS_FILE)?;
    let content = serde_json::to_string_pretty(options)?;
    fs::write(config_path, content)?;
    info!("解析选项已保存。");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_priority_prefers_ttml() {
        let options = ParseOptions::default();
        assert_eq!(
            options.parser_priority,
            vec![LyricFormat::Ttml, LyricFormat::Lrc]
        );
        assert!(!options.apply_lrc_offset);
        assert_eq!(options.track_length_ms, None);
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let options: ParseOptions = serde_json::from_str(r#"{"track_length_ms": 1000}"#).unwrap();
        assert_eq!(options.track_length_ms, Some(1000));
        assert_eq!(options.parser_priority, ParseOptions::default().parser_priority);
    }

    #[test]
    fn test_options_round_trip_through_json() {
        let options = ParseOptions {
            apply_lrc_offset: true,
            parser_priority: vec![LyricFormat::Lrc],
            ..ParseOptions::default().with_track_length(215_000)
        };
        let json = serde_json::to_string(&options).unwrap();
        let restored: ParseOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, options);
    }
}
