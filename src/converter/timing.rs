//! # 时间戳解析
//!
//! LRC 与 TTML 共用的时间戳工具。支持的格式：
//!
//! - `SS`、`SS.mmm`
//! - `MM:SS`、`MM:SS.xx`
//! - `HH:MM:SS.mmm`
//! - TTML 的偏移时间 `12.345s`
//!
//! 小数部分按毫秒读取：不足三位时右侧补零，超过三位时截断。
//! 秒与分钟字段允许大于 59，例如 `00:60.50` 即 60.5 秒。

use crate::converter::types::ConvertError;

/// 解析时间戳字符串到毫秒。
///
/// # 参数
/// * `time_str` - 时间戳字符串，例如 `"03:45.67"` 或 `"01:02:03.500"`。
///
/// # 返回
/// * `Ok(u64)` - 总毫秒数。
/// * `Err(ConvertError::InvalidTime)` - 格式无效或出现负数。
pub fn parse_timestamp(time_str: &str) -> Result<u64, ConvertError> {
    let trimmed = time_str.trim();
    if trimmed.is_empty() {
        return Err(ConvertError::InvalidTime("时间戳为空".to_string()));
    }
    if trimmed.starts_with('-') {
        return Err(ConvertError::InvalidTime(format!(
            "时间戳不能为负: '{time_str}'"
        )));
    }

    // 格式："12.345s"
    if let Some(stripped) = trimmed.strip_suffix('s') {
        if stripped.contains(':') {
            return Err(ConvertError::InvalidTime(format!(
                "偏移时间 '{time_str}' 中不能包含冒号"
            )));
        }
        let (seconds, milliseconds) = parse_seconds_and_fraction(stripped, time_str)?;
        return Ok(seconds.saturating_mul(1000).saturating_add(milliseconds));
    }

    // 从后往前解析以简化逻辑
    let mut parts_iter = trimmed.split(':').rev();

    let seconds_part = parts_iter
        .next()
        .ok_or_else(|| ConvertError::InvalidTime(format!("时间格式 '{time_str}' 无效或为空")))?;
    let (seconds, milliseconds) = parse_seconds_and_fraction(seconds_part, time_str)?;
    let mut total_ms = seconds.saturating_mul(1000).saturating_add(milliseconds);

    // 秒和分钟不限制在 60 以内，越界的值直接按进位累加
    if let Some(minutes_str) = parts_iter.next() {
        let minutes = parse_unit(minutes_str, "分钟", time_str)?;

        if let Some(hours_str) = parts_iter.next() {
            let hours = parse_unit(hours_str, "小时", time_str)?;
            total_ms = total_ms.saturating_add(hours.saturating_mul(3_600_000));
        }

        total_ms = total_ms.saturating_add(minutes.saturating_mul(60_000));
    }

    if parts_iter.next().is_some() {
        return Err(ConvertError::InvalidTime(format!(
            "时间格式 '{time_str}' 包含过多部分，格式无效。"
        )));
    }

    Ok(total_ms)
}

/// 将毫秒格式化为 `mm:ss.xx`，用于日志与诊断输出。
#[must_use]
pub fn format_timestamp(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let centiseconds = (ms % 1000) / 10;
    format!("{minutes:02}:{seconds:02}.{centiseconds:02}")
}

fn parse_unit(part: &str, unit_name: &str, original: &str) -> Result<u64, ConvertError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConvertError::InvalidTime(format!(
            "在 '{original}' 中解析{unit_name} '{part}' 失败"
        )));
    }
    Ok(part.parse::<u64>()?)
}

/// 解析 "SS.mmm" 或 "SS" 格式的字符串，返回秒和毫秒。
fn parse_seconds_and_fraction(part: &str, original: &str) -> Result<(u64, u64), ConvertError> {
    let (seconds_str, fraction_str) = match part.split_once('.') {
        Some((s, f)) => (s, Some(f)),
        None => (part, None),
    };

    let seconds = parse_unit(seconds_str, "秒", original)?;

    let milliseconds = match fraction_str {
        None => 0,
        Some(f) if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) => {
            return Err(ConvertError::InvalidTime(format!(
                "毫秒部分 '{f}' 在时间戳 '{original}' 中无效"
            )));
        }
        Some(f) => {
            let mut digits: String = f.chars().take(3).collect();
            while digits.len() < 3 {
                digits.push('0');
            }
            digits.parse::<u64>()?
        }
    };

    Ok((seconds, milliseconds))
}
