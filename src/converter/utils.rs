//! 包含行规范化等工具函数的模块。

use tracing::debug;

use crate::converter::types::Line;

/// 行规范化：为缺少结束时间的歌词行推导结束时间与时长。
///
/// 处理规则：
/// 1. 按 `start_at` 稳定排序，开始时间相同的行保持原有的文档顺序。
/// 2. 已经带有结束时间的行（例如 TTML 中声明了 `end`/`dur` 的段落）保持不变。
/// 3. 其余行的结束时间取下一个开始时间**严格更晚**的行的开始时间，
///    因此开始时间相同的行共享同一个区间；最后一组行使用 `total_duration`
///    （若已知且不早于行开始时间），否则保持未知。
/// 4. 每行最后一个没有结束时间的词继承该行的结束时间。
///
/// # 参数
/// * `lines` - 解析器收集到的歌词行。
/// * `total_duration` - 歌曲总时长（毫秒），`None` 表示未知。
pub fn adjust_lines(lines: &mut [Line], total_duration: Option<u64>) {
    lines.sort_by_key(|line| line.start_at);

    // 从后往前计算每一行之后第一个严格更晚的开始时间
    let mut next_starts: Vec<Option<u64>> = vec![None; lines.len()];
    for i in (0..lines.len().saturating_sub(1)).rev() {
        next_starts[i] = if lines[i + 1].start_at > lines[i].start_at {
            Some(lines[i + 1].start_at)
        } else {
            next_starts[i + 1]
        };
    }

    for (i, next_start) in next_starts.into_iter().enumerate() {
        let start_at = lines[i].start_at;

        if lines[i].end.is_none() {
            lines[i].end = match next_start {
                Some(next) => Some(next),
                None => total_duration.filter(|&total| total >= start_at),
            };

            if lines[i].end.is_none() {
                debug!(
                    "第 {} 行 ({}ms) 是最后一行且总时长未知，结束时间保持未知。",
                    i + 1,
                    start_at
                );
            }
        }

        let line = &mut lines[i];
        let line_end = line.end;
        line.duration_millis = line_end.map(|end| end.saturating_sub(start_at));

        if let Some(last_word) = line.words.last_mut()
            && last_word.end.is_none()
        {
            let word_start = last_word.start_at;
            last_word.end = line_end.filter(|&end| end >= word_start);
        }
    }
}

/// 辅助函数，用于安全地将偏移量应用到 u64 时间戳上
fn offset_timestamp(timestamp: u64, offset: i64) -> u64 {
    timestamp.saturating_add_signed(offset)
}

/// 对歌词行应用一个时间偏移。
///
/// 此函数会就地修改传入的行，调整其中所有的时间戳，结果不会小于 0。
///
/// # 参数
/// * `lines` - 一个可变的 `Line` 切片。
/// * `offset_ms` - 要应用的偏移量（毫秒）。正数表示延迟歌词，负数表示提前歌词。
pub fn apply_offset(lines: &mut [Line], offset_ms: i64) {
    if offset_ms == 0 {
        return;
    }

    for line in lines.iter_mut() {
        let start_at = offset_timestamp(line.start_at, offset_ms);
        line.start_at = start_at;
        line.end = line.end.map(|end| offset_timestamp(end, offset_ms));
        line.duration_millis = line.end.map(|end| end.saturating_sub(start_at));

        for word in line.words.iter_mut() {
            word.start_at = offset_timestamp(word.start_at, offset_ms);
            word.end = word.end.map(|end| offset_timestamp(end, offset_ms));
        }
    }
}

/// 规范化文本中的空白字符
pub fn normalize_text_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}
