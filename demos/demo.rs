//! 用于演示 `lyrics-sync` 库的核心功能。
//!
//! ## 如何运行
//!
//! ```bash
//! cargo run --example demo -- path/to/lyrics.lrc
//! ```
//!
//! 不带参数运行时会解析一段内置的 LRC 示例。

use lyrics_sync_rs::converter::timing::format_timestamp;
use lyrics_sync_rs::{LyricsEngine, load_parse_options};

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const SAMPLE_LRC: &str = "[ti:Demo]\n[ar:Lyrics Sync]\n[length:00:12]\n\
[00:01.00]<00:01.00>Hello <00:01.60>there\n\
[00:04.00][00:09.00]v2: A repeated chorus\n\
[00:06.50]<00:06.50>Lead <00:07.00>vocal[bg:<00:06.80>(echo)]\n";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let options = load_parse_options().unwrap_or_else(|e| {
        warn!("加载解析选项失败，将使用默认选项: {}", e);
        Default::default()
    });
    let engine = LyricsEngine::with_options(options);

    let lyrics = match std::env::args().nth(1) {
        Some(path) => {
            info!("正在解析文件: {}", path);
            engine.parse_file(&path)
        }
        None => {
            info!("未指定文件，解析内置示例。");
            engine.parse_str(SAMPLE_LRC)
        }
    };

    let Some(lyrics) = lyrics else {
        error!("未能解析出任何同步歌词。");
        return;
    };

    info!(
        "标题: {} | 艺术家: {} | 时长: {}",
        lyrics.title.as_deref().unwrap_or("未知"),
        lyrics.artist.as_deref().unwrap_or("未知"),
        format_timestamp(lyrics.optimal_duration_millis())
    );

    for line in &lyrics.lines {
        let end = line.end.map_or_else(|| "--:--.--".to_string(), format_timestamp);
        let actor = line.actor.as_deref().unwrap_or("-");
        println!("{line}  (至 {end}, 演唱者 {actor})");

        for word in &line.words {
            println!(
                "    {} {:?}{}",
                format_timestamp(word.start_at),
                word.content,
                if word.is_background { " [背景]" } else { "" }
            );
        }
    }
}
