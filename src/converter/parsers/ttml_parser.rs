//! # TTML (Timed Text Markup Language) 解析器
//!
//! 以递归下降的方式流式遍历 `tt → body → div → p → span*`，不构建完整的文档树。
//!
//! - `p` 的 `begin` 是必需的，无法解析时整段被丢弃；
//! - `span` 未声明 `begin` 或 `ttm:role` 时，从最近的祖先继承；
//! - 角色中带有 `bg` 的 span 被标记为背景人声；
//! - 翻译来自 `<head>` 中第一个 `<translation>` 块（通过 `itunes:key` 关联），
//!   或段落内 `ttm:role="x-translation"` 的 span；
//! - 任何 XML 结构错误都会使整个文档解析失败。
//!
//! `div` 与 `span` 的嵌套深度限制为 [`MAX_NESTING_DEPTH`] 层，超出时整个文档解析失败。

use std::{collections::HashMap, io::BufRead, str};

use quick_xml::{
    Reader,
    events::{BytesRef, BytesStart, Event},
};
use tracing::{debug, warn};

use crate::{
    config::ParseOptions,
    converter::{
        parsers::{LyricsParser, LyricsSource},
        timing::parse_timestamp,
        types::{ConvertError, Line, LyricFormat, Lyrics, Word},
        utils::{adjust_lines, normalize_text_whitespace},
    },
};

const TAG_TT: &[u8] = b"tt";
const TAG_BODY: &[u8] = b"body";
const TAG_DIV: &[u8] = b"div";
const TAG_P: &[u8] = b"p";
const TAG_SPAN: &[u8] = b"span";
const TAG_TRANSLATION: &[u8] = b"translation";
const TAG_TEXT: &[u8] = b"text";

const ATTR_BEGIN: &[u8] = b"begin";
const ATTR_END: &[u8] = b"end";
const ATTR_DUR: &[u8] = b"dur";
const ATTR_AGENT: &[u8] = b"ttm:agent";
const ATTR_AGENT_ALIAS: &[u8] = b"agent";
const ATTR_ROLE: &[u8] = b"ttm:role";
const ATTR_ROLE_ALIAS: &[u8] = b"role";
const ATTR_ITUNES_KEY: &[u8] = b"itunes:key";
const ATTR_KEY_ALIAS: &[u8] = b"key";
const ATTR_FOR: &[u8] = b"for";

const ROLE_BACKGROUND_MARKER: &str = "bg";
const ROLE_TRANSLATION: &str = "x-translation";
const ROLE_ROMANIZATION: &str = "x-roman";

/// `div` 与 `span` 允许的最大嵌套深度。
pub const MAX_NESTING_DEPTH: usize = 256;

/// 段落键到翻译文本的映射。
type Translations = HashMap<String, String>;

/// TTML 格式解析器。
#[derive(Debug, Default, Clone, Copy)]
pub struct TtmlParser;

impl LyricsParser for TtmlParser {
    fn name(&self) -> &'static str {
        "ttml"
    }

    fn format(&self) -> LyricFormat {
        LyricFormat::Ttml
    }

    fn handles(&self, source: LyricsSource<'_>) -> bool {
        is_ttml(source)
    }

    fn try_parse(
        &self,
        source: LyricsSource<'_>,
        options: &ParseOptions,
    ) -> Result<Lyrics, ConvertError> {
        parse_ttml(source, options)
    }
}

/// 探测输入是否为 TTML。
///
/// 只有同时找到根元素 `tt`，并在 `body` 内部找到至少一个 `div` 时才返回 `true`。
/// 扫描在找到第一个符合条件的 `div` 后立即停止。
pub fn is_ttml(source: LyricsSource<'_>) -> bool {
    let mut reader = Reader::from_reader(source.into_reader());
    reader.config_mut().expand_empty_elements = true;

    let mut found_tt = false;
    let mut inside_body = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                TAG_TT => found_tt = true,
                TAG_BODY => inside_body = true,
                TAG_DIV if inside_body => return found_tt,
                _ => {}
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == TAG_BODY => inside_body = false,
            Ok(Event::Eof) | Err(_) => return false,
            _ => {}
        }
        buf.clear();
    }
}

/// 解析 TTML 格式内容到 `Lyrics` 结构。
///
/// # 参数
/// * `source` - 一次性输入源。
/// * `options` - 解析选项。`body` 没有 `dur` 时使用 `track_length_ms` 作为总时长。
///
/// # 返回
/// * `Ok(Lyrics)` - 所有 `div` 中所有段落组成的歌词，TTML 不提供标题等元数据。
/// * `Err(ConvertError)` - XML 结构错误、读取错误或文档中没有 `body`。
pub fn parse_ttml(
    source: LyricsSource<'_>,
    options: &ParseOptions,
) -> Result<Lyrics, ConvertError> {
    let mut reader = Reader::from_reader(source.into_reader());
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = true;

    let mut translations: Option<Translations> = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == TAG_TRANSLATION => {
                if translations.is_none() {
                    translations = Some(parse_translation(&mut reader)?);
                } else {
                    debug!("[TTML] 只使用第一个翻译块，已跳过其余翻译。");
                    let mut skip_buf = Vec::new();
                    reader.read_to_end_into(e.name(), &mut skip_buf)?;
                }
            }
            Event::Start(e) if e.local_name().as_ref() == TAG_BODY => {
                let declared_duration = get_time_attribute(&e, &reader, &[ATTR_DUR])?;
                let translations = translations.take().unwrap_or_default();
                let mut lines = parse_body(&mut reader, &translations)?;

                let total_duration = declared_duration.or(options.track_length_ms);
                adjust_lines(&mut lines, total_duration);

                debug!("[TTML] 解析完成，共 {} 行。", lines.len());

                return Ok(Lyrics {
                    duration_millis: total_duration,
                    lines,
                    ..Default::default()
                });
            }
            Event::Eof => {
                return Err(ConvertError::InvalidLyricFormat(
                    "文档中没有 <body> 元素".to_string(),
                ));
            }
            _ => {}
        }
        buf.clear();
    }
}

/// 解析 `<translation>` 块中的所有 `<text for="...">`。
fn parse_translation<R: BufRead>(reader: &mut Reader<R>) -> Result<Translations, ConvertError> {
    let mut translations = Translations::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == TAG_TEXT => {
                let key = get_string_attribute(&e, reader, &[ATTR_FOR])?;
                let text = read_element_text(reader, "text")?;
                if let Some(key) = key
                    && !text.is_empty()
                {
                    translations.entry(key).or_insert(text);
                }
            }
            Event::End(e) if e.local_name().as_ref() == TAG_TRANSLATION => {
                debug!("[TTML] 读取到 {} 条翻译。", translations.len());
                return Ok(translations);
            }
            Event::Eof => return Err(unexpected_eof("translation")),
            _ => {}
        }
        buf.clear();
    }
}

/// 读取当前元素内的全部文本（包括嵌套元素中的文本），直到该元素结束。
///
/// 返回的文本已规范化空白。
fn read_element_text<R: BufRead>(
    reader: &mut Reader<R>,
    tag: &str,
) -> Result<String, ConvertError> {
    let mut text = String::new();
    let mut depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => return Ok(normalize_text_whitespace(&text)),
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(unexpected_eof(tag)),
            event => {
                if let Some(run) = text_of(&event)? {
                    text.push_str(&run);
                }
            }
        }
        buf.clear();
    }
}

fn parse_body<R: BufRead>(
    reader: &mut Reader<R>,
    translations: &Translations,
) -> Result<Vec<Line>, ConvertError> {
    let mut lines = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == TAG_DIV => {
                lines.extend(parse_div(reader, translations, 1)?);
            }
            Event::End(e) if e.local_name().as_ref() == TAG_BODY => return Ok(lines),
            Event::Eof => return Err(unexpected_eof("body")),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_div<R: BufRead>(
    reader: &mut Reader<R>,
    translations: &Translations,
    depth: usize,
) -> Result<Vec<Line>, ConvertError> {
    check_depth(depth, "div")?;
    let mut lines = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                TAG_DIV => lines.extend(parse_div(reader, translations, depth + 1)?),
                TAG_P => {
                    let attributes = ParagraphAttributes::read(&e, reader)?;
                    if let Some(begin) = attributes.begin {
                        let mut line = parse_paragraph(reader, begin, &attributes)?;
                        if line.translation.is_none() {
                            line.translation = attributes
                                .key
                                .as_ref()
                                .and_then(|key| translations.get(key))
                                .cloned();
                        }
                        lines.push(line);
                    } else {
                        debug!("[TTML] 段落缺少可解析的 begin 属性，已丢弃。");
                        let mut skip_buf = Vec::new();
                        reader.read_to_end_into(e.name(), &mut skip_buf)?;
                    }
                }
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == TAG_DIV => return Ok(lines),
            Event::Eof => return Err(unexpected_eof("div")),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_paragraph<R: BufRead>(
    reader: &mut Reader<R>,
    begin: u64,
    attributes: &ParagraphAttributes,
) -> Result<Line, ConvertError> {
    let paragraph_span = SpanContext::paragraph(begin);
    let mut collector = ParagraphCollector::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                collector.flush_into_paragraph();
                if e.local_name().as_ref() == TAG_SPAN {
                    parse_child_span(reader, &mut collector, &paragraph_span, &e, 1)?;
                }
            }
            Event::End(e) => {
                collector.flush_into_paragraph();
                if e.local_name().as_ref() == TAG_P {
                    break;
                }
            }
            Event::Eof => return Err(unexpected_eof("p")),
            event => {
                if let Some(text) = text_of(&event)? {
                    collector.push_text(&text);
                }
            }
        }
        buf.clear();
    }

    Ok(collector.into_line(begin, attributes))
}

/// 根据 span 的角色分派：翻译 span 的文本成为行的翻译，音译 span 被忽略，
/// 其余 span 按逐字数据解析。
fn parse_child_span<R: BufRead>(
    reader: &mut Reader<R>,
    collector: &mut ParagraphCollector,
    parent: &SpanContext,
    e: &BytesStart<'_>,
    depth: usize,
) -> Result<(), ConvertError> {
    let span = parent.child(e, reader)?;
    match span.role.as_deref() {
        Some(ROLE_TRANSLATION) => {
            let text = read_element_text(reader, "span")?;
            if collector.translation.is_none() && !text.is_empty() {
                collector.translation = Some(text);
            }
            Ok(())
        }
        Some(ROLE_ROMANIZATION) => read_element_text(reader, "span").map(drop),
        _ => parse_span(reader, collector, &span, depth),
    }
}

fn parse_span<R: BufRead>(
    reader: &mut Reader<R>,
    collector: &mut ParagraphCollector,
    span: &SpanContext,
    depth: usize,
) -> Result<(), ConvertError> {
    check_depth(depth, "span")?;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                collector.flush_into_span(span);
                if e.local_name().as_ref() == TAG_SPAN {
                    parse_child_span(reader, collector, span, &e, depth + 1)?;
                }
            }
            Event::End(e) => {
                collector.flush_into_span(span);
                if e.local_name().as_ref() == TAG_SPAN {
                    return Ok(());
                }
            }
            Event::Eof => return Err(unexpected_eof("span")),
            event => {
                if let Some(text) = text_of(&event)? {
                    collector.push_text(&text);
                }
            }
        }
        buf.clear();
    }
}

fn check_depth(depth: usize, tag: &str) -> Result<(), ConvertError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(ConvertError::InvalidLyricFormat(format!(
            "<{tag}> 元素嵌套超过 {MAX_NESTING_DEPTH} 层"
        )));
    }
    Ok(())
}

fn unexpected_eof(tag: &str) -> ConvertError {
    ConvertError::InvalidLyricFormat(format!("文档在 <{tag}> 元素结束前意外终止"))
}

/// 段落 `<p>` 上的属性。
struct ParagraphAttributes {
    begin: Option<u64>,
    end: Option<u64>,
    dur: Option<u64>,
    agent: Option<String>,
    key: Option<String>,
}

impl ParagraphAttributes {
    fn read<R>(e: &BytesStart<'_>, reader: &Reader<R>) -> Result<Self, ConvertError> {
        Ok(Self {
            begin: get_time_attribute(e, reader, &[ATTR_BEGIN])?,
            end: get_time_attribute(e, reader, &[ATTR_END])?,
            dur: get_time_attribute(e, reader, &[ATTR_DUR])?,
            agent: get_string_attribute(e, reader, &[ATTR_AGENT, ATTR_AGENT_ALIAS])?,
            key: get_string_attribute(e, reader, &[ATTR_ITUNES_KEY, ATTR_KEY_ALIAS])?,
        })
    }

    /// 段落的有效时长：`dur` 优先，其次是 `end - begin`。
    fn explicit_duration(&self, begin: u64) -> Option<u64> {
        self.dur.or_else(|| self.end.and_then(|end| end.checked_sub(begin)))
    }
}

/// 向下传递给嵌套 span 的时间与角色。
#[derive(Debug, Clone)]
struct SpanContext {
    begin: u64,
    end: Option<u64>,
    role: Option<String>,
}

impl SpanContext {
    fn paragraph(begin: u64) -> Self {
        Self {
            begin,
            end: None,
            role: None,
        }
    }

    /// 根据 span 自身的属性派生子上下文，未声明的 `begin`/角色沿用当前值。
    fn child<R>(&self, e: &BytesStart<'_>, reader: &Reader<R>) -> Result<Self, ConvertError> {
        let begin = get_time_attribute(e, reader, &[ATTR_BEGIN])?;
        let end = get_time_attribute(e, reader, &[ATTR_END])?;
        let role = get_string_attribute(e, reader, &[ATTR_ROLE, ATTR_ROLE_ALIAS])?;

        Ok(Self {
            begin: begin.unwrap_or(self.begin),
            end,
            role: role.or_else(|| self.role.clone()),
        })
    }

    fn is_background(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|role| role.contains(ROLE_BACKGROUND_MARKER))
    }
}

/// 收集一个段落内的文本与逐字数据。
///
/// 相邻的文本、CDATA 与实体引用先合并到 `pending`，
/// 遇到元素边界时再决定归属。
#[derive(Debug, Default)]
struct ParagraphCollector {
    words: Vec<Word>,
    leading_text: String,
    raw_text: String,
    pending: String,
    translation: Option<String>,
}

impl ParagraphCollector {
    fn push_text(&mut self, text: &str) {
        self.pending.push_str(text);
        self.raw_text.push_str(text);
    }

    /// 处理直接位于 `<p>` 下的文本。
    fn flush_into_paragraph(&mut self) {
        let text = std::mem::take(&mut self.pending);
        if text.is_empty() {
            return;
        }

        if let Some(last) = self.words.last_mut() {
            last.content.push_str(collapse_whitespace_run(&text));
        } else if !self.leading_text.is_empty() || !text.trim().is_empty() {
            self.leading_text.push_str(&text);
        }
    }

    /// 处理直接位于某个 `<span>` 下的文本。
    fn flush_into_span(&mut self, span: &SpanContext) {
        let text = std::mem::take(&mut self.pending);
        if text.is_empty() {
            return;
        }

        if text.trim().is_empty() {
            if let Some(last) = self.words.last_mut() {
                last.content.push_str(collapse_whitespace_run(&text));
            }
            return;
        }

        self.words.push(Word {
            content: text,
            start_at: span.begin,
            end: span.end,
            is_background: span.is_background(),
        });
    }

    /// 组装行。行从最早的词开始，结束时间为开始时间加上段落的有效时长。
    fn into_line(mut self, begin: u64, attributes: &ParagraphAttributes) -> Line {
        if !self.words.is_empty() && !self.leading_text.trim().is_empty() {
            let leading = std::mem::take(&mut self.leading_text);
            self.words.insert(0, Word::new(leading, begin));
        }

        let next_starts: Vec<u64> = self.words.iter().skip(1).map(|w| w.start_at).collect();
        for (word, next_start) in self.words.iter_mut().zip(next_starts) {
            if word.end.is_none() && next_start >= word.start_at {
                word.end = Some(next_start);
            }
        }

        let (start_at, content) = if self.words.is_empty() {
            (begin, normalize_text_whitespace(&self.leading_text))
        } else {
            let joined: String = self.words.iter().map(|w| w.content.as_str()).collect();
            let start_at = self
                .words
                .iter()
                .map(|w| w.start_at)
                .min()
                .unwrap_or(begin);
            (start_at, joined.trim().to_string())
        };

        Line {
            start_at,
            end: attributes
                .explicit_duration(begin)
                .map(|duration| start_at.saturating_add(duration)),
            duration_millis: None,
            content,
            raw_content: self.raw_text,
            words: self.words,
            actor: attributes.agent.clone(),
            translation: self.translation,
        }
    }
}

/// 带换行的空白（来自格式化缩进）折叠为单个空格，其余空白原样保留。
fn collapse_whitespace_run(text: &str) -> &str {
    if text.trim().is_empty() && text.contains(['\n', '\r']) {
        " "
    } else {
        text
    }
}

/// 提取文本类事件的内容，非文本事件返回 `None`。
fn text_of(event: &Event<'_>) -> Result<Option<String>, ConvertError> {
    match event {
        Event::Text(e) => Ok(Some(e.decode()?.into_owned())),
        Event::CData(e) => Ok(Some(e.decode()?.into_owned())),
        Event::GeneralRef(e) => Ok(decode_entity(e)?.map(String::from)),
        _ => Ok(None),
    }
}

/// 解码 XML 实体引用，例如 `&amp;`、`&#39;`、`&#x4E2D;`。
fn decode_entity(e: &BytesRef<'_>) -> Result<Option<char>, ConvertError> {
    let entity_name = str::from_utf8(e.as_ref())
        .map_err(|err| ConvertError::Internal(format!("无法将实体名解码为UTF-8: {err}")))?;

    let decoded_char = if let Some(num_str) = entity_name.strip_prefix('#') {
        let (radix, code_point_str) = num_str
            .strip_prefix('x')
            .map_or((10, num_str), |stripped| (16, stripped));

        u32::from_str_radix(code_point_str, radix)
            .ok()
            .and_then(char::from_u32)
    } else {
        match entity_name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => None,
        }
    };

    if decoded_char.is_none() {
        warn!("[TTML] 忽略了无法识别的XML实体 '&{entity_name};'");
    }
    Ok(decoded_char)
}

/// 获取字符串类型的属性值，依次尝试所有别名。
fn get_string_attribute<R>(
    e: &BytesStart<'_>,
    reader: &Reader<R>,
    attr_names: &[&[u8]],
) -> Result<Option<String>, ConvertError> {
    for &name in attr_names {
        if let Some(attr) = e.try_get_attribute(name)? {
            let decoded_value = attr.decode_and_unescape_value(reader.decoder())?;
            return Ok(Some(decoded_value.into_owned()));
        }
    }
    Ok(None)
}

/// 获取并解析为毫秒的时间戳属性值。无法解析的时间戳视为不存在。
fn get_time_attribute<R>(
    e: &BytesStart<'_>,
    reader: &Reader<R>,
    attr_names: &[&[u8]],
) -> Result<Option<u64>, ConvertError> {
    let Some(value_str) = get_string_attribute(e, reader, attr_names)? else {
        return Ok(None);
    };

    match parse_timestamp(&value_str) {
        Ok(ms) => Ok(Some(ms)),
        Err(err) => {
            debug!("[TTML] 时间戳 '{value_str}' 解析失败 ({err})，该时间戳将被忽略。");
            Ok(None)
        }
    }
}
