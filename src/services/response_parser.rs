//! 响应解析 - 业务能力层
//!
//! 把生成服务返回的自由文本转换为 `image_N → 结论` 的映射。
//!
//! 服务不保证严格遵守要求的格式：标题标记可能有也可能没有，
//! 解释里可能夹杂加粗等标记。解析失败只影响所在的块，
//! 每个识别出的块都恰好产生一条结果。

use crate::error::BlockParseError;
use crate::models::{AnalysisVerdict, Classification, ImageId, ResultSet};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// 块内没有可用解释时使用的占位文本
pub const NO_EXPLANATION_PLACEHOLDER: &str = "No explanation provided.";

/// 行首的 "Image N" 标记，允许被 `**` / `__` / `#` / 列表符号包裹
fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?mi)^[ \t]*(?:[#>*_\-][ \t]*|\d+[.)][ \t]+)*image(?P<gap>[ \t]*#?[ \t]*)(?P<label>[^\s:*_.)\-–—]*)[ \t]*(?:\*\*|__)?[ \t]*(?:[:.)\-–—]|$)",
        )
        .expect("marker regex is valid")
    })
}

fn affirmative_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\byes\b").expect("affirmative regex is valid"))
}

fn leading_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:yes|no)\b[\s*_:.,;\-–—]*").expect("leading token regex is valid")
    })
}

fn emphasis_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*|__").expect("emphasis regex is valid"))
}

/// 解析明细
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    pub results: ResultSet,
    /// 识别出的块数量
    pub block_count: usize,
    /// 重复出现的编号（保留第一次出现的块）
    pub duplicates: Vec<ImageId>,
    /// 解析失败的块数量
    pub failed_blocks: usize,
}

/// 响应与上传数量的一致性检查
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseValidation {
    pub expected: usize,
    pub parsed: usize,
    /// 应该出现但缺失的编号
    pub missing: Vec<ImageId>,
    /// 超出上传数量的编号
    pub unexpected: Vec<ImageId>,
    pub duplicates: Vec<ImageId>,
}

impl ResponseValidation {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.duplicates.is_empty()
    }
}

/// 一个原始块：标记中的编号文本 + 块正文
struct RawBlock<'a> {
    label: &'a str,
    body: &'a str,
}

/// 响应解析器
///
/// 职责：
/// - 按 "Image N" 标记切分响应
/// - 判断 yes / no，提取解释
/// - 单个块失败时记为 unknown，不影响其他块
#[derive(Debug, Clone, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// 解析响应文本
    pub fn parse(&self, raw_text: &str) -> ResultSet {
        self.parse_detailed(raw_text).results
    }

    /// 解析响应文本并返回明细
    pub fn parse_detailed(&self, raw_text: &str) -> ParsedResponse {
        let text = raw_text.replace("\r\n", "\n");
        let blocks = split_blocks(&text);

        let mut parsed = ParsedResponse {
            block_count: blocks.len(),
            ..Default::default()
        };

        if blocks.is_empty() {
            if !text.trim().is_empty() {
                warn!("⚠️ 响应中没有找到任何图片标记");
            }
            return parsed;
        }

        // 先收下编号完好的块，解析失败的块不能占用它们的编号
        let mut failed = Vec::new();
        for (position, block) in blocks.iter().enumerate() {
            match self.parse_block(block) {
                Ok(verdict) => {
                    let id = verdict.image_id;
                    if !parsed.results.insert(verdict) {
                        warn!("⚠️ 响应中 {} 重复出现，保留第一次的结果", id);
                        parsed.duplicates.push(id);
                    }
                }
                Err(e) => {
                    warn!("⚠️ 第 {} 个响应块解析失败: {}", position + 1, e);
                    failed.push((position, block, e));
                }
            }
        }

        parsed.failed_blocks = failed.len();
        for (position, block, e) in failed {
            let id = free_id_from(&parsed.results, position as u32 + 1);
            parsed.results.insert(unknown_verdict(id, block, &e));
        }

        debug!(
            "解析完成: {} 个块, {} 条结果, {} 个失败",
            parsed.block_count,
            parsed.results.len(),
            parsed.failed_blocks
        );

        parsed
    }

    /// 对照上传数量检查编号是否完整、是否越界
    pub fn validate(&self, parsed: &ParsedResponse, expected: usize) -> ResponseValidation {
        let missing = (1..=expected as u32)
            .map(ImageId)
            .filter(|id| !parsed.results.contains(*id))
            .collect();
        let unexpected = parsed
            .results
            .ids()
            .filter(|id| id.number() == 0 || id.number() as usize > expected)
            .collect();

        ResponseValidation {
            expected,
            parsed: parsed.results.len(),
            missing,
            unexpected,
            duplicates: parsed.duplicates.clone(),
        }
    }

    fn parse_block(&self, block: &RawBlock<'_>) -> Result<AnalysisVerdict, BlockParseError> {
        let id = parse_image_number(block.label)?;
        let body = strip_leading_markup(block.body);

        let leading_line = body.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        let classification = if affirmative_regex().is_match(leading_line) {
            Classification::Yes
        } else {
            Classification::No
        };

        let without_token = leading_token_regex().replace(body, "");
        let explanation = clean_explanation(&without_token);
        let explanation = if explanation.is_empty() {
            NO_EXPLANATION_PLACEHOLDER.to_string()
        } else {
            explanation
        };

        Ok(AnalysisVerdict::new(id, classification, explanation))
    }

}

/// 解析失败的块：编号优先取块的位置，被占用时顺延到下一个空闲编号
fn free_id_from(results: &ResultSet, start: u32) -> ImageId {
    let mut n = start.max(1);
    while results.contains(ImageId(n)) {
        n += 1;
    }
    ImageId(n)
}

/// 解析失败的块保留原文
fn unknown_verdict(id: ImageId, block: &RawBlock<'_>, error: &BlockParseError) -> AnalysisVerdict {
    let raw = clean_explanation(strip_leading_markup(block.body));
    let explanation = if raw.is_empty() {
        format!("Parse error: {}", error)
    } else {
        format!("Parse error: {}; raw: {}", error, raw)
    };
    AnalysisVerdict::new(id, Classification::Unknown, explanation)
}

/// 按标记切分，标记之前的文本被忽略
fn split_blocks(text: &str) -> Vec<RawBlock<'_>> {
    let markers: Vec<_> = marker_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let gap = caps.name("gap").map(|m| m.as_str()).unwrap_or("");
            let label = caps.name("label").map(|m| m.as_str()).unwrap_or("");
            // "Images:"、"Image analysis:" 之类的普通文字不是标记
            if !is_marker_label(gap, label) {
                return None;
            }
            Some((whole.start(), whole.end(), label))
        })
        .collect();

    if let Some((first_start, _, _)) = markers.first() {
        let preamble = text[..*first_start].trim();
        if !preamble.is_empty() {
            debug!("忽略响应开头的 {} 个字符", preamble.chars().count());
        }
    }

    markers
        .iter()
        .enumerate()
        .map(|(i, (_, end, label))| {
            let next_start = markers.get(i + 1).map(|m| m.0).unwrap_or(text.len());
            RawBlock {
                label,
                body: &text[*end..next_start],
            }
        })
        .collect()
}

const NUMBER_WORDS: [&str; 20] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
    "twenty",
];

fn trim_label(label: &str) -> &str {
    label.trim_matches(|c: char| matches!(c, '[' | ']' | '(' | '#'))
}

fn number_word(word: &str) -> Option<u32> {
    NUMBER_WORDS
        .iter()
        .position(|w| w.eq_ignore_ascii_case(word))
        .map(|i| i as u32 + 1)
}

/// 标记的编号部分必须以数字开头，或是紧跟在空白后的英文数词
fn is_marker_label(gap: &str, label: &str) -> bool {
    let trimmed = trim_label(label);
    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        return true;
    }
    !gap.is_empty() && number_word(trimmed).is_some()
}

fn parse_image_number(label: &str) -> Result<ImageId, BlockParseError> {
    let trimmed = trim_label(label);
    if let Some(n) = number_word(trimmed) {
        return Ok(ImageId(n));
    }
    match trimmed.parse::<u32>() {
        Ok(n) if n > 0 => Ok(ImageId(n)),
        _ => Err(BlockParseError::InvalidNumber(label.to_string())),
    }
}

fn strip_leading_markup(body: &str) -> &str {
    body.trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, '*' | '_' | ':' | '-' | '–' | '—')
    })
}

/// 去掉加粗标记和分隔线，保留被强调的文字
fn clean_explanation(text: &str) -> String {
    let without_emphasis = emphasis_regex().replace_all(text, "");
    let lines: Vec<&str> = without_emphasis
        .lines()
        .map(|l| l.trim_end())
        .filter(|l| !is_rule_line(l))
        .collect();
    lines
        .join("\n")
        .trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '_')
        .to_string()
}

/// `---`、`***`、`###` 这类只有标记的行
fn is_rule_line(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty() && t.chars().all(|c| matches!(c, '-' | '*' | '_' | '#' | '='))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ResponseParser {
        ResponseParser::new()
    }

    #[test]
    fn test_well_formed_single_line_blocks() {
        let text = "Image 1: yes - Person holding a phone to their ear.\n\
                    Image 2: no - Empty hallway.\n\
                    Image 3: Yes - Texting at the desk.";
        let results = parser().parse(text);

        assert_eq!(results.len(), 3);
        let v1 = results.get(ImageId(1)).unwrap();
        assert_eq!(v1.classification, Classification::Yes);
        assert_eq!(v1.explanation, "Person holding a phone to their ear.");
        assert_eq!(results.get(ImageId(2)).unwrap().classification, Classification::No);
        assert_eq!(results.get(ImageId(2)).unwrap().explanation, "Empty hallway.");
        assert_eq!(results.get(ImageId(3)).unwrap().classification, Classification::Yes);
    }

    #[test]
    fn test_bold_markers_and_multiline_explanations() {
        let text = "Here is the analysis:\n\n\
                    **Image 1:** Yes\n\
                    The person on the left is **looking at a phone screen**.\n\n\
                    ---\n\n\
                    **Image 2:**\n\
                    No\n\
                    Nobody is visible.\n";
        let results = parser().parse(text);

        assert_eq!(results.len(), 2);
        let v1 = results.get(ImageId(1)).unwrap();
        assert_eq!(v1.classification, Classification::Yes);
        assert_eq!(v1.explanation, "The person on the left is looking at a phone screen.");
        let v2 = results.get(ImageId(2)).unwrap();
        assert_eq!(v2.classification, Classification::No);
        assert_eq!(v2.explanation, "Nobody is visible.");
    }

    #[test]
    fn test_heading_and_list_markers() {
        let text = "### Image 1\nyes - scrolling on a phone\n\n- Image 2: no - reading a book\n1. Image 3) YES: taking a photo";
        let results = parser().parse(text);

        assert_eq!(results.len(), 3);
        assert_eq!(results.get(ImageId(1)).unwrap().explanation, "scrolling on a phone");
        assert_eq!(results.get(ImageId(2)).unwrap().classification, Classification::No);
        assert_eq!(results.get(ImageId(3)).unwrap().classification, Classification::Yes);
        assert_eq!(results.get(ImageId(3)).unwrap().explanation, "taking a photo");
    }

    #[test]
    fn test_yes_must_be_a_whole_word() {
        let results = parser().parse("Image 1: no - eyes closed, no phone visible");
        assert_eq!(results.get(ImageId(1)).unwrap().classification, Classification::No);
    }

    #[test]
    fn test_missing_explanation_uses_placeholder() {
        let text = "Image 1: yes - holding phone\nImage 2: no\nImage 3: no - nobody there";
        let results = parser().parse(text);

        assert_eq!(results.len(), 3);
        let v2 = results.get(ImageId(2)).unwrap();
        assert_eq!(v2.classification, Classification::No);
        assert_eq!(v2.explanation, NO_EXPLANATION_PLACEHOLDER);
    }

    #[test]
    fn test_malformed_number_yields_unknown_block() {
        let text = "**Image 1:** yes - phone in hand\n\
                    **Image 2b:** no - unclear frame\n\
                    **Image 3:** no - empty room";
        let parsed = parser().parse_detailed(text);

        assert_eq!(parsed.block_count, 3);
        assert_eq!(parsed.results.len(), 3);
        assert_eq!(parsed.failed_blocks, 1);
        let v2 = parsed.results.get(ImageId(2)).unwrap();
        assert_eq!(v2.classification, Classification::Unknown);
        assert!(v2.explanation.starts_with("Parse error:"));
        assert!(v2.explanation.contains("unclear frame"));
    }

    #[test]
    fn test_number_word_labels() {
        let parsed = parser().parse_detailed("Image One: yes - a\nImage two: no - b");
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.failed_blocks, 0);
        assert_eq!(
            parsed.results.get(ImageId(2)).unwrap().classification,
            Classification::No
        );
    }

    #[test]
    fn test_malformed_block_never_displaces_a_real_one() {
        let text = "Image 1: yes - phone in hand\nImage 2x: no - blurry frame\nImage 2: no - empty room";
        let parsed = parser().parse_detailed(text);

        assert_eq!(parsed.block_count, 3);
        assert_eq!(parsed.results.len(), 3);
        assert!(parsed.duplicates.is_empty());
        let v2 = parsed.results.get(ImageId(2)).unwrap();
        assert_eq!(v2.classification, Classification::No);
        assert_eq!(v2.explanation, "empty room");
        let v3 = parsed.results.get(ImageId(3)).unwrap();
        assert_eq!(v3.classification, Classification::Unknown);
        assert!(v3.explanation.contains("blurry frame"));
    }

    #[test]
    fn test_letter_label_stays_in_previous_explanation() {
        let text = "Image 1: yes - phone in hand\nImage A: no - blurry frame\nImage 2: no - empty room";
        let parsed = parser().parse_detailed(text);

        assert_eq!(parsed.block_count, 2);
        assert!(parsed.duplicates.is_empty());
        assert_eq!(
            parsed.results.get(ImageId(2)).unwrap().explanation,
            "empty room"
        );
    }

    #[test]
    fn test_prose_line_starting_with_image_does_not_split_block() {
        let text = "Image 1: yes\nImage analysis: the man holds a phone\nImage 2: no - nobody";
        let parsed = parser().parse_detailed(text);

        assert_eq!(parsed.block_count, 2);
        assert_eq!(parsed.failed_blocks, 0);
        let v1 = parsed.results.get(ImageId(1)).unwrap();
        assert_eq!(v1.classification, Classification::Yes);
        assert_eq!(v1.explanation, "Image analysis: the man holds a phone");
        let v2 = parsed.results.get(ImageId(2)).unwrap();
        assert_eq!(v2.classification, Classification::No);
        assert_eq!(v2.explanation, "nobody");
    }

    #[test]
    fn test_prose_mentioning_images_is_not_a_marker() {
        let text = "Images: analysed below\nImage 1: yes - phone\nThe image shows a man.\nImage 2: no - nothing";
        let results = parser().parse(text);

        assert_eq!(results.len(), 2);
        assert_eq!(results.get(ImageId(1)).unwrap().explanation, "phone\nThe image shows a man.");
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let parsed = parser().parse_detailed("Image 1: yes - a\nImage 1: no - b");
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.duplicates, vec![ImageId(1)]);
        assert_eq!(
            parsed.results.get(ImageId(1)).unwrap().classification,
            Classification::Yes
        );
    }

    #[test]
    fn test_no_markers_gives_empty_result() {
        let parsed = parser().parse_detailed("I cannot analyze these images.");
        assert_eq!(parsed.block_count, 0);
        assert!(parsed.results.is_empty());
        assert!(parser().parse("").is_empty());
    }

    #[test]
    fn test_crlf_line_endings() {
        let results = parser().parse("Image 1: yes - a\r\nImage 2: no - b\r\n");
        assert_eq!(results.len(), 2);
        assert_eq!(results.get(ImageId(1)).unwrap().explanation, "a");
    }

    #[test]
    fn test_every_well_formed_entry_has_explanation() {
        let text = "**Image 1:** yes\n**Image 2:** no -\n**Image 3:** **No** - **\n";
        let results = parser().parse(text);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|v| !v.explanation.is_empty()));
    }

    #[test]
    fn test_validate_reports_missing_and_unexpected() {
        let p = parser();
        let parsed = p.parse_detailed("Image 1: yes - a\nImage 3: no - b\nImage 5: no - c");
        let validation = p.validate(&parsed, 4);

        assert_eq!(validation.expected, 4);
        assert_eq!(validation.parsed, 3);
        assert_eq!(validation.missing, vec![ImageId(2), ImageId(4)]);
        assert_eq!(validation.unexpected, vec![ImageId(5)]);
        assert!(!validation.is_consistent());
    }

    #[test]
    fn test_validate_consistent() {
        let p = parser();
        let parsed = p.parse_detailed("Image 1: yes - a\nImage 2: no - b");
        assert!(p.validate(&parsed, 2).is_consistent());
    }
}
