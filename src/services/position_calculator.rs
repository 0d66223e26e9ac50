//! 字符位置换算
//!
//! 把清理后全文的字符偏移换算成 (段落, 句子, 句内偏移)。
//! 长度按 Unicode 字符计，段落之间算 1 个换行符，句子之间不算分隔。

use crate::models::response::SegmentedText;

/// 句内位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentencePosition {
    pub paragraph_index: usize,
    pub sentence_index: usize,
    pub relative_index: usize,
}

/// 段落分隔符长度
const PARAGRAPH_SEPARATOR_LEN: usize = 1;

/// 定位全局偏移所在的句子
///
/// 偏移为负或落在所有句子之外（包括段落分隔符本身）时返回 None，
/// 调用方应丢弃对应标注
///
/// ```
/// use essay_stream::services::position_calculator::{locate, SentencePosition};
///
/// let text = vec![
///     vec!["第一段第一句".to_string(), "第一段第二句".to_string()],
///     vec!["第二段第一句".to_string()],
/// ];
/// assert_eq!(
///     locate(&text, 8),
///     Some(SentencePosition { paragraph_index: 0, sentence_index: 1, relative_index: 2 })
/// );
/// assert_eq!(locate(&text, 12), None);
/// ```
pub fn locate(text: &SegmentedText, offset: i64) -> Option<SentencePosition> {
    let offset = usize::try_from(offset).ok()?;

    let mut current = 0usize;
    for (paragraph_index, paragraph) in text.iter().enumerate() {
        for (sentence_index, sentence) in paragraph.iter().enumerate() {
            let len = sentence.chars().count();
            if offset >= current && offset < current + len {
                return Some(SentencePosition {
                    paragraph_index,
                    sentence_index,
                    relative_index: offset - current,
                });
            }
            current += len;
        }
        current += PARAGRAPH_SEPARATOR_LEN;
    }
    None
}
