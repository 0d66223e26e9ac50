//! 作文内容清理 - 业务能力层
//!
//! 清理后的文本是所有下游字符偏移的基准，一次批改只清理一次

use regex::Regex;

use crate::error::{AppError, AppResult};

/// 允许保留的字符之外的一切
const DISALLOWED_CHARS: &str =
    r#"[^\p{Han}a-zA-Z0-9\s。，！？；：“”‘’（）【】《》、.,!?;:"'()\-]"#;

/// 作文内容清理器
///
/// 职责：
/// - 去掉非正常作文标点的特殊符号
/// - 合并行内空白、去掉行首行尾空白
/// - 合并连续换行、去掉首尾换行
///
/// 清理结果满足 `clean(clean(x)) == clean(x)`
#[derive(Debug, Clone)]
pub struct ContentCleaner {
    disallowed: Regex,
    inline_space: Regex,
    newlines: Regex,
}

impl ContentCleaner {
    pub fn new() -> AppResult<Self> {
        Ok(Self {
            disallowed: compile(DISALLOWED_CHARS)?,
            inline_space: compile(r"[^\S\n]+")?,
            newlines: compile(r"\n+")?,
        })
    }

    pub fn clean(&self, content: &str) -> String {
        if content.is_empty() {
            return String::new();
        }

        let content = self.disallowed.replace_all(content, "");
        let content = self.inline_space.replace_all(&content, " ");

        let content = content
            .split('\n')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n");

        // 行内空白去掉后可能留下空行，最后统一合并
        let content = self.newlines.replace_all(&content, "\n");
        content.trim_matches('\n').to_string()
    }
}

fn compile(pattern: &str) -> AppResult<Regex> {
    Regex::new(pattern).map_err(|e| AppError::Other(format!("正则编译失败 {}: {}", pattern, e)))
}
