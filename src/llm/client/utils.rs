use regex::Regex;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)```").expect("fence pattern is valid")
});

/// 去掉模型输出外层可选的 markdown 代码围栏
///
/// 成对的围栏替换为其内容；只有开头围栏（输出被截断）时也剥掉。
pub fn strip_code_fences(text: &str) -> String {
    let replaced = FENCED_BLOCK.replace_all(text, "$1");
    let trimmed = replaced.trim();

    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);

    trimmed.trim().to_string()
}

/// 截断过长文本用于日志与错误信息
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}
