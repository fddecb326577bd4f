//! 层级编码的比较与切分工具

use std::cmp::Ordering;

/// 按点分段做数字感知比较，使 "1.IJ.9" 排在 "1.IJ.10" 之前
pub fn compare_codes(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) => match compare_segment(x, y) {
                Ordering::Equal => continue,
                other => return other,
            },
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        }
    }
}

/// 段内再按数字/非数字游程切分，数字游程按数值比较
fn compare_segment(a: &str, b: &str) -> Ordering {
    let left = runs(a);
    let right = runs(b);

    for (x, y) in left.iter().zip(right.iter()) {
        let ord = match (is_numeric(x), is_numeric(y)) {
            (true, true) => compare_numeric(x, y),
            _ => x.to_lowercase().cmp(&y.to_lowercase()).then_with(|| x.cmp(y)),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len())
}

fn runs(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev: Option<bool> = None;
    for (i, c) in s.char_indices() {
        let digit = c.is_ascii_digit();
        if let Some(p) = prev
            && p != digit
        {
            out.push(&s[start..i]);
            start = i;
        }
        prev = Some(digit);
    }
    if start < s.len() {
        out.push(&s[start..]);
    }
    out
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// 任意长度的数字串比较，避免溢出
fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// CCI 编码的 rubric 部分（前三段），如 "1.IJ.50.LA" -> "1.IJ.50"
pub fn rubric_base(code: &str) -> String {
    code.split('.').take(3).collect::<Vec<_>>().join(".")
}

/// 编码是否落在 [start, end] 区段内，以 end 为前缀的子编码同样计入
pub fn in_block_range(code: &str, start: &str, end: &str) -> bool {
    let code = code.trim().to_uppercase();
    let start = start.trim().to_uppercase();
    let end = end.trim().to_uppercase();
    code.as_str() >= start.as_str() && (code.as_str() <= end.as_str() || code.starts_with(&end))
}
