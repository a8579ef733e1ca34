//! Local heuristic naming from OCR text
//!
//! Last rung of the ladder before the catch-all. Pure string work, so it cannot fail:
//! keep letters and digits (any script, CJK included), take a short prefix, append a
//! category suffix.

use super::types::FileKind;

/// Keyword → category suffix. First match wins.
const CATEGORY_KEYWORDS: &[(&[&str], &str)] = &[
    (&["invoice", "发票", "請求書"], "invoice"),
    (&["receipt", "收据", "小票", "領収書"], "receipt"),
    (&["contract", "agreement", "合同", "协议", "契約"], "contract"),
    (&["report", "报告", "報告"], "report"),
    (&["statement", "对账单", "账单"], "statement"),
    (&["resume", "curriculum vitae", "简历", "履歴書"], "resume"),
    (&["certificate", "证书", "証明書"], "certificate"),
];

/// Category suffix for a file: keyword match on the text, else the file kind
pub fn category_suffix(text: &str, kind: FileKind) -> &'static str {
    let lower = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(words, _)| words.iter().any(|w| lower.contains(w)))
        .map(|(_, category)| *category)
        .unwrap_or(match kind {
            FileKind::Image => "image",
            FileKind::Document => "document",
            FileKind::Other => "file",
        })
}

/// Name derived from OCR text, or `None` when the text has nothing usable
pub fn heuristic_name(
    text: &str,
    kind: FileKind,
    prefix_chars: usize,
    separator: char,
) -> Option<String> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();
    if words.is_empty() {
        return None;
    }

    let joined = words.join(&separator.to_string());
    let prefix: String = joined.chars().take(prefix_chars.max(1)).collect();
    let prefix = prefix.trim_end_matches(separator);
    if prefix.is_empty() {
        return None;
    }

    Some(format!(
        "{}{}{}",
        prefix,
        separator,
        category_suffix(text, kind)
    ))
}
