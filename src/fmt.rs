use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_width::UnicodeWidthChar;

pub const ELLIPSIS: char = '.';

/// NFKC-normalize `s`.
///
/// Half-width katakana widen with their voicing marks composed, and the
/// half-width prolonged-sound mark U+FF70 becomes `ー`. ASCII hyphens are
/// left alone.
pub fn normalize(s: &str) -> String {
    s.nfkc().collect()
}

/// Collapse runs of spaces into one.
pub fn collapse_spaces(s: &str) -> String {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    let re = SPACES.get_or_init(|| Regex::new(" {2,}").expect("static regex"));
    re.replace_all(s, " ").into_owned()
}

/// Visual width: 2 for East Asian Wide/Fullwidth, 1 for anything else.
pub fn char_width(c: char) -> usize {
    match UnicodeWidthChar::width(c) {
        Some(2) => 2,
        _ => 1,
    }
}

#[allow(dead_code)]
pub fn display_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

/// Shorten `s` to exactly `width` columns as `head + dots + tail`.
///
/// Strings that already fit are returned unchanged. The tail takes at most
/// half of the budget left after a two-dot ellipsis, the head takes what the
/// tail left, and the dots pad the remainder so the result is `width` wide.
pub fn omit(s: &str, width: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    let widths: Vec<usize> = chars.iter().copied().map(char_width).collect();
    if widths.iter().sum::<usize>() <= width {
        return s.to_string();
    }

    let ellipsis_min = 2.min(width);
    let tail_budget = (width - ellipsis_min) / 2;
    let mut tail_width = 0;
    let mut tail_start = chars.len();
    while tail_start > 0 && tail_width + widths[tail_start - 1] <= tail_budget {
        tail_start -= 1;
        tail_width += widths[tail_start];
    }

    let head_budget = width - ellipsis_min - tail_width;
    let mut head_width = 0;
    let mut head_end = 0;
    while head_end < tail_start && head_width + widths[head_end] <= head_budget {
        head_width += widths[head_end];
        head_end += 1;
    }

    let dots = width - head_width - tail_width;
    let mut out: String = chars[..head_end].iter().collect();
    out.extend(std::iter::repeat(ELLIPSIS).take(dots));
    out.extend(&chars[tail_start..]);
    out
}
