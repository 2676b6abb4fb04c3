//! Character-window truncation applied to article text before it is sent to
//! the model.

pub const SEPARATOR: &str = "\n...\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncationWindow {
    /// Start/end truncation activates above this many chars; `0` disables it.
    pub trigger_length: usize,
    pub keep_start: usize,
    pub keep_end: usize,
    /// Hard cap used whenever start/end truncation does not apply.
    pub fallback_max_chars: usize,
}

impl TruncationWindow {
    pub fn apply(&self, text: &str) -> String {
        truncate(
            text,
            self.trigger_length,
            self.keep_start,
            self.keep_end,
            self.fallback_max_chars,
        )
    }
}

pub fn truncate(
    text: &str,
    trigger_length: usize,
    keep_start: usize,
    keep_end: usize,
    fallback_max_chars: usize,
) -> String {
    let len = text.chars().count();

    if trigger_length > 0 && len > trigger_length && (keep_start > 0 || keep_end > 0) {
        if keep_start.saturating_add(keep_end) >= len {
            return text.to_string();
        }
        let head: String = text.chars().take(keep_start).collect();
        let tail: String = text.chars().skip(len - keep_end).collect();
        let separator = if !head.is_empty() && !tail.is_empty() {
            SEPARATOR
        } else {
            ""
        };
        return format!("{head}{separator}{tail}");
    }

    if len > fallback_max_chars {
        return text.chars().take(fallback_max_chars).collect();
    }
    text.to_string()
}
