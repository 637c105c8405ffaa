//! Output truncation (§4.L), applied to raw tool output before it is
//! inserted into history for the next LLM call. The raw, untruncated
//! output still reaches observers through the corresponding `SessionEvent`.
//! Promoted from the teacher's ad hoc inline 50000-char cap on tool
//! output into a configurable head-only or head+tail policy.

#[derive(Debug, Clone, Copy)]
pub struct Truncator {
    pub max_chars: usize,
    pub max_lines: usize,
    pub reserve_tail: bool,
}

impl Default for Truncator {
    fn default() -> Self {
        Self {
            max_chars: 50_000,
            max_lines: 2_000,
            reserve_tail: false,
        }
    }
}

impl Truncator {
    pub fn truncate(&self, text: &str) -> String {
        let by_lines = self.truncate_lines(text);
        self.truncate_chars(&by_lines)
    }

    fn truncate_lines(&self, text: &str) -> String {
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() <= self.max_lines {
            return text.to_string();
        }
        if self.reserve_tail {
            let tail_lines = self.max_lines / 2;
            let head_lines = self.max_lines - tail_lines;
            let omitted = lines.len() - head_lines - tail_lines;
            format!(
                "{}\n... [{omitted} lines omitted] ...\n{}",
                lines[..head_lines].join("\n"),
                lines[lines.len() - tail_lines..].join("\n")
            )
        } else {
            let omitted = lines.len() - self.max_lines;
            format!("{}\n... [{omitted} lines omitted]", lines[..self.max_lines].join("\n"))
        }
    }

    fn truncate_chars(&self, text: &str) -> String {
        let total_chars = text.chars().count();
        if total_chars <= self.max_chars {
            return text.to_string();
        }
        let char_offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let byte_offset = |char_idx: usize| char_offsets.get(char_idx).copied().unwrap_or(text.len());

        if self.reserve_tail {
            let tail_chars = self.max_chars / 2;
            let head_chars = self.max_chars - tail_chars;
            let omitted = total_chars - head_chars - tail_chars;
            format!(
                "{}\n... [{omitted} chars omitted] ...\n{}",
                &text[..byte_offset(head_chars)],
                &text[byte_offset(total_chars.saturating_sub(tail_chars))..]
            )
        } else {
            let omitted = total_chars - self.max_chars;
            format!("{}\n... [{omitted} chars omitted]", &text[..byte_offset(self.max_chars)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_passes_through_unchanged() {
        let truncator = Truncator::default();
        assert_eq!(truncator.truncate("hello"), "hello");
    }

    #[test]
    fn head_only_keeps_the_start_and_notes_omission() {
        let truncator = Truncator {
            max_chars: 10,
            max_lines: 2_000,
            reserve_tail: false,
        };
        let out = truncator.truncate("0123456789ABCDEF");
        assert!(out.starts_with("0123456789"));
        assert!(out.contains("omitted"));
    }

    #[test]
    fn reserve_tail_keeps_head_and_tail() {
        let truncator = Truncator {
            max_chars: 10,
            max_lines: 2_000,
            reserve_tail: true,
        };
        let out = truncator.truncate("0123456789ABCDEFGHIJ");
        assert!(out.starts_with("01234"));
        assert!(out.ends_with("FGHIJ"));
    }

    #[test]
    fn unbounded_caps_are_identity() {
        let truncator = Truncator {
            max_chars: usize::MAX,
            max_lines: usize::MAX,
            reserve_tail: false,
        };
        let text = "line one\nline two\n".repeat(10_000);
        assert_eq!(truncator.truncate(&text), text);
    }

    #[test]
    fn multi_byte_text_truncates_on_char_boundaries_without_panicking() {
        let truncator = Truncator {
            max_chars: 5,
            max_lines: 2_000,
            reserve_tail: false,
        };
        let out = truncator.truncate("café \u{1F600} noël");
        assert!(out.starts_with("café "));
        assert!(out.contains("omitted"));
    }

    #[test]
    fn multi_byte_text_with_reserve_tail_truncates_on_char_boundaries() {
        let truncator = Truncator {
            max_chars: 8,
            max_lines: 2_000,
            reserve_tail: true,
        };
        let out = truncator.truncate("café 日本語 noël");
        assert!(out.starts_with("café"));
        assert!(out.ends_with("noël"));
    }

    #[test]
    fn line_cap_applies_before_char_cap() {
        let truncator = Truncator {
            max_chars: 1_000_000,
            max_lines: 2,
            reserve_tail: false,
        };
        let out = truncator.truncate("a\nb\nc\nd\n");
        assert!(out.contains("omitted"));
        assert!(out.starts_with("a\nb"));
    }
}
