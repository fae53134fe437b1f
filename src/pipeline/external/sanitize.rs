// Sanitize transcript text before it leaves the process for external analysis.

/// Maximum transcript length sent to the model (characters).
pub const MAX_INPUT_LENGTH: usize = 20_000;

/// Strip invisible and control characters, then truncate at a word
/// boundary to [`MAX_INPUT_LENGTH`] characters.
pub fn sanitize_for_llm(raw: &str) -> String {
    let cleaned = remove_invisible_chars(raw);
    truncate_at_word_boundary(&cleaned, MAX_INPUT_LENGTH)
}

/// Remove zero-width, bidi-control and C0/C1 control characters.
/// Preserves standard whitespace (space, newline, tab, carriage return).
fn remove_invisible_chars(text: &str) -> String {
    text.chars()
        .filter(|c| {
            if matches!(*c, ' ' | '\n' | '\t' | '\r') {
                return true;
            }
            if matches!(
                *c,
                '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
            ) {
                return false;
            }
            !c.is_control()
        })
        .collect()
}

fn truncate_at_word_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let byte_end = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let head = &text[..byte_end];
    let cut = head.rfind(char::is_whitespace).unwrap_or(byte_end);
    head[..cut].trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_unchanged() {
        let text = "Attending: \"Good start.\"\nResident: \"Thanks.\"";
        assert_eq!(sanitize_for_llm(text), text);
    }

    #[test]
    fn invisible_chars_removed() {
        let text = "plan\u{200B} to\u{202E} escalate\u{FEFF}";
        assert_eq!(sanitize_for_llm(text), "plan to escalate");
    }

    #[test]
    fn control_chars_removed_whitespace_kept() {
        let text = "a\u{0007}b\tc\nd\u{0000}";
        assert_eq!(sanitize_for_llm(text), "ab\tc\nd");
    }

    #[test]
    fn long_text_truncated_on_word_boundary() {
        let text = "word ".repeat(5000);
        let out = sanitize_for_llm(&text);
        assert!(out.chars().count() <= MAX_INPUT_LENGTH);
        assert!(out.ends_with("word"));
    }

    #[test]
    fn single_huge_token_is_hard_cut() {
        let text = "x".repeat(MAX_INPUT_LENGTH + 10);
        assert_eq!(sanitize_for_llm(&text).chars().count(), MAX_INPUT_LENGTH);
    }

    #[test]
    fn multibyte_text_truncates_safely() {
        let text = "é ".repeat(MAX_INPUT_LENGTH);
        let out = sanitize_for_llm(&text);
        assert!(out.chars().count() <= MAX_INPUT_LENGTH);
        assert!(out.ends_with('é'));
    }
}
