//! Splitting long replies into platform-sized messages.

use serde::Serialize;

/// Telegram message size limit, in characters.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Characters a message may be split after.
const BOUNDARIES: [char; 5] = ['\n', '.', '!', '?', ' '];

/// One segment of a split reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub text: String,
    /// 1-based position in the sequence.
    pub index: usize,
    pub total: usize,
}

impl OutboundMessage {
    /// Every segment after the first.
    #[must_use]
    pub fn is_continuation(&self) -> bool {
        self.index > 1
    }
}

/// Split `text` into segments of at most `max_len` characters.
///
/// Each cut lands right after the last newline, sentence terminator or space
/// in the window; a window without any of those is hard-cut at `max_len`.
/// Leading whitespace of the remainder is dropped after every cut. Empty input
/// yields a single empty segment.
pub fn split(text: &str, max_len: usize) -> Vec<OutboundMessage> {
    let max_len = max_len.max(1);

    let mut parts: Vec<&str> = Vec::new();
    let mut remaining = text;
    loop {
        let window: Vec<(usize, char)> = remaining.char_indices().take(max_len + 1).collect();
        if window.len() <= max_len {
            if !remaining.is_empty() || parts.is_empty() {
                parts.push(remaining);
            }
            break;
        }

        let cut = window[1..max_len]
            .iter()
            .rev()
            .find(|(_, c)| BOUNDARIES.contains(c))
            .map_or(window[max_len].0, |(i, c)| i + c.len_utf8());

        parts.push(&remaining[..cut]);
        remaining = remaining[cut..].trim_start();
    }

    let total = parts.len();
    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| OutboundMessage {
            text: part.to_string(),
            index: i + 1,
            total,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn texts(parts: &[OutboundMessage]) -> Vec<&str> {
        parts.iter().map(|p| p.text.as_str()).collect()
    }

    /// Rebuild the input by re-inserting the whitespace dropped between segments.
    fn reconstruct(original: &str, parts: &[OutboundMessage]) -> String {
        let mut out = String::new();
        let mut rest = original;
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                let trimmed = rest.trim_start();
                out.push_str(&rest[..rest.len() - trimmed.len()]);
                rest = trimmed;
            }
            assert!(rest.starts_with(&part.text), "segment out of order");
            out.push_str(&part.text);
            rest = &rest[part.text.len()..];
        }
        out.push_str(rest);
        out
    }

    #[rstest]
    #[case("", 4096)]
    #[case("hello", 4096)]
    #[case("exactly ten", 11)]
    #[case("no split needed at all", 100)]
    fn short_text_is_single_segment(#[case] text: &str, #[case] max_len: usize) {
        let parts = split(text, max_len);
        assert_eq!(parts, vec![OutboundMessage {
            text: text.to_string(),
            index: 1,
            total: 1,
        }]);
        assert!(!parts[0].is_continuation());
    }

    #[test]
    fn splits_after_last_space_before_limit() {
        let mut text = "a".repeat(4080);
        text.push(' ');
        text.push_str(&"b".repeat(5000 - 4081));
        assert_eq!(text.chars().count(), 5000);

        let parts = split(&text, 4096);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].text, text[..4081]);
        assert_eq!(parts[1].text, text[4081..]);
        assert_eq!((parts[1].index, parts[1].total), (2, 2));
        assert!(parts[1].is_continuation());
    }

    #[test]
    fn splits_at_newline() {
        let parts = split("line1\nline2\nline3", 9);
        assert_eq!(texts(&parts), vec!["line1\n", "line2\n", "line3"]);
    }

    #[test]
    fn strips_leading_whitespace_of_remainder() {
        let parts = split("alpha    beta", 6);
        assert_eq!(texts(&parts), vec!["alpha ", "beta"]);
    }

    #[test]
    fn sentence_terminators_are_boundaries() {
        let parts = split("Hi! Ok? Yes.Done", 6);
        assert_eq!(texts(&parts), vec!["Hi! ", "Ok? ", "Yes.", "Done"]);
    }

    #[test]
    fn hard_cut_without_boundaries() {
        let text = "x".repeat(10);
        let parts = split(&text, 4);
        assert_eq!(texts(&parts), vec!["xxxx", "xxxx", "xx"]);
        assert_eq!(parts[2].total, 3);
    }

    #[test]
    fn boundary_at_first_char_is_ignored() {
        // Cutting after index 0 would emit a one-char segment; hard-cut instead.
        let parts = split(".abcdefgh", 4);
        assert_eq!(texts(&parts), vec![".abc", "defg", "h"]);
    }

    #[test]
    fn trailing_whitespace_does_not_emit_empty_segment() {
        let parts = split("abc     ", 4);
        assert_eq!(texts(&parts), vec!["abc "]);
        assert_eq!(parts[0].total, 1);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "привет мир ".repeat(3);
        let parts = split(&text, 12);
        assert!(parts.iter().all(|p| p.text.chars().count() <= 12));
        assert_eq!(parts[0].text, "привет мир ");
    }

    #[test]
    fn zero_max_len_is_treated_as_one() {
        let parts = split("ab", 0);
        assert_eq!(texts(&parts), vec!["a", "b"]);
    }

    #[rstest]
    #[case("Lorem ipsum dolor sit amet. Consectetur!\n\nAdipiscing elit?  Sed do.".into(), 10)]
    #[case("word ".repeat(2000), 4096)]
    #[case("z".repeat(9000), 4096)]
    #[case("sentence one. ".repeat(700), 1000)]
    #[case("  leading and\n\n\n trailing   ".into(), 5)]
    fn round_trip_and_limits(#[case] text: String, #[case] max_len: usize) {
        let parts = split(&text, max_len);
        assert!(parts.iter().all(|p| p.text.chars().count() <= max_len));
        assert_eq!(reconstruct(&text, &parts), text);
        for (i, part) in parts.iter().enumerate() {
            assert_eq!(part.index, i + 1);
            assert_eq!(part.total, parts.len());
        }
    }
}
