//! Seal boundary selection for drafts that outgrow one message.
//!
//! Lengths are counted in characters, offsets returned in bytes. The break
//! characters stay with the sealed chunk so that sealed chunks concatenate
//! back to the original text.

/// Whether `text` holds more than `max_chars` characters.
pub(crate) fn exceeds(text: &str, max_chars: usize) -> bool {
    text.len() > max_chars && text.chars().nth(max_chars).is_some()
}

/// Number of characters in `text`.
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Characters before the hard limit that a seal may give up for a clean
/// break: `lookback_chars`, but never more than a quarter of the message.
fn lookback_window(max_chars: usize, lookback_chars: usize) -> usize {
    lookback_chars.min(max_chars / 4)
}

/// Byte offset at which `text` should be sealed so that the head holds at
/// most `max_chars` characters.
///
/// Looks back from the hard limit for a paragraph break, then a line break,
/// then any whitespace. Falls back to a hard cut at `max_chars`. Returns
/// `text.len()` when everything fits.
pub(crate) fn seal_boundary(text: &str, max_chars: usize, lookback_chars: usize) -> usize {
    let max_chars = max_chars.max(1);
    let Some((hard, _)) = text.char_indices().nth(max_chars) else {
        return text.len();
    };

    let first = max_chars - lookback_window(max_chars, lookback_chars);
    let window_start = text.char_indices().nth(first).map_or(0, |(i, _)| i);
    let window = &text[window_start..hard];

    window
        .rfind("\n\n")
        .map(|i| i + 2)
        .or_else(|| window.rfind('\n').map(|i| i + 1))
        .or_else(|| {
            window
                .char_indices()
                .rev()
                .find(|(_, c)| c.is_whitespace())
                .map(|(i, c)| i + c.len_utf8())
        })
        .map_or(hard, |rel| window_start + rel)
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("hello", 10, 5)]
    #[case("hello", 5, 5)]
    #[case("abcdefghij", 4, 4)]
    #[case("hello world foo", 12, 12)]
    #[case("hello world foo", 10, 10)]
    #[case("one two\nthree", 9, 8)]
    #[case("para\n\nnext line here", 16, 16)]
    fn boundary_cases(#[case] text: &str, #[case] max: usize, #[case] expected: usize) {
        assert_eq!(seal_boundary(text, max, 200), expected);
    }

    #[test]
    fn paragraph_break_beats_later_space() {
        let text = format!("{}\n\nbody words more", "x".repeat(30));
        let cut = seal_boundary(&text, 40, 200);
        assert_eq!(cut, 32);
        assert!(text[..cut].ends_with("\n\n"));
    }

    #[test]
    fn line_break_beats_later_space() {
        let text = format!("{}\nabc def ghij", "x".repeat(30));
        assert_eq!(seal_boundary(&text, 40, 200), 31);
    }

    #[rstest]
    #[case(50, 200, 12)]
    #[case(4000, 200, 200)]
    #[case(8, 200, 2)]
    #[case(3, 200, 0)]
    fn lookback_is_a_quarter_of_the_message_at_most(
        #[case] max: usize,
        #[case] lookback: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(lookback_window(max, lookback), expected);
    }

    #[test]
    fn early_whitespace_does_not_shrink_the_chunk() {
        let text = format!("a {}", "x".repeat(60));
        assert_eq!(seal_boundary(&text, 50, 200), 50);
    }

    #[test]
    fn break_outside_lookback_is_ignored() {
        let text = format!("ab {}", "x".repeat(50));
        let cut = seal_boundary(&text, 40, 10);
        assert_eq!(cut, 40);
    }

    #[test]
    fn zero_lookback_hard_cuts() {
        assert_eq!(seal_boundary("aaa bbb ccc", 6, 0), 6);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "ллллл";
        let cut = seal_boundary(text, 3, 0);
        assert_eq!(&text[..cut], "ллл");
        assert!(!exceeds("ллл", 3));
        assert!(exceeds("лллл", 3));
        assert_eq!(char_len("лл"), 2);
    }

    #[test]
    fn unicode_whitespace_boundary() {
        let text = format!("{}ab\u{3000}cdef", "x".repeat(20));
        let cut = seal_boundary(&text, 24, 10);
        assert!(text[..cut].ends_with("ab\u{3000}"));
        assert_eq!(char_len(&text[..cut]), 23);
    }

    #[test]
    fn zero_max_is_treated_as_one() {
        assert_eq!(seal_boundary("abc", 0, 0), 1);
    }

    #[test]
    fn long_text_seals_at_word_within_limit() {
        let text = "lorem ipsum ".repeat(375);
        assert_eq!(char_len(&text), 4500);
        let cut = seal_boundary(&text, 4000, 200);
        let head = &text[..cut];
        assert!(char_len(head) <= 4000);
        assert!(head.ends_with(' '));
        assert!(char_len(head) > 3800);
        assert_eq!(format!("{head}{}", &text[cut..]), text);
    }
}
