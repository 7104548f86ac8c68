//! Rough token estimation.
//!
//! ASCII text averages about four characters per token; Hangul and other scripts come
//! closer to one token per character. Good enough for budgeting, not for billing.

const ASCII_CHARS_PER_TOKEN: usize = 4;

/// Estimate the number of tokens in `text`.
pub fn estimate_tokens(text: &str) -> usize {
    let (ascii, other) = text.chars().fold((0usize, 0usize), |(ascii, other), c| {
        if c.is_ascii() {
            (ascii + 1, other)
        } else {
            (ascii, other + 1)
        }
    });
    ascii.div_ceil(ASCII_CHARS_PER_TOKEN) + other
}
