//! Token estimation and text chunking.
//!
//! One token is taken to be four characters (Unicode scalar values). Chunks
//! are cut at `4 * budget` characters, which makes the chunk count of a text
//! with estimate `T` exactly `ceil(T / budget)`.

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimated token count of `text`: `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Split `text` into consecutive slices, each estimated at most `budget`.
///
/// Concatenating the result gives back `text`. An empty text yields one
/// empty chunk.
pub fn split_chunks(text: &str, budget: usize) -> Vec<&str> {
    let max_chars = budget.max(1) * CHARS_PER_TOKEN;
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in text.char_indices() {
        if count == max_chars {
            chunks.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    chunks.push(&text[start..]);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("Hello world"), 3);
    }

    #[test]
    fn estimate_counts_chars_not_bytes() {
        // 4 chars, 12 bytes
        assert_eq!(estimate_tokens("日本語字"), 1);
    }

    #[test]
    fn chunk_count_law() {
        for (len, budget) in [(500, 10), (40, 10), (41, 10), (1, 1), (9_999, 7), (12, 3)] {
            let text = "x".repeat(len);
            let estimate = estimate_tokens(&text);
            let chunks = split_chunks(&text, budget);

            assert_eq!(chunks.len(), estimate.div_ceil(budget), "len={len} budget={budget}");
            assert!(chunks.iter().all(|c| estimate_tokens(c) <= budget));
            assert_eq!(chunks.concat(), text);
        }
    }

    #[test]
    fn splits_on_char_boundaries() {
        let text = "é".repeat(9);
        let chunks = split_chunks(&text, 1);
        assert_eq!(chunks, vec!["éééé", "éééé", "é"]);
    }

    #[test]
    fn word_text_scenario() {
        let text = "word ".repeat(100);
        assert_eq!(estimate_tokens(&text), 125);
        let chunks = split_chunks(&text, 10);
        assert_eq!(chunks.len(), 13);
        assert_eq!(chunks[12].chars().count(), 20);
    }
}
