use venta_core::domain::message::PART_SEPARATOR;

/// Replies shorter than this many words are never split.
pub const MULTI_PART_MIN_WORDS: usize = 20;
/// Upper bound on delivered parts; extras are merged into the middle part.
pub const MAX_PARTS: usize = 3;

/// Splits text into sentences at `.`/`!`/`?` runs followed by whitespace.
/// Trailing text without a terminator counts as a final sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.trim().chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if chars.peek().map_or(true, |c| c.is_whitespace()) {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
                let sentence = current.trim().to_string();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
            }
        }
    }

    let tail = current.trim().to_string();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// Groups whole sentences into parts of at most `max_words` words. A single
/// sentence longer than the budget becomes its own oversized part rather
/// than being cut mid-sentence.
pub fn split_into_parts(text: &str, max_words: usize) -> Vec<String> {
    let max_words = max_words.max(1);
    let mut parts = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_words = 0;

    for sentence in split_sentences(text) {
        let sentence_words = sentence.split_whitespace().count();
        if current_words + sentence_words > max_words && !current.is_empty() {
            parts.push(current.join(" "));
            current_words = sentence_words;
            current = vec![sentence];
        } else {
            current_words += sentence_words;
            current.push(sentence);
        }
    }

    if !current.is_empty() {
        parts.push(current.join(" "));
    }

    parts
}

/// Applies the multi-part delivery policy to a generated reply: when enabled
/// and the reply has at least [`MULTI_PART_MIN_WORDS`] words it is split into
/// at most [`MAX_PARTS`] sentence-aligned parts joined by the part separator.
pub fn apply_multi_part(text: &str, enabled: bool) -> String {
    if !enabled {
        return text.to_string();
    }

    let word_count = text.split_whitespace().count();
    if word_count < MULTI_PART_MIN_WORDS {
        return text.to_string();
    }

    let words_per_part =
        if word_count >= 30 { word_count / MAX_PARTS } else { word_count / 2 };
    let mut parts = split_into_parts(text, words_per_part);

    if parts.len() > MAX_PARTS {
        let middle = parts[1..parts.len() - 1].join(" ");
        parts = vec![parts[0].clone(), middle, parts[parts.len() - 1].clone()];
    }

    if parts.len() > 1 {
        parts.join(PART_SEPARATOR)
    } else {
        text.to_string()
    }
}
