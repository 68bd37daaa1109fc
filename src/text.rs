/// Marker appended to text cut short by [`truncate_text`].
pub const ELLIPSIS: &str = "...";

/// Caps `text` at `max_chars` characters, ellipsis included. Counts chars, not bytes,
/// so multi-byte text is never split inside a code point.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= ELLIPSIS.len() {
        return text.chars().take(max_chars).collect();
    }
    let kept: String = text.chars().take(max_chars - ELLIPSIS.len()).collect();
    format!("{}{ELLIPSIS}", kept.trim_end())
}

/// Collapses every whitespace run into a single space and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    append_words(&mut out, text);
    out
}

pub(crate) fn append_words(out: &mut String, text: &str) {
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
}

/// Uppercases the first letter of every alphabetic run and lowercases the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// Truncates every item and keeps at most `max_items` of them.
pub fn cap_list(items: &[String], max_items: usize, max_chars: usize) -> Vec<String> {
    items
        .iter()
        .take(max_items)
        .map(|item| truncate_text(item, max_chars))
        .collect()
}
