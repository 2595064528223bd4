const TRUNCATED_MARKER: &str = "…";
pub const MAX_PREVIEW_CHARS: usize = 50;

/// Single-line excerpt of message text for log output.
pub fn text_preview(text: &str, max_chars: usize) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flattened.char_indices().nth(max_chars) {
        None => flattened,
        Some((end, _)) => format!("{}{TRUNCATED_MARKER}", &flattened[..end]),
    }
}
