//! Text helpers for Telegram's message limits.

/// Telegram's limit for a text message, in characters
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Byte index of the `n`th character, or the end of the string
fn char_boundary(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map(|(i, _)| i).unwrap_or(text.len())
}

/// Split a message into chunks of at most `max_len` characters, breaking at
/// line ends where possible
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 || text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();
        let separator = usize::from(!current.is_empty());
        if current_len + separator + line_len > max_len {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            // If single line is too long, split it
            let mut remaining = line;
            while remaining.chars().count() > max_len {
                let cut = char_boundary(remaining, max_len);
                chunks.push(remaining[..cut].to_string());
                remaining = &remaining[cut..];
            }
            current_len = remaining.chars().count();
            current = remaining.to_string();
        } else {
            if separator == 1 {
                current.push('\n');
            }
            current.push_str(line);
            current_len += separator + line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Cut `text` to `max_len` characters, marking the cut with an ellipsis
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let keep = max_len.saturating_sub(1);
    format!("{}…", &text[..char_boundary(text, keep)])
}
