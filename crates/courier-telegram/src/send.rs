//! Message sending helpers for the Telegram adapter.
//!
//! Telegram's hard limit is 4096 characters per message.

use std::time::Duration;

use teloxide::prelude::*;
use tracing::warn;

/// Maximum characters per Telegram message.
const CHUNK_MAX: usize = 4096;

/// Split `text` into chunks of at most [`CHUNK_MAX`] characters.
///
/// Prefers splitting at the rightmost `\n\n` within the window, then the
/// rightmost `\n`, then the rightmost space, falling back to a hard cut.
/// Leading newlines of each chunk after the first are trimmed.
pub fn split_chunks(text: &str) -> Vec<String> {
    if text.chars().count() <= CHUNK_MAX {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let remaining = chars.len() - start;
        if remaining <= CHUNK_MAX {
            chunks.push(chars[start..].iter().collect());
            break;
        }

        let window = &chars[start..start + CHUNK_MAX];
        let split_at = rfind_double_newline(window)
            .or_else(|| window.iter().rposition(|&c| c == '\n'))
            .or_else(|| window.iter().rposition(|&c| c == ' '))
            .unwrap_or(CHUNK_MAX);

        let end = start + split_at;
        let chunk: String = chars[start..end].iter().collect();
        chunks.push(chunk);

        start = end;
        while start < chars.len() && chars[start] == '\n' {
            start += 1;
        }
    }

    chunks
}

fn rfind_double_newline(window: &[char]) -> Option<usize> {
    if window.len() < 2 {
        return None;
    }
    (0..=window.len() - 2).rev().find(|&i| window[i] == '\n' && window[i + 1] == '\n')
}

/// Send `text` to `chat_id`, splitting into chunks if it exceeds the Telegram limit.
///
/// Per-chunk send failures are logged and not retried. A small delay is
/// inserted between consecutive chunks to avoid hitting rate limits.
pub async fn send_response(bot: &Bot, chat_id: ChatId, text: &str) {
    let chunks = split_chunks(text);
    for (i, chunk) in chunks.iter().enumerate() {
        if let Err(e) = bot.send_message(chat_id, chunk).await {
            warn!(error = %e, chunk_index = i, "Telegram: failed to send message chunk");
        }

        if i + 1 < chunks.len() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = split_chunks("Hello, world!");
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn exactly_chunk_max_is_single_chunk() {
        let text = "a".repeat(CHUNK_MAX);
        let chunks = split_chunks(&text);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn splits_on_double_newline_when_present() {
        let para = "a".repeat(3000);
        let text = format!("{para}\n\n{para}\n\n{para}");
        let chunks = split_chunks(&text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.chars().count() <= CHUNK_MAX);
        }
        assert!(!chunks[1].starts_with('\n'));
    }

    #[test]
    fn falls_back_to_single_newline() {
        let line = "a".repeat(2000);
        let text = format!("{line}\n{line}\n{line}");
        let chunks = split_chunks(&text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.chars().count() <= CHUNK_MAX);
        }
    }

    #[test]
    fn falls_back_to_space() {
        let word = "a".repeat(10);
        let text = (0..1000).map(|_| word.clone()).collect::<Vec<_>>().join(" ");
        let chunks = split_chunks(&text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.chars().count() <= CHUNK_MAX);
        }
    }

    #[test]
    fn hard_cuts_when_no_boundary_found() {
        let text = "x".repeat(9000);
        let chunks = split_chunks(&text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.chars().count() <= CHUNK_MAX);
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn concatenation_round_trips_modulo_leading_newline_trim() {
        let para = "a".repeat(3000);
        let text = format!("{para}\n\n{para}");
        let chunks = split_chunks(&text);
        let rejoined = chunks.join("\n\n");
        assert_eq!(rejoined, text);
    }
}
