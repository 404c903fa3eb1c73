//! Chat-id allowlist enforcement for the Telegram adapter.
//!
//! Deny-by-default: an empty allow-list means no chat is permitted.

/// Returns `true` when `chat_id` is permitted to interact with the bot.
pub fn is_allowed(allowed_chat_ids: &[i64], chat_id: i64) -> bool {
    allowed_chat_ids.contains(&chat_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_denies_all() {
        assert!(!is_allowed(&[], 111));
    }

    #[test]
    fn matches_a_listed_chat_id() {
        assert!(is_allowed(&[111, 222], 111));
        assert!(!is_allowed(&[111, 222], 333));
    }
}
