use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use courier_core::types::{Event, FallbackContext, Turn};

const RETRIEVAL_INSTRUCTIONS: &str = "\
Before answering, follow these steps:
1. Fetch recent memory episodes for this chat.
2. Search memory for any pending items relevant to the current messages.
3. If needed, search memory further to fill gaps in context.
4. Respond to the user with a single, concise message.
5. Persist a short summary of this exchange back to memory.";

/// Assembles the ordered prompt sections described in the design: system
/// context, recent conversation, retrieval instructions, current messages,
/// and an optional fallback-context section. Pure function of its inputs.
pub fn assemble_prompt(chat_id: &str, timezone: &str, history: &[Turn], events: &[Event], fallback: Option<&FallbackContext>) -> String {
    let mut sections = Vec::new();

    sections.push(system_context(chat_id, timezone));

    if !history.is_empty() {
        sections.push(recent_conversation(history));
    }

    sections.push(RETRIEVAL_INSTRUCTIONS.to_string());

    sections.push(current_messages(events));

    if let Some(fb) = fallback {
        sections.push(fallback_section(fb));
    }

    sections.join("\n\n")
}

fn system_context(chat_id: &str, timezone: &str) -> String {
    let now = local_now(timezone);
    format!(
        "You are a personal assistant responding to a single Telegram chat.\n\
         Respond with one concise textual message to the user; do not add meta-commentary \
         about your own reasoning process. Use formatting sparingly.\n\
         Current time: {now}\n\
         Chat: {chat_id}"
    )
}

fn local_now(timezone: &str) -> String {
    match timezone.parse::<Tz>() {
        Ok(tz) => Utc::now().with_timezone(&tz).to_rfc3339(),
        Err(_) => Utc::now().to_rfc3339(),
    }
}

fn recent_conversation(history: &[Turn]) -> String {
    let mut out = String::from("Recent conversation:");
    for turn in history {
        out.push_str(&format!("\nUser: {}\nAssistant: {}", turn.user_text, turn.bot_response));
    }
    out
}

fn current_messages(events: &[Event]) -> String {
    #[derive(serde::Serialize)]
    struct Wire<'a> {
        text: &'a str,
        from: &'a str,
        timestamp: DateTime<Utc>,
    }
    let wire: Vec<Wire> = events
        .iter()
        .map(|e| Wire {
            text: &e.text,
            from: &e.from_name,
            timestamp: e.timestamp,
        })
        .collect();
    format!("Current messages:\n{}", serde_json::to_string(&wire).unwrap_or_default())
}

fn fallback_section(fb: &FallbackContext) -> String {
    format!("Previous interaction context (recovery from an earlier failure):\n{}", fb.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text: &str) -> Event {
        Event::new(text, "alice", "chat1", 1)
    }

    #[test]
    fn omits_recent_conversation_when_history_is_empty() {
        let prompt = assemble_prompt("chat1", "UTC", &[], &[event("hi")], None);
        assert!(!prompt.contains("Recent conversation"));
    }

    #[test]
    fn includes_recent_conversation_when_history_present() {
        let turn = Turn {
            id: 1,
            chat_id: "chat1".into(),
            user_text: "hello".into(),
            bot_response: "hi there".into(),
            duration_ms: None,
            created_at: Utc::now(),
        };
        let prompt = assemble_prompt("chat1", "UTC", &[turn], &[event("hi")], None);
        assert!(prompt.contains("Recent conversation"));
        assert!(prompt.contains("User: hello"));
        assert!(prompt.contains("Assistant: hi there"));
    }

    #[test]
    fn fallback_section_is_present_only_when_given() {
        let without = assemble_prompt("chat1", "UTC", &[], &[event("hi")], None);
        assert!(!without.contains("Previous interaction context"));

        let fb = FallbackContext {
            chat_id: "chat1".into(),
            stdout: "recovery hint".into(),
            updated_at: Utc::now(),
        };
        let with = assemble_prompt("chat1", "UTC", &[], &[event("hi")], Some(&fb));
        assert!(with.contains("Previous interaction context"));
        assert!(with.contains("recovery hint"));
    }

    #[test]
    fn current_messages_is_valid_json() {
        let prompt = assemble_prompt("chat1", "UTC", &[], &[event("hello world")], None);
        let json_part = prompt.split("Current messages:\n").nth(1).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(json_part).unwrap();
        assert_eq!(parsed[0]["text"], "hello world");
    }
}
