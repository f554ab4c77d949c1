//! Readiness classification for interactive stages.
//!
//! Two independent signals, either of which triggers compilation:
//!
//! 1. the assistant emits an out-of-band marker token once it judges
//!    the gathered information sufficient;
//! 2. the user explicitly asks for the draft.
//!
//! Both are pure functions, decoupled from the streaming machinery so
//! the precision/recall tradeoff can be tuned (and tested) in
//! isolation. The marker is stripped before any transcript is
//! persisted or shown to a human.

use quillflow_store::{ChatMessage, ChatRole, Stage};

/// Out-of-band token the assistant appends when the interview has
/// gathered enough information to compile.
pub const READY_MARKER: &str = "[[READY_TO_DRAFT]]";

/// Phrases treated as an explicit user request to compile now.
/// Matched case-insensitively against the user's latest message.
const COMPILE_PHRASES: &[&str] = &[
    "draft it",
    "compile",
    "write it up",
    "write the draft",
    "write the brief",
    "make the draft",
    "generate the document",
    "go ahead and draft",
    "ready for the draft",
];

/// Did the assistant's reply carry the readiness marker?
pub fn assistant_signals_ready(reply: &str) -> bool {
    reply.contains(READY_MARKER)
}

/// Remove the marker so it never reaches a human transcript.
pub fn strip_ready_marker(text: &str) -> String {
    let stripped = text.replace(READY_MARKER, "");
    stripped.trim_end().to_string()
}

/// Is this user utterance an explicit request to compile?
pub fn user_requested_compile(utterance: &str) -> bool {
    let lowered = utterance.to_lowercase();
    COMPILE_PHRASES.iter().any(|p| lowered.contains(p))
}

/// Combined readiness check over the transcript tail of one stage.
///
/// Looks at the most recent user message for compile intent and the
/// most recent assistant message for the marker (the marker only
/// survives in un-persisted text; persisted transcripts are already
/// stripped).
pub fn ready_to_compile(transcript: &[ChatMessage], stage: Stage) -> bool {
    let tail = transcript
        .iter()
        .rev()
        .filter(|m| m.stage == Some(stage));

    let mut saw_user = false;
    let mut saw_assistant = false;
    for message in tail {
        match message.role {
            ChatRole::User if !saw_user => {
                saw_user = true;
                if user_requested_compile(&message.content) {
                    return true;
                }
            }
            ChatRole::Assistant if !saw_assistant => {
                saw_assistant = true;
                if assistant_signals_ready(&message.content) {
                    return true;
                }
            }
            _ => {}
        }
        if saw_user && saw_assistant {
            break;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillflow_store::SessionId;

    fn msg(role: ChatRole, content: &str) -> ChatMessage {
        ChatMessage::new(SessionId::new(), Some(Stage::Brief), role, content)
    }

    #[test]
    fn test_marker_detection() {
        assert!(assistant_signals_ready(
            "I have what I need. [[READY_TO_DRAFT]]"
        ));
        assert!(!assistant_signals_ready("What is the audience?"));
    }

    #[test]
    fn test_marker_stripped_exactly() {
        let reply = "I have what I need.\n\n[[READY_TO_DRAFT]]";
        assert_eq!(strip_ready_marker(reply), "I have what I need.");
    }

    #[test]
    fn test_user_compile_intent() {
        assert!(user_requested_compile("Looks good, draft it please"));
        assert!(user_requested_compile("COMPILE"));
        assert!(!user_requested_compile("Tell me about the timeline"));
    }

    #[test]
    fn test_ready_from_user_signal() {
        let transcript = vec![
            msg(ChatRole::Assistant, "What is the budget?"),
            msg(ChatRole::User, "About 50k. Now write the brief."),
        ];
        assert!(ready_to_compile(&transcript, Stage::Brief));
    }

    #[test]
    fn test_ready_from_assistant_marker() {
        let transcript = vec![
            msg(ChatRole::User, "That covers everything."),
            msg(ChatRole::Assistant, "Understood. [[READY_TO_DRAFT]]"),
        ];
        assert!(ready_to_compile(&transcript, Stage::Brief));
    }

    #[test]
    fn test_not_ready_mid_interview() {
        let transcript = vec![
            msg(ChatRole::Assistant, "What is the audience?"),
            msg(ChatRole::User, "Mostly internal teams."),
        ];
        assert!(!ready_to_compile(&transcript, Stage::Brief));
    }

    #[test]
    fn test_only_latest_user_message_counts() {
        let transcript = vec![
            msg(ChatRole::User, "draft it"),
            msg(ChatRole::Assistant, "First, what is the audience?"),
            msg(ChatRole::User, "Internal teams."),
        ];
        assert!(!ready_to_compile(&transcript, Stage::Brief));
    }

    #[test]
    fn test_other_stage_messages_ignored() {
        let transcript = vec![ChatMessage::new(
            SessionId::new(),
            Some(Stage::Requirements),
            ChatRole::User,
            "draft it",
        )];
        assert!(!ready_to_compile(&transcript, Stage::Brief));
    }
}
