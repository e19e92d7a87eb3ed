use marketer_core::domain::session::{ChatEntry, UserSession};

use crate::llm::GenerationRequest;

pub const FREE_CHAT_SYSTEM_PROMPT: &str =
    "You are AI marketer 360°. Answer briefly and to the point, considering the diagnostic context.";

pub const FREE_CHAT_HINT: &str =
    "You can ask follow-up questions in free form.\nTo exit, press '⬅️ Main menu'.";

/// Free-form follow-up chat grounded in the diagnostic answers.
///
/// A turn is `begin_turn` → generation → `finish_turn`. A failed generation leaves the
/// pending user entry for the caller to drop by restoring the session snapshot.
#[derive(Clone, Copy, Debug)]
pub struct FreeChat {
    temperature: f32,
}

impl FreeChat {
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }

    pub fn begin_turn(&self, session: &mut UserSession, text: &str) -> GenerationRequest {
        session.push_chat(ChatEntry::user(text.trim()));
        GenerationRequest {
            system: vec![
                FREE_CHAT_SYSTEM_PROMPT.to_owned(),
                format!("Diagnostic context: {}", session.answers_json()),
            ],
            messages: session.chat_history.clone(),
            temperature: self.temperature,
        }
    }

    pub fn finish_turn(&self, session: &mut UserSession, answer: &str) {
        session.push_chat(ChatEntry::assistant(answer));
    }
}

#[cfg(test)]
mod tests {
    use marketer_core::domain::session::{ChatRole, UserSession, CHAT_HISTORY_LIMIT};

    use super::{FreeChat, FREE_CHAT_SYSTEM_PROMPT};

    #[test]
    fn request_carries_preamble_and_answers_context() {
        let chat = FreeChat::new(0.6);
        let mut session = UserSession::default();
        session.answers.insert("niche".to_owned(), "dental clinic".to_owned());

        let request = chat.begin_turn(&mut session, "  how do I get more patients?  ");

        assert_eq!(request.system[0], FREE_CHAT_SYSTEM_PROMPT);
        assert_eq!(request.system[1], r#"Diagnostic context: {"niche":"dental clinic"}"#);
        assert_eq!(request.last_user_text(), Some("how do I get more patients?"));
        assert_eq!(request.temperature, 0.6);
    }

    #[test]
    fn history_keeps_latest_entries_only() {
        let chat = FreeChat::new(0.6);
        let mut session = UserSession::default();

        for turn in 0..20 {
            chat.begin_turn(&mut session, &format!("question {turn}"));
            chat.finish_turn(&mut session, &format!("answer {turn}"));
        }

        assert_eq!(session.chat_history.len(), CHAT_HISTORY_LIMIT);
        let last = session.chat_history.last().expect("history not empty");
        assert_eq!(last.role, ChatRole::Assistant);
        assert_eq!(last.text, "answer 19");
        assert_eq!(session.chat_history[0].text, "question 14");
    }
}
