use serde::{Deserialize, Serialize};

pub const GREETING: &str = "Hi! I'm Ada, your assistant for the documents you have shared with Mesafold. How can I help you today?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Role::User => "Human",
            Role::Assistant => "AI",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Conversation state for one user. Owned by the caller and passed to every
/// turn; nothing here is global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    history: Vec<ChatMessage>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// A new session opens with the assistant greeting.
    pub fn new() -> Self {
        Self { history: vec![ChatMessage::assistant(GREETING)] }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::assistant(content));
    }

    /// Forget the whole conversation, greeting included.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// One `Human: ...` / `AI: ...` line per message.
    pub fn render_history(&self) -> String {
        self.history
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_greeting_and_reset_clears() {
        let mut session = ChatSession::new();
        assert_eq!(session.history(), &[ChatMessage::assistant(GREETING)]);

        session.push_user("What is in the manual?");
        session.push_assistant("A maintenance schedule.");
        assert_eq!(session.history().len(), 3);
        assert_eq!(
            session.render_history(),
            format!("AI: {GREETING}\nHuman: What is in the manual?\nAI: A maintenance schedule.")
        );

        session.reset();
        assert!(session.history().is_empty());
        assert_eq!(session.render_history(), "");
    }
}
