//! Dialogue turns and the append-only history of a conversation.

use serde::{Deserialize, Serialize};

/// Who produced a dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions.
    User,
    /// The generative model.
    Assistant,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    /// Who produced the message.
    pub role: Role,
    /// The message text.
    pub text: String,
}

impl DialogueTurn {
    /// A turn spoken by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    /// A turn produced by the assistant.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, text: text.into() }
    }
}

/// Ordered, append-only record of a conversation.
///
/// Turns are only ever added in user/assistant pairs, so the history always
/// alternates and has even length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueHistory {
    turns: Vec<DialogueTurn>,
}

impl DialogueHistory {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[DialogueTurn] {
        &self.turns
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no exchange has happened yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Iterate over `(question, answer)` pairs.
    pub fn exchanges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.turns.chunks_exact(2).map(|pair| (pair[0].text.as_str(), pair[1].text.as_str()))
    }

    /// Append a completed exchange.
    pub(crate) fn push_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(DialogueTurn::user(question));
        self.turns.push(DialogueTurn::assistant(answer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchanges_pair_questions_with_answers() {
        let mut history = DialogueHistory::new();
        history.push_exchange("q1", "a1");
        history.push_exchange("q2", "a2");

        assert_eq!(history.len(), 4);
        assert_eq!(history.turns()[0], DialogueTurn::user("q1"));
        assert_eq!(history.turns()[3].role, Role::Assistant);
        assert_eq!(history.exchanges().collect::<Vec<_>>(), vec![("q1", "a1"), ("q2", "a2")]);
    }

    #[test]
    fn serializes_roles_in_lowercase() {
        let json = serde_json::to_string(&DialogueTurn::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","text":"hi"}"#);
    }
}
