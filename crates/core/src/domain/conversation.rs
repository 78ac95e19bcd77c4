use serde::{Deserialize, Serialize};

/// Instruction pinned as the first message of every conversation. It is sent
/// to the LLM on every turn but never shown to the user.
pub const SYSTEM_INSTRUCTION: &str = "You are a helpful shipment assistant. Your role is to:\n\
1. Help users track their shipments and provide status updates\n\
2. Answer questions about shipping services and tracking numbers\n\
3. Explain shipping statuses and estimated delivery times\n\
4. Provide clear and concise responses\n\
Always maintain a professional and friendly tone.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Ordered, append-only chat history.
///
/// Element 0 is always the single system message; everything after it is the
/// user/assistant exchange in insertion order. Insertion order is both the
/// display order and the LLM-context order. Past messages are never mutated
/// or reordered - turn handlers only append.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_system_instruction(SYSTEM_INSTRUCTION)
    }

    pub fn with_system_instruction(content: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage { role: Role::System, content: content.into() }],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage { role: Role::User, content: content.into() });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage { role: Role::Assistant, content: content.into() });
    }

    /// Full ordered sequence, system message included. This is what goes to
    /// the LLM gateway.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The displayable subset: everything except the system message.
    pub fn visible(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|message| message.role != Role::System)
    }

    pub fn last_assistant(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .map(|message| message.content.as_str())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
