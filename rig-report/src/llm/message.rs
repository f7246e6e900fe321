//! Chat messages exchanged with LLM providers

use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self { role: Role::User, content: content.to_string() }
    }

    pub fn assistant(content: &str) -> Self {
        Self { role: Role::Assistant, content: content.to_string() }
    }

    pub fn system(content: &str) -> Self {
        Self { role: Role::System, content: content.to_string() }
    }
}

/// Join all system messages into a single preamble.
///
/// Rig agents accept one preamble, so multiple system messages are
/// separated by a blank line. Returns `None` when there are none.
pub fn extract_system_preamble(messages: &[Message]) -> Option<String> {
    let system_messages: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    if system_messages.is_empty() {
        None
    } else {
        Some(system_messages.join("\n\n"))
    }
}

/// The last user message, used as the prompt for single-turn agents
pub fn last_user_prompt(messages: &[Message]) -> String {
    messages
        .iter()
        .rfind(|m| m.role == Role::User)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}
