//! LLM Provider abstractions
//!
//! ```text
//! workflow nodes ──► StructuredOutput ──► LLMProvider (trait)
//!                                            ├── OpenAIProvider    (rig openai)
//!                                            └── AnthropicProvider (rig anthropic)
//! ```

mod anthropic;
mod config;
mod message;
mod openai;
mod provider;
mod structured;

pub use anthropic::AnthropicProvider;
pub use config::LLMConfig;
pub use message::{extract_system_preamble, last_user_prompt, Message, Role};
pub use openai::{OpenAIProvider, DEFAULT_OPENAI_MODEL};
pub use provider::{LLMProvider, LLMResponse};
pub use structured::{extract_json_block, parse_structured, StructuredOutput};
