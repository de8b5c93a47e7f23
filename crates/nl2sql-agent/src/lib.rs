//! LLM-backed SQL agent speaking the OpenAI chat-completions protocol
//! (Groq by default).

pub mod openai;
pub mod prompts;
pub mod reply;
