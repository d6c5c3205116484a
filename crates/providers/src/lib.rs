//! LLM Provider implementations for Parley.
//!
//! All providers implement the `parley_core::Provider` trait. The bot talks
//! to a single OpenAI-compatible endpoint chosen by configuration.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
