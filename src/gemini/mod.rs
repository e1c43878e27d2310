//! Gemini generative-language API: generation, model selection, embeddings.

pub mod client;
pub mod embed;
pub mod models;
pub mod retry;
pub mod types;

pub use client::{GeminiClient, GeminiError, InlineImage, Prompt, TextGenerator};
pub use embed::GeminiEmbedder;
