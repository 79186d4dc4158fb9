//! Text generation used to annotate search results
//!
//! Only simple, non-streaming calls are needed: one system prompt, one user
//! message, one text reply.

pub mod client;

pub use client::{create_client, GenerationClient, HttpGenerationClient, LazyGenerationClient};

#[cfg(test)]
pub mod testing;
