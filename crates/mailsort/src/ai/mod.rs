//! AI-assisted email categorization.
//!
//! Wraps an OpenAI-compatible chat-completions endpoint: the classifier
//! builds a single-turn prompt from a message and the user's category set,
//! requests a JSON-object completion, and parses it strictly.

pub mod classifier;

pub use classifier::{Categorize, ClassifierError, EmailCategorization, EmailClassifier};
