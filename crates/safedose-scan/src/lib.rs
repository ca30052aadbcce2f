//! Prompting and response parsing for AI-assisted scans.
//!
//! A vision model reads a syringe and a vial label; this crate builds the
//! prompt and turns the model's free-text answer into calculator inputs
//! via the `safedose-core` unit parser. Inference itself happens elsewhere.

pub mod extraction;
pub mod prompts;

pub use extraction::*;
pub use prompts::*;
