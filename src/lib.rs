pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use engine::workflow::{CodingMode, CodingOutcome, CodingRequest, launch};
pub use error::{CodingError, CodingResult};
