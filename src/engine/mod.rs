pub mod agentic;
pub mod assembler;
pub mod browser;
pub mod context;
pub mod enhancer;
pub mod prompt;
pub mod reconciler;
pub mod retriever;
pub mod selector;
pub mod workflow;

pub use agentic::AgenticCodingOrchestrator;
pub use assembler::RubricAssembler;
pub use browser::{CatalogBrowser, Neighbourhood};
pub use context::EngineContext;
pub use enhancer::SingleModelEnhancer;
pub use prompt::SelectionPromptBuilder;
pub use reconciler::{DualModelReconciler, DualReconciliation};
pub use retriever::CandidateRetriever;
pub use selector::ModelSelector;
