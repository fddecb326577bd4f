pub mod catalog;
pub mod comparison;
pub mod package;
pub mod selection;
pub mod unified;

pub use catalog::{
    AttributeDefinition, AttributeDomain, AttributeSpec, CandidateItem, Cardinality,
    CatalogRecord, Qualifier, ResolvedAttribute, ScoredRecord,
};
pub use comparison::{ComparisonDetail, ComparisonSummary};
pub use package::{AgentFinalPayload, FinalCodingPackage, FinalCodingResult};
pub use selection::{ChosenAttribute, Selection};
pub use unified::{
    AppliedAttributes, CatalogListing, SearchStatus, UnifiedResponse, UnifiedResultItem,
};
