pub mod catalog_range;

pub use catalog_range::{AgentToolCatalogRange, RangeArgs, RangeEntry};
