//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, TextCompletion)
//! but are themselves concrete structs, not traits.

mod documents;
mod extraction;
mod taxonomy;

pub use documents::{text_blocks, to_pretty_json, DocumentService};
pub use extraction::{ExtractOptions, ExtractionService};
pub use taxonomy::{EnrichReport, LeafOutcome, LeafReport, RefineOutcome, TaxonomyEngine, TaxonomyRules};
