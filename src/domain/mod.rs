//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod codec;
pub mod error;
pub mod payload;
pub mod posting;
pub mod segment;

pub use arena::{Attributes, SkillNode, SkillsTree, TERMINAL_ATTRIBUTE};
pub use error::{DomainError, DomainResult};
pub use posting::{JobPosting, RequirementLevel};
pub use segment::{SegmentClassifier, SegmentRule, SegmentedPosting};
