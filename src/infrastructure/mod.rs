//! Infrastructure layer: I/O implementations and DI container
//!
//! This layer implements I/O boundary traits and wires up services.

pub mod completion;
pub mod di;
pub mod error;
pub mod prompts;
pub mod traits;

pub use completion::MessagesCompletion;
pub use error::{InfraError, InfraResult};
pub use prompts::PromptCatalog;
pub use traits::{CompletionError, FileSystem, PromptName, RealFileSystem, TextCompletion};
