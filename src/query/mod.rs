//! Natural-language questions answered from the mirror.

pub mod orchestrator;
pub mod prompts;
pub mod safety;

pub use orchestrator::{QueryError, QueryOrchestrator, QueryOutcome, QuerySettings, Resolution};
pub use safety::is_safe;
