//! File extraction and graph synchronization

pub mod coordinator;
pub mod extractor;
pub mod languages;
pub mod registry;
pub mod sync;

#[cfg(test)]
pub mod tests;

pub use coordinator::{Coordinator, ReconcileError, ReconcileReport};
pub use extractor::{ExtractError, LanguageExtractor, decode};
pub use registry::{Classification, ExtractorRegistry, IgnoreReason, Matched, Registration};
pub use sync::{DEFAULT_SYNC_TIMEOUT, GraphSync, SyncError, SyncOutcome};
