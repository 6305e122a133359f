//! Application layer: the replay processor, the resolver read surface,
//! and authoring services.

pub mod authoring;
pub mod processor;
pub mod resolver;

pub use authoring::{AuthoringService, NewDidParams, PreparedOperation};
pub use processor::{Processor, StepOutcome, SyncProgress};
pub use resolver::{HistoryEntry, Resolution, Resolver, Tombstone};
