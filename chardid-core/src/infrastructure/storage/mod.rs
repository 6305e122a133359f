pub mod memory;
pub mod rocks;
mod traits;

pub use memory::MemoryStore;
pub use rocks::RocksStore;
pub use traits::{ReplayStep, Store, StoreStatus};
