mod keyfile;

pub use keyfile::{ChainKeys, KeyFile};
