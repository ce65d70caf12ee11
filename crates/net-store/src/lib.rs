//! netd Network Store
//!
//! Persistent storage of network records, shared by every node of the
//! cluster, plus the instance and profile inventory used for usage checks.

pub mod file;
pub mod lock;
pub mod memory;
mod record;

#[cfg(test)]
mod tests;

pub use file::FileStore;
pub use lock::{LockInfo, StoreLock, LOCK_TIMEOUT};
pub use memory::{MemoryStore, StoreOp};
