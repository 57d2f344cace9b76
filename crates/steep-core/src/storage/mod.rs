//! Durable plugin state: the registry document and its lock marker.

pub mod lock;
pub mod store;

pub use lock::{LockFile, LockGuard};
pub use store::{RegistryStore, StoreGuard};
