pub mod item_lock;

pub use item_lock::{ItemLock, ItemLockGuard};
