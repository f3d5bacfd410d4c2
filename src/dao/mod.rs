/// Persisted document shapes.
pub mod models;
/// Storage error types shared by every backend.
pub mod storage;
/// Realtime document tree abstraction and its backends.
pub mod tree_store;
