//! Storage Engine Module
//!
//! The shared in-memory key-value store. It is wrapped in an `Arc` and
//! handed to every connection; all access goes through atomic `get`/`set`.
//!
//! ## Example
//!
//! ```
//! use linekv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//! engine.set("foo", "bar");
//! assert_eq!(engine.get("foo").as_deref(), Some("bar"));
//! ```

pub mod engine;

pub use engine::{StorageEngine, StorageStats};
