//! Backing-store capability traits for the Meridian feature store.
//!
//! The feature store consumes exactly two external collaborators:
//!
//! - a sorted key-value store with conditional writes, atomic numeric
//!   updates, and prefix range scans ([`KeyValueStore`])
//! - a blob store for large feature payloads ([`BlobStore`])
//!
//! Both are modeled as explicit capability traits so production and test
//! implementations are interchangeable variants injected at construction.
//! This crate also ships the in-memory reference implementations
//! ([`MemoryKvStore`], [`MemoryBlobStore`]) used by the test suites and by
//! embedded deployments; production AWS adapters live in
//! `meridian-storage-aws`.

pub mod blob;
pub mod error;
pub mod item;
pub mod kv;

pub use blob::{BlobStore, MemoryBlobStore};
pub use error::{Error, Result};
pub use item::{item_dataset, item_id, AttrValue, Item, ATTR_DATASET, ATTR_ID};
pub use kv::{Condition, KeyValueStore, MemoryKvStore, UpdateAction, Updates};
