//! Durable purge queue for the sofs metadata server.
//!
//! Deleting a file commits quickly in metadata, but its striped data
//! objects can number in the millions and must be removed from the object
//! store asynchronously. This crate makes that deferral crash-safe: every
//! deletion intent is journaled before execution, removals run with bounded
//! concurrency, and the journal is reclaimed only behind a monotone expire
//! frontier that never passes an outstanding item.
//!
//! The journaled log and the object-store client are collaborators behind
//! the [`PurgeJournal`] and [`ObjectStore`] traits; [`mem`] provides
//! in-memory implementations for testing and lightweight use.

pub mod config;
pub mod item;
pub mod journal;
pub mod mem;
pub mod object_store;
pub mod queue;
pub mod striper;

pub use config::PurgeQueueConfig;
pub use item::{FileLayout, PurgeItem, SnapContext, inode_object_name};
pub use journal::PurgeJournal;
pub use mem::{MemJournal, MemObjectStore};
pub use object_store::{ObjectLocator, ObjectStore};
pub use queue::{AppendAck, PurgeQueue};
