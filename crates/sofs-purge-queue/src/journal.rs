//! Contract for the journaled log backing the purge queue.

use async_trait::async_trait;
use bytes::Bytes;
use sofs_types::Result;

use crate::item::FileLayout;

/// The append-only durable log the purge queue records intents in.
///
/// The log is offset-addressable: every appended entry occupies a byte
/// range, positions increase strictly with append order, and the prefix up
/// to the expire position may be physically reclaimed. One instance serves
/// as both writer and reader; the read position survives restarts at the
/// first entry not yet covered by the expire position.
#[async_trait]
pub trait PurgeJournal: Send + Sync {
    /// Replay the head and position the reader at the first unexecuted
    /// entry. Must complete before the journal is written or read.
    async fn recover(&self) -> Result<()>;

    /// Initialise a fresh, empty journal with the given layout for its
    /// backing objects.
    async fn create(&self, layout: &FileLayout) -> Result<()>;

    /// Mark the journal writable. Called once recover/create succeeds.
    fn set_writeable(&self);

    fn is_writeable(&self) -> bool;

    /// Whether a fully durable entry is available at the read position.
    fn is_readable(&self) -> bool;

    /// Buffer an entry for durable write. Returns immediately; durability
    /// is established by the next `flush`.
    fn append_entry(&self, entry: Bytes);

    /// Make all prior appends durable.
    async fn flush(&self) -> Result<()>;

    /// Resolve the next time `is_readable` becomes true. At most one
    /// waiter may be registered at a time; callers check `have_waiter`
    /// first. Resolves with an error if the journal shuts down first.
    async fn wait_for_readable(&self) -> Result<()>;

    /// Whether a `wait_for_readable` call is currently pending.
    fn have_waiter(&self) -> bool;

    /// Non-blocking read of the next entry. Must only be called while
    /// `is_readable` holds.
    fn try_read_entry(&self) -> Option<Bytes>;

    /// Offset of the entry that would be read next; after a successful
    /// `try_read_entry` this is the offset just past the returned entry.
    fn read_pos(&self) -> u64;

    /// Offset past the last appended entry.
    fn write_pos(&self) -> u64;

    /// Largest offset whose entries have all been executed.
    fn expire_pos(&self) -> u64;

    /// Advance the expire position. Never moves backwards.
    fn set_expire_pos(&self, pos: u64);

    /// Physically reclaim the log up to the expire position.
    fn trim(&self);

    /// Stop the journal: wake any pending waiter with an error and refuse
    /// further writes.
    fn shutdown(&self);
}
