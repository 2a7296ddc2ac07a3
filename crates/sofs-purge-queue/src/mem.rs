//! In-memory journal and object-store backends.
//!
//! Fully functional implementations of the [`PurgeJournal`] and
//! [`ObjectStore`] contracts suitable for testing and lightweight use. All
//! state lives in memory behind shared handles, so a "restarted" queue
//! constructed over a cloned backend observes everything its predecessor
//! made durable.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};

use sofs_types::{
    InodeId, JournalCode, PoolId, Result, SnapId, StoreCode, UtcTime, make_error, make_error_msg,
};

use crate::item::{FileLayout, SnapContext, inode_object_name};
use crate::journal::PurgeJournal;
use crate::object_store::{ObjectLocator, ObjectStore};

// ---------------------------------------------------------------------------
// MemJournal
// ---------------------------------------------------------------------------

/// Bytes of offset space each entry consumes beyond its payload (the
/// length prefix a real log would write).
pub const ENTRY_OVERHEAD: u64 = 4;

#[derive(Debug)]
struct JournalEntry {
    start: u64,
    end: u64,
    payload: Bytes,
}

#[derive(Debug, Default)]
struct JournalState {
    entries: VecDeque<JournalEntry>,
    write_pos: u64,
    flushed_pos: u64,
    read_pos: u64,
    expire_pos: u64,
    writeable: bool,
    stopped: bool,
    waiter: bool,
    fail_next_flush: bool,
    layout: Option<FileLayout>,
}

impl JournalState {
    fn next_entry(&self) -> Option<&JournalEntry> {
        self.entries.iter().find(|e| e.end > self.read_pos)
    }

    fn readable(&self) -> bool {
        self.next_entry().is_some_and(|e| e.end <= self.flushed_pos)
    }
}

/// In-memory journal sharing its state across clones.
#[derive(Clone, Default)]
pub struct MemJournal {
    state: Arc<Mutex<JournalState>>,
    readable: Arc<Notify>,
}

impl MemJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries not yet trimmed away.
    pub fn entry_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Layout the journal was created with, if any.
    pub fn layout(&self) -> Option<FileLayout> {
        self.state.lock().layout.clone()
    }

    /// Make the next `flush` fail, as a crashed backing store would.
    pub fn inject_flush_error(&self) {
        self.state.lock().fail_next_flush = true;
    }
}

#[async_trait]
impl PurgeJournal for MemJournal {
    async fn recover(&self) -> Result<()> {
        let mut st = self.state.lock();
        st.read_pos = st.expire_pos;
        st.writeable = false;
        st.stopped = false;
        Ok(())
    }

    async fn create(&self, layout: &FileLayout) -> Result<()> {
        let mut st = self.state.lock();
        st.entries.clear();
        st.write_pos = 0;
        st.flushed_pos = 0;
        st.read_pos = 0;
        st.expire_pos = 0;
        st.stopped = false;
        st.layout = Some(layout.clone());
        Ok(())
    }

    fn set_writeable(&self) {
        self.state.lock().writeable = true;
    }

    fn is_writeable(&self) -> bool {
        self.state.lock().writeable
    }

    fn is_readable(&self) -> bool {
        self.state.lock().readable()
    }

    fn append_entry(&self, entry: Bytes) {
        let mut st = self.state.lock();
        debug_assert!(st.writeable, "append on a read-only journal");
        let start = st.write_pos;
        let end = start + ENTRY_OVERHEAD + entry.len() as u64;
        st.entries.push_back(JournalEntry {
            start,
            end,
            payload: entry,
        });
        st.write_pos = end;
    }

    async fn flush(&self) -> Result<()> {
        {
            let mut st = self.state.lock();
            if st.stopped {
                return make_error(JournalCode::SHUT_DOWN);
            }
            if st.fail_next_flush {
                st.fail_next_flush = false;
                return make_error_msg(JournalCode::WRITE_FAILED, "injected flush failure");
            }
            st.flushed_pos = st.write_pos;
        }
        self.readable.notify_waiters();
        Ok(())
    }

    async fn wait_for_readable(&self) -> Result<()> {
        {
            let mut st = self.state.lock();
            debug_assert!(!st.waiter, "a readable waiter is already registered");
            st.waiter = true;
        }
        loop {
            let notified = self.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut st = self.state.lock();
                if st.stopped {
                    st.waiter = false;
                    return make_error(JournalCode::SHUT_DOWN);
                }
                if st.readable() {
                    st.waiter = false;
                    return Ok(());
                }
            }
            notified.await;
        }
    }

    fn have_waiter(&self) -> bool {
        self.state.lock().waiter
    }

    fn try_read_entry(&self) -> Option<Bytes> {
        let mut st = self.state.lock();
        if !st.readable() {
            return None;
        }
        let entry = st.next_entry().expect("readable implies a next entry");
        let (end, payload) = (entry.end, entry.payload.clone());
        st.read_pos = end;
        Some(payload)
    }

    fn read_pos(&self) -> u64 {
        self.state.lock().read_pos
    }

    fn write_pos(&self) -> u64 {
        self.state.lock().write_pos
    }

    fn expire_pos(&self) -> u64 {
        self.state.lock().expire_pos
    }

    fn set_expire_pos(&self, pos: u64) {
        let mut st = self.state.lock();
        debug_assert!(pos >= st.expire_pos, "expire position moved backwards");
        st.expire_pos = pos;
    }

    fn trim(&self) {
        let mut st = self.state.lock();
        while st
            .entries
            .front()
            .is_some_and(|e| e.end <= st.expire_pos)
        {
            st.entries.pop_front();
        }
    }

    fn shutdown(&self) {
        {
            let mut st = self.state.lock();
            st.stopped = true;
            st.writeable = false;
        }
        self.readable.notify_waiters();
    }
}

// ---------------------------------------------------------------------------
// MemObjectStore
// ---------------------------------------------------------------------------

/// One executed object-store operation, recorded for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    PurgeRange {
        ino: InodeId,
        pool: PoolId,
        namespace: String,
        first_obj: u64,
        num_obj: u64,
        snap_seq: SnapId,
    },
    Remove {
        oid: String,
        pool: PoolId,
        namespace: String,
        snap_seq: SnapId,
    },
}

type ObjectKey = (u64, String, String);

/// In-memory object store.
///
/// Holds objects in a concurrent map keyed by (pool, namespace, name) and
/// records every executed operation. Removal of an absent object succeeds,
/// matching the idempotency contract. Tests can gate an inode's operations
/// with [`MemObjectStore::hold`] to control completion order, and flip
/// [`MemObjectStore::set_fail_ops`] to exercise failure accounting.
#[derive(Default)]
pub struct MemObjectStore {
    objects: DashMap<ObjectKey, Vec<u8>>,
    ops: Mutex<Vec<StoreOp>>,
    holds: Mutex<HashMap<String, watch::Sender<bool>>>,
    fail_ops: AtomicBool,
}

impl MemObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, as the data path would have written it.
    pub fn put_object(&self, pool: PoolId, namespace: &str, oid: &str, data: Vec<u8>) {
        self.objects
            .insert((pool.0, namespace.to_string(), oid.to_string()), data);
    }

    pub fn contains_object(&self, pool: PoolId, namespace: &str, oid: &str) -> bool {
        self.objects
            .contains_key(&(pool.0, namespace.to_string(), oid.to_string()))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Snapshot of every operation executed so far, in completion order.
    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().clone()
    }

    /// Block operations touching `ino` until [`MemObjectStore::release`].
    pub fn hold(&self, ino: InodeId) {
        let (tx, _rx) = watch::channel(true);
        self.holds.lock().insert(format!("{:x}", ino.0), tx);
    }

    /// Let operations previously held on `ino` proceed.
    pub fn release(&self, ino: InodeId) {
        if let Some(tx) = self.holds.lock().remove(&format!("{:x}", ino.0)) {
            let _ = tx.send(false);
        }
    }

    /// Make subsequent operations fail after executing.
    pub fn set_fail_ops(&self, fail: bool) {
        self.fail_ops.store(fail, Ordering::SeqCst);
    }

    async fn wait_if_held(&self, ino_hex: &str) {
        let rx = self.holds.lock().get(ino_hex).map(|tx| tx.subscribe());
        if let Some(mut rx) = rx {
            while *rx.borrow() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
    }

    fn record(&self, op: StoreOp) {
        self.ops.lock().push(op);
    }
}

#[async_trait]
impl ObjectStore for MemObjectStore {
    async fn purge_range(
        &self,
        ino: InodeId,
        layout: &FileLayout,
        snapc: &SnapContext,
        first_obj: u64,
        num_obj: u64,
        _mtime: UtcTime,
        _flags: u32,
    ) -> Result<()> {
        self.wait_if_held(&format!("{:x}", ino.0)).await;
        self.record(StoreOp::PurgeRange {
            ino,
            pool: layout.pool,
            namespace: layout.pool_namespace.clone(),
            first_obj,
            num_obj,
            snap_seq: snapc.seq,
        });
        for index in first_obj..first_obj + num_obj {
            let oid = inode_object_name(ino, index);
            self.objects
                .remove(&(layout.pool.0, layout.pool_namespace.clone(), oid));
        }
        if self.fail_ops.load(Ordering::SeqCst) {
            return make_error_msg(StoreCode::PURGE_RANGE_FAILED, "injected store failure");
        }
        Ok(())
    }

    async fn remove(
        &self,
        oid: &str,
        locator: &ObjectLocator,
        snapc: &SnapContext,
        _mtime: UtcTime,
        _flags: u32,
    ) -> Result<()> {
        let ino_hex = oid.split('.').next().unwrap_or(oid).to_string();
        self.wait_if_held(&ino_hex).await;
        self.record(StoreOp::Remove {
            oid: oid.to_string(),
            pool: locator.pool,
            namespace: locator.namespace.clone(),
            snap_seq: snapc.seq,
        });
        // Removing an absent object is success.
        self.objects
            .remove(&(locator.pool.0, locator.namespace.clone(), oid.to_string()));
        if self.fail_ops.load(Ordering::SeqCst) {
            return make_error_msg(StoreCode::REMOVE_FAILED, "injected store failure");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
