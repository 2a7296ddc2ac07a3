//! The purge queue engine.
//!
//! [`PurgeQueue`] turns file deletions into durable, bounded-concurrency
//! object removal. Producers `push` a [`PurgeItem`]; the engine appends it
//! to the journal, flushes, and consumes entries back off the log as
//! admission allows. Each consumed item is tracked in an in-flight map
//! keyed by its post-read journal offset and dispatched as a set of
//! parallel object-store removals. When the oldest in-flight item
//! completes, the journal's expire position advances to its offset and the
//! log prefix is reclaimed; out-of-order completions leave the expire
//! position untouched until the oldest catches up.
//!
//! All engine state is guarded by one mutex. Code holding it never waits:
//! journal flushes, readable waits, and removal gathers run as spawned
//! tasks that re-enter the engine through the lock when they finish.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, error, trace, warn};

use sofs_types::{
    JournalCode, PoolId, PurgeCode, RankId, Result, Status, StatusCode, UtcTime, Void,
    make_error_msg,
};

use crate::config::PurgeQueueConfig;
use crate::item::{FileLayout, PurgeItem, inode_object_name};
use crate::journal::PurgeJournal;
use crate::object_store::{ObjectLocator, ObjectStore};
use crate::striper;

/// Resolves once a pushed item is durable in the journal.
pub type AppendAck = oneshot::Receiver<Result<Void>>;

/// The purge queue state machine. Construct with [`PurgeQueue::new`], bind
/// to a runtime with [`PurgeQueue::init`], then recover an existing journal
/// with [`PurgeQueue::open`] or start fresh with [`PurgeQueue::create`]
/// before pushing items.
pub struct PurgeQueue {
    rank: RankId,
    config: PurgeQueueConfig,
    journal: Arc<dyn PurgeJournal>,
    store: Arc<dyn ObjectStore>,
    inner: Mutex<Inner>,
    /// Sub-operations that reported a terminal failure and were counted as
    /// purged anyway.
    failed_ops: AtomicU64,
    self_ref: Weak<PurgeQueue>,
}

struct Inner {
    runtime: Option<Handle>,
    /// Items being executed, keyed by the journal offset just past each
    /// item's entry. Keys strictly increase with consumption order.
    in_flight: BTreeMap<u64, PurgeItem>,
    /// Whether a readable waiter is registered with the journal.
    have_waiter: bool,
    /// Set when a malformed entry halts consumption for good.
    damage: Option<Status>,
    stopping: bool,
}

impl PurgeQueue {
    pub fn new(
        rank: RankId,
        config: PurgeQueueConfig,
        journal: Arc<dyn PurgeJournal>,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new_cyclic(|self_ref| Self {
            rank,
            config,
            journal,
            store,
            inner: Mutex::new(Inner {
                runtime: None,
                in_flight: BTreeMap::new(),
                have_waiter: false,
                damage: None,
                stopping: false,
            }),
            failed_ops: AtomicU64::new(0),
            self_ref: self_ref.clone(),
        }))
    }

    /// Bind the engine to the runtime its continuations will run on. Must
    /// be called from within that runtime.
    pub fn init(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| {
            Status::with_message(
                StatusCode::NOT_INITIALIZED,
                "init() must be called on the executor runtime",
            )
        })?;
        self.inner.lock().runtime = Some(handle);
        Ok(())
    }

    /// Recover the journal and resume consuming any entries that were
    /// appended but not executed before the last shutdown.
    pub async fn open(&self) -> Result<()> {
        debug!(rank = %self.rank, "opening purge queue");
        self.journal.recover().await?;
        self.journal.set_writeable();
        debug!(rank = %self.rank, read_pos = self.journal.read_pos(), "open complete");
        self.consume();
        Ok(())
    }

    /// Initialise a fresh journal backed by the metadata pool.
    pub async fn create(&self) -> Result<()> {
        debug!(rank = %self.rank, pool = %self.config.metadata_pool, "creating purge queue");
        let layout = FileLayout::with_pool(self.config.metadata_pool);
        self.journal.set_writeable();
        self.journal.create(&layout).await
    }

    /// Stop accepting work and tear the journal down. In-flight removals
    /// are not cancelled; callers that need a drain poll [`Self::is_idle`]
    /// first.
    pub fn shutdown(&self) {
        debug!(rank = %self.rank, "shutting down purge queue");
        let mut inner = self.inner.lock();
        inner.stopping = true;
        self.journal.shutdown();
        inner.runtime = None;
    }

    /// Append a deletion intent to the journal and schedule its execution.
    ///
    /// Returns synchronously once the entry is buffered and the flush is
    /// scheduled; the returned [`AppendAck`] resolves when the append is
    /// durable. Callers must have waited for `open` or `create`.
    pub fn push(&self, item: &PurgeItem) -> Result<AppendAck> {
        debug!(rank = %self.rank, ino = %item.ino, size = item.size, "pushing purge item");
        item.validate()?;
        let payload = item
            .encode()
            .map_err(|e| Status::with_message(StatusCode::INVALID_ARG, e.to_string()))?;

        let mut inner = self.inner.lock();
        if inner.stopping {
            return make_error_msg(JournalCode::SHUT_DOWN, "purge queue is shutting down");
        }
        let Some(handle) = inner.runtime.clone() else {
            return make_error_msg(StatusCode::NOT_INITIALIZED, "purge queue not initialised");
        };
        if !self.journal.is_writeable() {
            return make_error_msg(
                JournalCode::NOT_WRITEABLE,
                "journal not writeable; open or create the queue first",
            );
        }

        self.journal.append_entry(Bytes::from(payload));

        // Flush batching is the journal's concern, so schedule one per push.
        let (tx, rx) = oneshot::channel();
        let journal = Arc::clone(&self.journal);
        handle.spawn(async move {
            let res = journal.flush().await;
            if let Err(status) = &res {
                error!(status = %status, "journal flush failed");
            }
            let _ = tx.send(res);
        });

        // Maybe go ahead and execute it right away.
        self.consume_locked(&mut inner);
        Ok(rx)
    }

    /// Number of items currently executing.
    pub fn in_flight_len(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// Whether no item is currently executing.
    pub fn is_idle(&self) -> bool {
        self.in_flight_len() == 0
    }

    /// The fatal status that halted consumption, if any.
    pub fn damage(&self) -> Option<Status> {
        self.inner.lock().damage.clone()
    }

    /// Count of object-store sub-operations that failed terminally and
    /// were treated as purged.
    pub fn failed_ops(&self) -> u64 {
        self.failed_ops.load(Ordering::Relaxed)
    }

    fn consume(&self) {
        let mut inner = self.inner.lock();
        self.consume_locked(&mut inner);
    }

    /// Drive consumption while admission allows and entries are readable.
    /// Runs under the engine lock; every suspension is a spawned task.
    fn consume_locked(&self, inner: &mut Inner) {
        if inner.damage.is_some() {
            trace!(rank = %self.rank, "queue is damaged, not consuming");
            return;
        }
        if inner.stopping {
            return;
        }
        let Some(handle) = inner.runtime.clone() else {
            warn!(rank = %self.rank, "consume before init");
            return;
        };

        while !inner.stopping && inner.in_flight.len() < self.config.max_in_flight {
            if !self.journal.is_readable() {
                trace!(rank = %self.rank, "journal not readable right now");
                if !inner.have_waiter {
                    inner.have_waiter = true;
                    let journal = Arc::clone(&self.journal);
                    let this = self.self_ref.clone();
                    handle.spawn(async move {
                        let res = journal.wait_for_readable().await;
                        let Some(this) = this.upgrade() else { return };
                        let mut inner = this.inner.lock();
                        inner.have_waiter = false;
                        match res {
                            Ok(()) => this.consume_locked(&mut inner),
                            Err(status) => {
                                debug!(status = %status, "readable wait ended without data");
                            }
                        }
                    });
                }
                return;
            }

            let payload = self
                .journal
                .try_read_entry()
                .expect("readable journal must yield an entry");
            match PurgeItem::decode(&payload) {
                Ok(item) => self.execute_locked(inner, &handle, item),
                Err(err) => {
                    let status = Status::with_message(PurgeCode::MALFORMED_ENTRY, err.to_string());
                    error!(
                        rank = %self.rank,
                        pos = self.journal.read_pos(),
                        status = %status,
                        "malformed journal entry, purge queue halted",
                    );
                    inner.damage = Some(status);
                    return;
                }
            }
        }
    }

    /// Install `item` into the in-flight map and dispatch its removals.
    fn execute_locked(&self, inner: &mut Inner, handle: &Handle, item: PurgeItem) {
        let expire_to = self.journal.read_pos();
        debug_assert!(
            !inner.in_flight.contains_key(&expire_to),
            "journal read position repeated"
        );
        inner.in_flight.insert(expire_to, item.clone());

        let mtime = UtcTime::now();
        let mut subs: JoinSet<Result<Void>> = JoinSet::new();

        let mut ranged = false;
        if item.size > 0 {
            let num = striper::num_objects(&item.layout, item.size);
            debug!(
                ino = %item.ino,
                size = item.size,
                objects = num,
                snap_seq = %item.snapc.seq,
                "purging striped objects",
            );
            let store = Arc::clone(&self.store);
            let ino = item.ino;
            let layout = item.layout.clone();
            let snapc = item.snapc.clone();
            subs.spawn_on(
                async move { store.purge_range(ino, &layout, &snapc, 0, num, mtime, 0).await },
                handle,
            );
            ranged = true;
        }

        // The ranged purge already covers the backtrace object when it runs
        // in the default namespace; a namespaced layout keeps the backtrace
        // outside the range and it must go separately.
        let oid = inode_object_name(item.ino, 0);
        if !ranged || !item.layout.pool_namespace.is_empty() {
            debug!(oid = %oid, pool = %item.layout.pool, "removing backtrace object");
            self.spawn_remove(&mut subs, handle, oid.clone(), item.layout.pool, &item, mtime);
        }

        for pool in &item.old_pools {
            debug!(oid = %oid, pool = %pool, "removing backtrace object from old pool");
            self.spawn_remove(&mut subs, handle, oid.clone(), *pool, &item, mtime);
        }

        assert!(!subs.is_empty(), "purge item dispatched no operations");

        let this = self.self_ref.clone();
        handle.spawn(async move {
            let mut subs = subs;
            let mut failures = 0u64;
            while let Some(joined) = subs.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(status)) => {
                        failures += 1;
                        error!(
                            status = %status,
                            pos = expire_to,
                            "purge sub-operation failed terminally, counting object as removed",
                        );
                    }
                    Err(join_err) => {
                        failures += 1;
                        error!(error = %join_err, pos = expire_to, "purge sub-operation aborted");
                    }
                }
            }
            let Some(this) = this.upgrade() else { return };
            if failures > 0 {
                this.failed_ops.fetch_add(failures, Ordering::Relaxed);
            }
            this.complete(expire_to);
        });
    }

    fn spawn_remove(
        &self,
        subs: &mut JoinSet<Result<Void>>,
        handle: &Handle,
        oid: String,
        pool: PoolId,
        item: &PurgeItem,
        mtime: UtcTime,
    ) {
        let store = Arc::clone(&self.store);
        let snapc = item.snapc.clone();
        subs.spawn_on(
            async move {
                store
                    .remove(&oid, &ObjectLocator::pool(pool), &snapc, mtime, 0)
                    .await
            },
            handle,
        );
    }

    /// All removals for the item at `expire_to` finished. Advance the
    /// expire position when the item was the oldest in flight, then keep
    /// consuming.
    fn complete(&self, expire_to: u64) {
        let mut inner = self.inner.lock();

        let oldest = inner.in_flight.first_key_value().map(|(pos, _)| *pos);
        if oldest == Some(expire_to) {
            // Every earlier entry has completed, so the log may be
            // reclaimed through this one.
            self.journal.set_expire_pos(expire_to);
            self.journal.trim();
        }

        let item = inner
            .in_flight
            .remove(&expire_to)
            .unwrap_or_else(|| panic!("completion for unknown journal position {expire_to}"));
        debug!(rank = %self.rank, ino = %item.ino, pos = expire_to, "purge item complete");

        self.consume_locked(&mut inner);
    }
}
