//! Purge items and their on-disk encoding.
//!
//! A [`PurgeItem`] is the durable record of one file deletion intent. It
//! carries everything needed to remove the file's backing objects without
//! consulting live metadata: the inode number, the byte length at deletion
//! time, the striping layout, any old pools that may still hold a backtrace
//! object, and the snapshot context under which the removals must run.

use std::collections::BTreeSet;

use sofs_types::{InodeId, PoolId, Result, SnapId, StatusCode, make_error_msg};
use sofs_wire::{Cursor, WireDecode, WireEncode, WireError, encode_framed, finish_frame, read_frame};

type WireResult<T> = std::result::Result<T, WireError>;

/// Default object size and stripe unit for fresh layouts (4 MiB).
pub const DEFAULT_OBJECT_SIZE: u32 = 4 << 20;

/// Striping layout of a file across the object store.
///
/// Version 2 of the encoding added `pool_namespace`; version 1 frames
/// decode with an empty namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    /// Bytes written to one object before moving to the next stripe.
    pub stripe_unit: u32,
    /// Number of objects striped across per period.
    pub stripe_count: u32,
    /// Maximum bytes per object.
    pub object_size: u32,
    /// Primary data pool holding the file's objects.
    pub pool: PoolId,
    /// Object namespace within the pool; empty means the default namespace.
    pub pool_namespace: String,
}

const LAYOUT_VERSION: u8 = 2;
const LAYOUT_COMPAT: u8 = 1;

impl FileLayout {
    /// A one-stripe layout with 4 MiB objects in the given pool.
    pub fn with_pool(pool: PoolId) -> Self {
        Self {
            stripe_unit: DEFAULT_OBJECT_SIZE,
            stripe_count: 1,
            object_size: DEFAULT_OBJECT_SIZE,
            pool,
            pool_namespace: String::new(),
        }
    }

    /// Check the structural invariants of the layout.
    pub fn validate(&self) -> Result<()> {
        if self.stripe_unit == 0 || self.stripe_count == 0 || self.object_size == 0 {
            return make_error_msg(
                StatusCode::INVALID_ARG,
                format!(
                    "layout has zero field: stripe_unit={} stripe_count={} object_size={}",
                    self.stripe_unit, self.stripe_count, self.object_size
                ),
            );
        }
        if self.object_size % self.stripe_unit != 0 {
            return make_error_msg(
                StatusCode::INVALID_ARG,
                format!(
                    "object_size {} is not a multiple of stripe_unit {}",
                    self.object_size, self.stripe_unit
                ),
            );
        }
        Ok(())
    }

    fn encode(&self, out: &mut Vec<u8>) -> WireResult<()> {
        encode_framed(out, LAYOUT_COMPAT, LAYOUT_VERSION, |b| {
            self.stripe_unit.encode(b)?;
            self.stripe_count.encode(b)?;
            self.object_size.encode(b)?;
            self.pool.0.encode(b)?;
            self.pool_namespace.encode(b)
        })
    }

    fn decode(cur: &mut Cursor<'_>) -> WireResult<Self> {
        let (version, mut body) = read_frame(cur, "FileLayout", LAYOUT_VERSION)?;
        let stripe_unit = u32::decode(&mut body)?;
        let stripe_count = u32::decode(&mut body)?;
        let object_size = u32::decode(&mut body)?;
        let pool = PoolId(u64::decode(&mut body)?);
        let pool_namespace = if version >= 2 {
            String::decode(&mut body)?
        } else {
            String::new()
        };
        finish_frame(&body, "FileLayout")?;
        Ok(Self {
            stripe_unit,
            stripe_count,
            object_size,
            pool,
            pool_namespace,
        })
    }
}

/// Snapshot context attached to destructive operations.
///
/// `seq` is the snapshot sequence the operation was issued under; `snaps`
/// lists the existing snapshot ids, newest first. The object store uses the
/// context to preserve snapshotted object versions while removing the head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapContext {
    pub seq: SnapId,
    pub snaps: Vec<SnapId>,
}

const SNAPC_VERSION: u8 = 1;

impl SnapContext {
    /// A context with no snapshots.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Well-formed iff `snaps` is strictly descending and `seq` is at least
    /// the newest snapshot id.
    pub fn is_valid(&self) -> bool {
        if let Some(first) = self.snaps.first() {
            if self.seq < *first {
                return false;
            }
        }
        self.snaps.windows(2).all(|w| w[0] > w[1])
    }

    fn encode(&self, out: &mut Vec<u8>) -> WireResult<()> {
        encode_framed(out, SNAPC_VERSION, SNAPC_VERSION, |b| {
            self.seq.0.encode(b)?;
            let snaps: Vec<u64> = self.snaps.iter().map(|s| s.0).collect();
            snaps.encode(b)
        })
    }

    fn decode(cur: &mut Cursor<'_>) -> WireResult<Self> {
        let (_, mut body) = read_frame(cur, "SnapContext", SNAPC_VERSION)?;
        let seq = SnapId(u64::decode(&mut body)?);
        let snaps = Vec::<u64>::decode(&mut body)?
            .into_iter()
            .map(SnapId)
            .collect();
        finish_frame(&body, "SnapContext")?;
        Ok(Self { seq, snaps })
    }
}

/// One durable deletion intent. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeItem {
    /// Inode number of the deleted file.
    pub ino: InodeId,
    /// Byte length at deletion time; zero means no striped data objects.
    pub size: u64,
    /// Striping layout of the file's data objects.
    pub layout: FileLayout,
    /// Pools in which backtrace objects for this inode may also exist.
    pub old_pools: BTreeSet<PoolId>,
    /// Snapshot context for the removal operations.
    pub snapc: SnapContext,
}

const ITEM_VERSION: u8 = 1;

impl PurgeItem {
    /// Check the invariants a well-formed item must satisfy.
    pub fn validate(&self) -> Result<()> {
        self.layout.validate()?;
        if !self.snapc.is_valid() {
            return make_error_msg(
                StatusCode::INVALID_ARG,
                format!("snap context is not well-formed: {:?}", self.snapc),
            );
        }
        Ok(())
    }

    /// Encode into the versioned journal entry payload.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        let mut out = Vec::new();
        encode_framed(&mut out, ITEM_VERSION, ITEM_VERSION, |b| {
            self.ino.0.encode(b)?;
            self.size.encode(b)?;
            self.layout.encode(b)?;
            let pools: Vec<u64> = self.old_pools.iter().map(|p| p.0).collect();
            pools.encode(b)?;
            self.snapc.encode(b)
        })?;
        Ok(out)
    }

    /// Decode a journal entry payload.
    pub fn decode(buf: &[u8]) -> WireResult<Self> {
        let mut cur = Cursor::new(buf);
        let (_, mut body) = read_frame(&mut cur, "PurgeItem", ITEM_VERSION)?;
        let ino = InodeId(u64::decode(&mut body)?);
        let size = u64::decode(&mut body)?;
        let layout = FileLayout::decode(&mut body)?;
        let old_pools = Vec::<u64>::decode(&mut body)?
            .into_iter()
            .map(PoolId)
            .collect();
        let snapc = SnapContext::decode(&mut body)?;
        finish_frame(&body, "PurgeItem")?;
        if !cur.is_exhausted() {
            return Err(WireError::TrailingBytes {
                what: "PurgeItem",
                leftover: cur.remaining(),
            });
        }
        Ok(Self {
            ino,
            size,
            layout,
            old_pools,
            snapc,
        })
    }
}

/// Canonical name of an inode's object at the given stripe index.
///
/// The backtrace object is the inode's object 0 in its primary data pool.
pub fn inode_object_name(ino: InodeId, index: u64) -> String {
    format!("{:x}.{:08x}", ino.0, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> PurgeItem {
        PurgeItem {
            ino: InodeId(0x10000000123),
            size: 16 << 20,
            layout: FileLayout {
                stripe_unit: 4 << 20,
                stripe_count: 1,
                object_size: 4 << 20,
                pool: PoolId(3),
                pool_namespace: String::new(),
            },
            old_pools: [PoolId(7), PoolId(9)].into_iter().collect(),
            snapc: SnapContext {
                seq: SnapId(12),
                snaps: vec![SnapId(12), SnapId(5)],
            },
        }
    }

    #[test]
    fn test_item_roundtrip() {
        let item = sample_item();
        let buf = item.encode().unwrap();
        let decoded = PurgeItem::decode(&buf).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn test_item_roundtrip_minimal() {
        let item = PurgeItem {
            ino: InodeId(1),
            size: 0,
            layout: FileLayout::with_pool(PoolId(0)),
            old_pools: BTreeSet::new(),
            snapc: SnapContext::empty(),
        };
        let buf = item.encode().unwrap();
        assert_eq!(PurgeItem::decode(&buf).unwrap(), item);
    }

    #[test]
    fn test_item_roundtrip_namespaced() {
        let mut item = sample_item();
        item.layout.pool_namespace = "fast".to_string();
        let buf = item.encode().unwrap();
        assert_eq!(PurgeItem::decode(&buf).unwrap(), item);
    }

    #[test]
    fn test_decode_rejects_newer_item_version() {
        let mut buf = sample_item().encode().unwrap();
        // Pretend a newer writer produced this frame.
        buf[0] = 2; // compat
        buf[1] = 2; // current
        assert!(matches!(
            PurgeItem::decode(&buf),
            Err(WireError::UnsupportedVersion { version: 2, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let buf = sample_item().encode().unwrap();
        for cut in [1, 6, buf.len() / 2, buf.len() - 1] {
            assert!(PurgeItem::decode(&buf[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(PurgeItem::decode(b"not a purge item").is_err());
        assert!(PurgeItem::decode(&[]).is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_garbage() {
        let mut buf = sample_item().encode().unwrap();
        buf.push(0xFF);
        assert!(matches!(
            PurgeItem::decode(&buf),
            Err(WireError::TrailingBytes { .. })
        ));
    }

    #[test]
    fn test_layout_v1_frame_decodes_with_empty_namespace() {
        // Hand-build a v1 layout frame: no namespace field.
        let mut out = Vec::new();
        encode_framed(&mut out, 1, 1, |b| {
            (1u32 << 20).encode(b)?;
            4u32.encode(b)?;
            (4u32 << 20).encode(b)?;
            11u64.encode(b)
        })
        .unwrap();

        let mut cur = Cursor::new(&out);
        let layout = FileLayout::decode(&mut cur).unwrap();
        assert!(cur.is_exhausted());
        assert_eq!(layout.stripe_unit, 1 << 20);
        assert_eq!(layout.stripe_count, 4);
        assert_eq!(layout.pool, PoolId(11));
        assert!(layout.pool_namespace.is_empty());
    }

    #[test]
    fn test_layout_validate() {
        assert!(FileLayout::with_pool(PoolId(1)).validate().is_ok());

        let mut bad = FileLayout::with_pool(PoolId(1));
        bad.stripe_count = 0;
        assert!(bad.validate().is_err());

        let mut bad = FileLayout::with_pool(PoolId(1));
        bad.object_size = bad.stripe_unit + 1;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_snap_context_validity() {
        assert!(SnapContext::empty().is_valid());
        assert!(
            SnapContext {
                seq: SnapId(10),
                snaps: vec![SnapId(10), SnapId(4), SnapId(1)],
            }
            .is_valid()
        );
        // seq behind the newest snapshot
        assert!(
            !SnapContext {
                seq: SnapId(3),
                snaps: vec![SnapId(4)],
            }
            .is_valid()
        );
        // not strictly descending
        assert!(
            !SnapContext {
                seq: SnapId(10),
                snaps: vec![SnapId(4), SnapId(4)],
            }
            .is_valid()
        );
    }

    #[test]
    fn test_item_validate() {
        assert!(sample_item().validate().is_ok());

        let mut bad = sample_item();
        bad.snapc.seq = SnapId(0);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_inode_object_name() {
        assert_eq!(inode_object_name(InodeId(0x10000000123), 0), "10000000123.00000000");
        assert_eq!(inode_object_name(InodeId(0x42), 3), "42.00000003");
    }
}
