strong_type!(
    /// Inode number of a file.
    InodeId,
    u64
);
strong_type!(
    /// Id of a data or metadata pool in the object store.
    PoolId,
    u64
);
strong_type!(
    /// Snapshot id. Snapshot ids increase monotonically as snapshots are taken.
    SnapId,
    u64
);
strong_type!(
    /// Rank of a metadata server within its cluster.
    RankId,
    u32
);
