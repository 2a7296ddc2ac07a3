//! Contract for the object-store client used to remove backing objects.

use async_trait::async_trait;
use sofs_types::{InodeId, PoolId, Result, UtcTime};

use crate::item::{FileLayout, SnapContext};

/// Addresses a single object: the pool it lives in and the namespace
/// within that pool (empty for the default namespace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocator {
    pub pool: PoolId,
    pub namespace: String,
}

impl ObjectLocator {
    /// Locator for the pool's default namespace.
    pub fn pool(pool: PoolId) -> Self {
        Self {
            pool,
            namespace: String::new(),
        }
    }
}

/// Asynchronous object removal operations.
///
/// Both operations are idempotent: removing an absent object reports
/// success. Transient failures are retried inside the implementation; a
/// returned error is terminal for that operation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Remove the `num_obj` striped objects of `ino` starting at stripe
    /// index `first_obj`, under the given snapshot context.
    #[allow(clippy::too_many_arguments)]
    async fn purge_range(
        &self,
        ino: InodeId,
        layout: &FileLayout,
        snapc: &SnapContext,
        first_obj: u64,
        num_obj: u64,
        mtime: UtcTime,
        flags: u32,
    ) -> Result<()>;

    /// Remove a single object by name.
    async fn remove(
        &self,
        oid: &str,
        locator: &ObjectLocator,
        snapc: &SnapContext,
        mtime: UtcTime,
        flags: u32,
    ) -> Result<()>;
}
