//! Immutable shard registry with routing and fan-out.
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::trace;

use crate::connect::ClusterBuilder;
use crate::config::ShardConfig;
use crate::fanout;
use crate::hash::Strategy;
use crate::key::{ShardId, ShardKey};

/// One established backend connection and its id.
#[derive(Debug)]
pub struct Shard<I, C> {
    id: I,
    conn: C,
}

impl<I, C> Shard<I, C> {
    pub(crate) fn new(id: I, conn: C) -> Self {
        Self { id, conn }
    }

    pub fn id(&self) -> &I {
        &self.id
    }

    /// The connection returned by the connect function for this shard.
    pub fn conn(&self) -> &C {
        &self.conn
    }
}

/// Keys grouped per shard, as returned by [`Cluster::map`].
pub type KeyGroups<I, C, K> = Vec<(Arc<Shard<I, C>>, Vec<K>)>;

struct Inner<I, C> {
    shards: Vec<Arc<Shard<I, C>>>,
    strategy: Arc<dyn Strategy>,
}

/// Ordered, fixed set of shards plus the strategy routing keys to them.
///
/// Built once by [`ClusterBuilder::connect`] and never changed afterwards:
/// there is no way to add, remove or rehash shards. Clones share the same
/// shard list.
pub struct Cluster<I, C> {
    inner: Arc<Inner<I, C>>,
}

impl<I: fmt::Debug, C> fmt::Debug for Cluster<I, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("shards", &self.inner.shards.iter().map(|s| &s.id).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<I, C> Clone for Cluster<I, C> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<I: ShardId, C> Cluster<I, C> {
    /// Start building a cluster from shard configs.
    pub fn builder(shards: Vec<ShardConfig<I>>) -> ClusterBuilder<I, C> {
        ClusterBuilder::new(shards)
    }

    /// `shards` must be non-empty and sorted by id.
    pub(crate) fn from_parts(shards: Vec<Arc<Shard<I, C>>>, strategy: Arc<dyn Strategy>) -> Self {
        debug_assert!(!shards.is_empty());
        debug_assert!(shards.windows(2).all(|w| w[0].id < w[1].id));
        Self { inner: Arc::new(Inner { shards, strategy }) }
    }

    /// All shards, ascending by id.
    pub fn all(&self) -> &[Arc<Shard<I, C>>] {
        &self.inner.shards
    }

    pub fn len(&self) -> usize {
        self.inner.shards.len()
    }

    /// Always `false`: a cluster is never built without shards.
    pub fn is_empty(&self) -> bool {
        self.inner.shards.is_empty()
    }

    /// Shard with the given id.
    pub fn get(&self, id: &I) -> Option<&Arc<Shard<I, C>>> {
        let shards = &self.inner.shards;
        shards.binary_search_by(|s| s.id.cmp(id)).ok().map(|pos| &shards[pos])
    }

    /// Route a key to its shard. Pure, no I/O.
    pub fn shard<K: ShardKey + ?Sized>(&self, key: &K) -> &Arc<Shard<I, C>> {
        let shards = &self.inner.shards;
        let pos = self.inner.strategy.select(key.as_key(), shards.len()) % shards.len();
        &shards[pos]
    }

    /// Group keys by shard.
    ///
    /// Input order and duplicates are kept inside each group. Only shards
    /// that receive at least one key appear, in cluster order.
    pub fn map<K, It>(&self, keys: It) -> KeyGroups<I, C, K>
    where
        K: ShardKey,
        It: IntoIterator<Item = K>,
    {
        let shards = &self.inner.shards;
        let mut groups: Vec<Vec<K>> = (0..shards.len()).map(|_| Vec::new()).collect();
        for key in keys {
            let pos = self.inner.strategy.select(key.as_key(), shards.len()) % shards.len();
            groups[pos].push(key);
        }
        shards
            .iter()
            .zip(groups)
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(shard, keys)| (shard.clone(), keys))
            .collect()
    }

    /// Run `op` against every shard concurrently.
    ///
    /// All invocations run to completion even when some fail. Returns the
    /// first error observed; later errors are discarded.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime. A panic in `op`, or a task
    /// cancelled by runtime shutdown, is re-raised once every sibling has
    /// finished.
    pub async fn each<F, Fut, E>(&self, op: F) -> Result<(), E>
    where
        F: Fn(Arc<Shard<I, C>>) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        let tasks: Vec<Fut> = self.inner.shards.iter().map(|s| op(s.clone())).collect();
        trace!(tasks = tasks.len(), "each");
        fanout::first_error(tasks).await
    }

    /// Group `keys` with [`map`](Self::map) and run `op` once per touched
    /// shard with that shard's keys, concurrently. Same error policy as
    /// [`each`](Self::each).
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime. A panic in `op`, or a task
    /// cancelled by runtime shutdown, is re-raised once every sibling has
    /// finished.
    pub async fn by_key<K, It, F, Fut, E>(&self, keys: It, op: F) -> Result<(), E>
    where
        K: ShardKey,
        It: IntoIterator<Item = K>,
        F: Fn(Vec<K>, Arc<Shard<I, C>>) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        let tasks: Vec<Fut> = self
            .map(keys)
            .into_iter()
            .map(|(shard, keys)| op(keys, shard))
            .collect();
        trace!(tasks = tasks.len(), "by_key");
        fanout::first_error(tasks).await
    }
}
