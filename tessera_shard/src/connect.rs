//! Concurrent connection establishment.
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::cluster::{Cluster, Shard};
use crate::config::{validate_all, ShardConfig};
use crate::error::{ConfigError, ConnectError};
use crate::fanout;
use crate::hash::{Crc64, HashStrategy, Strategy};
use crate::key::ShardId;

type ConnectFuture<C, E> = Pin<Box<dyn Future<Output = Result<C, E>> + Send>>;
type ConnectFn<C, E> = Box<dyn Fn(String) -> ConnectFuture<C, E> + Send + Sync>;

/// Collects the inputs of [`connect`](Self::connect): shard configs, the
/// connect function and an optional strategy.
pub struct ClusterBuilder<I, C, E = std::convert::Infallible> {
    shards: Vec<ShardConfig<I>>,
    connector: Option<ConnectFn<C, E>>,
    strategy: Option<Arc<dyn Strategy>>,
}

impl<I: fmt::Debug, C, E> fmt::Debug for ClusterBuilder<I, C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterBuilder")
            .field("shards", &self.shards)
            .field("connector", &self.connector.is_some())
            .field("strategy", &self.strategy.is_some())
            .finish()
    }
}

impl<I: ShardId, C> ClusterBuilder<I, C> {
    pub fn new(shards: Vec<ShardConfig<I>>) -> Self {
        Self { shards, connector: None, strategy: None }
    }
}

impl<I, C, E> ClusterBuilder<I, C, E>
where
    I: ShardId,
    C: Send + 'static,
    E: Send + 'static,
{
    /// Routing strategy. Defaults to CRC-64 modulo shard count.
    pub fn strategy(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategy = Some(Arc::new(strategy));
        self
    }

    /// Function opening one connection from a shard address. Called exactly
    /// once per shard, concurrently with its siblings.
    pub fn connector<F, Fut, E2>(self, connect: F) -> ClusterBuilder<I, C, E2>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, E2>> + Send + 'static,
    {
        let connect: ConnectFn<C, E2> = Box::new(move |addr| Box::pin(connect(addr)));
        ClusterBuilder { shards: self.shards, connector: Some(connect), strategy: self.strategy }
    }

    /// Validate the configs, open every connection concurrently and wait
    /// for all attempts.
    ///
    /// Fails with the first connection error observed once every attempt has
    /// finished. Connections opened by the attempts that did succeed are
    /// dropped with the rest of the partial result.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime. A panicking attempt, or one
    /// cancelled by runtime shutdown, is re-raised once every attempt has
    /// finished.
    #[instrument(skip_all, fields(shards = self.shards.len()))]
    pub async fn connect(self) -> Result<Cluster<I, C>, ConnectError<E>> {
        validate_all(&self.shards)?;
        let connect = self.connector.ok_or(ConfigError::MissingConnector)?;

        let attempts: Vec<_> = self
            .shards
            .into_iter()
            .map(|cfg| {
                debug!(id = ?cfg.id, address = %cfg.address, "connecting shard");
                let fut = connect(cfg.address);
                let id = cfg.id;
                async move { fut.await.map(|conn| Shard::new(id, conn)) }
            })
            .collect();

        let (slots, err) = fanout::run_all(attempts).await;
        if let Some(err) = err {
            return Err(ConnectError::Connect(err));
        }

        let mut shards: Vec<Arc<Shard<I, C>>> = slots.into_iter().flatten().map(Arc::new).collect();
        shards.sort_by(|a, b| a.id().cmp(b.id()));
        info!(shards = shards.len(), "cluster ready");
        let strategy = self
            .strategy
            .unwrap_or_else(|| Arc::new(HashStrategy::<Crc64>::default()));
        Ok(Cluster::from_parts(shards, strategy))
    }
}
