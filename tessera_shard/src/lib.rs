//! Tessera shard routing core.
//!
//! Maps application keys onto a fixed, ordered set of backend connections
//! with a deterministic hash, and fans work out across them concurrently.
//! The crate never speaks a backend protocol: connections are whatever the
//! caller's connect function returns.
//!
//! [`ClusterBuilder::connect`], [`Cluster::each`] and [`Cluster::by_key`]
//! spawn one task per shard with `tokio::spawn`, so they must be awaited
//! inside a Tokio runtime. Routing ([`Cluster::shard`], [`Cluster::map`])
//! is plain synchronous code and needs no runtime.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use tessera_shard::{Cluster, ShardConfig};
//!
//! let shards = vec![ShardConfig::new(1i64, "10.0.0.1:11211"), ShardConfig::new(2, "10.0.0.2:11211")];
//! let cluster = Cluster::builder(shards)
//!     .connector(|addr: String| async move { tokio::net::TcpStream::connect(addr).await })
//!     .connect()
//!     .await?;
//! let shard = cluster.shard("user:42");
//! println!("user:42 lives on shard {}", shard.id());
//! # Ok(())
//! # }
//! ```
#![deny(missing_debug_implementations)]

mod cluster;
mod config;
mod connect;
mod error;
mod fanout;
mod hash;
mod key;

pub use cluster::{Cluster, KeyGroups, Shard};
pub use config::{validate_all, ShardConfig};
pub use connect::ClusterBuilder;
pub use error::{ConfigError, ConnectError};
pub use hash::{Crc64, HashStrategy, KeyHash, Strategy};
pub use key::{Key, OwnedKey, ShardId, ShardKey};
