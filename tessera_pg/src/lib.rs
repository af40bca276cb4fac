//! PostgreSQL shards on top of tokio-postgres.

use std::sync::{Arc, Mutex};

use tessera_shard::{Cluster, ConnectError, ShardConfig, ShardKey};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Error, NoTls, Row};
use tracing::error;

/// Cluster of PostgreSQL clients keyed by numeric shard id.
pub type PgCluster = Cluster<i64, Client>;

/// Sharded SQL client.
#[derive(Debug)]
pub struct ShardedClient {
    cluster: PgCluster,
}

impl ShardedClient {
    /// Connect to every shard (`dsn` as in `tokio_postgres::connect`).
    pub async fn connect(shards: Vec<ShardConfig>) -> Result<Self, ConnectError<Error>> {
        let cluster = Cluster::builder(shards).connector(open).connect().await?;
        Ok(Self { cluster })
    }

    pub fn cluster(&self) -> &PgCluster {
        &self.cluster
    }

    /// Client owning `key`.
    pub fn shard_for<K: ShardKey + ?Sized>(&self, key: &K) -> &Client {
        self.cluster.shard(key).conn()
    }

    /// Run a statement on every shard, e.g. DDL.
    pub async fn execute_all(&self, sql: &str) -> Result<(), Error> {
        let sql: Arc<str> = Arc::from(sql);
        self.cluster
            .each(|shard| {
                let sql = sql.clone();
                async move { shard.conn().execute(&*sql, &[]).await.map(|_| ()) }
            })
            .await
    }

    /// Run a statement on the shard owning `key`.
    pub async fn execute_for<K: ShardKey + ?Sized>(
        &self,
        key: &K,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Error> {
        self.shard_for(key).execute(sql, params).await
    }

    /// `{select} WHERE {column} IN (..)` on each shard holding some of
    /// `keys`, in parallel. Rows come back grouped by shard, shards in no
    /// particular order.
    pub async fn select_by_keys(
        &self,
        keys: Vec<String>,
        select: &str,
        column: &str,
    ) -> Result<Vec<Row>, Error> {
        let rows = Arc::new(Mutex::new(Vec::new()));
        let select: Arc<str> = Arc::from(select);
        let column: Arc<str> = Arc::from(column);
        self.cluster
            .by_key(keys, |keys, shard| {
                let rows = rows.clone();
                let sql = select_in(&select, &column, keys.len());
                async move {
                    let params: Vec<&(dyn ToSql + Sync)> =
                        keys.iter().map(|k| k as &(dyn ToSql + Sync)).collect();
                    let found = shard.conn().query(sql.as_str(), &params).await?;
                    rows.lock().unwrap_or_else(|e| e.into_inner()).extend(found);
                    Ok(())
                }
            })
            .await?;
        let mut rows = rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(std::mem::take(&mut *rows))
    }
}

async fn open(dsn: String) -> Result<Client, Error> {
    let (client, connection) = tokio_postgres::connect(&dsn, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "shard connection closed");
        }
    });
    Ok(client)
}

/// `$1,$2,..,$n`
fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("${i}")).collect::<Vec<_>>().join(",")
}

fn select_in(select: &str, column: &str, n: usize) -> String {
    format!("{select} WHERE {column} IN ({})", placeholders(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_lists() {
        assert_eq!(placeholders(1), "$1");
        assert_eq!(placeholders(3), "$1,$2,$3");
        assert_eq!(
            select_in("SELECT id, value FROM sample", "id", 2),
            "SELECT id, value FROM sample WHERE id IN ($1,$2)"
        );
    }

    #[tokio::test]
    async fn rejects_empty_config() {
        let err = ShardedClient::connect(Vec::new()).await.unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_shard_fails_connect() {
        let shards = vec![
            ShardConfig::new(1, "host=127.0.0.1 port=1 user=alice connect_timeout=2"),
            ShardConfig::new(2, "host=127.0.0.1 port=2 user=alice connect_timeout=2"),
        ];
        match ShardedClient::connect(shards).await {
            Err(ConnectError::Connect(_)) => {}
            other => panic!("expected connection error, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn crud_against_local_shards() {
        // Needs databases db1 and db2 on a local server; skipped when unreachable.
        let shards = vec![
            ShardConfig::new(1, "host=127.0.0.1 user=postgres password=password dbname=db1"),
            ShardConfig::new(2, "host=127.0.0.1 user=postgres password=password dbname=db2"),
        ];
        let Ok(db) = ShardedClient::connect(shards).await else {
            return;
        };
        db.execute_all("CREATE TABLE IF NOT EXISTS tessera_sample (id TEXT PRIMARY KEY, value TEXT)")
            .await
            .unwrap();
        let ids: Vec<String> = (0..10).map(|i| format!("key-{i}")).collect();
        for id in &ids {
            db.execute_for(
                id,
                "INSERT INTO tessera_sample (id, value) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
                &[id, id],
            )
            .await
            .unwrap();
        }
        let rows = db
            .select_by_keys(ids.clone(), "SELECT id, value FROM tessera_sample", "id")
            .await
            .unwrap();
        assert_eq!(rows.len(), ids.len());
        db.execute_all("DROP TABLE tessera_sample").await.unwrap();
    }
}
