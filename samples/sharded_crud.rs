//! Sharded CRUD example using tessera_pg: create a table on every shard,
//! insert rows on the shard owning each id, read them back in parallel.
use tessera_pg::ShardedClient;
use tessera_shard::ShardConfig;

#[tokio::main]
async fn main() {
    let _log = tessera_log::init(None, tracing::Level::INFO).unwrap();
    let mut shards = tessera_config::from_env(Some("SAMPLE"));
    if shards.is_empty() {
        shards = (1..=3)
            .map(|id| ShardConfig::new(id, format!("host=127.0.0.1 user=postgres password=password dbname=db{id}")))
            .collect();
    }
    let db = ShardedClient::connect(shards).await.unwrap();
    db.execute_all("CREATE TABLE IF NOT EXISTS sample (id TEXT PRIMARY KEY, value TEXT)").await.unwrap();

    let ids: Vec<String> = (0..10).map(|i| format!("sample-{i}")).collect();
    for (i, id) in ids.iter().enumerate() {
        let value = format!("sharding example [index: {i}, id: {id}]");
        db.execute_for(id, "INSERT INTO sample (id, value) VALUES ($1, $2)", &[id, &value]).await.unwrap();
    }

    let rows = db.select_by_keys(ids, "SELECT id, value FROM sample", "id").await.unwrap();
    for row in rows {
        println!("{}: {}", row.get::<usize, String>(0), row.get::<usize, String>(1));
    }
}
