//! Sharded memcached example over the text protocol: store each item on the
//! shard owning its key, then read everything back with one `get` per shard.
use std::error::Error;
use std::io;
use std::sync::{Arc, Mutex};

use tessera_shard::{Cluster, ShardConfig};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

type Conn = tokio::sync::Mutex<BufReader<TcpStream>>;

fn protocol_error(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

async fn set(conn: &Conn, key: &str, value: &str) -> io::Result<()> {
    let mut conn = conn.lock().await;
    let cmd = format!("set {key} 0 86400 {}\r\n{value}\r\n", value.len());
    conn.get_mut().write_all(cmd.as_bytes()).await?;
    let mut reply = String::new();
    conn.read_line(&mut reply).await?;
    match reply.trim_end() {
        "STORED" => Ok(()),
        other => Err(protocol_error(format!("set {key}: {other}"))),
    }
}

async fn get_multi(conn: &Conn, keys: &[String]) -> io::Result<Vec<(String, String)>> {
    let mut conn = conn.lock().await;
    conn.get_mut().write_all(format!("get {}\r\n", keys.join(" ")).as_bytes()).await?;
    let mut items = Vec::new();
    loop {
        let mut header = String::new();
        if conn.read_line(&mut header).await? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        let header = header.trim_end();
        if header == "END" {
            return Ok(items);
        }
        // VALUE <key> <flags> <bytes>
        let mut parts = header.split(' ');
        let (Some("VALUE"), Some(key), Some(_), Some(len)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(protocol_error(format!("unexpected reply {header:?}")));
        };
        let len: usize = len.parse().map_err(|_| protocol_error(format!("bad length in {header:?}")))?;
        let mut data = vec![0; len + 2];
        conn.read_exact(&mut data).await?;
        data.truncate(len);
        items.push((key.to_string(), String::from_utf8_lossy(&data).into_owned()));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _log = tessera_log::init(None, tracing::Level::INFO)?;
    let shards: Vec<ShardConfig> = (1..=3)
        .map(|id| ShardConfig::new(id, format!("127.0.0.1:{}", 11210 + id)))
        .collect();
    let cluster = Cluster::builder(shards)
        .connector(|addr: String| async move {
            let stream = TcpStream::connect(addr).await?;
            Ok::<Conn, io::Error>(tokio::sync::Mutex::new(BufReader::new(stream)))
        })
        .connect()
        .await?;

    let keys: Vec<String> = (0..10).map(|i| format!("sample-{i}")).collect();
    for (i, key) in keys.iter().enumerate() {
        let value = format!("sharding example [index: {i}, id: {key}]");
        set(cluster.shard(key).conn(), key, &value).await?;
    }

    let found = Arc::new(Mutex::new(Vec::new()));
    cluster
        .by_key(keys, |keys, shard| {
            let found = found.clone();
            async move {
                let items = get_multi(shard.conn(), &keys).await?;
                found.lock().unwrap().extend(items);
                Ok::<(), io::Error>(())
            }
        })
        .await?;

    for (key, value) in found.lock().unwrap().iter() {
        println!("{key}: {value}");
    }
    Ok(())
}
