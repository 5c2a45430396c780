//! Shared helpers for integration tests.
//!
//! `FakeMemcached` speaks enough of the memcached text protocol for the
//! client's set/get/delete commands, with real exptime handling. Setting a
//! key that starts with `oom` answers `SERVER_ERROR out of memory`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use kv_storage::memcached::ClientConfig;

type Store = Arc<Mutex<HashMap<String, (String, Option<Instant>)>>>;

pub struct FakeMemcached {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl FakeMemcached {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store: Store = Arc::default();

        let handle = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(serve(socket, store.clone()));
            }
        });

        Self { addr, handle }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Client settings pointing at this server.
    pub fn client_config(&self, max_open_conns: usize) -> ClientConfig {
        local_config(self.addr, max_open_conns)
    }
}

impl Drop for FakeMemcached {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn local_config(addr: SocketAddr, max_open_conns: usize) -> ClientConfig {
    ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        max_idle_conns: max_open_conns,
        max_open_conns,
        new_conn_timeout: Duration::from_secs(1),
        conn_retry_timeout: Duration::from_secs(2),
        io_timeout: Some(Duration::from_secs(2)),
    }
}

/// Answers each request line from a fixed table of reply chunks, pausing
/// 50ms between chunks so each lands in its own read. Unknown requests get
/// `END`. Returns settings for a single-connection client.
pub async fn scripted_server(replies: HashMap<&'static str, Vec<&'static [u8]>>) -> ClientConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let replies = Arc::new(replies);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let replies = replies.clone();
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut lines = BufReader::new(read).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let chunks = replies
                        .get(line.as_str())
                        .cloned()
                        .unwrap_or_else(|| vec![&b"END\r\n"[..]]);
                    for (i, chunk) in chunks.iter().enumerate() {
                        if i > 0 {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                        }
                        if write.write_all(chunk).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    local_config(addr, 1)
}

/// Settings for a port nothing listens on.
pub async fn unreachable_config() -> ClientConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    ClientConfig {
        host: "127.0.0.1".to_string(),
        port,
        max_idle_conns: 1,
        max_open_conns: 1,
        new_conn_timeout: Duration::from_millis(500),
        conn_retry_timeout: Duration::from_millis(500),
        io_timeout: None,
    }
}

async fn serve(socket: TcpStream, store: Store) {
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let reply = match parts.as_slice() {
            ["set", key, _flags, exptime, bytes] => {
                let Ok(len) = bytes.parse::<usize>() else {
                    return;
                };
                let mut data = vec![0u8; len + 2];
                if reader.read_exact(&mut data).await.is_err() {
                    return;
                }
                data.truncate(len);

                if key.starts_with("oom") {
                    "SERVER_ERROR out of memory\r\n".to_string()
                } else {
                    let exptime: u64 = exptime.parse().unwrap_or(0);
                    let expires = (exptime > 0).then(|| Instant::now() + Duration::from_secs(exptime));
                    let value = String::from_utf8_lossy(&data).into_owned();
                    store.lock().unwrap().insert(key.to_string(), (value, expires));
                    "STORED\r\n".to_string()
                }
            }
            ["get", key] => {
                let store = store.lock().unwrap();
                match store.get(*key) {
                    Some((value, expires)) if expires.map_or(true, |at| Instant::now() < at) => {
                        format!("VALUE {} 0 {}\r\n{}\r\nEND\r\n", key, value.len(), value)
                    }
                    _ => "END\r\n".to_string(),
                }
            }
            ["delete", key] => {
                let removed = store.lock().unwrap().remove(*key);
                match removed {
                    Some(_) => "DELETED\r\n".to_string(),
                    None => "NOT_FOUND\r\n".to_string(),
                }
            }
            _ => "ERROR\r\n".to_string(),
        };

        if write.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}
