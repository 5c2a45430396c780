//! # Connection Pool
//!
//! Purpose: Share a bounded set of TCP connections to one memcached address
//! between many concurrent callers.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Idle connections are reused FIFO; the open
//!    count only grows by dialing and only shrinks by closing.
//! 2. **Minimal Locking**: One mutex guards the idle list, the pending queue
//!    and the counters and is never held across an await.
//! 3. **Queue, Don't Spin**: A saturated acquisition becomes a pending request
//!    served by a single dispatcher task, which sleeps until a connection is
//!    released, the request's deadline passes, or its context is cancelled.
//! 4. **Always Answer**: Every queued request receives a connection or a
//!    definitive error, including dial failures and pool shutdown.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{oneshot, Notify};
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::context::Context;
use crate::memcached::error::{PoolError, PoolResult};

/// Hard ceiling on acquisitions waiting for capacity.
pub const MAX_PENDING_REQUESTS: usize = 10_000;

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Backend host name or IP.
    pub host: String,
    /// Backend port.
    pub port: u16,
    /// Maximum number of idle connections to keep.
    pub max_idle_conns: usize,
    /// Maximum open connections (idle + in use), 0 = unlimited.
    pub max_open_conns: usize,
    /// Dial timeout for a new connection, zero = no timeout.
    pub new_conn_timeout: Duration,
    /// How long a queued acquisition waits for capacity.
    pub conn_retry_timeout: Duration,
}

impl PoolConfig {
    /// Returns the `host:port` address dialed by the pool.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            host: "127.0.0.1".to_string(),
            port: 11211,
            max_idle_conns: 10,
            max_open_conns: 10,
            new_conn_timeout: Duration::from_millis(3000),
            conn_retry_timeout: Duration::from_millis(3000),
        }
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub open_conns: usize,
    pub idle_conns: usize,
}

struct PoolState {
    idle: VecDeque<TcpStream>,
    // FIFO of saturated acquisitions, served by the dispatcher.
    pending: VecDeque<PendingRequest>,
    open: usize,
    max_idle: usize,
    closed: bool,
}

enum Checkout {
    Idle(TcpStream),
    Dial,
    Saturated,
    Closed,
}

struct PendingRequest {
    reply: oneshot::Sender<PoolResult<PooledConnection>>,
    ctx: Context,
    deadline: Instant,
}

struct Shared {
    addr: String,
    state: Mutex<PoolState>,
    // Wakes the dispatcher when capacity may have freed up.
    released: Notify,
    // Wakes the dispatcher when a request is queued or the pool closes.
    queued: Notify,
    config: PoolConfig,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes an idle connection or reserves a slot for dialing.
    fn checkout(&self) -> Checkout {
        let mut state = self.lock();
        if state.closed {
            return Checkout::Closed;
        }
        if let Some(stream) = state.idle.pop_front() {
            return Checkout::Idle(stream);
        }
        let max_open = self.config.max_open_conns;
        if max_open == 0 || state.open < max_open {
            state.open += 1;
            return Checkout::Dial;
        }
        Checkout::Saturated
    }

    async fn dial(&self) -> PoolResult<TcpStream> {
        let connect = TcpStream::connect(self.addr.as_str());
        let result = if self.config.new_conn_timeout.is_zero() {
            connect.await
        } else {
            match time::timeout(self.config.new_conn_timeout, connect).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "dial timed out")),
            }
        };

        let stream = result.map_err(|source| PoolError::ServerConnect {
            addr: self.addr.clone(),
            source,
        })?;
        // Small request/response frames; disable Nagle.
        if let Err(err) = stream.set_nodelay(true) {
            debug!(addr = %self.addr, error = %err, "unable to set TCP_NODELAY");
        }
        debug!(addr = %self.addr, "opened memcached connection");
        Ok(stream)
    }

    fn release_slot(&self) {
        {
            let mut state = self.lock();
            state.open = state.open.saturating_sub(1);
        }
        self.released.notify_one();
    }

    /// Returns a borrowed connection. Broken connections and connections
    /// beyond idle capacity are closed.
    fn put(&self, stream: TcpStream, reusable: bool) {
        let discarded = {
            let mut state = self.lock();
            if reusable && state.idle.len() < state.max_idle {
                state.idle.push_back(stream);
                None
            } else {
                state.open = state.open.saturating_sub(1);
                Some(stream)
            }
        };
        drop(discarded);
        self.released.notify_one();
    }
}

/// Releases a reserved open slot unless the dial succeeded.
struct Reservation<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl Reservation<'_> {
    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.release_slot();
        }
    }
}

async fn open_reserved(shared: &Arc<Shared>) -> PoolResult<PooledConnection> {
    let reservation = Reservation {
        shared,
        armed: true,
    };
    let stream = shared.dial().await?;
    reservation.keep();
    Ok(PooledConnection::new(Arc::clone(shared), stream))
}

/// Closes the pool once the last `Pool` handle is gone, which also stops
/// the dispatcher.
struct Lifetime {
    shared: Arc<Shared>,
}

impl Drop for Lifetime {
    fn drop(&mut self) {
        shutdown(&self.shared);
    }
}

/// Connection pool handle.
///
/// Cloning is cheap; all clones share one pool and one dispatcher task.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<Shared>,
    _lifetime: Arc<Lifetime>,
}

impl Pool {
    /// Creates a pool and spawns its dispatcher. Must be called inside a
    /// tokio runtime. No connection is dialed until the first acquisition.
    pub fn new(config: PoolConfig) -> Self {
        let shared = Arc::new(Shared {
            addr: config.addr(),
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(config.max_idle_conns),
                pending: VecDeque::new(),
                open: 0,
                max_idle: config.max_idle_conns,
                closed: false,
            }),
            released: Notify::new(),
            queued: Notify::new(),
            config,
        });

        tokio::spawn(dispatch(Arc::clone(&shared)));

        Pool {
            _lifetime: Arc::new(Lifetime {
                shared: Arc::clone(&shared),
            }),
            shared,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Acquires a connection.
    ///
    /// Dial failures outside the queue are returned immediately. When the
    /// pool is saturated the call waits at most `conn_retry_timeout` and
    /// gives up early if `ctx` is cancelled.
    pub async fn acquire(&self, ctx: &Context) -> PoolResult<PooledConnection> {
        match self.shared.checkout() {
            Checkout::Idle(stream) => {
                return Ok(PooledConnection::new(Arc::clone(&self.shared), stream))
            }
            Checkout::Dial => return open_reserved(&self.shared).await,
            Checkout::Closed => return Err(PoolError::Closed),
            Checkout::Saturated => {}
        }
        if ctx.is_cancelled() {
            return Err(PoolError::ConnCanceled);
        }

        let deadline = Instant::now() + self.shared.config.conn_retry_timeout;
        let (reply, delivery) = oneshot::channel();
        {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }
            if state.pending.len() >= MAX_PENDING_REQUESTS {
                // Waiters that already gave up do not count toward the limit.
                state.pending.retain(|request| !request.reply.is_closed());
            }
            if state.pending.len() >= MAX_PENDING_REQUESTS {
                return Err(PoolError::QueueFull);
            }
            state.pending.push_back(PendingRequest {
                reply,
                ctx: ctx.clone(),
                deadline,
            });
        }
        self.shared.queued.notify_one();
        debug!(
            request_id = %ctx.request_id(),
            addr = %self.shared.addr,
            "pool saturated, connection request queued"
        );

        // A connection delivered after we stop listening is dropped with the
        // receiver and finds its own way back to the pool.
        tokio::select! {
            delivered = delivery => delivered.unwrap_or(Err(PoolError::Closed)),
            _ = ctx.cancelled() => Err(PoolError::ConnCanceled),
            _ = time::sleep_until(deadline) => Err(PoolError::ConnTimeout),
        }
    }

    /// Number of acquisitions queued and not yet picked up by the dispatcher.
    pub fn pending_requests(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.lock();
        PoolStats {
            open_conns: state.open,
            idle_conns: state.idle.len(),
        }
    }

    /// Closes every idle connection, fails queued requests and stops the
    /// dispatcher. Connections released afterwards are closed immediately.
    pub fn close(&self) {
        shutdown(&self.shared);
    }
}

fn shutdown(shared: &Shared) {
    let drained: Vec<TcpStream> = {
        let mut state = shared.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.max_idle = 0;
        let drained: Vec<TcpStream> = state.idle.drain(..).collect();
        state.open = state.open.saturating_sub(drained.len());
        drained
    };
    let closed = drained.len();
    drop(drained);

    shared.released.notify_one();
    shared.queued.notify_one();
    info!(addr = %shared.addr, closed, "connection pool closed");
}

async fn dispatch(shared: Arc<Shared>) {
    loop {
        let next = {
            let mut state = shared.lock();
            if state.closed {
                break;
            }
            state.pending.pop_front()
        };
        match next {
            Some(request) => serve(&shared, request).await,
            None => shared.queued.notified().await,
        }
    }

    let abandoned: Vec<PendingRequest> = shared.lock().pending.drain(..).collect();
    for request in abandoned {
        let _ = request.reply.send(Err(PoolError::Closed));
    }
    debug!(addr = %shared.addr, "pool dispatcher stopped");
}

async fn serve(shared: &Arc<Shared>, mut request: PendingRequest) {
    let outcome = loop {
        if request.reply.is_closed() {
            return;
        }
        match shared.checkout() {
            Checkout::Idle(stream) => break Ok(PooledConnection::new(Arc::clone(shared), stream)),
            Checkout::Dial => break open_reserved(shared).await,
            Checkout::Closed => break Err(PoolError::Closed),
            Checkout::Saturated => {}
        }

        tokio::select! {
            _ = shared.released.notified() => {}
            _ = time::sleep_until(request.deadline) => break Err(PoolError::ConnTimeout),
            _ = request.ctx.cancelled() => break Err(PoolError::ConnCanceled),
            _ = request.reply.closed() => return,
        }
    };

    if let Err(err) = &outcome {
        debug!(request_id = %request.ctx.request_id(), error = %err, "queued connection request failed");
    }
    let _ = request.reply.send(outcome);
}

/// RAII wrapper returning a connection to the pool on drop.
pub struct PooledConnection {
    shared: Arc<Shared>,
    stream: Option<TcpStream>,
    reusable: bool,
}

impl PooledConnection {
    fn new(shared: Arc<Shared>, stream: TcpStream) -> Self {
        PooledConnection {
            shared,
            stream: Some(stream),
            reusable: true,
        }
    }

    /// The underlying stream.
    pub fn stream(&mut self) -> &mut TcpStream {
        self.stream.as_mut().expect("connection exists until drop")
    }

    /// Marks the connection as broken so the pool closes it on release.
    pub fn discard(&mut self) {
        self.reusable = false;
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("addr", &self.shared.addr)
            .field("reusable", &self.reusable)
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.shared.put(stream, self.reusable);
        }
    }
}
