//! TCP transport
//!
//! Each frame is a 4-byte big-endian length followed by a `bincode` payload.
//! A connection carries any number of request/response pairs; the client
//! side dials a fresh connection per call.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use sightline_core::{Result, SightlineError};

use crate::api::{dispatch, RemoteReplica, ReplicaApi, RpcChannel, RpcRequest, RpcResponse};
use crate::network::Connector;

/// Largest accepted frame payload
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Pause after a failed `accept` (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Write one length-prefixed frame
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(message)
        .map_err(|e| SightlineError::internal(format!("encode frame: {e}")))?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len as usize <= MAX_FRAME_LEN)
        .ok_or_else(|| {
            SightlineError::invalid_argument(format!(
                "frame of {} bytes exceeds the {MAX_FRAME_LEN} byte limit",
                payload.len()
            ))
        })?;

    writer.write_u32(len).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. `None` on a clean end of stream before the length prefix.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_LEN {
        return Err(SightlineError::unavailable(format!(
            "peer announced a {len} byte frame, limit is {MAX_FRAME_LEN}"
        )));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    bincode::deserialize(&payload)
        .map(Some)
        .map_err(|e| SightlineError::unavailable(format!("decode frame: {e}")))
}

// =============================================================================
// Server
// =============================================================================

/// Serves a replica over TCP
pub struct TcpReplicaServer {
    listener: TcpListener,
    replica: Arc<dyn ReplicaApi>,
}

impl TcpReplicaServer {
    /// Bind to `address`. Port 0 picks a free port; see [`Self::local_addr`].
    pub async fn bind(address: &str, replica: Arc<dyn ReplicaApi>) -> Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener, replica })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the future is dropped
    pub async fn serve(self) {
        let Self { listener, replica } = self;
        accept_loop(|| listener.accept(), replica).await;
    }
}

async fn accept_loop<A, Fut>(mut accept: A, replica: Arc<dyn ReplicaApi>)
where
    A: FnMut() -> Fut + Send,
    Fut: Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send,
{
    loop {
        match accept().await {
            Ok((stream, peer)) => {
                let replica = replica.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, replica).await {
                        debug!(peer = %peer, error = %e, "Connection closed with error");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn serve_connection(mut stream: TcpStream, replica: Arc<dyn ReplicaApi>) -> Result<()> {
    while let Some(request) = read_frame::<_, RpcRequest>(&mut stream).await? {
        let operation = request.operation();
        let response = dispatch(replica.as_ref(), request).await;
        if let RpcResponse::Error(e) = &response {
            debug!(operation, error = %e, "Request failed");
        }
        write_frame(&mut stream, &response).await?;
    }
    Ok(())
}

// =============================================================================
// Client
// =============================================================================

/// One request per fresh connection to `address`
#[derive(Debug, Clone)]
pub struct TcpChannel {
    address: String,
    timeout: Option<Duration>,
}

impl TcpChannel {
    /// Channel to `address`, optionally bounding each call by `timeout`
    pub fn new(address: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    async fn round_trip(&self, request: RpcRequest) -> Result<RpcResponse> {
        let mut stream = TcpStream::connect(&self.address).await.map_err(|e| {
            SightlineError::unavailable(format!("connect to {}: {e}", self.address))
        })?;
        write_frame(&mut stream, &request).await?;
        read_frame(&mut stream).await?.ok_or_else(|| {
            SightlineError::unavailable(format!("{} closed the connection", self.address))
        })
    }
}

#[async_trait]
impl RpcChannel for TcpChannel {
    async fn call(&self, request: RpcRequest) -> Result<RpcResponse> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.round_trip(request))
                .await
                .map_err(|_| {
                    SightlineError::unavailable(format!(
                        "{} did not answer within {limit:?}",
                        self.address
                    ))
                })?,
            None => self.round_trip(request).await,
        }
    }
}

/// Dials replicas over TCP
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    timeout: Option<Duration>,
}

impl TcpConnector {
    /// Connector whose calls are bounded by `timeout`
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn ReplicaApi>> {
        Ok(Arc::new(RemoteReplica::new(TcpChannel::new(
            address,
            self.timeout,
        ))))
    }
}
