//! Relay session: one client, one upstream server.
//!
//! The session follows the handshake and login exchange just far enough to
//! learn the protocol version and the player, then installs a
//! [`ConnectionProxy`] and routes every clientbound play packet through it.
//! Serverbound traffic is relayed untouched.

use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use mcshim_proto::wire::{Reader, put_string, put_varint};
use mcshim_proto::{FrameCodec, OutboundMessage, ProtocolVersion};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, warn};
use uuid::Uuid;

use crate::error::RelayError;
use crate::proxy::{Connection, ConnectionInfo, ConnectionProxy, ProxyDeps};

const HANDSHAKE_ID: i32 = 0x00;
const NEXT_STATE_LOGIN: i32 = 2;

const LOGIN_DISCONNECT: i32 = 0x00;
const LOGIN_ENCRYPTION_REQUEST: i32 = 0x01;
const LOGIN_SUCCESS: i32 = 0x02;
const LOGIN_SET_COMPRESSION: i32 = 0x03;

const MAX_HOST_CHARS: usize = 255;
const MAX_USERNAME_CHARS: usize = 16;
const UUID_STRING_CHARS: usize = 36;

/// Per-session settings shared by every session of a gateway.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub upstream: SocketAddr,
    /// Capacity of the queue between the proxy and the client writer.
    pub send_queue: usize,
}

/// Serverbound handshake packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol: i32,
    pub address: String,
    pub port: u16,
    pub next_state: i32,
}

impl Handshake {
    /// Parse a handshake frame payload (`VarInt id ++ fields`).
    pub fn parse(frame: &[u8]) -> Result<Self, RelayError> {
        let mut r = Reader::new(frame);
        if r.varint("packet id")? != HANDSHAKE_ID {
            return Err(RelayError::Malformed("handshake"));
        }
        let protocol = r.varint("protocol version")?;
        let address = r.string(MAX_HOST_CHARS, "server address")?.to_owned();
        let port = r.bytes(2, "server port")?;
        let port = u16::from_be_bytes([port[0], port[1]]);
        let next_state = r.varint("next state")?;

        Ok(Self {
            protocol,
            address,
            port,
            next_state,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.address.len() + 16);
        put_varint(&mut buf, HANDSHAKE_ID);
        put_varint(&mut buf, self.protocol);
        put_string(&mut buf, &self.address);
        buf.extend_from_slice(&self.port.to_be_bytes());
        put_varint(&mut buf, self.next_state);
        buf.freeze()
    }

    /// The intercepted version, if the client speaks one.
    pub fn version(&self) -> Option<ProtocolVersion> {
        ProtocolVersion::from_protocol(self.protocol)
    }

    pub fn is_login(&self) -> bool {
        self.next_state == NEXT_STATE_LOGIN
    }
}

/// Player identity from a Login Success body (hyphenated uuid string, name).
fn parse_login_success(body: &[u8]) -> Result<(Uuid, String), RelayError> {
    let mut r = Reader::new(body);
    let uuid = r.string(UUID_STRING_CHARS, "uuid")?;
    let uuid = Uuid::parse_str(uuid).map_err(|_| RelayError::Malformed("login success"))?;
    let name = r.string(MAX_USERNAME_CHARS, "username")?.to_owned();
    Ok((uuid, name))
}

type FrameReader = FramedRead<OwnedReadHalf, FrameCodec>;
type FrameWriter = FramedWrite<OwnedWriteHalf, FrameCodec>;

/// Framed halves of both sockets.
struct Link {
    client_rx: FrameReader,
    client_tx: FrameWriter,
    upstream_rx: FrameReader,
    upstream_tx: FrameWriter,
}

impl Link {
    fn new(client: TcpStream, upstream: TcpStream) -> Self {
        let (client_read, client_write) = client.into_split();
        let (upstream_read, upstream_write) = upstream.into_split();
        Self {
            client_rx: FramedRead::new(client_read, FrameCodec::new()),
            client_tx: FramedWrite::new(client_write, FrameCodec::new()),
            upstream_rx: FramedRead::new(upstream_read, FrameCodec::new()),
            upstream_tx: FramedWrite::new(upstream_write, FrameCodec::new()),
        }
    }

    /// Relay raw bytes in both directions until either side closes.
    async fn pipe(self, shutdown: &CancellationToken) -> Result<(), RelayError> {
        let Link {
            mut client_rx,
            client_tx,
            mut upstream_rx,
            upstream_tx,
        } = self;

        let mut to_upstream = upstream_tx.into_inner();
        let mut to_client = client_tx.into_inner();
        let buffered = client_rx.read_buffer_mut().split();
        to_upstream.write_all(&buffered).await?;
        let buffered = upstream_rx.read_buffer_mut().split();
        to_client.write_all(&buffered).await?;

        let mut from_client = client_rx.into_inner();
        let mut from_upstream = upstream_rx.into_inner();
        tokio::select! {
            _ = shutdown.cancelled() => {}
            copied = tokio::io::copy(&mut from_client, &mut to_upstream) => {
                copied?;
            }
            copied = tokio::io::copy(&mut from_upstream, &mut to_client) => {
                copied?;
            }
        }
        Ok(())
    }

    /// Relay the login exchange. Returns the player once the upstream
    /// accepts the login, `None` if either side gives up first.
    async fn login(&mut self, shutdown: &CancellationToken) -> Result<Option<(Uuid, String)>, RelayError> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(None),
                frame = self.client_rx.next() => match frame.transpose()? {
                    Some(frame) => self.upstream_tx.send(frame).await?,
                    None => return Ok(None),
                },
                frame = self.upstream_rx.next() => {
                    let Some(frame) = frame.transpose()? else {
                        return Ok(None);
                    };
                    let mut r = Reader::new(&frame);
                    match r.varint("packet id")? {
                        LOGIN_ENCRYPTION_REQUEST => return Err(RelayError::EncryptionRequested),
                        LOGIN_SET_COMPRESSION => {
                            let threshold = r.varint("threshold")?;
                            return Err(RelayError::CompressionRequested(threshold));
                        }
                        LOGIN_SUCCESS => {
                            let player = parse_login_success(r.remaining())?;
                            self.client_tx.send(frame).await?;
                            return Ok(Some(player));
                        }
                        LOGIN_DISCONNECT => {
                            self.client_tx.send(frame).await?;
                            info!("Upstream refused login");
                            return Ok(None);
                        }
                        _ => self.client_tx.send(frame).await?,
                    }
                }
            }
        }
    }

    /// Play phase: clientbound packets go through `conn`, whose send path
    /// ends in `outgoing`.
    async fn play(
        &mut self,
        conn: &Connection,
        outgoing: &mut mpsc::Receiver<OutboundMessage>,
        shutdown: &CancellationToken,
    ) -> Result<(), RelayError> {
        let version = conn.info().version;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = conn.disconnected() => return Ok(()),
                frame = self.client_rx.next() => match frame.transpose()? {
                    Some(frame) => self.upstream_tx.send(frame).await?,
                    None => return Ok(()),
                },
                frame = self.upstream_rx.next() => {
                    let Some(frame) = frame.transpose()? else {
                        return Ok(());
                    };
                    let msg = OutboundMessage::decode(version, frame)?;
                    conn.send(msg)?;
                    while let Ok(msg) = outgoing.try_recv() {
                        self.client_tx.feed(msg).await?;
                    }
                    SinkExt::<OutboundMessage>::flush(&mut self.client_tx).await?;
                }
                Some(msg) = outgoing.recv() => self.client_tx.send(msg).await?,
            }
        }
    }
}

/// A relayed client connection.
pub struct Session {
    id: u64,
    client: TcpStream,
    addr: SocketAddr,
    config: SessionConfig,
    deps: ProxyDeps,
    shutdown: CancellationToken,
}

impl Session {
    pub fn new(
        id: u64,
        client: TcpStream,
        addr: SocketAddr,
        config: SessionConfig,
        deps: ProxyDeps,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            client,
            addr,
            config,
            deps,
            shutdown,
        }
    }

    /// Run the session to completion.
    pub async fn run(self) -> Result<(), RelayError> {
        let Self {
            id,
            client,
            addr,
            config,
            deps,
            shutdown,
        } = self;

        let upstream = TcpStream::connect(config.upstream).await?;
        client.set_nodelay(true)?;
        upstream.set_nodelay(true)?;
        let mut link = Link::new(client, upstream);

        let Some(frame) = link.client_rx.next().await.transpose()? else {
            return Ok(());
        };
        let handshake = Handshake::parse(&frame)?;
        link.upstream_tx.send(frame).await?;

        let version = match handshake.version() {
            Some(version) if handshake.is_login() => version,
            Some(_) => {
                debug!(next_state = handshake.next_state, "Status request; relaying raw");
                return link.pipe(&shutdown).await;
            }
            None => {
                warn!(protocol = handshake.protocol, "Unsupported protocol; relaying without interception");
                return link.pipe(&shutdown).await;
            }
        };

        let Some((uuid, name)) = link.login(&shutdown).await? else {
            return Ok(());
        };
        Span::current().record("player", name.as_str());

        let info = ConnectionInfo::new(id, version, uuid, name).with_remote_addr(addr);
        let span = crate::telemetry::spans::connection(id, &info.player_name, &version.to_string());

        let (tx, mut outgoing) = mpsc::channel::<OutboundMessage>(config.send_queue);
        let conn = Connection::new(info, Arc::new(tx));
        ConnectionProxy::install(&conn, deps)?;

        let result = link
            .play(&conn, &mut outgoing, &shutdown)
            .instrument(span)
            .await;
        conn.disconnect();
        result
    }
}
