//! Framed socket peers standing in for a game client or upstream server.

use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use mcshim_proto::FrameCodec;
use mcshim_proto::wire::{Reader, put_varint};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

/// A length-framed TCP peer.
#[allow(dead_code)]
pub struct FramedPeer {
    framed: Framed<TcpStream, FrameCodec>,
}

#[allow(dead_code)]
impl FramedPeer {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            framed: Framed::new(stream, FrameCodec::new()),
        }
    }

    pub async fn connect(addr: std::net::SocketAddr) -> anyhow::Result<Self> {
        Ok(Self::new(TcpStream::connect(addr).await?))
    }

    /// Send `id ++ body` as one frame.
    pub async fn send_packet(&mut self, id: i32, body: &[u8]) -> anyhow::Result<()> {
        let mut frame = BytesMut::new();
        put_varint(&mut frame, id);
        frame.extend_from_slice(body);
        self.send_frame(frame.freeze()).await
    }

    pub async fn send_frame(&mut self, frame: Bytes) -> anyhow::Result<()> {
        self.framed.send(frame).await?;
        Ok(())
    }

    /// Next frame, split into packet id and body.
    pub async fn recv_packet(&mut self) -> anyhow::Result<(i32, Bytes)> {
        let frame = self.recv_frame().await?;
        let mut r = Reader::new(&frame);
        let id = r.varint("packet id")?;
        let body = frame.slice(r.position()..);
        Ok((id, body))
    }

    pub async fn recv_frame(&mut self) -> anyhow::Result<Bytes> {
        match tokio::time::timeout(Duration::from_secs(5), self.framed.next()).await {
            Ok(Some(frame)) => Ok(frame?),
            Ok(None) => anyhow::bail!("peer closed"),
            Err(_) => anyhow::bail!("timed out waiting for a frame"),
        }
    }

    /// Whether the other side closed within the timeout.
    pub async fn closed(&mut self, timeout: Duration) -> bool {
        matches!(tokio::time::timeout(timeout, self.framed.next()).await, Ok(None) | Ok(Some(Err(_))))
    }
}
