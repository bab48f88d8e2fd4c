//! A client or server connection with a negotiated protocol version.
//!
//! The exchange is strictly request/reply:
//!
//! ```text
//! client                         server
//!   ClientState  ───────────────▶
//!                ◀─────────────── ServerState        (handshake)
//!   RequestBlock ───────────────▶
//!                ◀─────────────── ServerState
//!                ◀─────────────── DataBlockList      (one per request block)
//!   Closedown    ───────────────▶
//! ```
//!
//! Every block after the handshake is encoded at `min(client, server)`.
//! Replies echo the sequence number of the request they answer.

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::{ClientState, DataBlockList, RequestBlock, ServerState, WireCodec};
use crate::error::{protocol_codes, Result, UdaError};
use crate::protocol::version::{self, PROTOCOL_VERSION};
use crate::protocol::{build_frame, flags, Frame, FrameBuffer, Header, MessageType};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Which end of the connection this session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    fn outbound_flags(self) -> u8 {
        match self {
            Role::Client => 0,
            Role::Server => flags::TO_CLIENT,
        }
    }
}

/// One end of a framed connection.
pub struct Session<S> {
    stream: S,
    role: Role,
    frames: FrameBuffer,
    pending: VecDeque<Frame>,
    read_buf: Vec<u8>,
    /// Negotiated version, `None` until the handshake completes.
    version: Option<i32>,
    /// Server version seen at handshake; later replies must match it.
    server_version: i32,
    sequence: u32,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, role: Role) -> Self {
        Self::with_frame_buffer(stream, role, FrameBuffer::new())
    }

    /// Use a frame buffer with a custom payload limit.
    pub fn with_frame_buffer(stream: S, role: Role, frames: FrameBuffer) -> Self {
        Self {
            stream,
            role,
            frames,
            pending: VecDeque::new(),
            read_buf: vec![0u8; READ_BUFFER_SIZE],
            version: None,
            server_version: PROTOCOL_VERSION,
            sequence: 0,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The negotiated protocol version, once the handshake is done.
    pub fn version(&self) -> Option<i32> {
        self.version
    }

    /// Sequence number of the last request sent or received.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Send our state, read the server's and fix the session version.
    pub async fn client_handshake(&mut self, client: &ClientState) -> Result<ServerState> {
        self.require_role(Role::Client)?;
        let payload = client.encode(client.version)?;
        self.write_frames(&[(MessageType::ClientState, 0, &payload[..])])
            .await?;

        let frame = self.expect_frame(MessageType::ServerState).await?;
        let server = ServerState::decode(frame.payload_bytes(), client.version)?;

        let negotiated = version::negotiate(client.version, server.version);
        self.server_version = server.version;
        self.version = Some(negotiated);
        tracing::info!(
            client_version = client.version,
            server_version = server.version,
            negotiated,
            "handshake complete"
        );
        surface_errors(&server);
        Ok(server)
    }

    /// Read the client's state, answer with ours and fix the session version.
    ///
    /// The client state is read at the layout its sender wrote, so a client
    /// newer than `server.version` is still understood.
    pub async fn server_handshake(&mut self, server: &ServerState) -> Result<ClientState> {
        self.require_role(Role::Server)?;
        let frame = self.expect_frame(MessageType::ClientState).await?;
        let client = ClientState::decode(frame.payload_bytes(), PROTOCOL_VERSION)?;

        let negotiated = version::negotiate(client.version, server.version);
        self.server_version = server.version;
        self.version = Some(negotiated);

        let payload = server.encode(negotiated)?;
        self.write_frames(&[(MessageType::ServerState, error_flags(server), &payload[..])])
            .await?;
        tracing::info!(
            client_version = client.version,
            server_version = server.version,
            negotiated,
            pid = client.pid,
            "handshake complete"
        );
        Ok(client)
    }

    /// Send a request block under a fresh sequence number.
    pub async fn send_request(&mut self, requests: &RequestBlock) -> Result<u32> {
        self.require_role(Role::Client)?;
        let version = self.negotiated()?;
        let payload = requests.encode(version)?;
        self.sequence = self.sequence.wrapping_add(1);
        self.write_frames(&[(MessageType::RequestBlock, 0, &payload[..])])
            .await?;
        Ok(self.sequence)
    }

    /// Wait for the next request block; `None` once the client closes down.
    pub async fn recv_request(&mut self) -> Result<Option<RequestBlock>> {
        self.require_role(Role::Server)?;
        let version = self.negotiated()?;
        let frame = match self.expect_frame(MessageType::RequestBlock).await {
            Ok(frame) => frame,
            Err(UdaError::ConnectionClosed) => return Ok(None),
            Err(e) => return Err(e),
        };
        self.sequence = frame.sequence();
        let requests = RequestBlock::decode(frame.payload_bytes(), version)?;
        tracing::debug!(sequence = self.sequence, count = requests.0.len(), "request received");
        Ok(Some(requests))
    }

    /// Answer the last request with the server state and its data blocks.
    pub async fn send_data(&mut self, data: &DataBlockList, server: &ServerState) -> Result<()> {
        self.require_role(Role::Server)?;
        let version = self.negotiated()?;
        let state = server.encode(version)?;
        let blocks = data.encode(version)?;
        let flags = error_flags(server);
        self.write_frames(&[
            (MessageType::ServerState, flags, &state[..]),
            (MessageType::DataBlockList, flags, &blocks[..]),
        ])
        .await
    }

    /// Read the reply to the last request.
    ///
    /// The server's error stack is returned in the state, not as an `Err`;
    /// a reply may carry both data and errors.
    pub async fn recv_data(&mut self) -> Result<(ServerState, DataBlockList)> {
        self.require_role(Role::Client)?;
        let version = self.negotiated()?;

        let frame = self.expect_frame(MessageType::ServerState).await?;
        self.check_sequence(&frame)?;
        let server = ServerState::decode(frame.payload_bytes(), version)?;
        if server.version != self.server_version {
            return Err(UdaError::protocol(
                protocol_codes::STATE,
                format!(
                    "Server protocol version changed from {} to {}: server restarted?",
                    self.server_version, server.version
                ),
            ));
        }
        surface_errors(&server);

        let frame = self.expect_frame(MessageType::DataBlockList).await?;
        self.check_sequence(&frame)?;
        let data = DataBlockList::decode(frame.payload_bytes(), version)?;
        Ok((server, data))
    }

    /// Tell the peer we are done and shut the write side.
    pub async fn close(&mut self) -> Result<()> {
        let empty: &[u8] = &[];
        self.write_frames(&[(MessageType::Closedown, 0, empty)]).await?;
        self.stream.shutdown().await?;
        tracing::debug!(role = ?self.role, "closed down");
        Ok(())
    }

    fn require_role(&self, role: Role) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(UdaError::protocol(
                protocol_codes::STATE,
                format!("Operation not available to a {:?} session", self.role),
            ))
        }
    }

    fn negotiated(&self) -> Result<i32> {
        self.version.ok_or_else(|| {
            UdaError::protocol(protocol_codes::STATE, "Handshake not completed")
        })
    }

    fn check_sequence(&self, frame: &Frame) -> Result<()> {
        if frame.sequence() == self.sequence {
            return Ok(());
        }
        Err(UdaError::protocol(
            protocol_codes::STATE,
            format!(
                "Reply sequence {} does not match request {}",
                frame.sequence(),
                self.sequence
            ),
        ))
    }

    async fn write_frames(&mut self, frames: &[(MessageType, u8, &[u8])]) -> Result<()> {
        let direction = self.role.outbound_flags();
        let mut out = Vec::new();
        for &(kind, flags, payload) in frames {
            let length = u32::try_from(payload.len()).map_err(|_| {
                UdaError::protocol(
                    protocol_codes::HEADER,
                    format!("Payload of {} bytes does not fit a frame", payload.len()),
                )
            })?;
            let header = Header::new(kind, flags | direction, self.sequence, length);
            out.extend_from_slice(&build_frame(&header, payload));
        }
        self.stream.write_all(&out).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }
            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                self.frames.ensure_idle()?;
                return Err(UdaError::ConnectionClosed);
            }
            let frames = self.frames.push(&self.read_buf[..n])?;
            self.pending.extend(frames);
        }
    }

    async fn expect_frame(&mut self, kind: MessageType) -> Result<Frame> {
        let frame = self.read_frame().await?;
        if frame.is_closedown() {
            tracing::debug!(role = ?self.role, "peer closed down");
            return Err(UdaError::ConnectionClosed);
        }
        let inbound_to_client = self.role == Role::Client;
        if frame.header.is_to_client() != inbound_to_client {
            return Err(UdaError::protocol(
                protocol_codes::HEADER,
                "Frame travels in the wrong direction",
            ));
        }
        if frame.message_type() != Some(kind) {
            return Err(UdaError::protocol(
                protocol_codes::HEADER,
                format!("Expected {:?} frame, got {:?}", kind, frame.message_type()),
            ));
        }
        Ok(frame)
    }
}

fn error_flags(server: &ServerState) -> u8 {
    if server.errors.is_empty() {
        0
    } else {
        flags::HAS_ERRORS
    }
}

fn surface_errors(server: &ServerState) {
    for record in server.errors.records() {
        tracing::warn!(
            code = record.code,
            location = %record.location,
            "server error: {}",
            record.message
        );
    }
}
