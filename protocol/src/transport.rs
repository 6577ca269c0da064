//! 传输层
//!
//! 帧格式：`[版本 1 字节][长度 4 字节，大端][bincode 负载]`。
//! 上层通过 Connector/Connection/Listener traits 使用，与具体 socket 解耦。

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use crate::error::{ProtocolError, Result};
use crate::{CONNECT_TIMEOUT, MAX_FRAME_SIZE, PROTOCOL_VERSION};

/// 帧头大小: 1 字节版本 + 4 字节长度
pub const HEADER_SIZE: usize = 5;

/// 编码帧头
pub fn encode_header(length: usize) -> Result<[u8; HEADER_SIZE]> {
    check_size(length)?;
    let mut header = [0u8; HEADER_SIZE];
    header[0] = PROTOCOL_VERSION;
    header[1..].copy_from_slice(&(length as u32).to_be_bytes());
    Ok(header)
}

/// 解码帧头，返回负载长度
pub fn decode_header(header: &[u8; HEADER_SIZE]) -> Result<usize> {
    let version = header[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            actual: version,
        });
    }

    let length = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    check_size(length)?;
    Ok(length)
}

/// 将消息编码为完整的帧
pub fn encode_frame<M: Serialize>(msg: &M) -> Result<Vec<u8>> {
    let payload = bincode::serialize(msg)?;
    let header = encode_header(payload.len())?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

fn check_size(length: usize) -> Result<()> {
    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: length,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(())
}

/// 对端关闭时 read_exact 返回 UnexpectedEof
fn map_eof(e: std::io::Error) -> ProtocolError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::ConnectionClosed
    } else {
        ProtocolError::Io(e)
    }
}

/// 连接抽象 trait
#[async_trait]
pub trait Connection: Send + Sync {
    /// 发送消息
    async fn send<M: Serialize + Send + Sync>(&mut self, msg: &M) -> Result<()>;

    /// 接收消息
    async fn recv<M: DeserializeOwned>(&mut self) -> Result<M>;

    /// 获取远端地址
    fn peer_addr(&self) -> Option<String>;
}

/// 连接器 trait（客户端使用）
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    /// 建立连接
    async fn connect(&self, addr: &str) -> Result<Self::Conn>;
}

/// 监听器 trait（服务端使用）
#[async_trait]
pub trait Listener: Send + Sync + Sized {
    type Conn: Connection;

    /// 绑定地址
    async fn bind(addr: &str) -> Result<Self>;

    /// 接受连接
    async fn accept(&mut self) -> Result<Self::Conn>;

    /// 获取本地地址
    fn local_addr(&self) -> Option<String>;
}

// ============================================================================
// TCP 实现
// ============================================================================

/// TCP 连接器
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Conn = TcpConnection;

    async fn connect(&self, addr: &str) -> Result<Self::Conn> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)??;
        TcpConnection::from_stream(stream)
    }
}

/// TCP 连接
pub struct TcpConnection {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    peer_addr: Option<String>,
}

impl TcpConnection {
    /// 从 TcpStream 创建
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
            peer_addr,
        })
    }

    /// 分离读写端，便于读写放在不同任务中
    pub fn split(self) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
        (self.reader, self.writer)
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send<M: Serialize + Send + Sync>(&mut self, msg: &M) -> Result<()> {
        self.writer.write_frame(msg).await
    }

    async fn recv<M: DeserializeOwned>(&mut self) -> Result<M> {
        self.reader.read_frame().await
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }
}

/// TCP 监听器
pub struct TcpListener {
    listener: tokio::net::TcpListener,
}

#[async_trait]
impl Listener for TcpListener {
    type Conn = TcpConnection;

    async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    async fn accept(&mut self) -> Result<Self::Conn> {
        let (stream, addr) = self.listener.accept().await?;
        trace!("Accepted TCP connection from {}", addr);
        TcpConnection::from_stream(stream)
    }

    fn local_addr(&self) -> Option<String> {
        self.listener.local_addr().ok().map(|a| a.to_string())
    }
}

// ============================================================================
// 帧读写
// ============================================================================

/// 帧读取器
pub struct FrameReader<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
        }
    }

    /// 读取并解码一帧消息
    pub async fn read_frame<M: DeserializeOwned>(&mut self) -> Result<M> {
        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header).await.map_err(map_eof)?;
        let length = decode_header(&header)?;

        if self.buffer.len() < length {
            self.buffer.resize(length, 0);
        }
        self.reader
            .read_exact(&mut self.buffer[..length])
            .await
            .map_err(map_eof)?;

        trace!("Read frame of {} bytes", length);
        Ok(bincode::deserialize(&self.buffer[..length])?)
    }
}

/// 帧写入器
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 编码并写入一帧消息
    pub async fn write_frame<M: Serialize>(&mut self, msg: &M) -> Result<()> {
        let frame = encode_frame(msg)?;
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        trace!("Wrote frame of {} bytes", frame.len() - HEADER_SIZE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ClientMessage, ServerMessage};
    use crate::piece::Position;

    #[test]
    fn test_header_roundtrip() {
        let header = encode_header(300).unwrap();
        assert_eq!(header, [PROTOCOL_VERSION, 0, 0, 1, 44]);
        assert_eq!(decode_header(&header).unwrap(), 300);
    }

    #[test]
    fn test_header_rejects_wrong_version() {
        let header = [PROTOCOL_VERSION + 1, 0, 0, 0, 4];
        assert!(matches!(
            decode_header(&header),
            Err(ProtocolError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_header_rejects_oversize() {
        assert!(matches!(
            encode_header(MAX_FRAME_SIZE + 1),
            Err(ProtocolError::FrameTooLarge { .. })
        ));

        let mut header = [PROTOCOL_VERSION, 0, 0, 0, 0];
        header[1..].copy_from_slice(&((MAX_FRAME_SIZE as u32) + 1).to_be_bytes());
        assert!(matches!(
            decode_header(&header),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_frames_over_duplex() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        writer
            .write_frame(&ClientMessage::MakeMove {
                from: Position::new(5, 1),
                to: Position::new(4, 2),
            })
            .await
            .unwrap();
        writer.write_frame(&ClientMessage::Ping).await.unwrap();

        match reader.read_frame::<ClientMessage>().await.unwrap() {
            ClientMessage::MakeMove { from, to } => {
                assert_eq!(from, Position::new(5, 1));
                assert_eq!(to, Position::new(4, 2));
            }
            _ => panic!("Unexpected message"),
        }
        assert!(matches!(
            reader.read_frame::<ClientMessage>().await.unwrap(),
            ClientMessage::Ping
        ));
    }

    #[tokio::test]
    async fn test_closed_stream_reports_connection_closed() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let mut reader = FrameReader::new(server);
        assert!(matches!(
            reader.read_frame::<ClientMessage>().await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_tcp_connection() {
        let mut listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client_handle = tokio::spawn(async move {
            let mut conn = TcpConnector.connect(&addr).await.unwrap();
            conn.send(&ClientMessage::Login {
                nickname: "alice".to_string(),
            })
            .await
            .unwrap();

            let msg: ServerMessage = conn.recv().await.unwrap();
            match msg {
                ServerMessage::LoginSuccess { player_id, token } => {
                    assert_eq!(player_id, 1);
                    assert_eq!(token, 42);
                }
                _ => panic!("Unexpected message"),
            }
        });

        let mut conn = listener.accept().await.unwrap();
        assert!(conn.peer_addr().is_some());

        let msg: ClientMessage = conn.recv().await.unwrap();
        match msg {
            ClientMessage::Login { nickname } => assert_eq!(nickname, "alice"),
            _ => panic!("Unexpected message"),
        }

        conn.send(&ServerMessage::LoginSuccess {
            player_id: 1,
            token: 42,
        })
            .await
            .unwrap();

        client_handle.await.unwrap();
    }
}
