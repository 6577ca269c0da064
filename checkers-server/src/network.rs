//! 网络层
//!
//! - 接受循环：每个连接一个读任务和一个写任务，连接数受信号量限制
//! - hub 任务：唯一持有 [`ServerState`]，按到达顺序处理所有事件

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use protocol::{
    ClientMessage, Connection, FrameReader, FrameWriter, Listener, ProtocolError, ServerMessage,
    TcpConnection, TcpListener,
};

use crate::config::ServerConfig;
use crate::server::{ConnectionId, MessageHandler, ServerState};

/// hub 事件队列容量
const HUB_QUEUE_SIZE: usize = 1024;

/// 每个连接的发送队列容量
const OUTBOUND_QUEUE_SIZE: usize = 64;

/// 断线超时检查间隔
const TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// 连接任务发给 hub 的事件
#[derive(Debug)]
pub enum HubEvent {
    /// 新连接，附带该连接的发送通道
    Connected {
        conn_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// 收到客户端消息
    Message {
        conn_id: ConnectionId,
        msg: ClientMessage,
    },
    /// 连接断开
    Disconnected { conn_id: ConnectionId },
}

/// hub 主循环：处理事件并定期检查断线超时，事件通道关闭后退出
pub async fn run_hub(mut state: ServerState, mut events: mpsc::Receiver<HubEvent>) {
    let mut ticker = tokio::time::interval(TIMEOUT_CHECK_INTERVAL);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => dispatch(&mut state, event),
                None => break,
            },
            _ = ticker.tick() => MessageHandler::check_disconnect_timeouts(&mut state),
        }
    }

    debug!("Hub stopped");
}

fn dispatch(state: &mut ServerState, event: HubEvent) {
    match event {
        HubEvent::Connected { conn_id, sender } => {
            state.register_connection(conn_id, sender);
        }
        HubEvent::Message { conn_id, msg } => {
            debug!("Connection {} -> {:?}", conn_id, msg);
            MessageHandler::handle(state, conn_id, msg);
        }
        HubEvent::Disconnected { conn_id } => {
            MessageHandler::handle_disconnect(state, conn_id);
        }
    }
}

/// 对局服务器
pub struct Server {
    listener: TcpListener,
    state: ServerState,
    max_connections: usize,
    heartbeat_timeout: Duration,
}

impl Server {
    /// 按配置绑定监听地址并初始化状态
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let state = ServerState::new(config).context("初始化服务器状态失败")?;
        Self::bind_with_state(config, state).await
    }

    /// 使用给定状态绑定
    pub async fn bind_with_state(config: &ServerConfig, state: ServerState) -> Result<Self> {
        let addr = config.bind_addr()?.to_string();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("无法监听 {}", addr))?;

        Ok(Self {
            listener,
            state,
            max_connections: config.max_connections,
            heartbeat_timeout: config.heartbeat_timeout(),
        })
    }

    /// 实际监听地址
    pub fn local_addr(&self) -> Option<String> {
        self.listener.local_addr()
    }

    /// 运行直到 `shutdown` 完成
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let Server {
            mut listener,
            state,
            max_connections,
            heartbeat_timeout,
        } = self;

        info!(
            "Listening on {} (max {} connections)",
            listener.local_addr().unwrap_or_default(),
            max_connections
        );

        let (hub_tx, hub_rx) = mpsc::channel(HUB_QUEUE_SIZE);
        let hub = tokio::spawn(run_hub(state, hub_rx));

        let limit = Arc::new(Semaphore::new(max_connections));
        let mut next_conn_id: ConnectionId = 1;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    let conn = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!("Accept failed: {}", e);
                            continue;
                        }
                    };

                    let Ok(permit) = limit.clone().try_acquire_owned() else {
                        warn!("Connection limit reached, rejecting {:?}", conn.peer_addr());
                        continue;
                    };

                    let conn_id = next_conn_id;
                    next_conn_id += 1;
                    tokio::spawn(handle_connection(
                        conn,
                        conn_id,
                        hub_tx.clone(),
                        heartbeat_timeout,
                        permit,
                    ));
                }
            }
        }

        drop(hub_tx);
        hub.abort();
        Ok(())
    }
}

/// 单个连接的生命周期
async fn handle_connection(
    conn: TcpConnection,
    conn_id: ConnectionId,
    hub: mpsc::Sender<HubEvent>,
    heartbeat_timeout: Duration,
    _permit: OwnedSemaphorePermit,
) {
    let peer = conn.peer_addr().unwrap_or_default();
    info!("Connection {} opened from {}", conn_id, peer);

    let (reader, writer) = conn.split();
    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);

    if hub
        .send(HubEvent::Connected {
            conn_id,
            sender: tx,
        })
        .await
        .is_err()
    {
        return;
    }

    let writer_task = tokio::spawn(write_loop(writer, rx, conn_id));
    read_loop(reader, &hub, conn_id, heartbeat_timeout).await;

    let _ = hub.send(HubEvent::Disconnected { conn_id }).await;
    // hub 移除发送端后写任务自行结束
    if let Err(e) = writer_task.await {
        error!("Writer task for connection {} failed: {}", conn_id, e);
    }
    info!("Connection {} closed", conn_id);
}

async fn read_loop<R>(
    mut reader: FrameReader<R>,
    hub: &mpsc::Sender<HubEvent>,
    conn_id: ConnectionId,
    heartbeat_timeout: Duration,
) where
    R: tokio::io::AsyncRead + Unpin + Send,
{
    loop {
        let msg = match timeout(heartbeat_timeout, reader.read_frame::<ClientMessage>()).await {
            Ok(Ok(msg)) => msg,
            Ok(Err(ProtocolError::ConnectionClosed)) => break,
            Ok(Err(e)) => {
                warn!("Connection {} read error: {}", conn_id, e);
                break;
            }
            Err(_) => {
                warn!("Connection {} heartbeat timeout", conn_id);
                break;
            }
        };

        if hub.send(HubEvent::Message { conn_id, msg }).await.is_err() {
            break;
        }
    }
}

async fn write_loop<W>(
    mut writer: FrameWriter<W>,
    mut rx: mpsc::Receiver<ServerMessage>,
    conn_id: ConnectionId,
) where
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    while let Some(msg) = rx.recv().await {
        if let Err(e) = writer.write_frame(&msg).await {
            debug!("Connection {} write error: {}", conn_id, e);
            break;
        }
    }
}
