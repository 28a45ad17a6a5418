// SPDX-License-Identifier: AGPL-3.0-only
//! Framed transport over one TCP connection: a writer loop draining a
//! bounded outbound queue and a reader loop that validates inbound frames
//! and demultiplexes them into per-session mailboxes by session id.

use crate::config::ClientConfig;
use crate::conn;
use crate::error::{ClientError, Result};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tacplus_proto::{
    FLAG_SINGLE_CONNECT, HEADER_LEN, Header, MAX_BODY_LEN, TYPE_ACCT, TYPE_AUTHEN, TYPE_AUTHOR,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-session inbound mailboxes, keyed by session id.
pub(crate) type SessionTable = Arc<DashMap<u32, mpsc::Sender<Vec<u8>>>>;

pub(crate) const OUTBOUND_CAPACITY: usize = 100;
pub(crate) const MAILBOX_CAPACITY: usize = 10;

#[derive(Debug)]
pub(crate) struct Transport {
    outbound: mpsc::Sender<Vec<u8>>,
    local_addr: SocketAddr,
    done: Arc<AtomicBool>,
    shutdown: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    /// Connect and start the two loops.
    pub(crate) async fn open(
        config: &ClientConfig,
        sessions: SessionTable,
        single_connect_seen: Arc<AtomicBool>,
    ) -> Result<Arc<Transport>> {
        let connection = conn::open(config).await?;
        let local_addr = connection.local_addr;
        let (read_half, write_half) = connection.stream.into_split();
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let done = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();

        let reader = tokio::spawn(read_loop(
            read_half,
            sessions,
            single_connect_seen,
            done.clone(),
            shutdown.clone(),
        ));
        let writer = tokio::spawn(write_loop(
            write_half,
            outbound_rx,
            done.clone(),
            shutdown.clone(),
        ));
        debug!(server = %config.server_host, local = %local_addr, "transport opened");

        Ok(Arc::new(Transport {
            outbound,
            local_addr,
            done,
            shutdown,
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
        }))
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Enqueue a sealed frame for the writer. May wait for queue capacity;
    /// fails with `TransportClosed` once either loop has exited.
    pub(crate) async fn submit(&self, frame: Vec<u8>) -> Result<()> {
        if self.is_closed() {
            return Err(ClientError::TransportClosed);
        }
        self.outbound
            .send(frame)
            .await
            .map_err(|_| ClientError::TransportClosed)
    }

    /// Stop both loops, shut the socket down and wait for both tasks to
    /// exit. Safe to call more than once.
    pub(crate) async fn close(&self) {
        self.shutdown.cancel();
        self.done.store(true, Ordering::SeqCst);
        if let Some(handle) = self.reader.lock().await.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.writer.lock().await.take() {
            let _ = handle.await;
        }
    }
}

async fn write_loop(
    mut half: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    done: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        if let Err(err) = half.write_all(&frame).await {
            warn!(error = %err, "transport write failed");
            break;
        }
    }
    done.store(true, Ordering::SeqCst);
    outbound.close();
    while outbound.try_recv().is_ok() {}
    let _ = half.shutdown().await;
}

async fn read_loop(
    mut half: OwnedReadHalf,
    sessions: SessionTable,
    single_connect_seen: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    loop {
        let mut head = [0u8; HEADER_LEN];
        let read = tokio::select! {
            _ = shutdown.cancelled() => break,
            res = half.read_exact(&mut head) => res,
        };
        if let Err(err) = read {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                debug!("server closed the connection");
            } else {
                warn!(error = %err, "transport read failed");
            }
            break;
        }
        let Ok(header) = Header::parse(&head) else {
            break;
        };

        if let Err(err) = check_wire_header(&header) {
            warn!(session_id = header.session_id, error = %err, "skipping invalid frame");
            if header.length > 0 && header.length <= MAX_BODY_LEN {
                let mut sink = vec![0u8; header.length as usize];
                let skipped = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    res = half.read_exact(&mut sink) => res,
                };
                if skipped.is_err() {
                    break;
                }
            }
            continue;
        }

        let mut frame = vec![0u8; HEADER_LEN + header.length as usize];
        frame[..HEADER_LEN].copy_from_slice(&head);
        let read = tokio::select! {
            _ = shutdown.cancelled() => break,
            res = half.read_exact(&mut frame[HEADER_LEN..]) => res,
        };
        if let Err(err) = read {
            warn!(error = %err, "transport read failed mid-frame");
            break;
        }

        if header.flags & FLAG_SINGLE_CONNECT != 0 {
            single_connect_seen.store(true, Ordering::SeqCst);
        }

        let mailbox = sessions
            .get(&header.session_id)
            .map(|entry| entry.value().clone());
        match mailbox {
            Some(tx) => {
                let delivered = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    res = tx.send(frame) => res,
                };
                if delivered.is_err() {
                    debug!(
                        session_id = header.session_id,
                        "session mailbox closed; frame dropped"
                    );
                }
            }
            None => warn!(
                session_id = header.session_id,
                "no live session for inbound frame; dropped"
            ),
        }
    }
    done.store(true, Ordering::SeqCst);
}

fn check_wire_header(header: &Header) -> Result<()> {
    if !matches!(
        header.packet_type,
        TYPE_AUTHEN | TYPE_AUTHOR | TYPE_ACCT
    ) {
        return Err(ClientError::Protocol(anyhow::anyhow!(
            "invalid packet type {}",
            header.packet_type
        )));
    }
    if header.length == 0 {
        return Err(ClientError::EmptyFrame);
    }
    if header.length > MAX_BODY_LEN {
        return Err(ClientError::FrameTooLarge(header.length));
    }
    Ok(())
}
